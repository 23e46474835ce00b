mod controller;
mod loop_worker;
mod source;

pub use controller::SensingController;
pub use loop_worker::{sensing_loop, SensingConfig, SensingSummary};
pub use source::TelemetrySource;
