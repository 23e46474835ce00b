use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::ClassModifier;
use crate::quest::QuestController;

use super::loop_worker::{sensing_loop, SensingConfig, SensingSummary};
use super::source::TelemetrySource;

/// Owns at most one running sensing loop.
#[derive(Default)]
pub struct SensingController {
    handle: Option<JoinHandle<SensingSummary>>,
    cancel_token: Option<CancellationToken>,
}

impl SensingController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_sensing(
        &mut self,
        controller: QuestController,
        source: Arc<dyn TelemetrySource>,
        modifier: ClassModifier,
        config: SensingConfig,
    ) -> Result<()> {
        if self.is_active() {
            bail!("sensing already active");
        }

        info!(
            "starting sensing from {} every {:?}",
            source.name(),
            config.poll_interval()
        );

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(sensing_loop(controller, source, modifier, config, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// True while a loop is running. A loop that stopped on its own (quest
    /// completed) is not active.
    pub fn is_active(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancel the loop and wait for it. `None` if nothing was running.
    pub async fn stop_sensing(&mut self) -> Result<Option<SensingSummary>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.join().await
    }

    /// Wait for the loop to stop by itself.
    pub async fn wait(&mut self) -> Result<Option<SensingSummary>> {
        let summary = self.join().await;
        self.cancel_token = None;
        summary
    }

    async fn join(&mut self) -> Result<Option<SensingSummary>> {
        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("sensing loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }
}
