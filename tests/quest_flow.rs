mod common;

use std::sync::Arc;

use stridequest::validation::Field;
use stridequest::{
    CharacterClass, ClassModifier, Database, Encounter, PersistOutcome, QuestController,
    QuestOutcome, QuestState, QuestStore, RawTelemetry, Severity, TelemetrySnapshot, Transition,
    TransitionRejected,
};

use common::{distance_draft, fast_config, steps};

fn controller_with(db: Database) -> QuestController {
    QuestController::new(&fast_config(), Arc::new(db))
}

#[tokio::test]
async fn ninety_plus_fifteen_completes_at_105() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    controller.accept_quest(distance_draft(100.0)).await.unwrap();
    let modifier = ClassModifier::UNMODIFIED;

    for count in [4500, 4500] {
        let snapshot = controller.ingest_telemetry(steps(count)).await.snapshot;
        controller.apply_progress(snapshot, modifier).await.unwrap();
    }
    assert_eq!(controller.snapshot().await.quest.unwrap().current_progress, 90.0);

    let snapshot = controller.ingest_telemetry(steps(1500)).await.snapshot;
    let report = controller.apply_progress(snapshot, modifier).await.unwrap();

    match report.transition {
        Transition::Completed {
            progress,
            raised_from,
            ..
        } => {
            assert_eq!(progress, 105.0);
            assert_eq!(raised_from, None);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(controller.state().await, QuestState::Completed);

    // Terminal: more progress changes nothing.
    let snapshot = controller.ingest_telemetry(steps(1000)).await.snapshot;
    let again = controller.apply_progress(snapshot, modifier).await.unwrap();
    assert_eq!(again.transition, Transition::AlreadyComplete);
    assert_eq!(controller.snapshot().await.quest.unwrap().current_progress, 105.0);
}

#[tokio::test]
async fn twelve_thousand_steps_scale_with_class() {
    let snapshot = TelemetrySnapshot::from_raw(steps(12_000)).snapshot;
    let config = fast_config().calculator;
    let monk = CharacterClass::Monk.modifier();

    let base = stridequest::progress::distance_delta(&snapshot, ClassModifier::UNMODIFIED, &config);
    let scaled = stridequest::progress::distance_delta(&snapshot, monk, &config);
    assert_eq!(base, 120.0);
    assert!((scaled - 132.0).abs() < 1e-9);
}

#[tokio::test]
async fn heart_rate_300_is_rejected_at_medium() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    let outcome = controller
        .ingest_telemetry(RawTelemetry {
            steps: 800,
            heart_rate: 300.0,
            ..RawTelemetry::default()
        })
        .await;

    assert!(outcome.was_rejected(Field::HeartRate));
    let violation = &outcome.rejected[0];
    assert_eq!(violation.severity, Severity::Medium);
    assert_eq!(outcome.snapshot.steps(), 800);
    assert_eq!(outcome.snapshot.heart_rate(), 0.0);
}

#[tokio::test]
async fn oversized_jump_is_rejected_without_change() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    controller.accept_quest(distance_draft(100.0)).await.unwrap();

    let snapshot = controller.ingest_telemetry(steps(9_000)).await.snapshot;
    let err = controller
        .apply_progress(snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionRejected::InvalidProgress(_)));
    assert_eq!(controller.snapshot().await.quest.unwrap().current_progress, 0.0);
}

#[tokio::test]
async fn encounters_are_reported_once() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    let mut draft = distance_draft(100.0);
    draft.encounters = vec![
        Encounter {
            name: "Troll bridge".into(),
            at_progress: 30.0,
        },
        Encounter {
            name: "Wolf pack".into(),
            at_progress: 60.0,
        },
    ];
    controller.accept_quest(draft).await.unwrap();

    let snapshot = controller.ingest_telemetry(steps(3_500)).await.snapshot;
    let report = controller
        .apply_progress(snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap();
    match report.transition {
        Transition::Advanced { encounters, .. } => {
            assert_eq!(encounters.len(), 1);
            assert_eq!(encounters[0].name, "Troll bridge");
        }
        other => panic!("expected advance, got {other:?}"),
    }

    let report = controller
        .apply_progress(snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap();
    match report.transition {
        Transition::Advanced { encounters, .. } => {
            assert_eq!(encounters.len(), 1);
            assert_eq!(encounters[0].name, "Wolf pack");
        }
        other => panic!("expected advance, got {other:?}"),
    }
}

#[tokio::test]
async fn early_completion_raises_progress_and_scales_rewards() {
    let db = Database::open_in_memory().unwrap();
    let controller = controller_with(db.clone());
    controller.accept_quest(distance_draft(100.0)).await.unwrap();
    let snapshot = controller.ingest_telemetry(steps(2_000)).await.snapshot;
    controller
        .apply_progress(snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap();

    let warrior = CharacterClass::Warrior.modifier();
    let report = controller.complete_quest(warrior).await.unwrap();
    match report.transition {
        Transition::Completed {
            progress,
            raised_from,
            rewards,
            ..
        } => {
            assert_eq!(progress, 100.0);
            assert_eq!(raised_from, Some(20.0));
            assert_eq!(rewards.xp, 144);
            assert_eq!(rewards.gold, 36);
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(report.persist, PersistOutcome::Saved);

    let log = db.quest_log(10).await.unwrap();
    assert_eq!(log[0].outcome, QuestOutcome::Completed);
    assert_eq!(log[0].xp, 144);
}

#[tokio::test]
async fn stored_quest_round_trips_with_correction() {
    let db = Database::open_in_memory().unwrap();
    let first = controller_with(db.clone());
    first.accept_quest(distance_draft(100.0)).await.unwrap();

    // Tamper with the stored copy: marked complete but short of the total.
    let mut stored = db.load_active().await.unwrap().unwrap();
    stored.current_progress = 40.0;
    stored.is_completed = true;
    db.save_active(&stored).await.unwrap();

    let second = controller_with(db.clone());
    let report = second.restore_active().await.unwrap();
    assert_eq!(report.state, QuestState::Completed);
    assert_eq!(report.corrections.len(), 1);
    assert_eq!(report.persist, PersistOutcome::Saved);

    let repaired = db.load_active().await.unwrap().unwrap();
    assert_eq!(repaired.current_progress, 100.0);
    assert!(repaired.is_completed);
}

#[tokio::test]
async fn second_accept_is_refused_while_in_progress() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    controller.accept_quest(distance_draft(50.0)).await.unwrap();
    let err = controller.accept_quest(distance_draft(80.0)).await.unwrap_err();
    assert!(matches!(err, TransitionRejected::QuestAlreadyActive { .. }));
}

#[tokio::test]
async fn stale_intent_is_discarded() {
    let controller = controller_with(Database::open_in_memory().unwrap());
    controller.accept_quest(distance_draft(100.0)).await.unwrap();
    let stale = controller.intent().await.unwrap();

    controller.cancel_quest().await.unwrap();
    controller.accept_quest(distance_draft(100.0)).await.unwrap();

    let snapshot = controller.ingest_telemetry(steps(1_000)).await.snapshot;
    let err = controller
        .apply_deferred_progress(&stale, snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionRejected::StaleIntent {
            quest_id: stale.quest_id.clone()
        }
    );
    assert_eq!(controller.snapshot().await.quest.unwrap().current_progress, 0.0);

    let live = controller.intent().await.unwrap();
    controller
        .apply_deferred_progress(&live, snapshot, ClassModifier::UNMODIFIED)
        .await
        .unwrap();
    assert_eq!(controller.snapshot().await.quest.unwrap().current_progress, 10.0);
}
