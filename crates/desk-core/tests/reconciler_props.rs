//! Property tests for status reconciliation and UI derivation.

use desk_core::{
    derive_ui_state, GenerationStatus, Phase, Reconciler, StatusText,
};
use proptest::prelude::*;

fn any_phase() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::NotRunning),
        Just(Phase::Ideation),
        Just(Phase::Outline),
        Just(Phase::Content),
        Just(Phase::Completed),
    ]
}

fn any_status_text() -> impl Strategy<Value = StatusText> {
    prop_oneof![
        Just(StatusText::NoOp),
        Just(StatusText::Processing),
        Just(StatusText::Success),
        Just(StatusText::Error),
        Just(StatusText::Completed),
    ]
}

/// Only pairs that satisfy the idle invariant.
fn any_status() -> impl Strategy<Value = GenerationStatus> {
    (any_phase(), any_status_text(), "[a-c]{0,2}").prop_filter_map(
        "illegal phase/status pair",
        |(phase, text, message)| GenerationStatus::new(phase, text, message).ok(),
    )
}

proptest! {
    #[test]
    fn duplicate_candidate_leaves_current_unchanged(
        prefix in prop::collection::vec(any_status(), 0..8),
        use_poll in any::<bool>(),
    ) {
        let mut r = Reconciler::new();
        for s in prefix {
            r.on_push(s);
        }
        let before = r.current().clone();
        let count = r.accepted_count();
        let out = if use_poll { r.on_poll(before.clone()) } else { r.on_push(before.clone()) };
        prop_assert!(!out.accepted);
        prop_assert_eq!(out.completed, None);
        prop_assert_eq!(r.current(), &before);
        prop_assert_eq!(r.accepted_count(), count);
    }

    #[test]
    fn last_accepted_candidate_wins(
        stream in prop::collection::vec((any_status(), any::<bool>()), 1..16),
    ) {
        let mut r = Reconciler::new();
        let mut last_accepted = GenerationStatus::initial();
        for (s, from_poll) in stream {
            let out = if from_poll { r.on_poll(s.clone()) } else { r.on_push(s.clone()) };
            if out.accepted {
                last_accepted = s;
            }
            prop_assert_eq!(r.current(), &last_accepted);
        }
    }

    #[test]
    fn completion_fires_once_per_success_run(
        processing in 1usize..4,
        successes in 1usize..4,
    ) {
        let mut r = Reconciler::new();
        let mut fired = 0;
        let run = GenerationStatus::new(Phase::Content, StatusText::Processing, "").unwrap();
        let done = GenerationStatus::new(Phase::Content, StatusText::Success, "").unwrap();
        for _ in 0..processing {
            fired += usize::from(r.on_push(run.clone()).completed.is_some());
        }
        for _ in 0..successes {
            fired += usize::from(r.on_push(done.clone()).completed.is_some());
        }
        prop_assert_eq!(fired, 1);
    }

    #[test]
    fn derive_ui_state_is_pure(status in any_status(), phase in any_phase()) {
        let first = derive_ui_state(&status, phase);
        let _ = derive_ui_state(&GenerationStatus::initial(), Phase::Content);
        let second = derive_ui_state(&status.clone(), phase);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn running_and_complete_are_exclusive(status in any_status(), phase in any_phase()) {
        let ui = derive_ui_state(&status, phase);
        prop_assert!(!(ui.is_running && ui.is_complete));
        if ui.is_running {
            prop_assert!(!ui.can_run_others);
        }
    }
}

#[test]
fn processing_then_success_stream_fires_exactly_once() {
    let mut r = Reconciler::new();
    let statuses = [
        StatusText::Processing,
        StatusText::Processing,
        StatusText::Success,
        StatusText::Success,
    ];
    let fired = statuses
        .into_iter()
        .map(|t| GenerationStatus::new(Phase::Content, t, "").unwrap())
        .filter(|s| r.on_push(s.clone()).completed == Some(Phase::Content))
        .count();
    assert_eq!(fired, 1);
}

#[test]
fn ideation_run_walks_running_then_complete() {
    let mut r = Reconciler::new();

    r.on_push(GenerationStatus::new(Phase::Ideation, StatusText::Processing, "").unwrap());
    let ui = derive_ui_state(r.current(), Phase::Ideation);
    assert!(ui.is_running);
    assert!(!ui.can_run_others);

    r.on_push(GenerationStatus::new(Phase::Ideation, StatusText::Success, "").unwrap());
    let ui = derive_ui_state(r.current(), Phase::Ideation);
    assert!(!ui.is_running);
    assert!(ui.is_complete);
    assert!(ui.can_run_others);
}
