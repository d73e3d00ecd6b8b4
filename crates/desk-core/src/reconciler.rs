//! Status reconciler
//!
//! Merges pushed (channel) and polled (REST) status candidates into one
//! current value. Merge rule:
//! - A candidate equal to `current` in phase, status and message is a
//!   duplicate and is ignored.
//! - Every other candidate replaces `current`, regressions included. Neither
//!   source carries ordering metadata, so last write wins.
//!
//! Transitions into `success` for a watched phase raise a completion signal
//! exactly once per transition.

use crate::status::{GenerationStatus, Phase, StatusText};
use std::fmt;

/// Where a candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Status channel event
    Push,
    /// Status endpoint snapshot
    Poll,
    /// Synthetic status after the channel was closed by the peer
    ConnectionLost,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Source::Push => "push",
            Source::Poll => "poll",
            Source::ConnectionLost => "connection_lost",
        })
    }
}

/// Result of offering one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Candidate replaced `current`
    pub accepted: bool,
    /// Edge-triggered completion of this phase
    pub completed: Option<Phase>,
}

/// Single writer of the current desk status
#[derive(Debug, Clone)]
pub struct Reconciler {
    current: GenerationStatus,
    held: bool,
    completion_phases: Vec<Phase>,
    accepted: u64,
}

impl Reconciler {
    /// Reconciler signalling completion of the content phase
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_completion_phases([Phase::Content])
    }

    /// Reconciler signalling completion of the given phases
    #[must_use]
    pub fn with_completion_phases(phases: impl IntoIterator<Item = Phase>) -> Self {
        Self {
            current: GenerationStatus::initial(),
            held: false,
            completion_phases: phases.into_iter().collect(),
            accepted: 0,
        }
    }

    /// Current truth
    #[inline]
    #[must_use]
    pub fn current(&self) -> &GenerationStatus {
        &self.current
    }

    /// Check if a real status has been observed since the last reset
    #[inline]
    #[must_use]
    pub fn holds_status(&self) -> bool {
        self.held
    }

    /// Number of accepted candidates since the last reset
    #[inline]
    #[must_use]
    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    /// Phases whose success raises a completion signal
    #[inline]
    #[must_use]
    pub fn completion_phases(&self) -> &[Phase] {
        &self.completion_phases
    }

    /// Offer a channel-pushed candidate
    pub fn on_push(&mut self, candidate: GenerationStatus) -> Reconciled {
        self.offer(candidate, Source::Push)
    }

    /// Offer a polled candidate
    pub fn on_poll(&mut self, candidate: GenerationStatus) -> Reconciled {
        self.offer(candidate, Source::Poll)
    }

    /// Degrade to the connection-lost status
    ///
    /// Does nothing unless a status is already held.
    pub fn on_connection_lost(&mut self) -> Reconciled {
        if !self.held {
            tracing::debug!("connection lost before any status was held");
            return Reconciled::default();
        }
        self.offer(GenerationStatus::connection_lost(), Source::ConnectionLost)
    }

    /// Establish a baseline from a full desk load without signalling
    pub fn seed(&mut self, status: GenerationStatus) {
        self.current = status;
        self.held = true;
    }

    /// Back to the initial status
    pub fn reset(&mut self) {
        self.current = GenerationStatus::initial();
        self.held = false;
        self.accepted = 0;
    }

    fn offer(&mut self, candidate: GenerationStatus, source: Source) -> Reconciled {
        if source != Source::ConnectionLost {
            self.held = true;
        }
        if candidate == self.current {
            tracing::trace!(%source, status = %candidate, "duplicate status ignored");
            return Reconciled::default();
        }

        let completed = self.completion_edge(&candidate);
        tracing::debug!(
            %source,
            from = %self.current,
            to = %candidate,
            "status accepted"
        );
        self.current = candidate;
        self.accepted += 1;

        if let Some(phase) = completed {
            tracing::info!(%phase, "phase completed");
        }
        Reconciled {
            accepted: true,
            completed,
        }
    }

    fn completion_edge(&self, candidate: &GenerationStatus) -> Option<Phase> {
        let phase = candidate.phase();
        let entering = candidate.status_text() == StatusText::Success
            && self.completion_phases.contains(&phase);
        let already = self.current.phase() == phase
            && self.current.status_text() == StatusText::Success;
        (entering && !already).then_some(phase)
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn status(phase: Phase, text: StatusText, message: &str) -> GenerationStatus {
        GenerationStatus::new(phase, text, message).unwrap()
    }

    #[test]
    fn starts_idle_and_unheld() {
        let r = Reconciler::new();
        assert_eq!(r.current(), &GenerationStatus::initial());
        assert!(!r.holds_status());
    }

    #[test]
    fn duplicate_is_ignored() {
        let mut r = Reconciler::new();
        let s = status(Phase::Ideation, StatusText::Processing, "working");
        assert!(r.on_push(s.clone()).accepted);
        assert_eq!(r.on_poll(s.clone()), Reconciled::default());
        assert_eq!(r.accepted_count(), 1);
    }

    #[test]
    fn message_change_is_not_a_duplicate() {
        let mut r = Reconciler::new();
        r.on_push(status(Phase::Outline, StatusText::Processing, "step 1"));
        let out = r.on_push(status(Phase::Outline, StatusText::Processing, "step 2"));
        assert!(out.accepted);
        assert_eq!(r.current().message(), "step 2");
    }

    #[test]
    fn regression_replaces_current() {
        let mut r = Reconciler::new();
        r.on_push(status(Phase::Content, StatusText::Processing, ""));
        let out = r.on_poll(status(Phase::Content, StatusText::Error, "boom"));
        assert!(out.accepted);
        assert_eq!(r.current().status_text(), StatusText::Error);
    }

    #[test]
    fn content_success_fires_once() {
        let mut r = Reconciler::new();
        let stream = [
            status(Phase::Content, StatusText::Processing, ""),
            status(Phase::Content, StatusText::Processing, ""),
            status(Phase::Content, StatusText::Success, ""),
            status(Phase::Content, StatusText::Success, ""),
        ];
        let fired: Vec<_> = stream
            .into_iter()
            .filter_map(|s| r.on_push(s).completed)
            .collect();
        assert_eq!(fired, vec![Phase::Content]);
    }

    #[test]
    fn success_message_change_does_not_refire() {
        let mut r = Reconciler::new();
        assert_eq!(
            r.on_push(status(Phase::Content, StatusText::Success, "Content generation complete."))
                .completed,
            Some(Phase::Content)
        );
        let out = r.on_push(status(
            Phase::Content,
            StatusText::Success,
            "All generation steps completed successfully.",
        ));
        assert!(out.accepted);
        assert_eq!(out.completed, None);
    }

    #[test]
    fn unwatched_phase_success_is_silent() {
        let mut r = Reconciler::new();
        assert_eq!(
            r.on_push(status(Phase::Ideation, StatusText::Success, "")).completed,
            None
        );

        let mut r = Reconciler::with_completion_phases([Phase::Ideation, Phase::Content]);
        assert_eq!(
            r.on_push(status(Phase::Ideation, StatusText::Success, "")).completed,
            Some(Phase::Ideation)
        );
    }

    #[test]
    fn seeded_success_does_not_fire() {
        let mut r = Reconciler::new();
        r.seed(status(Phase::Content, StatusText::Success, "done"));
        assert!(r.holds_status());
        assert_eq!(
            r.on_poll(status(Phase::Content, StatusText::Success, "done")),
            Reconciled::default()
        );
    }

    #[test]
    fn connection_lost_needs_held_status() {
        let mut r = Reconciler::new();
        assert_eq!(r.on_connection_lost(), Reconciled::default());
        assert_eq!(r.current(), &GenerationStatus::initial());

        r.on_push(status(Phase::Content, StatusText::Processing, "..."));
        assert!(r.on_connection_lost().accepted);
        assert_eq!(r.current(), &GenerationStatus::connection_lost());
    }

    #[test]
    fn reset_forgets_everything() {
        let mut r = Reconciler::new();
        r.on_push(status(Phase::Outline, StatusText::Processing, ""));
        r.reset();
        assert!(!r.holds_status());
        assert_eq!(r.accepted_count(), 0);
        assert_eq!(r.current(), &GenerationStatus::initial());
    }
}
