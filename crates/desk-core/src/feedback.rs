//! Last persisted feedback per phase
//!
//! Saving feedback identical to what the server already holds is a no-op the
//! caller must short-circuit. The ledger is what it compares against.

use crate::desk::{Desk, PhaseKind};
use std::collections::HashMap;

/// Last persisted feedback, by phase
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackLedger {
    persisted: HashMap<PhaseKind, String>,
}

impl FeedbackLedger {
    /// Empty ledger
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger seeded from the phase records of a desk
    #[must_use]
    pub fn from_desk(desk: &Desk) -> Self {
        let persisted = PhaseKind::ALL
            .into_iter()
            .filter_map(|kind| {
                desk.phase_record(kind)
                    .map(|record| (kind, record.feedback.clone()))
            })
            .collect();
        Self { persisted }
    }

    /// Last persisted value for a phase
    #[inline]
    #[must_use]
    pub fn last(&self, kind: PhaseKind) -> Option<&str> {
        self.persisted.get(&kind).map(String::as_str)
    }

    /// Check if saving `text` would change nothing
    ///
    /// A phase with nothing recorded counts as holding empty feedback.
    #[must_use]
    pub fn is_unchanged(&self, kind: PhaseKind, text: &str) -> bool {
        self.last(kind).unwrap_or_default() == text
    }

    /// Record a successful save
    pub fn record(&mut self, kind: PhaseKind, text: impl Into<String>) {
        self.persisted.insert(kind, text.into());
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.persisted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::{DeskId, PhaseRecord};
    use crate::status::GenerationStatus;

    #[test]
    fn seeded_from_desk_records() {
        let desk = Desk {
            id: DeskId::new("d"),
            created_at: None,
            updated_at: None,
            topic: String::new(),
            context: String::new(),
            platform: None,
            content_type: None,
            content_id: None,
            status: GenerationStatus::initial(),
            ideation: None,
            outline: Some(PhaseRecord {
                feedback: "shorter intro".into(),
                ..PhaseRecord::default()
            }),
            content: None,
        };
        let ledger = FeedbackLedger::from_desk(&desk);
        assert!(ledger.is_unchanged(PhaseKind::Outline, "shorter intro"));
        assert!(!ledger.is_unchanged(PhaseKind::Outline, "longer intro"));
        assert_eq!(ledger.last(PhaseKind::Ideation), None);
        assert!(ledger.is_unchanged(PhaseKind::Ideation, ""));
    }

    #[test]
    fn record_updates_baseline() {
        let mut ledger = FeedbackLedger::new();
        assert!(!ledger.is_unchanged(PhaseKind::Content, "tone it down"));
        ledger.record(PhaseKind::Content, "tone it down");
        assert!(ledger.is_unchanged(PhaseKind::Content, "tone it down"));
        ledger.clear();
        assert_eq!(ledger.last(PhaseKind::Content), None);
    }
}
