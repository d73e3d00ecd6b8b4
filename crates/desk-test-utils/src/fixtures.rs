//! Test data with sensible defaults

use desk_core::{
    Desk, DeskId, GenerationStatus, Phase, PhaseKind, PhaseRecord, SettingsCatalog, StatusText,
};

pub fn status(phase: Phase, status_text: StatusText, message: &str) -> GenerationStatus {
    GenerationStatus::new(phase, status_text, message).unwrap()
}

pub fn processing(phase: Phase) -> GenerationStatus {
    status(phase, StatusText::Processing, "")
}

pub fn succeeded(phase: Phase) -> GenerationStatus {
    status(phase, StatusText::Success, "")
}

pub fn failed(phase: Phase, message: &str) -> GenerationStatus {
    status(phase, StatusText::Error, message)
}

/// Platforms and content types accepted by the mock server
pub fn catalog() -> SettingsCatalog {
    SettingsCatalog::new(
        vec!["linkedin".into(), "twitter".into(), "blog".into()],
        vec!["post".into(), "article".into(), "thread".into()],
    )
}

/// Builder for desk aggregates
#[derive(Debug, Clone)]
pub struct DeskBuilder {
    desk: Desk,
}

impl DeskBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            desk: Desk {
                id: DeskId::new(id),
                created_at: None,
                updated_at: None,
                topic: "Writing async Rust".to_string(),
                context: "Backend engineers".to_string(),
                platform: None,
                content_type: None,
                content_id: None,
                status: GenerationStatus::initial(),
                ideation: None,
                outline: None,
                content: None,
            },
        }
    }

    pub fn status(mut self, status: GenerationStatus) -> Self {
        self.desk.status = status;
        self
    }

    pub fn platform(mut self, platform: &str) -> Self {
        self.desk.platform = Some(platform.to_string());
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.desk.content_type = Some(content_type.to_string());
        self
    }

    /// Fully configured for a full run
    pub fn ready(self) -> Self {
        self.platform("linkedin").content_type("post")
    }

    pub fn feedback(mut self, kind: PhaseKind, text: &str) -> Self {
        record_mut(&mut self.desk, kind).feedback = text.to_string();
        self
    }

    pub fn result(mut self, kind: PhaseKind, text: &str) -> Self {
        record_mut(&mut self.desk, kind).result = text.to_string();
        self
    }

    pub fn build(self) -> Desk {
        self.desk
    }
}

/// Phase record of a desk, created empty if missing
pub fn record_mut(desk: &mut Desk, kind: PhaseKind) -> &mut PhaseRecord {
    let slot = match kind {
        PhaseKind::Ideation => &mut desk.ideation,
        PhaseKind::Outline => &mut desk.outline,
        PhaseKind::Content => &mut desk.content,
    };
    slot.get_or_insert_with(PhaseRecord::default)
}

pub fn desk(id: &str) -> Desk {
    DeskBuilder::new(id).build()
}
