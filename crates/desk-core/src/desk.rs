//! Desk aggregate and the values exchanged with the desk API

use crate::error::StatusError;
use crate::status::{GenerationStatus, Phase};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Desk identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeskId(String);

impl DeskId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Topic identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(String);

impl TopicId {
    /// Wrap a raw identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One of the three phases a desk owns a record for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Ideation record
    Ideation,
    /// Outline record
    Outline,
    /// Content record
    Content,
}

impl PhaseKind {
    /// All kinds, in pipeline order
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Ideation, PhaseKind::Outline, PhaseKind::Content];

    /// Path segment and wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Ideation => "ideation",
            PhaseKind::Outline => "outline",
            PhaseKind::Content => "content",
        }
    }

    /// Status phase this record belongs to
    #[inline]
    #[must_use]
    pub fn phase(self) -> Phase {
        match self {
            PhaseKind::Ideation => Phase::Ideation,
            PhaseKind::Outline => Phase::Outline,
            PhaseKind::Content => Phase::Content,
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| StatusError::UnknownName {
                what: "phase kind",
                value: s.to_string(),
            })
    }
}

/// What a run command starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunTarget {
    /// A single phase
    Phase(PhaseKind),
    /// Ideation, outline and content in sequence
    Full,
}

impl RunTarget {
    /// Trailing path segment after `/run`, if any
    #[inline]
    #[must_use]
    pub fn path_segment(self) -> Option<&'static str> {
        match self {
            RunTarget::Phase(kind) => Some(kind.as_str()),
            RunTarget::Full => None,
        }
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunTarget::Phase(kind) => f.write_str(kind.as_str()),
            RunTarget::Full => f.write_str("full"),
        }
    }
}

impl FromStr for RunTarget {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "full" {
            return Ok(RunTarget::Full);
        }
        s.parse().map(RunTarget::Phase).map_err(|_| StatusError::UnknownName {
            what: "run target",
            value: s.to_string(),
        })
    }
}

/// Result and feedback of one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Record identifier
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    /// Human feedback for the next run
    #[serde(default)]
    pub feedback: String,
    /// Worker output, replaced wholesale on each successful run
    #[serde(default)]
    pub result: String,
    /// Creation time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Desk aggregate as returned by `GET /desk/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Desk {
    /// Desk identifier
    #[serde(alias = "_id")]
    pub id: DeskId,
    /// Creation time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Topic text
    #[serde(default)]
    pub topic: String,
    /// Audience and goals
    #[serde(default)]
    pub context: String,
    /// Target platform
    #[serde(default)]
    pub platform: Option<String>,
    /// Requested content type
    #[serde(default)]
    pub content_type: Option<String>,
    /// Linked content record
    #[serde(default)]
    pub content_id: Option<String>,
    /// Embedded generation status
    #[serde(default)]
    pub status: GenerationStatus,
    /// Ideation record
    #[serde(default)]
    pub ideation: Option<PhaseRecord>,
    /// Outline record
    #[serde(default)]
    pub outline: Option<PhaseRecord>,
    /// Content record
    #[serde(default)]
    pub content: Option<PhaseRecord>,
}

impl Desk {
    /// Record owned for a phase
    #[inline]
    #[must_use]
    pub fn phase_record(&self, kind: PhaseKind) -> Option<&PhaseRecord> {
        match kind {
            PhaseKind::Ideation => self.ideation.as_ref(),
            PhaseKind::Outline => self.outline.as_ref(),
            PhaseKind::Content => self.content.as_ref(),
        }
    }

    /// Configured platform, blank treated as unset
    #[inline]
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        non_blank(self.platform.as_deref())
    }

    /// Configured content type, blank treated as unset
    #[inline]
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        non_blank(self.content_type.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Partial update of desk settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// New platform
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// New content type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl SettingsPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With platform
    #[inline]
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    /// With content type
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Check if nothing would be updated
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.platform.is_none() && self.content_type.is_none()
    }
}

/// Acknowledgement of a run start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAck {
    /// Worker message
    pub message: String,
}

/// Post created when a desk's content is promoted to review
///
/// Only the fields this crate reads are typed; the rest is preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPost {
    /// Post identifier
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    /// Owning topic
    #[serde(default)]
    pub topic_id: String,
    /// Review status
    #[serde(default)]
    pub status: String,
    /// Promoted content
    #[serde(default)]
    pub content: String,
    /// Remaining fields
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Allow-lists for desk settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsCatalog {
    /// Allowed platforms
    pub platforms: Vec<String>,
    /// Allowed content types
    pub content_types: Vec<String>,
}

impl SettingsCatalog {
    /// Create a catalog
    #[must_use]
    pub fn new(platforms: Vec<String>, content_types: Vec<String>) -> Self {
        Self {
            platforms,
            content_types,
        }
    }

    /// Check platform against the allow-list
    #[inline]
    #[must_use]
    pub fn allows_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p == platform)
    }

    /// Check content type against the allow-list
    #[inline]
    #[must_use]
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.content_types.iter().any(|c| c == content_type)
    }
}

/// Accepts RFC 3339 timestamps and offset-less ones, which are read as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusText;
    use pretty_assertions::assert_eq;

    fn sample_desk_json() -> serde_json::Value {
        serde_json::json!({
            "_id": "desk-1",
            "created_at": "2025-03-01T09:30:00.125000",
            "updated_at": "2025-03-01T10:00:00Z",
            "topic": "Plant uptime",
            "context": "Operations leads in discrete manufacturing",
            "platform": "LinkedIn",
            "content_type": "",
            "content_id": "c-1",
            "status": {"phase": "outline", "status_text": "success", "message": "done"},
            "ideation": {"_id": "i-1", "feedback": "", "result": "ideas"},
            "content": null
        })
    }

    #[test]
    fn desk_decodes_server_shape() {
        let desk: Desk = serde_json::from_value(sample_desk_json()).unwrap();
        assert_eq!(desk.id.as_str(), "desk-1");
        assert_eq!(desk.status.phase(), Phase::Outline);
        assert_eq!(desk.status.status_text(), StatusText::Success);
        assert_eq!(desk.platform(), Some("LinkedIn"));
        assert_eq!(desk.content_type(), None);
        assert_eq!(
            desk.phase_record(PhaseKind::Ideation).map(|r| r.result.as_str()),
            Some("ideas")
        );
        assert!(desk.phase_record(PhaseKind::Outline).is_none());
        assert!(desk.phase_record(PhaseKind::Content).is_none());
        let created = desk.created_at.unwrap();
        assert_eq!(created.to_rfc3339(), "2025-03-01T09:30:00.125+00:00");
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let mut raw = sample_desk_json();
        raw["created_at"] = serde_json::json!("yesterday");
        assert!(serde_json::from_value::<Desk>(raw).is_err());
    }

    #[test]
    fn settings_patch_skips_unset_fields() {
        let patch = SettingsPatch::new().with_platform("Twitter");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"platform": "Twitter"})
        );
        assert!(!patch.is_empty());
        assert!(SettingsPatch::new().is_empty());
    }

    #[test]
    fn run_target_parsing() {
        assert_eq!("full".parse::<RunTarget>().unwrap(), RunTarget::Full);
        assert_eq!(
            "outline".parse::<RunTarget>().unwrap(),
            RunTarget::Phase(PhaseKind::Outline)
        );
        assert!("publish".parse::<RunTarget>().is_err());
        assert_eq!(RunTarget::Full.path_segment(), None);
        assert_eq!(RunTarget::Phase(PhaseKind::Content).path_segment(), Some("content"));
    }

    #[test]
    fn review_post_keeps_unknown_fields() {
        let post: ReviewPost = serde_json::from_value(serde_json::json!({
            "_id": "p-1",
            "topic_id": "t-1",
            "status": "pending",
            "content": "body",
            "qna": ["q"]
        }))
        .unwrap();
        assert_eq!(post.id.as_deref(), Some("p-1"));
        assert_eq!(post.extra.get("qna"), Some(&serde_json::json!(["q"])));
    }

    #[test]
    fn catalog_membership() {
        let catalog = SettingsCatalog::new(vec!["LinkedIn".into()], vec!["News Roundup".into()]);
        assert!(catalog.allows_platform("LinkedIn"));
        assert!(!catalog.allows_platform("linkedin"));
        assert!(catalog.allows_content_type("News Roundup"));
    }
}
