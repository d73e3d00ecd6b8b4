//! Terminal rendering

use desk_core::{indicator, Desk, GenerationStatus, Phase, PhaseIndicator, PhaseKind, SettingsCatalog};
use desk_sync::ViewNotice;
use std::fmt::Write;

const PHASES: [Phase; 3] = [Phase::Ideation, Phase::Outline, Phase::Content];

fn glyph(indicator: PhaseIndicator) -> &'static str {
    match indicator {
        PhaseIndicator::Idle => "·",
        PhaseIndicator::Running => "…",
        PhaseIndicator::Succeeded => "✓",
        PhaseIndicator::Failed => "✗",
    }
}

/// One line per status: the raw status, then a per-phase strip
pub(crate) fn status_line(status: &GenerationStatus) -> String {
    let mut line = status.to_string();
    line.push_str("  |");
    for phase in PHASES {
        let _ = write!(line, " {phase} {}", glyph(indicator(status, phase)));
    }
    line
}

pub(crate) fn notice_line(notice: &ViewNotice) -> String {
    match notice {
        ViewNotice::ChannelError(error) => format!("! channel {error}"),
        ViewNotice::ChannelEnded => "! status channel ended".to_string(),
        ViewNotice::Completed(phase) => format!("* {phase} completed"),
        ViewNotice::Refetched => "* desk refreshed".to_string(),
        ViewNotice::RefetchFailed(error) => format!("! refresh failed: {error}"),
        ViewNotice::PollFailed(error) => format!("! status poll failed: {error}"),
        ViewNotice::FeedbackUnchanged(kind) => format!("* {kind} feedback: No changes"),
    }
}

pub(crate) fn desk_summary(desk: &Desk) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "desk          {}", desk.id);
    let _ = writeln!(out, "topic         {}", desk.topic);
    if !desk.context.is_empty() {
        let _ = writeln!(out, "context       {}", desk.context);
    }
    let _ = writeln!(out, "platform      {}", desk.platform().unwrap_or("-"));
    let _ = writeln!(out, "content type  {}", desk.content_type().unwrap_or("-"));
    let _ = writeln!(out, "status        {}", status_line(&desk.status));
    for kind in PhaseKind::ALL {
        let Some(record) = desk.phase_record(kind) else {
            continue;
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "[{kind}]");
        if !record.feedback.is_empty() {
            let _ = writeln!(out, "feedback: {}", record.feedback);
        }
        if !record.result.is_empty() {
            let _ = writeln!(out, "{}", record.result.trim_end());
        }
    }
    out
}

pub(crate) fn catalog_summary(catalog: &SettingsCatalog) -> String {
    format!(
        "platforms      {}\ncontent types  {}\n",
        catalog.platforms.join(", "),
        catalog.content_types.join(", ")
    )
}
