//! Caller-side preconditions for desk commands
//!
//! The run endpoint itself validates nothing on the client's behalf. These
//! checks run before a request is built; a closed gate means no request.

use crate::desk::{Desk, SettingsCatalog, SettingsPatch};
use crate::error::GateError;
use crate::status::GenerationStatus;
use crate::ui_state::can_start_run;

/// Require that no phase is processing
///
/// # Errors
/// `GateError::Busy` naming the processing phase.
pub fn ensure_can_start(status: &GenerationStatus) -> Result<(), GateError> {
    if can_start_run(status) {
        Ok(())
    } else {
        Err(GateError::Busy {
            phase: status.phase(),
        })
    }
}

/// Require platform and content type set to allowed values
///
/// # Errors
/// `MissingSetting` for an unset value, `NotAllowed` for one outside the catalog.
pub fn ensure_full_run_ready(desk: &Desk, catalog: &SettingsCatalog) -> Result<(), GateError> {
    let platform = desk.platform().ok_or(GateError::MissingSetting("platform"))?;
    if !catalog.allows_platform(platform) {
        return Err(GateError::NotAllowed {
            setting: "platform",
            value: platform.to_string(),
        });
    }
    let content_type = desk
        .content_type()
        .ok_or(GateError::MissingSetting("content_type"))?;
    if !catalog.allows_content_type(content_type) {
        return Err(GateError::NotAllowed {
            setting: "content_type",
            value: content_type.to_string(),
        });
    }
    Ok(())
}

/// Require a non-empty patch whose values are in the catalog
///
/// # Errors
/// `EmptyPatch` or `NotAllowed`.
pub fn ensure_settings_allowed(
    patch: &SettingsPatch,
    catalog: &SettingsCatalog,
) -> Result<(), GateError> {
    if patch.is_empty() {
        return Err(GateError::EmptyPatch);
    }
    if let Some(platform) = patch.platform.as_deref() {
        if !catalog.allows_platform(platform) {
            return Err(GateError::NotAllowed {
                setting: "platform",
                value: platform.to_string(),
            });
        }
    }
    if let Some(content_type) = patch.content_type.as_deref() {
        if !catalog.allows_content_type(content_type) {
            return Err(GateError::NotAllowed {
                setting: "content_type",
                value: content_type.to_string(),
            });
        }
    }
    Ok(())
}
