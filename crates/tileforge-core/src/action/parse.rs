//! Structural validation of untrusted action input.
//!
//! Input arrives already decoded into a JSON value. [`parse`] accepts it only
//! if it matches one of the three variant shapes exactly:
//!
//! - the `type` discriminant is one of `tile_placement`, `npc_event`,
//!   `scriptedEvent`
//! - every required field is present with the right type
//! - integers are in range (ticks, timestamps, tile types and tiers are
//!   non-negative)
//! - no unrecognized object keys, at any level
//! - identifier strings are non-empty
//! - metadata carries at most [`MAX_METADATA_TAGS`] tags
//!
//! No side effects, no access to board or session state.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::{Action, ActionMetadata};

/// Default upper bound on `metadata.tags` entries.
pub const MAX_METADATA_TAGS: usize = 16;

/// Reasons an input value is not a well-formed action.
#[derive(Debug, Error)]
pub enum ActionParseError {
    /// The value does not match any action shape.
    #[error("malformed action: {0}")]
    Shape(#[from] serde_json::Error),
    /// A required identifier is an empty string.
    #[error("field `{field}` must not be empty")]
    EmptyField {
        /// Wire name of the field.
        field: &'static str,
    },
    /// Too many metadata tags.
    #[error("metadata carries {count} tags, at most {max} allowed")]
    TooManyTags {
        /// Tags present.
        count: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Parse an untrusted value into an [`Action`].
///
/// # Errors
///
/// Returns [`ActionParseError`] if the value is not a well-formed action.
pub fn parse(raw: &Value) -> Result<Action, ActionParseError> {
    parse_with_tag_limit(raw, MAX_METADATA_TAGS)
}

/// Parse an untrusted JSON string into an [`Action`].
///
/// # Errors
///
/// Returns [`ActionParseError`] if the text is not JSON or not a well-formed
/// action.
pub fn parse_str(raw: &str) -> Result<Action, ActionParseError> {
    let value: Value = serde_json::from_str(raw)?;
    parse(&value)
}

/// [`parse`] with a caller-chosen metadata tag limit.
///
/// # Errors
///
/// Returns [`ActionParseError`] if the value is not a well-formed action.
pub fn parse_with_tag_limit(raw: &Value, max_tags: usize) -> Result<Action, ActionParseError> {
    let action = Action::deserialize(raw)?;
    check_semantics(&action, max_tags)?;
    Ok(action)
}

/// Returns true if [`parse`] would succeed. Never fails.
#[must_use]
pub fn is_action(raw: &Value) -> bool {
    parse(raw).is_ok()
}

fn check_semantics(action: &Action, max_tags: usize) -> Result<(), ActionParseError> {
    require_non_empty("id", action.id().as_str())?;
    require_non_empty("instanceId", action.instance_id().as_str())?;
    match action {
        Action::TilePlacement(a) => {
            require_non_empty("playerId", a.player_id.as_str())?;
        }
        Action::NpcEvent(a) => {
            require_non_empty("npcId", a.npc_id.as_str())?;
            require_non_empty("eventType", &a.event_type)?;
        }
        Action::ScriptedEvent(a) => {
            require_non_empty("scriptId", a.script_id.as_str())?;
            require_non_empty("triggerId", a.trigger_id.as_str())?;
            require_non_empty("eventType", &a.event_type)?;
        }
    }
    if let Some(metadata) = action.metadata() {
        check_metadata(metadata, max_tags)?;
    }
    Ok(())
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ActionParseError> {
    if value.is_empty() {
        Err(ActionParseError::EmptyField { field })
    } else {
        Ok(())
    }
}

fn check_metadata(metadata: &ActionMetadata, max_tags: usize) -> Result<(), ActionParseError> {
    let count = metadata.tags.len();
    if count > max_tags {
        return Err(ActionParseError::TooManyTags {
            count,
            max: max_tags,
        });
    }
    Ok(())
}
