//! Dialed-number extraction
//!
//! The telephony layer delivers the originally-dialed number in different
//! places depending on trunk configuration: SIP participant attributes,
//! session metadata, room metadata, or baked into the room name itself.
//! Resolution walks an ordered strategy list; the first strategy that
//! yields a valid number wins.

use super::error::BridgeError;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Minimum digits for a candidate to count as a phone number
const MIN_DIGITS: usize = 10;

/// Attribute keys checked by the direct-lookup strategy, in order
const NUMBER_ATTRIBUTE_KEYS: &[&str] = &[
    "sip.toUser",
    "sip.to_user",
    "to-user",
    "called-number",
    "sip.calledNumber",
    "phone-number",
    "sip.phoneNumber",
    "sip.trunkPhoneNumber",
    "to-number",
];

/// Attribute keys carrying the caller's number, in order
const CALLER_ATTRIBUTE_KEYS: &[&str] = &[
    "sip.fromUser",
    "sip.from_user",
    "from-user",
    "caller-number",
    "sip.callerNumber",
    "from-number",
];

/// JSON fields probed inside session/room metadata, in order
const NUMBER_METADATA_FIELDS: &[&str] = &[
    "phone_number",
    "phoneNumber",
    "to_number",
    "toNumber",
    "called_number",
    "dialed_number",
];

/// Read-only call attributes captured at session start
pub type RoutingAttributes = HashMap<String, String>;

/// Resolution strategies, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Well-known keys in the attribute map
    AttributeKey,
    /// Phone-shaped field in session metadata JSON
    SessionMetadata,
    /// Phone-shaped field in room metadata JSON
    RoomMetadata,
    /// Digit run embedded in the room name
    RoomNameSubstring,
    /// Room name used verbatim as a last resort
    RoomNameVerbatim,
}

impl RoutingStrategy {
    pub const ALL: [RoutingStrategy; 5] = [
        RoutingStrategy::AttributeKey,
        RoutingStrategy::SessionMetadata,
        RoutingStrategy::RoomMetadata,
        RoutingStrategy::RoomNameSubstring,
        RoutingStrategy::RoomNameVerbatim,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingStrategy::AttributeKey => "attribute_key",
            RoutingStrategy::SessionMetadata => "session_metadata",
            RoutingStrategy::RoomMetadata => "room_metadata",
            RoutingStrategy::RoomNameSubstring => "room_name_substring",
            RoutingStrategy::RoomNameVerbatim => "room_name_verbatim",
        }
    }
}

/// Raw inputs available to the resolver for one session
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    pub attributes: RoutingAttributes,
    /// Session id / room name from the telephony layer
    pub room_name: String,
    /// Free-text session metadata, JSON if present
    pub session_metadata: Option<String>,
    /// Room-level metadata, JSON if present
    pub room_metadata: Option<String>,
}

/// Resolve the dialed number for a session
///
/// Returns the number in normalized `+`-prefixed form, or
/// `RoutingUnresolved` with a full diagnostic dump when every
/// strategy fails.
pub fn resolve_dialed_number(ctx: &RoutingContext) -> Result<String, BridgeError> {
    for strategy in RoutingStrategy::ALL {
        if let Some(candidate) = run_strategy(strategy, ctx) {
            if let Some(number) = validate_candidate(&candidate) {
                debug!(
                    "Resolved dialed number {} via {}",
                    number,
                    strategy.as_str()
                );
                return Ok(number);
            }
            debug!(
                "Strategy {} produced invalid candidate: {:?}",
                strategy.as_str(),
                candidate
            );
        }
    }

    warn!(
        "No routing strategy matched: room={:?} attributes={:?} session_metadata={:?} room_metadata={:?}",
        ctx.room_name, ctx.attributes, ctx.session_metadata, ctx.room_metadata
    );
    Err(BridgeError::RoutingUnresolved)
}

/// Best-effort caller id from the attribute map
///
/// Normalized like a dialed number when phone-shaped; otherwise the raw
/// value survives (trunks send anonymous and extension callers too).
/// Unexpanded template markers yield nothing.
pub fn resolve_caller(ctx: &RoutingContext) -> Option<String> {
    let raw = CALLER_ATTRIBUTE_KEYS
        .iter()
        .find_map(|key| ctx.attributes.get(*key))?;
    if raw.is_empty() || raw.contains("${") || raw.contains("{{") {
        return None;
    }
    Some(validate_candidate(raw).unwrap_or_else(|| raw.clone()))
}

fn run_strategy(strategy: RoutingStrategy, ctx: &RoutingContext) -> Option<String> {
    match strategy {
        RoutingStrategy::AttributeKey => NUMBER_ATTRIBUTE_KEYS
            .iter()
            .find_map(|key| ctx.attributes.get(*key))
            .cloned(),
        RoutingStrategy::SessionMetadata => {
            probe_metadata(ctx.session_metadata.as_deref()?)
        }
        RoutingStrategy::RoomMetadata => probe_metadata(ctx.room_metadata.as_deref()?),
        RoutingStrategy::RoomNameSubstring => extract_digit_run(&ctx.room_name),
        RoutingStrategy::RoomNameVerbatim => {
            if looks_like_phone_number(&ctx.room_name) {
                Some(ctx.room_name.clone())
            } else {
                None
            }
        }
    }
}

/// Parse metadata as JSON and probe the known phone-number fields
fn probe_metadata(metadata: &str) -> Option<String> {
    let value: Value = serde_json::from_str(metadata).ok()?;
    let object = value.as_object()?;
    NUMBER_METADATA_FIELDS
        .iter()
        .find_map(|field| object.get(*field))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// Pull the longest digit run (allowing `+`, `-`, `.`, space separators)
/// out of an arbitrary identifier
fn extract_digit_run(input: &str) -> Option<String> {
    let mut best: Option<String> = None;
    let mut current = String::new();

    for c in input.chars() {
        let extends_run = c.is_ascii_digit()
            || (c == '+' && current.is_empty())
            || (matches!(c, '-' | '.' | ' ') && current.chars().any(|c| c.is_ascii_digit()));
        if extends_run {
            current.push(c);
        } else {
            take_if_better(&mut best, &mut current);
        }
    }
    take_if_better(&mut best, &mut current);

    best.filter(|run| digit_count(run) >= MIN_DIGITS)
}

fn take_if_better(best: &mut Option<String>, current: &mut String) {
    let run = std::mem::take(current);
    if digit_count(&run) > best.as_deref().map(digit_count).unwrap_or(0) {
        *best = Some(run);
    }
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

/// Heuristic for "this string is itself a phone number"
fn looks_like_phone_number(s: &str) -> bool {
    !s.is_empty()
        && digit_count(s) >= MIN_DIGITS
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | ' ' | '(' | ')'))
}

/// Validate and normalize one candidate
///
/// Unexpanded template markers mean the trunk configuration failed to
/// substitute a variable; such a candidate must never route a call.
fn validate_candidate(candidate: &str) -> Option<String> {
    if candidate.contains("${") || candidate.contains("{{") {
        warn!("Rejecting routing candidate with template marker: {:?}", candidate);
        return None;
    }

    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < MIN_DIGITS {
        return None;
    }

    Some(format!("+{}", digits))
}
