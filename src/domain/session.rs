//! Call session lifecycle
//!
//! Implements the state machine for one bridged phone call:
//! Connecting -> Resolving -> Streaming -> Closing -> Closed

use super::error::BridgeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Telephony leg attached, AI leg not yet established
    Connecting,
    /// Running routing extraction and business lookup
    Resolving,
    /// Both legs active, duplex bridge running
    Streaming,
    /// One leg signaled termination; draining the other
    Closing,
    /// Terminal; session removed from registry
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Connecting => "connecting",
            SessionState::Resolving => "resolving",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        }
    }

    /// Whether audio frames may be delivered in this state
    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionState::Streaming)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

/// Session state machine event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Telephony leg delivered its identity; routing can start
    TelephonyReady,
    /// Routing resolved and AI leg handshake succeeded
    Resolved,
    /// No routing strategy produced a number
    RoutingFailed,
    /// Hangup frame or leg-close from either side
    Hangup,
    /// Unrecoverable I/O error on either leg
    LegError,
    /// Both legs confirmed released
    Released,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEvent::TelephonyReady => "telephony_ready",
            SessionEvent::Resolved => "resolved",
            SessionEvent::RoutingFailed => "routing_failed",
            SessionEvent::Hangup => "hangup",
            SessionEvent::LegError => "leg_error",
            SessionEvent::Released => "released",
        }
    }
}

/// One phone call bridged between the telephony trunk and the AI leg
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Opaque session id (protocol-assigned or generated)
    pub id: String,
    pub direction: CallDirection,
    /// Normalized dialed number, set once routing resolves
    pub dialed_number: Option<String>,
    /// Caller phone number or opaque id
    pub caller: Option<String>,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl CallSession {
    pub fn new(id: String, direction: CallDirection) -> Self {
        let now = Utc::now();
        Self {
            id,
            direction,
            dialed_number: None,
            caller: None,
            state: SessionState::Connecting,
            created_at: now,
            last_activity: now,
        }
    }

    /// Create a session with a generated id (telephony leg sent none yet)
    pub fn with_generated_id(direction: CallDirection) -> Self {
        Self::new(Uuid::new_v4().to_string(), direction)
    }

    /// Record activity on either leg
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Seconds since the session was created
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }

    /// Seconds since the last frame in either direction
    pub fn idle_seconds(&self) -> i64 {
        (Utc::now() - self.last_activity).num_seconds()
    }

    /// Process an event and transition state
    ///
    /// Double-close is a no-op; every other illegal move is an error.
    /// Hangup before streaming goes straight to Closed since there is
    /// no second leg to drain yet.
    pub fn apply(&mut self, event: SessionEvent) -> Result<SessionState, BridgeError> {
        use SessionEvent::*;
        use SessionState::*;

        let next = match (self.state, event) {
            (Connecting, TelephonyReady) => Resolving,
            (Connecting, Hangup) | (Connecting, LegError) => Closed,

            (Resolving, Resolved) => Streaming,
            (Resolving, RoutingFailed) => Closed,
            (Resolving, Hangup) | (Resolving, LegError) => Closed,

            (Streaming, Hangup) | (Streaming, LegError) => Closing,

            (Closing, Released) => Closed,
            // Duplicate hangup/error while draining changes nothing
            (Closing, Hangup) | (Closing, LegError) => Closing,

            // Idempotent double-close
            (Closed, Hangup) | (Closed, LegError) | (Closed, Released) => Closed,

            (from, event) => {
                return Err(BridgeError::InvalidTransition {
                    from: from.as_str().to_string(),
                    event: event.as_str().to_string(),
                })
            }
        };

        self.state = next;
        Ok(next)
    }
}
