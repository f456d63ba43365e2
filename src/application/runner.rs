//! Session lifecycle driver
//!
//! Owns one call from trunk accept to registry removal:
//! register -> identity -> resolve routing -> business lookup ->
//! AI handshake -> bridge -> drain -> close.

use super::bridge::{run_bridge, BridgeEnd};
use crate::domain::error::BridgeError;
use crate::domain::registry::SessionRegistry;
use crate::domain::routing::{resolve_caller, resolve_dialed_number, RoutingContext};
use crate::domain::session::{CallDirection, CallSession, SessionEvent};
use crate::infrastructure::ai::AiConnector;
use crate::infrastructure::directory::DirectoryClient;
use crate::infrastructure::protocol::{read_frame, write_frame, Frame, FrameType};
use crate::infrastructure::telephony::ConnectionHandler;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Out-of-band supplier of routing attributes and session metadata
///
/// The telephony layer delivers call attributes separately from the
/// audio stream; deployments plug their session-layer source in here.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Routing context for a trunk-announced session id
    async fn context_for(&self, session_id: &str) -> RoutingContext;
}

/// Source for trunks that put everything into the session identifier
///
/// Returns an empty attribute map; resolution then relies on the
/// digit-run and verbatim strategies against the id itself.
pub struct IdentifierOnlySource;

#[async_trait]
impl MetadataSource for IdentifierOnlySource {
    async fn context_for(&self, session_id: &str) -> RoutingContext {
        RoutingContext {
            room_name: session_id.to_string(),
            ..Default::default()
        }
    }
}

/// Timing policy for one session
#[derive(Debug, Clone)]
pub struct SessionTimeouts {
    /// Bound on waiting for the identity frame and routing resolution
    pub setup: Duration,
    /// Bound on silence in both directions while streaming
    pub idle: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            setup: Duration::from_secs(10),
            idle: Duration::from_secs(120),
        }
    }
}

/// Per-call orchestrator, shared across all trunk connections
pub struct SessionRunner {
    registry: SessionRegistry,
    directory: Arc<dyn DirectoryClient>,
    metadata: Arc<dyn MetadataSource>,
    ai: Arc<dyn AiConnector>,
    timeouts: SessionTimeouts,
    /// Process-wide shutdown signal, forwarded into every bridge so
    /// live trunks get a hangup frame on exit
    shutdown: watch::Receiver<bool>,
}

impl SessionRunner {
    pub fn new(
        registry: SessionRegistry,
        directory: Arc<dyn DirectoryClient>,
        metadata: Arc<dyn MetadataSource>,
        ai: Arc<dyn AiConnector>,
        timeouts: SessionTimeouts,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            directory,
            metadata,
            ai,
            timeouts,
            shutdown,
        }
    }

    async fn run_call(&self, stream: TcpStream, peer: SocketAddr) -> Result<(), BridgeError> {
        let (mut trunk_read, mut trunk_write) = stream.into_split();

        // Register on connect; the id becomes the trunk's once announced
        let session = CallSession::with_generated_id(CallDirection::Inbound);
        let generated_id = session.id.clone();
        let entry = self.registry.insert(session).await?;

        // Setup phase: identity frame within the setup window
        let setup = timeout(self.timeouts.setup, async {
            loop {
                let frame = read_frame(&mut trunk_read).await?;
                match frame.frame_type {
                    FrameType::Identity => {
                        let id = String::from_utf8_lossy(&frame.payload).to_string();
                        return Ok::<_, BridgeError>(Some(id));
                    }
                    FrameType::Hangup => return Ok(None),
                    FrameType::Audio => {
                        // Early audio before identity cannot be routed yet
                        warn!("Dropping audio frame before identity from {}", peer);
                    }
                    FrameType::Error => {
                        warn!(
                            "Trunk error during setup: {}",
                            String::from_utf8_lossy(&frame.payload)
                        );
                    }
                }
            }
        })
        .await;

        let session_id = match setup {
            Ok(Ok(Some(id))) => id,
            Ok(Ok(None)) => {
                info!("Hangup before identity from {}", peer);
                entry.write().await.apply(SessionEvent::Hangup)?;
                self.registry.remove(&generated_id).await;
                return Ok(());
            }
            Ok(Err(e)) => {
                entry.write().await.apply(SessionEvent::LegError)?;
                self.registry.remove(&generated_id).await;
                return Err(e);
            }
            Err(_elapsed) => {
                entry.write().await.apply(SessionEvent::LegError)?;
                self.registry.remove(&generated_id).await;
                let _ = write_frame(&mut trunk_write, &Frame::hangup()).await;
                return Err(BridgeError::SetupTimeout);
            }
        };

        // Adopt the trunk-announced id as the registry key
        let entry = match self.registry.rekey(&generated_id, &session_id).await {
            Ok(entry) => entry,
            Err(e) => {
                // A second connection claiming a live call id is a
                // protocol violation; drop this one
                self.registry.remove(&generated_id).await;
                let _ = write_frame(&mut trunk_write, &Frame::hangup()).await;
                return Err(e);
            }
        };
        info!("Session {} announced by trunk {}", session_id, peer);

        entry.write().await.apply(SessionEvent::TelephonyReady)?;

        // Resolve routing and business context
        let ctx = self.metadata.context_for(&session_id).await;
        let dialed = match resolve_dialed_number(&ctx) {
            Ok(number) => number,
            Err(e) => {
                error!("Session {} routing unresolved", session_id);
                entry.write().await.apply(SessionEvent::RoutingFailed)?;
                self.registry.remove(&session_id).await;
                let _ = write_frame(
                    &mut trunk_write,
                    &Frame::new(FrameType::Error, "routing unresolved".into())?,
                )
                .await;
                let _ = write_frame(&mut trunk_write, &Frame::hangup()).await;
                return Err(e);
            }
        };

        {
            let mut s = entry.write().await;
            s.dialed_number = Some(dialed.clone());
            s.caller = resolve_caller(&ctx);
            s.touch();
        }

        let business = match self.directory.business_for_number(&dialed).await {
            Ok(found) => found,
            Err(e) => {
                // A directory outage degrades to the default agent rather
                // than dropping an answered call
                warn!("Directory lookup failed for {}: {}", dialed, e);
                None
            }
        };
        let instructions = business.as_ref().and_then(|b| b.agent_instructions.clone());
        if let Some(b) = &business {
            info!("Session {} routed to business {} ({})", session_id, b.business_id, dialed);
        } else {
            info!("Session {} has no business for {}", session_id, dialed);
        }

        // AI leg handshake, bounded retries inside the connector
        let voice = business.as_ref().and_then(|b| b.voice.clone());
        let (ai_sink, ai_source) = match self.ai.connect(instructions, voice).await {
            Ok(legs) => legs,
            Err(e) => {
                error!("Session {} AI handshake failed: {}", session_id, e);
                entry.write().await.apply(SessionEvent::LegError)?;
                self.registry.remove(&session_id).await;
                let _ = write_frame(&mut trunk_write, &Frame::hangup()).await;
                return Err(e);
            }
        };

        entry.write().await.apply(SessionEvent::Resolved)?;
        info!("Session {} streaming", session_id);

        let outcome = run_bridge(
            entry.clone(),
            trunk_read,
            trunk_write,
            ai_sink,
            ai_source,
            self.timeouts.idle,
            self.shutdown.clone(),
        )
        .await;

        // Drain and close, whatever the bridge outcome
        let close_event = match &outcome {
            Ok(BridgeEnd::TrunkHangup) | Ok(BridgeEnd::Shutdown) => SessionEvent::Hangup,
            Ok(BridgeEnd::AiClosed) | Err(_) => SessionEvent::LegError,
        };
        {
            let mut s = entry.write().await;
            s.apply(close_event)?;
            s.apply(SessionEvent::Released)?;
        }
        self.registry.remove(&session_id).await;

        match outcome {
            Ok(end) => {
                info!("Session {} closed ({:?})", session_id, end);
                Ok(())
            }
            Err(e) => {
                warn!("Session {} closed on error: {}", session_id, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ConnectionHandler for SessionRunner {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        // Session errors are logged and contained; the listener and the
        // other sessions keep running
        if let Err(e) = self.run_call(stream, peer).await {
            warn!("Call from {} ended with error: {}", peer, e);
        }
    }
}
