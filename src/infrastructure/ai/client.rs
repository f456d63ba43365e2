//! AI realtime leg
//!
//! WebSocket client for the realtime-voice API. The connection is split
//! into independent sink/stream halves so the two bridge directions can
//! run without blocking each other.

use super::messages::{AiSessionConfig, ClientEvent, ServerEvent};
use crate::domain::error::BridgeError;
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the AI leg
#[derive(Debug, Clone)]
pub struct AiLegConfig {
    /// WebSocket endpoint, including any model query parameter
    pub url: String,
    /// Bearer token
    pub api_key: String,
    /// Handshake attempts before giving up
    pub connect_attempts: u32,
    pub voice: Option<String>,
}

/// Outbound half of the AI leg
#[async_trait]
pub trait AiAudioSink: Send {
    async fn send(&mut self, event: ClientEvent) -> Result<(), BridgeError>;
    async fn close(&mut self) -> Result<(), BridgeError>;
}

/// Inbound half of the AI leg
///
/// `Ok(None)` means the peer closed the connection cleanly.
#[async_trait]
pub trait AiEventSource: Send {
    async fn next(&mut self) -> Result<Option<ServerEvent>, BridgeError>;
}

#[async_trait]
impl<T: AiAudioSink + ?Sized> AiAudioSink for Box<T> {
    async fn send(&mut self, event: ClientEvent) -> Result<(), BridgeError> {
        (**self).send(event).await
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        (**self).close().await
    }
}

#[async_trait]
impl<T: AiEventSource + ?Sized> AiEventSource for Box<T> {
    async fn next(&mut self) -> Result<Option<ServerEvent>, BridgeError> {
        (**self).next().await
    }
}

/// Opens the AI leg for a resolved session
///
/// The production impl dials the realtime API; tests plug in scripted
/// legs.
#[async_trait]
pub trait AiConnector: Send + Sync {
    async fn connect(
        &self,
        instructions: Option<String>,
        voice: Option<String>,
    ) -> Result<(Box<dyn AiAudioSink>, Box<dyn AiEventSource>), BridgeError>;
}

/// WebSocket-backed connector
pub struct RealtimeConnector {
    config: AiLegConfig,
}

impl RealtimeConnector {
    pub fn new(config: AiLegConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AiConnector for RealtimeConnector {
    async fn connect(
        &self,
        instructions: Option<String>,
        voice: Option<String>,
    ) -> Result<(Box<dyn AiAudioSink>, Box<dyn AiEventSource>), BridgeError> {
        let mut config = self.config.clone();
        if voice.is_some() {
            config.voice = voice;
        }
        let (sink, source) = connect_ai_leg(&config, instructions).await?;
        Ok((Box::new(sink), Box::new(source)))
    }
}

/// Sink half over a live WebSocket
pub struct RealtimeSink {
    inner: SplitSink<WsStream, Message>,
}

/// Stream half over a live WebSocket
pub struct RealtimeSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl AiAudioSink for RealtimeSink {
    async fn send(&mut self, event: ClientEvent) -> Result<(), BridgeError> {
        let text = serde_json::to_string(&event)
            .map_err(|e| BridgeError::AiLeg(format!("serialize: {}", e)))?;
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| BridgeError::AiLeg(format!("send: {}", e)))
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        self.inner
            .send(Message::Close(None))
            .await
            .map_err(|e| BridgeError::AiLeg(format!("close: {}", e)))
    }
}

#[async_trait]
impl AiEventSource for RealtimeSource {
    async fn next(&mut self) -> Result<Option<ServerEvent>, BridgeError> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(event) => return Ok(Some(event)),
                        Err(e) => {
                            // Unparseable event: log and keep reading,
                            // the envelope schema is versioned upstream
                            debug!("Skipping unparseable AI event: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(other)) => {
                    debug!("Ignoring non-text AI message: {:?}", other);
                }
                Some(Err(e)) => {
                    return Err(BridgeError::UpstreamDisconnect(format!("ai leg: {}", e)))
                }
            }
        }
    }
}

/// Connect the AI leg and send the initial session configuration
///
/// Retries the handshake a bounded number of times; a failure after the
/// last attempt surfaces to the session runner as a setup failure.
pub async fn connect_ai_leg(
    config: &AiLegConfig,
    instructions: Option<String>,
) -> Result<(RealtimeSink, RealtimeSource), BridgeError> {
    let mut last_error = None;

    for attempt in 1..=config.connect_attempts.max(1) {
        match try_connect(config).await {
            Ok(ws) => {
                info!("AI leg connected (attempt {})", attempt);
                let (sink, source) = ws.split();
                let mut sink = RealtimeSink { inner: sink };
                let source = RealtimeSource { inner: source };

                sink.send(ClientEvent::SessionUpdate {
                    session: AiSessionConfig::for_call(instructions.clone(), config.voice.clone()),
                })
                .await?;

                return Ok((sink, source));
            }
            Err(e) => {
                warn!("AI leg handshake failed (attempt {}): {}", attempt, e);
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| BridgeError::AiLeg("no connect attempts".to_string())))
}

async fn try_connect(config: &AiLegConfig) -> Result<WsStream, BridgeError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| BridgeError::AiLeg(format!("bad url: {}", e)))?;

    let auth = format!("Bearer {}", config.api_key);
    request.headers_mut().insert(
        "Authorization",
        auth.parse()
            .map_err(|_| BridgeError::AiLeg("bad api key header".to_string()))?,
    );

    let (ws, _response) = connect_async(request)
        .await
        .map_err(|e| BridgeError::AiLeg(format!("handshake: {}", e)))?;
    Ok(ws)
}
