//! End-to-end session tests
//!
//! Drives a full in-process call: a TCP client plays the telephony
//! trunk, the AI leg is a scripted channel pair, and assertions cover
//! the session lifecycle, transcoded audio, and teardown.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use voxbridge::application::{MetadataSource, SessionRunner, SessionTimeouts};
use voxbridge::domain::routing::RoutingContext;
use voxbridge::domain::{BridgeError, SessionRegistry};
use voxbridge::infrastructure::ai::{
    AiAudioSink, AiConnector, AiEventSource, ClientEvent, ServerEvent,
};
use voxbridge::infrastructure::directory::{BusinessContext, DirectoryClient, StaticDirectory};
use voxbridge::infrastructure::media::mulaw;
use voxbridge::infrastructure::protocol::{read_frame, write_frame, Frame, FrameType};
use voxbridge::infrastructure::telephony::bind_ephemeral;

const WAIT: Duration = Duration::from_secs(5);

/// Sink half that forwards client events to the test
struct ChannelSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

#[async_trait]
impl AiAudioSink for ChannelSink {
    async fn send(&mut self, event: ClientEvent) -> Result<(), BridgeError> {
        self.tx
            .send(event)
            .map_err(|_| BridgeError::AiLeg("test sink closed".to_string()))
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        Ok(())
    }
}

/// Source half scripted by the test
struct ChannelSource {
    rx: mpsc::UnboundedReceiver<ServerEvent>,
}

#[async_trait]
impl AiEventSource for ChannelSource {
    async fn next(&mut self) -> Result<Option<ServerEvent>, BridgeError> {
        Ok(self.rx.recv().await)
    }
}

/// Hands out one scripted leg per connect and records the handshakes
#[derive(Default)]
struct FakeConnector {
    connects: Mutex<u32>,
    // Channels for the next leg, installed by the test
    pending: Mutex<Option<(mpsc::UnboundedSender<ClientEvent>, mpsc::UnboundedReceiver<ServerEvent>)>>,
}

impl FakeConnector {
    /// Install the next leg; returns the test's ends of both channels
    async fn arm(
        &self,
    ) -> (
        mpsc::UnboundedReceiver<ClientEvent>,
        mpsc::UnboundedSender<ServerEvent>,
    ) {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();
        *self.pending.lock().await = Some((client_tx, server_rx));
        (client_rx, server_tx)
    }

    async fn connect_count(&self) -> u32 {
        *self.connects.lock().await
    }
}

#[async_trait]
impl AiConnector for FakeConnector {
    async fn connect(
        &self,
        _instructions: Option<String>,
        _voice: Option<String>,
    ) -> Result<(Box<dyn AiAudioSink>, Box<dyn AiEventSource>), BridgeError> {
        *self.connects.lock().await += 1;
        let (tx, rx) = self
            .pending
            .lock()
            .await
            .take()
            .ok_or_else(|| BridgeError::AiLeg("no scripted leg armed".to_string()))?;
        Ok((Box::new(ChannelSink { tx }), Box::new(ChannelSource { rx })))
    }
}

/// Metadata source with a fixed attribute map
struct StaticMetadata {
    attributes: HashMap<String, String>,
}

impl StaticMetadata {
    fn with(key: &str, value: &str) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(key.to_string(), value.to_string());
        Self { attributes }
    }

    fn and(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    fn empty() -> Self {
        Self {
            attributes: HashMap::new(),
        }
    }
}

#[async_trait]
impl MetadataSource for StaticMetadata {
    async fn context_for(&self, session_id: &str) -> RoutingContext {
        RoutingContext {
            attributes: self.attributes.clone(),
            room_name: session_id.to_string(),
            ..Default::default()
        }
    }
}

struct Harness {
    registry: SessionRegistry,
    connector: Arc<FakeConnector>,
    addr: std::net::SocketAddr,
    shutdown: tokio::sync::watch::Sender<bool>,
}

async fn start_bridge(
    metadata: StaticMetadata,
    directory: Arc<dyn DirectoryClient>,
) -> Harness {
    start_bridge_with(
        metadata,
        directory,
        SessionTimeouts {
            setup: Duration::from_secs(2),
            idle: Duration::from_secs(30),
        },
    )
    .await
}

async fn start_bridge_with(
    metadata: StaticMetadata,
    directory: Arc<dyn DirectoryClient>,
    timeouts: SessionTimeouts,
) -> Harness {
    let registry = SessionRegistry::new();
    let connector = Arc::new(FakeConnector::default());
    let (shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = Arc::new(SessionRunner::new(
        registry.clone(),
        directory,
        Arc::new(metadata),
        connector.clone(),
        timeouts,
        shutdown_rx,
    ));
    let addr = bind_ephemeral(runner).await.unwrap();
    Harness {
        registry,
        connector,
        addr,
        shutdown,
    }
}

async fn wait_until_empty(registry: &SessionRegistry) {
    timeout(WAIT, async {
        while registry.active_count().await > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("registry never drained");
}

fn salon_directory() -> Arc<dyn DirectoryClient> {
    Arc::new(StaticDirectory::new().with_business(
        "+903322379153",
        BusinessContext {
            business_id: "biz-1".to_string(),
            name: "Cut & Curl".to_string(),
            agent_instructions: Some("You book haircuts.".to_string()),
            voice: None,
        },
    ))
}

#[tokio::test]
async fn test_happy_path_streams_in_order() {
    let harness = start_bridge(
        StaticMetadata::with("to-user", "903322379153").and("sip.fromUser", "15550001111"),
        salon_directory(),
    )
    .await;
    let (mut appended, ai_tx) = harness.connector.arm().await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::identity("abc-123").unwrap())
        .await
        .unwrap();

    // 10 audio frames of 160 bytes, each filled with a distinct sample
    for i in 0u8..10 {
        let frame = Frame::audio(Bytes::from(vec![0x30 + i; 160])).unwrap();
        write_frame(&mut trunk, &frame).await.unwrap();
    }

    // Each frame comes out as one in-order 640-byte append (2x upsample,
    // 2 bytes per sample)
    for i in 0u8..10 {
        let event = timeout(WAIT, appended.recv()).await.unwrap().unwrap();
        let ClientEvent::InputAudioAppend { audio } = event else {
            panic!("expected audio append, got {:?}", event);
        };
        let pcm = voxbridge::infrastructure::ai::messages::decode_audio_b64(&audio).unwrap();
        assert_eq!(pcm.len(), 640);

        // Output sample 1 is the first decoded input sample unchanged
        let expected = mulaw::decode_sample(0x30 + i);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), expected);
    }

    // Session is registered under the trunk-announced id while streaming
    let entry = harness.registry.get("abc-123").await.expect("session missing");
    assert_eq!(
        entry.read().await.dialed_number.as_deref(),
        Some("+903322379153")
    );
    assert_eq!(entry.read().await.caller.as_deref(), Some("+15550001111"));
    assert_eq!(harness.connector.connect_count().await, 1);

    // Downlink: one 480-sample AI chunk becomes one 160-byte trunk frame
    let pcm24k: Vec<u8> = vec![0u8; 960];
    ai_tx
        .send(ServerEvent::AudioDelta {
            delta: base64_encode(&pcm24k),
        })
        .unwrap();
    let frame = timeout(WAIT, read_frame(&mut trunk)).await.unwrap().unwrap();
    assert_eq!(frame.frame_type, FrameType::Audio);
    assert_eq!(frame.payload.len(), 160);

    // Hangup tears the whole session down
    write_frame(&mut trunk, &Frame::hangup()).await.unwrap();
    wait_until_empty(&harness.registry).await;
}

#[tokio::test]
async fn test_unresolvable_routing_closes_before_streaming() {
    let harness = start_bridge(StaticMetadata::empty(), salon_directory()).await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    // "sip-call-7f3a" has no phone-number shape anywhere
    write_frame(&mut trunk, &Frame::identity("sip-call-7f3a").unwrap())
        .await
        .unwrap();

    // Trunk is told about the failure, then hung up on
    let first = timeout(WAIT, read_frame(&mut trunk)).await.unwrap().unwrap();
    assert_eq!(first.frame_type, FrameType::Error);
    let second = timeout(WAIT, read_frame(&mut trunk)).await.unwrap().unwrap();
    assert_eq!(second.frame_type, FrameType::Hangup);

    wait_until_empty(&harness.registry).await;
    // No AI leg was ever opened
    assert_eq!(harness.connector.connect_count().await, 0);
}

#[tokio::test]
async fn test_malformed_frame_kills_session_without_partial_audio() {
    let harness = start_bridge(
        StaticMetadata::with("to-user", "903322379153"),
        salon_directory(),
    )
    .await;
    let (mut appended, _ai_tx) = harness.connector.arm().await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::identity("abc-456").unwrap())
        .await
        .unwrap();

    // A valid frame, to prove streaming was up
    write_frame(&mut trunk, &Frame::audio(Bytes::from(vec![0u8; 160])).unwrap())
        .await
        .unwrap();
    timeout(WAIT, appended.recv()).await.unwrap().unwrap();

    // Frame declares 500 payload bytes but only 100 arrive before close
    use tokio::io::AsyncWriteExt;
    let mut partial = vec![0x10u8, 0x01, 0xF4];
    partial.extend_from_slice(&[0u8; 100]);
    trunk.write_all(&partial).await.unwrap();
    trunk.shutdown().await.unwrap();
    drop(trunk);

    wait_until_empty(&harness.registry).await;
    // The truncated frame never reached the AI leg
    assert!(appended.try_recv().is_err());
}

#[tokio::test]
async fn test_hangup_before_identity() {
    let harness = start_bridge(StaticMetadata::empty(), salon_directory()).await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::hangup()).await.unwrap();

    wait_until_empty(&harness.registry).await;
    assert_eq!(harness.connector.connect_count().await, 0);
}

#[tokio::test]
async fn test_ai_leg_close_hangs_up_trunk() {
    let harness = start_bridge(
        StaticMetadata::with("to-user", "903322379153"),
        salon_directory(),
    )
    .await;
    let (_appended, ai_tx) = harness.connector.arm().await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::identity("abc-789").unwrap())
        .await
        .unwrap();
    // Wait for streaming, then close the scripted AI leg
    timeout(WAIT, async {
        while harness.connector.connect_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    drop(ai_tx);

    // Trunk receives a hangup frame
    let frame = timeout(WAIT, async {
        loop {
            let frame = read_frame(&mut trunk).await.unwrap();
            if frame.frame_type == FrameType::Hangup {
                return frame;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(frame.frame_type, FrameType::Hangup);
    wait_until_empty(&harness.registry).await;
}

#[tokio::test]
async fn test_setup_window_elapses_without_identity() {
    let harness = start_bridge_with(
        StaticMetadata::empty(),
        salon_directory(),
        SessionTimeouts {
            setup: Duration::from_millis(300),
            idle: Duration::from_secs(30),
        },
    )
    .await;

    // Connect and stay silent past the setup window
    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    let frame = timeout(WAIT, read_frame(&mut trunk)).await.unwrap().unwrap();
    assert_eq!(frame.frame_type, FrameType::Hangup);

    wait_until_empty(&harness.registry).await;
    assert_eq!(harness.connector.connect_count().await, 0);
}

#[tokio::test]
async fn test_idle_session_is_closed() {
    let harness = start_bridge_with(
        StaticMetadata::with("to-user", "903322379153"),
        salon_directory(),
        SessionTimeouts {
            setup: Duration::from_secs(2),
            idle: Duration::from_secs(1),
        },
    )
    .await;
    let (mut appended, _ai_tx) = harness.connector.arm().await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::identity("abc-idle").unwrap())
        .await
        .unwrap();
    write_frame(&mut trunk, &Frame::audio(Bytes::from(vec![0u8; 160])).unwrap())
        .await
        .unwrap();
    timeout(WAIT, appended.recv()).await.unwrap().unwrap();

    // Both directions go silent; the watchdog tears the session down
    // without either peer hanging up
    wait_until_empty(&harness.registry).await;
    assert_eq!(harness.connector.connect_count().await, 1);

    // The trunk connection is gone too
    let res = timeout(WAIT, read_frame(&mut trunk)).await.unwrap();
    assert!(res.is_err());
}

#[tokio::test]
async fn test_shutdown_hangs_up_live_trunk() {
    let harness = start_bridge(
        StaticMetadata::with("to-user", "903322379153"),
        salon_directory(),
    )
    .await;
    let (mut appended, _ai_tx) = harness.connector.arm().await;

    let mut trunk = TcpStream::connect(harness.addr).await.unwrap();
    write_frame(&mut trunk, &Frame::identity("abc-down").unwrap())
        .await
        .unwrap();
    write_frame(&mut trunk, &Frame::audio(Bytes::from(vec![0u8; 160])).unwrap())
        .await
        .unwrap();
    timeout(WAIT, appended.recv()).await.unwrap().unwrap();

    // Process shutdown while the call is streaming
    harness.shutdown.send(true).unwrap();

    let frame = timeout(WAIT, read_frame(&mut trunk)).await.unwrap().unwrap();
    assert_eq!(frame.frame_type, FrameType::Hangup);
    wait_until_empty(&harness.registry).await;
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    STANDARD.encode(data)
}
