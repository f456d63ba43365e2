//! Duplex audio bridge
//!
//! Runs the two directional pumps for one streaming session. Uplink
//! reads trunk audio frames, upsamples, and appends them to the AI
//! input buffer; downlink decodes AI audio deltas, decimates, and
//! frames them back to the trunk. The directions are independent tasks
//! so a stalled peer on one side never starves the other; either side
//! ending stops both cooperatively via the shared stop signal.

use crate::domain::audio::AudioFrame;
use crate::domain::error::BridgeError;
use crate::domain::session::CallSession;
use crate::infrastructure::ai::messages;
use crate::infrastructure::ai::{AiAudioSink, AiEventSource, ClientEvent, ServerEvent};
use crate::infrastructure::media::{ai_to_telephony, Upsampler};
use crate::infrastructure::protocol::{read_frame, write_frame, Frame, FrameType};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

/// How a bridge run ended
///
/// An idle session is not an "end" but an error
/// (`BridgeError::IdleTimeout`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// Trunk sent a hangup frame
    TrunkHangup,
    /// AI leg closed its connection
    AiClosed,
    /// Process shutdown forced the call closed
    Shutdown,
}

/// Pump audio both ways until either leg ends
///
/// Frames are forwarded strictly in arrival order within each
/// direction; there is no batching. The stop signal is checked between
/// frames, so cancellation lands before the next frame crosses.
pub async fn run_bridge<R, W, S, E>(
    session: Arc<RwLock<CallSession>>,
    mut trunk_read: R,
    mut trunk_write: W,
    mut ai_sink: S,
    mut ai_source: E,
    idle_timeout: Duration,
    shutdown: watch::Receiver<bool>,
) -> Result<BridgeEnd, BridgeError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    S: AiAudioSink + 'static,
    E: AiEventSource + 'static,
{
    let (stop_tx, stop_rx) = watch::channel(false);

    // Uplink: trunk -> transcode -> AI
    let uplink_session = session.clone();
    let uplink_stop = stop_rx.clone();
    let uplink_stop_tx = stop_tx.clone();
    let mut uplink_shutdown = shutdown.clone();
    let uplink = tokio::spawn(async move {
        let mut stop = uplink_stop;
        let mut upsampler = Upsampler::new();
        let result = loop {
            let frame = tokio::select! {
                biased;
                // Process shutdown outranks the peer-stop signal so
                // both pumps report the same ending
                changed = uplink_shutdown.changed() => {
                    if changed.is_err() || *uplink_shutdown.borrow() {
                        break Ok(Some(BridgeEnd::Shutdown));
                    }
                    continue;
                }
                _ = stop.changed() => break Ok(None),
                frame = read_frame(&mut trunk_read) => frame,
            };

            match frame {
                Ok(frame) => match frame.frame_type {
                    FrameType::Audio => {
                        let audio = AudioFrame::mulaw_8k(frame.payload);
                        if audio.sample_count() == 0 {
                            continue;
                        }
                        let pcm = upsampler.telephony_to_ai(&audio.data);
                        uplink_session.write().await.touch();
                        if let Err(e) = ai_sink.send(ClientEvent::audio_append(&pcm)).await {
                            break Err(e);
                        }
                    }
                    FrameType::Hangup => {
                        info!("Trunk hangup received");
                        break Ok(Some(BridgeEnd::TrunkHangup));
                    }
                    FrameType::Error => {
                        warn!(
                            "Trunk error frame: {}",
                            String::from_utf8_lossy(&frame.payload)
                        );
                    }
                    FrameType::Identity => {
                        debug!("Ignoring identity frame mid-stream");
                    }
                },
                Err(e) => break Err(BridgeError::Framing(e)),
            }
        };
        let _ = uplink_stop_tx.send(true);
        let _ = ai_sink.close().await;
        result
    });

    // Downlink: AI -> transcode -> trunk
    let downlink_session = session.clone();
    let downlink_stop = stop_rx.clone();
    let downlink_stop_tx = stop_tx.clone();
    let mut downlink_shutdown = shutdown.clone();
    let downlink = tokio::spawn(async move {
        let mut stop = downlink_stop;
        let result = loop {
            let event = tokio::select! {
                biased;
                changed = downlink_shutdown.changed() => {
                    if changed.is_err() || *downlink_shutdown.borrow() {
                        break Ok(Some(BridgeEnd::Shutdown));
                    }
                    continue;
                }
                _ = stop.changed() => break Ok(None),
                event = ai_source.next() => event,
            };

            match event {
                Ok(Some(ServerEvent::AudioDelta { delta })) => {
                    let Some(pcm) = messages::decode_audio_b64(&delta) else {
                        warn!("Undecodable AI audio delta, skipping");
                        continue;
                    };
                    let audio = AudioFrame::pcm16(pcm.into(), 24_000);
                    let mulaw = ai_to_telephony(&audio.data);
                    downlink_session.write().await.touch();
                    match Frame::audio(mulaw.into()) {
                        Ok(frame) => {
                            if let Err(e) = write_frame(&mut trunk_write, &frame).await {
                                break Err(BridgeError::UpstreamDisconnect(format!(
                                    "trunk write: {}",
                                    e
                                )));
                            }
                        }
                        Err(e) => break Err(BridgeError::Framing(e)),
                    }
                }
                Ok(Some(ServerEvent::ResponseDone)) => {
                    debug!("AI response turn complete");
                }
                Ok(Some(ServerEvent::Error { error })) => {
                    break Err(BridgeError::AiLeg(error.message));
                }
                Ok(Some(ServerEvent::Ignored)) => {}
                Ok(None) => {
                    info!("AI leg closed");
                    break Ok(Some(BridgeEnd::AiClosed));
                }
                Err(e) => break Err(e),
            }
        };
        let _ = downlink_stop_tx.send(true);
        // Tell the trunk the call is over when the AI side ended it
        if !matches!(result, Ok(Some(BridgeEnd::TrunkHangup)) | Ok(None)) {
            let _ = write_frame(&mut trunk_write, &Frame::hangup()).await;
        }
        result
    });

    // Idle watchdog: both directions quiet past the window ends the call
    let watchdog_session = session.clone();
    let watchdog_stop = stop_rx;
    let watchdog_stop_tx = stop_tx;
    let watchdog = tokio::spawn(async move {
        let mut stop = watchdog_stop;
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = stop.changed() => return false,
                _ = ticker.tick() => {
                    let idle = watchdog_session.read().await.idle_seconds();
                    if idle >= idle_timeout.as_secs() as i64 {
                        warn!("Session idle for {}s, closing", idle);
                        let _ = watchdog_stop_tx.send(true);
                        return true;
                    }
                }
            }
        }
    });

    let uplink_result = uplink.await.unwrap_or_else(|e| {
        Err(BridgeError::UpstreamDisconnect(format!("uplink panicked: {}", e)))
    });
    let downlink_result = downlink.await.unwrap_or_else(|e| {
        Err(BridgeError::UpstreamDisconnect(format!("downlink panicked: {}", e)))
    });
    let timed_out = watchdog.await.unwrap_or(false);

    if timed_out {
        return Err(BridgeError::IdleTimeout);
    }

    // A definite end from either pump wins over the other side's
    // cancellation fallout
    match (uplink_result, downlink_result) {
        (Ok(Some(end)), _) | (_, Ok(Some(end))) => Ok(end),
        (Err(e), _) => Err(e),
        (_, Err(e)) => Err(e),
        (Ok(None), Ok(None)) => Ok(BridgeEnd::AiClosed),
    }
}
