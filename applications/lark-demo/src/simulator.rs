//! Audio backend that plays silence on a timer
//!
//! Sources advance one second per tick, report `TimeUpdate` on each tick and
//! `Ended` when they reach the configured length. URLs starting with `fail:`
//! are rejected the way a native player rejects a dead link.

use async_trait::async_trait;
use lark_playback::{AudioBackend, DeviceEvent, DeviceEventSink, PlaybackError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Transport {
    paused: AtomicBool,
    position_secs: AtomicU64,
}

pub struct SimulatedBackend {
    track_length: Duration,
    transport: Arc<Transport>,
    ticker: Option<JoinHandle<()>>,
}

impl SimulatedBackend {
    pub fn new(track_length: Duration) -> Self {
        Self {
            track_length: track_length.max(TICK),
            transport: Arc::new(Transport::default()),
            ticker: None,
        }
    }
}

#[async_trait]
impl AudioBackend for SimulatedBackend {
    async fn play(&mut self, url: &str, events: DeviceEventSink) -> lark_playback::Result<()> {
        if url.starts_with("fail:") {
            return Err(PlaybackError::device(format!("source not supported: {url}")));
        }

        debug!(url, "Simulated source attached");
        let transport = Arc::new(Transport::default());
        self.transport = transport.clone();
        let length = self.track_length.as_secs();

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK);
            interval.tick().await;
            loop {
                interval.tick().await;
                if transport.paused.load(Ordering::SeqCst) {
                    continue;
                }

                let position = transport.position_secs.fetch_add(1, Ordering::SeqCst) + 1;
                if position >= length {
                    // Hold at the end until a seek and resume restart the source.
                    transport.paused.store(true, Ordering::SeqCst);
                    if !events.emit(DeviceEvent::Ended) {
                        break;
                    }
                    continue;
                }

                let sent = events.emit(DeviceEvent::TimeUpdate {
                    current: Duration::from_secs(position),
                    duration: Duration::from_secs(length),
                });
                if !sent {
                    break;
                }
            }
        }));

        Ok(())
    }

    fn detach(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn pause(&mut self) {
        self.transport.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.transport.paused.store(false, Ordering::SeqCst);
    }

    fn seek(&mut self, position: Duration) {
        self.transport
            .position_secs
            .store(position.as_secs(), Ordering::SeqCst);
    }

    fn set_volume(&mut self, gain: f32) {
        debug!(gain, "Simulated volume");
    }
}

impl Drop for SimulatedBackend {
    fn drop(&mut self) {
        self.detach();
    }
}
