use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::aggregator::SampleAggregator;
use crate::buffer::SessionBuffer;
use crate::config::{RecorderConfig, UploadConfig};
use crate::error::{RecorderError, Result};
use crate::frame::SensorFrame;
use crate::identity::Identity;
use crate::serializer::{self, SerializerConfig};
use crate::session::{FrozenSession, SessionMetadata, SessionState};
use crate::ticker::Ticker;
use crate::uploader::{UploadOutcome, Uploader};

/// What the display collaborator shows about the last stopped session
#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Idle,
    Uploading { frames: usize },
    Finished(UploadOutcome),
    SerializationFailed(String),
}

/// Session controller: owns the ticker and the buffer of the active session.
///
/// `start` clears the buffer and begins ticking; every tick appends one fused
/// frame from the aggregator. `stop` cancels and joins the ticker before the
/// buffer is read, then serializes and uploads on a background task.
pub struct Recorder {
    config: RecorderConfig,
    serializer: SerializerConfig,
    uploader: Uploader,
    aggregator: SampleAggregator,
    buffer: SessionBuffer,
    ticker: Ticker,
    active: Option<SessionMetadata>,
    status_tx: Arc<watch::Sender<UploadStatus>>,
}

impl Recorder {
    pub fn new(config: RecorderConfig, upload: &UploadConfig, serializer: SerializerConfig) -> Self {
        let (status_tx, _) = watch::channel(UploadStatus::Idle);
        Recorder {
            config,
            serializer,
            uploader: Uploader::new(upload),
            aggregator: SampleAggregator::new(""),
            buffer: SessionBuffer::new(),
            ticker: Ticker::new(),
            active: None,
            status_tx: Arc::new(status_tx),
        }
    }

    /// Handle for sensor source callbacks
    pub fn aggregator(&self) -> SampleAggregator {
        self.aggregator.clone()
    }

    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Recording
        } else {
            SessionState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    pub fn frame_count(&self) -> usize {
        self.buffer.size()
    }

    pub fn estimated_byte_size(&self) -> usize {
        self.buffer.estimated_byte_size()
    }

    pub fn latest(&self) -> SensorFrame {
        self.aggregator.latest()
    }

    /// Metadata of the running session, if any
    pub fn session(&self) -> Option<&SessionMetadata> {
        self.active.as_ref()
    }

    pub fn status(&self) -> watch::Receiver<UploadStatus> {
        self.status_tx.subscribe()
    }

    /// Begin a new session. Must be called from within a tokio runtime.
    pub fn start(&mut self, identity: &Identity, smoothing: bool) -> Result<()> {
        if self.active.is_some() || self.ticker.is_running() {
            return Err(RecorderError::AlreadyRunning);
        }

        self.buffer.clear();
        self.aggregator.reset(&identity.device_id);
        let metadata = SessionMetadata::new(identity, smoothing);

        let aggregator = self.aggregator.clone();
        let buffer = self.buffer.clone();
        self.ticker.start(self.config.tick_interval(), move || {
            buffer.append(aggregator.snapshot(Utc::now()));
        })?;

        info!(
            "recording started for {} ({}) every {}ms, smoothing={}",
            metadata.name, metadata.device_id, self.config.tick_interval_ms, smoothing
        );
        self.active = Some(metadata);
        Ok(())
    }

    /// Toggle the smoothing flag of the running session.
    pub fn set_smoothing(&mut self, smoothing: bool) -> Result<()> {
        let metadata = self.active.as_mut().ok_or(RecorderError::NotRunning)?;
        metadata.smoothing = smoothing;
        Ok(())
    }

    /// Stop recording and upload the session in the background.
    ///
    /// The returned handle resolves to the final status, which is also
    /// published on [`Recorder::status`]. The recorder can start a new session
    /// as soon as this returns.
    pub async fn stop(&mut self) -> Result<JoinHandle<UploadStatus>> {
        let session = self.stop_session().await?;
        Ok(self.upload(session))
    }

    /// Stop recording and drop the buffered frames without uploading.
    pub async fn stop_and_discard(&mut self) -> Result<()> {
        let session = self.stop_session().await?;
        warn!("discarding session with {} frames", session.len());
        Ok(())
    }

    /// Stop recording and hand back the frozen session without uploading it.
    pub async fn stop_session(&mut self) -> Result<FrozenSession> {
        let metadata = self.active.take().ok_or(RecorderError::NotRunning)?;

        // Drain barrier: the last tick has finished appending once this returns.
        self.ticker.stop().await?;

        let session = FrozenSession::new(metadata, self.buffer.snapshot_for_upload());
        info!(
            "recording stopped: {} frames in {:.2}s",
            session.len(),
            session.duration().num_milliseconds() as f64 / 1000.0
        );
        Ok(session)
    }

    /// Serialize and upload `session` on a background task.
    pub fn upload(&self, session: FrozenSession) -> JoinHandle<UploadStatus> {
        let uploader = self.uploader.clone();
        let serializer_cfg = self.serializer.clone();
        let status_tx = self.status_tx.clone();

        tokio::spawn(async move {
            status_tx.send_replace(UploadStatus::Uploading {
                frames: session.len(),
            });

            let encoded =
                tokio::task::spawn_blocking(move || serializer::to_json(&session, &serializer_cfg))
                    .await;

            let status = match encoded {
                Ok(Ok(body)) => {
                    info!("session serialized: {} KB", body.len() / 1024);
                    UploadStatus::Finished(uploader.upload(body).await)
                }
                Ok(Err(e)) => {
                    error!("session discarded, serialization failed: {}", e);
                    UploadStatus::SerializationFailed(e.to_string())
                }
                Err(e) => {
                    error!("serializer task failed: {}", e);
                    UploadStatus::SerializationFailed(e.to_string())
                }
            };

            status_tx.send_replace(status.clone());
            status
        })
    }
}
