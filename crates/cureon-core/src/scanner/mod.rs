//! QR capture/decode loop.
//!
//! The platform supplies a [`Camera`] (opening a [`VideoStream`]) and a
//! [`SymbolDecoder`]. [`QrScanner`] owns at most one live stream, copies ready
//! frames into a reused RGBA buffer on a fixed ticker and stops itself on the
//! first decoded payload.

mod frame;

pub use frame::FrameBuffer;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cancel::CancelToken;
use crate::config::{FacingMode, ScanConfig};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera found")]
    DeviceNotFound,

    #[error("Cannot access camera: {0}")]
    Other(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScannerError {
    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Scanner not started")]
    NotStarted,
}

pub type ScannerResult<T> = Result<T, ScannerError>;

/// Requested capture parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl From<&ScanConfig> for CameraConstraints {
    fn from(config: &ScanConfig) -> Self {
        Self {
            facing: config.facing,
            ideal_width: config.ideal_width,
            ideal_height: config.ideal_height,
        }
    }
}

#[async_trait]
pub trait Camera: Send + Sync {
    async fn open(&self, constraints: &CameraConstraints) -> Result<Box<dyn VideoStream>, CameraError>;
}

/// A live camera stream.
pub trait VideoStream: Send {
    /// Enough data buffered and a non-zero frame width.
    fn is_ready(&self) -> bool;

    /// Current frame size in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Copy the current frame into `frame`, already sized to `dimensions()`.
    fn draw_into(&mut self, frame: &mut FrameBuffer);

    /// Stop every track. Must be safe to call twice.
    fn stop(&mut self);

    fn live_tracks(&self) -> usize;
}

pub trait SymbolDecoder: Send + Sync {
    fn decode(&self, rgba: &[u8], width: u32, height: u32) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Decoded(String),
    Cancelled,
    TimedOut,
}

struct ScanSession {
    stream: Box<dyn VideoStream>,
    ticker: tokio::time::Interval,
}

enum Wake {
    Frame,
    Cancelled,
    TimedOut,
}

pub struct QrScanner<C, D> {
    camera: C,
    decoder: D,
    config: ScanConfig,
    frame: FrameBuffer,
    session: Option<ScanSession>,
}

impl<C: Camera, D: SymbolDecoder> QrScanner<C, D> {
    pub fn new(camera: C, decoder: D, config: ScanConfig) -> Self {
        Self {
            camera,
            decoder,
            config,
            frame: FrameBuffer::default(),
            session: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Tracks still live on the current stream.
    pub fn live_tracks(&self) -> usize {
        self.session
            .as_ref()
            .map(|s| s.stream.live_tracks())
            .unwrap_or(0)
    }

    /// Open the camera, replacing any running session.
    pub async fn start(&mut self) -> ScannerResult<()> {
        self.stop();

        let constraints = CameraConstraints::from(&self.config);
        let stream = self.camera.open(&constraints).await.map_err(|e| {
            tracing::warn!(error = %e, "camera unavailable");
            e
        })?;

        let mut ticker = tokio::time::interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.session = Some(ScanSession { stream, ticker });
        tracing::debug!("scan session started");
        Ok(())
    }

    /// One decode attempt. A hit ends the session.
    pub fn step(&mut self) -> Option<String> {
        let session = self.session.as_mut()?;
        if !session.stream.is_ready() {
            return None;
        }

        let (width, height) = session.stream.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        self.frame.ensure_size(width, height);
        session.stream.draw_into(&mut self.frame);

        let payload = self.decoder.decode(self.frame.pixels(), width, height)?;
        tracing::info!(bytes = payload.len(), "QR code decoded");
        self.stop();
        Some(payload)
    }

    /// Drive the loop until a decode, cancellation or the configured timeout.
    pub async fn scan(&mut self, cancel: &CancelToken) -> ScannerResult<ScanOutcome> {
        if self.session.is_none() {
            return Err(ScannerError::NotStarted);
        }

        let deadline = self.config.timeout().map(|t| Instant::now() + t);
        let timeout = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timeout);

        loop {
            let wake = match self.session.as_mut() {
                Some(session) => tokio::select! {
                    _ = session.ticker.tick() => Wake::Frame,
                    _ = cancel.cancelled() => Wake::Cancelled,
                    _ = &mut timeout => Wake::TimedOut,
                },
                None => Wake::Cancelled,
            };

            match wake {
                Wake::Frame => {
                    if let Some(payload) = self.step() {
                        return Ok(ScanOutcome::Decoded(payload));
                    }
                }
                Wake::Cancelled => {
                    self.stop();
                    return Ok(ScanOutcome::Cancelled);
                }
                Wake::TimedOut => {
                    tracing::info!("scan timed out");
                    self.stop();
                    return Ok(ScanOutcome::TimedOut);
                }
            }
        }
    }

    /// Drop the pending tick and stop all tracks. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stream.stop();
            tracing::debug!("scan session stopped");
        }
    }
}

impl<C, D> Drop for QrScanner<C, D> {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stream.stop();
        }
    }
}
