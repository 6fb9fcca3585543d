//! Video feed adapters: the frame directory, the sidecar detector and the
//! async [`Scanner`] used by actions and the watcher.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::errors::ScanError;
use crate::scan::{scan, FaceBox, FaceDetector, ScanLimits, ScanOutcome, VideoFrame};
use crate::settings::AnalysisSettings;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// The video feed as a directory of decoded frames, ordered by file name
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    frames: Vec<PathBuf>,
}

impl FrameDirectory {
    pub fn open(dir: &Path) -> Result<Self, ScanError> {
        let entries = std::fs::read_dir(dir).map_err(|source| ScanError::Source {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut frames: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_frame_file(path))
            .collect();
        frames.sort();

        debug!(dir = %dir.display(), frames = frames.len(), "Opened frame directory");
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Decode the most recent frames lazily: at most `max_frames` of them,
    /// every `stride`-th one, ending on the newest frame. Frames not newer
    /// than `after` are left out.
    pub fn recent_frames(
        &self,
        stride: usize,
        max_frames: usize,
        after: Option<&Path>,
    ) -> impl Iterator<Item = Result<VideoFrame, ScanError>> + '_ {
        let stride = stride.max(1);
        let first_new = after
            .map(|cursor| self.frames.partition_point(|path| path.as_path() <= cursor))
            .unwrap_or(0);
        let span = match max_frames {
            0 => 0,
            n => (n - 1).saturating_mul(stride).saturating_add(1),
        };
        let start = self.frames.len().saturating_sub(span).max(first_new);

        self.frames[start..]
            .iter()
            .enumerate()
            .step_by(stride)
            .map(move |(offset, path)| load_frame(start + offset, path))
    }

    /// Path of the newest frame, the cursor of the next scan
    pub fn newest(&self) -> Option<&Path> {
        self.frames.last().map(PathBuf::as_path)
    }

    /// Most recent frame of the feed
    pub fn latest(&self) -> Option<Result<VideoFrame, ScanError>> {
        let index = self.frames.len().checked_sub(1)?;
        Some(load_frame(index, &self.frames[index]))
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_frame(index: usize, path: &Path) -> Result<VideoFrame, ScanError> {
    let image = image::open(path).map_err(|source| ScanError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(VideoFrame {
        index,
        path: path.to_path_buf(),
        image,
    })
}

/// Reads face boxes written by an external classifier next to each frame:
/// `frame_0001.png` is described by `frame_0001.json`, a JSON array of
/// `{"x", "y", "width", "height"}` objects. Frames without sidecar have no faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarDetector;

impl FaceDetector for SidecarDetector {
    fn detect(&self, frame: &VideoFrame) -> Vec<FaceBox> {
        let sidecar = frame.path.with_extension("json");
        let content = match std::fs::read_to_string(&sidecar) {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&content) {
            Ok(faces) => faces,
            Err(e) => {
                warn!(sidecar = %sidecar.display(), error = %e, "Ignoring malformed face sidecar");
                Vec::new()
            }
        }
    }
}

/// Async access to the video feed
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Latest frame, `None` when the feed is empty
    async fn snapshot(&self) -> Result<Option<DynamicImage>, ScanError>;
    /// Bounded face scan over the most recent footage, skipping frames not
    /// newer than `after`
    async fn scan(
        &self,
        settings: AnalysisSettings,
        after: Option<PathBuf>,
    ) -> Result<ScanOutcome, ScanError>;
}

/// Scanner over a [`FrameDirectory`], running decode work on the blocking pool
#[derive(Debug, Clone)]
pub struct VideoScanner<D = SidecarDetector> {
    frames_dir: PathBuf,
    fps: u32,
    detector: Arc<D>,
}

impl VideoScanner<SidecarDetector> {
    pub fn new(frames_dir: impl Into<PathBuf>, fps: u32) -> Self {
        Self::with_detector(frames_dir, fps, SidecarDetector)
    }
}

impl<D> VideoScanner<D>
where
    D: FaceDetector + Send + Sync + 'static,
{
    pub fn with_detector(frames_dir: impl Into<PathBuf>, fps: u32, detector: D) -> Self {
        Self {
            frames_dir: frames_dir.into(),
            fps,
            detector: Arc::new(detector),
        }
    }
}

#[async_trait]
impl<D> Scanner for VideoScanner<D>
where
    D: FaceDetector + Send + Sync + 'static,
{
    async fn snapshot(&self) -> Result<Option<DynamicImage>, ScanError> {
        let dir = self.frames_dir.clone();
        tokio::task::spawn_blocking(move || {
            let source = FrameDirectory::open(&dir)?;
            source
                .latest()
                .transpose()
                .map(|frame| frame.map(|f| f.image))
        })
        .await
        .map_err(|e| ScanError::Worker(e.to_string()))?
    }

    async fn scan(
        &self,
        settings: AnalysisSettings,
        after: Option<PathBuf>,
    ) -> Result<ScanOutcome, ScanError> {
        let dir = self.frames_dir.clone();
        let detector = Arc::clone(&self.detector);
        let (limits, stride) = ScanLimits::from_settings(&settings, self.fps);
        info!(
            max_faces = limits.max_faces,
            max_frames = limits.max_frames(),
            stride,
            "Starting bounded scan"
        );

        tokio::task::spawn_blocking(move || {
            let source = FrameDirectory::open(&dir)?;
            let frames = source.recent_frames(stride, limits.max_frames(), after.as_deref());
            let mut outcome = scan(frames, detector.as_ref(), limits);
            outcome.newest_frame = source.newest().map(Path::to_path_buf);
            Ok::<_, ScanError>(outcome)
        })
        .await
        .map_err(|e| ScanError::Worker(e.to_string()))?
    }
}
