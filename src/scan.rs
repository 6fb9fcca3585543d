//! # Bounded Media Scan
//!
//! Reads frames in order and collects face crops until either enough faces
//! were found or the frame budget (`frame_rate × max_duration_seconds`) is
//! spent, whichever comes first.

use std::io::Cursor;
use std::path::PathBuf;

use image::DynamicImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ScanError;
use crate::settings::AnalysisSettings;

/// A decoded frame of the video feed
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Position in the feed
    pub index: usize,
    pub path: PathBuf,
    pub image: DynamicImage,
}

/// Face bounding box in frame pixel coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Locates faces in a frame
pub trait FaceDetector {
    fn detect(&self, frame: &VideoFrame) -> Vec<FaceBox>;
}

/// Stopping conditions of a scan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_faces: usize,
    pub max_duration_seconds: u32,
    /// Examined frames per second of footage
    pub frame_rate: u32,
}

impl ScanLimits {
    pub fn new(max_faces: usize, max_duration_seconds: u32, frame_rate: u32) -> Self {
        Self {
            max_faces,
            max_duration_seconds,
            frame_rate,
        }
    }

    /// Frame budget of the scan
    pub fn max_frames(&self) -> usize {
        self.frame_rate as usize * self.max_duration_seconds as usize
    }

    /// Limits and sampling stride for a feed running at `fps`.
    ///
    /// Only `frame_percentage` percent of the frames are examined: the feed is
    /// sampled every `stride` frames and the budget shrinks accordingly, so the
    /// scan still covers `seconds` of footage.
    pub fn from_settings(settings: &AnalysisSettings, fps: u32) -> (Self, usize) {
        let percentage = settings.frame_percentage.clamp(1, 100);
        let frame_rate = (fps * percentage / 100).max(1);
        let stride = ((100 + percentage / 2) / percentage).max(1) as usize;
        (
            Self::new(settings.face_number as usize, settings.seconds, frame_rate),
            stride,
        )
    }
}

/// Result of a scan
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Face crops in detection order
    pub faces: Vec<DynamicImage>,
    pub frames_examined: usize,
    /// Newest frame of the feed when the scan ran
    pub newest_frame: Option<PathBuf>,
}

/// Scan `source` for faces within `limits`.
///
/// Frames that fail to decode are logged, counted as examined and skipped.
/// An exhausted source ends the scan early with whatever was collected.
pub fn scan<S, D>(source: S, detector: &D, limits: ScanLimits) -> ScanOutcome
where
    S: IntoIterator<Item = Result<VideoFrame, ScanError>>,
    D: FaceDetector + ?Sized,
{
    let max_frames = limits.max_frames();
    let mut outcome = ScanOutcome::default();
    let mut frames = source.into_iter();

    while outcome.faces.len() < limits.max_faces && outcome.frames_examined < max_frames {
        let Some(next) = frames.next() else {
            debug!(frames_examined = outcome.frames_examined, "Video source exhausted");
            break;
        };
        outcome.frames_examined += 1;

        let frame = match next {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable frame");
                continue;
            }
        };

        for face in detector.detect(&frame) {
            if outcome.faces.len() == limits.max_faces {
                break;
            }
            match crop_face(&frame.image, face) {
                Some(crop) => outcome.faces.push(crop),
                None => debug!(frame = frame.index, ?face, "Face box outside frame, ignored"),
            }
        }
    }

    debug!(
        faces = outcome.faces.len(),
        frames_examined = outcome.frames_examined,
        "Scan finished"
    );
    outcome
}

/// Crop `face` out of `image`, clamped to the image bounds
pub fn crop_face(image: &DynamicImage, face: FaceBox) -> Option<DynamicImage> {
    let (width, height) = (image.width(), image.height());
    if face.x >= width || face.y >= height {
        return None;
    }
    let crop_width = face.width.min(width - face.x);
    let crop_height = face.height.min(height - face.y);
    if crop_width == 0 || crop_height == 0 {
        return None;
    }
    Some(image.crop_imm(face.x, face.y, crop_width, crop_height))
}

/// Encode an image as PNG for sending
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ScanError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(bytes)
}
