//! Frame capture and preparation
//!
//! Frames are rescaled to a fixed canvas before submission regardless
//! of the source's native resolution, then encoded losslessly so the
//! detector sees exactly what was captured.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageFormat, RgbImage};

use crate::{Error, Result};

/// Capture canvas width, matching the detector's training resolution
pub const CAPTURE_WIDTH: u32 = 640;

/// Capture canvas height
pub const CAPTURE_HEIGHT: u32 = 480;

/// One frame from a source, tightly packed 8-bit RGB
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Frame source capability (camera or stand-in)
///
/// The source is a scoped resource: opened on entry into scanning and
/// closed unconditionally on every exit path.
pub trait FrameSource: Send {
    /// Acquire the underlying device or data
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot be acquired.
    fn open(&mut self) -> Result<()>;

    /// Grab the current frame
    ///
    /// # Errors
    ///
    /// Returns error if the source is closed or the grab fails.
    fn grab(&mut self) -> Result<RawFrame>;

    /// Release the underlying device or data
    fn close(&mut self);

    /// Whether the source is currently acquired
    fn is_open(&self) -> bool;
}

/// Rescale a frame to the capture canvas and encode it as PNG
///
/// # Errors
///
/// Returns error if the frame buffer is inconsistent or encoding fails.
pub fn encode_frame(frame: &RawFrame) -> Result<Vec<u8>> {
    let img = RgbImage::from_raw(frame.width, frame.height, frame.rgb.clone())
        .ok_or_else(|| Error::Capture("frame buffer does not match dimensions".to_string()))?;

    let scaled = image::imageops::resize(&img, CAPTURE_WIDTH, CAPTURE_HEIGHT, FilterType::Triangle);

    let mut buf = Cursor::new(Vec::new());
    scaled
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::Capture(format!("png encode failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Frame source backed by still images in a directory
///
/// Cycles through the images in filename order, one per grab. Useful
/// for hardware-free demos and soak tests against a live detector.
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageDirSource {
    /// Create a source over the given directory
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Vec::new(),
            next: 0,
            open: false,
        }
    }

    /// List image files under a directory in stable order
    fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        matches!(ext.to_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp")
                    })
            })
            .collect();
        files.sort();
        Ok(files)
    }
}

impl FrameSource for ImageDirSource {
    fn open(&mut self) -> Result<()> {
        let files = Self::scan_dir(&self.dir)
            .map_err(|e| Error::Capture(format!("{}: {e}", self.dir.display())))?;

        if files.is_empty() {
            return Err(Error::Capture(format!(
                "no images found in {}",
                self.dir.display()
            )));
        }

        tracing::debug!(dir = %self.dir.display(), frames = files.len(), "frame source opened");

        self.files = files;
        self.next = 0;
        self.open = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<RawFrame> {
        if !self.open {
            return Err(Error::Capture("frame source is closed".to_string()));
        }

        let path = &self.files[self.next % self.files.len()];
        self.next = self.next.wrapping_add(1);

        let img = image::open(path)
            .map_err(|e| Error::Capture(format!("{}: {e}", path.display())))?
            .to_rgb8();

        Ok(RawFrame {
            width: img.width(),
            height: img.height(),
            rgb: img.into_raw(),
        })
    }

    fn close(&mut self) {
        if self.open {
            tracing::debug!(dir = %self.dir.display(), "frame source closed");
        }
        self.open = false;
        self.files.clear();
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_scales_to_capture_canvas() {
        let frame = RawFrame {
            width: 4,
            height: 4,
            rgb: vec![128; 4 * 4 * 3],
        };
        let png = encode_frame(&frame).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), CAPTURE_WIDTH);
        assert_eq!(decoded.height(), CAPTURE_HEIGHT);
    }

    #[test]
    fn encode_rejects_inconsistent_buffer() {
        let frame = RawFrame {
            width: 10,
            height: 10,
            rgb: vec![0; 5],
        };
        assert!(encode_frame(&frame).is_err());
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let mut source = ImageDirSource::new("/nonexistent/frames");
        assert!(source.open().is_err());
        assert!(!source.is_open());
    }
}
