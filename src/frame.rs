//! Frame buffers and per-stream update tracking.

use crate::convert::i420_buffer_size;
use crate::error::{Error, Result};

/// An owned planar YUV 4:2:0 image.
///
/// Exclusively owned by one manager; the byte buffer is only ever handed to
/// a backend driver for the duration of a present call. Reallocation happens
/// only when the geometry changes; a frame of the same size overwrites the
/// existing allocation wholesale.
#[derive(Debug, Clone, Default)]
pub struct YuvFrame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl YuvFrame {
    /// Empty frame with no allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame width in pixels (0 when empty).
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels (0 when empty).
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether no frame has been written yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw frame bytes (Y plane, then U, then V).
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Resize the backing buffer, reallocating only when the geometry
    /// actually changed. Contents after a resize are unspecified.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
            return Err(Error::InvalidGeometry(format!(
                "frame size must be even and non-zero, got {width}x{height}"
            )));
        }
        if self.width != width || self.height != height {
            self.data.resize(i420_buffer_size(width, height), 0);
            self.width = width;
            self.height = height;
        }
        Ok(())
    }

    /// Overwrite the frame with new image data, resizing as needed. A
    /// rejected write leaves the previous contents and geometry untouched.
    pub fn write(&mut self, data: &[u8], width: u32, height: u32) -> Result<()> {
        let expected = i420_buffer_size(width, height);
        if data.len() < expected {
            return Err(Error::ShortBuffer {
                actual: data.len(),
                expected,
            });
        }
        self.set_size(width, height)?;
        self.data.copy_from_slice(&data[..expected]);
        Ok(())
    }

    /// The Y, U and V plane slices.
    pub fn planes(&self) -> (&[u8], &[u8], &[u8]) {
        let w = self.width as usize;
        let h = self.height as usize;
        let luma = w * h;
        let chroma = (w / 2) * (h / 2);
        (
            &self.data[..luma],
            &self.data[luma..luma + chroma],
            &self.data[luma + chroma..luma + 2 * chroma],
        )
    }
}

/// Which stream(s) produced a new frame since the last present.
///
/// Set under the frame lock by `set_frame_data`, read and cleared by the
/// render loop's decision phase, and ferried to the lock-free sync phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateRequired {
    /// A new local frame arrived.
    pub local: bool,
    /// A new remote frame arrived.
    pub remote: bool,
}

impl UpdateRequired {
    /// Whether either stream changed.
    #[inline]
    pub fn any(&self) -> bool {
        self.local || self.remote
    }

    /// Reset both flags.
    #[inline]
    pub fn clear(&mut self) {
        self.local = false;
        self.remote = false;
    }
}
