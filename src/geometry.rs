//! Rectangle and layout math for frame presentation.
//!
//! All destination-rectangle decisions live here: aspect-preserving fit of a
//! source image into a window, picture-in-picture inset placement, and zoom
//! application. Backend drivers call into these instead of carrying their own
//! geometry code.

/// Ratio of window size to PIP inset size in windowed modes.
pub const PIP_RATIO_WINDOW: u32 = 3;

/// Ratio of window size to PIP inset size in fullscreen mode.
pub const PIP_RATIO_FULLSCREEN: u32 = 5;

/// A rectangle in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Horizontal offset of the top-left corner.
    pub x: i32,
    /// Vertical offset of the top-left corner.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle anchored at the origin.
    #[inline]
    pub const fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Whether this rectangle is fully contained in `outer`.
    pub fn fits_within(&self, outer: &Rect) -> bool {
        self.x >= outer.x
            && self.y >= outer.y
            && self.x + self.width as i32 <= outer.x + outer.width as i32
            && self.y + self.height as i32 <= outer.y + outer.height as i32
    }
}

/// Largest rectangle inside `window_w` x `window_h` that preserves the aspect
/// ratio of `image_w` x `image_h`, centered on the axis with slack.
///
/// Degenerate inputs (any zero dimension) yield an empty rectangle.
pub fn aspect_fit(window_w: u32, window_h: u32, image_w: u32, image_h: u32) -> Rect {
    if window_w == 0 || window_h == 0 || image_w == 0 || image_h == 0 {
        return Rect::default();
    }

    // Compare window and image aspect ratios without division:
    // window wider than image <=> window_w * image_h > window_h * image_w.
    let (dst_w, dst_h) = if (window_w as u64) * (image_h as u64) > (window_h as u64) * (image_w as u64)
    {
        // Height-bound: fill the window vertically, center horizontally.
        let h = window_h;
        let w = ((window_h as u64 * image_w as u64) / image_h as u64) as u32;
        (w.max(1), h)
    } else {
        // Width-bound: fill the window horizontally, center vertically.
        let w = window_w;
        let h = ((window_w as u64 * image_h as u64) / image_w as u64) as u32;
        (w, h.max(1))
    };

    Rect::new(
        ((window_w - dst_w) / 2) as i32,
        ((window_h - dst_h) / 2) as i32,
        dst_w,
        dst_h,
    )
}

/// PIP inset rectangle: the window size divided by `ratio`, anchored at the
/// bottom-right corner of the window.
pub fn pip_inset(window_w: u32, window_h: u32, ratio: u32) -> Rect {
    let ratio = ratio.max(1);
    let w = (window_w / ratio).max(1);
    let h = (window_h / ratio).max(1);
    Rect::new(
        window_w.saturating_sub(w) as i32,
        window_h.saturating_sub(h) as i32,
        w,
        h,
    )
}

/// Apply a zoom percentage to an image size. A zoom of 0 (unset) behaves
/// like 100.
pub fn zoomed(width: u32, height: u32, zoom_percent: u32) -> (u32, u32) {
    let zoom = if zoom_percent == 0 { 100 } else { zoom_percent };
    let w = ((width as u64 * zoom as u64) / 100) as u32;
    let h = ((height as u64 * zoom as u64) / 100) as u32;
    (w.max(1), h.max(1))
}
