//! Software colorspace conversion and scaling.
//!
//! This is the fallback pixel path used when no hardware overlay is
//! available: the incoming planar YUV 4:2:0 frame is scaled to the
//! destination rectangle plane by plane, then converted to the packed
//! format a native drawable accepts (BGRA or RGBA).
//!
//! Conversion uses fixed-point BT.601 arithmetic; scaling supports four
//! algorithms selectable by the persisted scaling-algorithm index.

use crate::error::{Error, Result};

/// Bytes required for a planar YUV 4:2:0 image of the given size.
#[inline]
pub const fn i420_buffer_size(width: u32, height: u32) -> usize {
    let w = width as usize;
    let h = height as usize;
    w * h + 2 * ((w / 2) * (h / 2))
}

/// Software scaling algorithm, indexed by the persisted configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleAlgorithm {
    /// Nearest neighbor - fastest, pixelated results.
    #[default]
    NearestNeighbor,
    /// Bilinear interpolation - good quality/speed balance.
    Bilinear,
    /// Box average - averages all covered source pixels, best for downscale.
    BoxAverage,
    /// Catmull-Rom bicubic - sharpest upscale, most expensive.
    CatmullRom,
}

impl ScaleAlgorithm {
    /// Map a persisted index to an algorithm. Out-of-range values fall back
    /// to index 0 (nearest neighbor).
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::NearestNeighbor,
            1 => Self::Bilinear,
            2 => Self::BoxAverage,
            3 => Self::CatmullRom,
            _ => Self::NearestNeighbor,
        }
    }

    /// The persisted index for this algorithm.
    pub fn index(self) -> u32 {
        match self {
            Self::NearestNeighbor => 0,
            Self::Bilinear => 1,
            Self::BoxAverage => 2,
            Self::CatmullRom => 3,
        }
    }
}

fn check_dims(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidGeometry("dimensions must be non-zero".into()));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(Error::InvalidGeometry(format!(
            "YUV 4:2:0 requires even dimensions, got {width}x{height}"
        )));
    }
    Ok(())
}

fn check_len(buf_len: usize, expected: usize) -> Result<()> {
    if buf_len < expected {
        return Err(Error::ShortBuffer {
            actual: buf_len,
            expected,
        });
    }
    Ok(())
}

// ============================================================================
// Scaling
// ============================================================================

/// Scales planar YUV 4:2:0 frames between resolutions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareScaler {
    algorithm: ScaleAlgorithm,
}

impl SoftwareScaler {
    /// Create a scaler using the given algorithm.
    pub fn new(algorithm: ScaleAlgorithm) -> Self {
        Self { algorithm }
    }

    /// The configured algorithm.
    pub fn algorithm(&self) -> ScaleAlgorithm {
        self.algorithm
    }

    /// Scale an I420 frame from `in_w` x `in_h` into `out_w` x `out_h`.
    pub fn scale_i420(
        &self,
        input: &[u8],
        in_w: u32,
        in_h: u32,
        output: &mut [u8],
        out_w: u32,
        out_h: u32,
    ) -> Result<()> {
        check_dims(in_w, in_h)?;
        check_dims(out_w, out_h)?;
        check_len(input.len(), i420_buffer_size(in_w, in_h))?;
        check_len(output.len(), i420_buffer_size(out_w, out_h))?;

        let (iw, ih) = (in_w as usize, in_h as usize);
        let (ow, oh) = (out_w as usize, out_h as usize);

        // Y plane.
        self.scale_plane(&input[..iw * ih], iw, ih, &mut output[..ow * oh], ow, oh);

        // U plane (half resolution).
        let in_u = iw * ih;
        let out_u = ow * oh;
        self.scale_plane(
            &input[in_u..in_u + (iw / 2) * (ih / 2)],
            iw / 2,
            ih / 2,
            &mut output[out_u..out_u + (ow / 2) * (oh / 2)],
            ow / 2,
            oh / 2,
        );

        // V plane (half resolution).
        let in_v = in_u + (iw / 2) * (ih / 2);
        let out_v = out_u + (ow / 2) * (oh / 2);
        self.scale_plane(
            &input[in_v..in_v + (iw / 2) * (ih / 2)],
            iw / 2,
            ih / 2,
            &mut output[out_v..out_v + (ow / 2) * (oh / 2)],
            ow / 2,
            oh / 2,
        );

        Ok(())
    }

    /// Scale a single 8-bit plane.
    fn scale_plane(
        &self,
        input: &[u8],
        in_w: usize,
        in_h: usize,
        output: &mut [u8],
        out_w: usize,
        out_h: usize,
    ) {
        if in_w == out_w && in_h == out_h {
            output[..in_w * in_h].copy_from_slice(&input[..in_w * in_h]);
            return;
        }
        match self.algorithm {
            ScaleAlgorithm::NearestNeighbor => {
                scale_plane_nearest(input, in_w, in_h, output, out_w, out_h)
            }
            ScaleAlgorithm::Bilinear => {
                scale_plane_bilinear(input, in_w, in_h, output, out_w, out_h)
            }
            ScaleAlgorithm::BoxAverage => scale_plane_box(input, in_w, in_h, output, out_w, out_h),
            ScaleAlgorithm::CatmullRom => {
                scale_plane_catmull_rom(input, in_w, in_h, output, out_w, out_h)
            }
        }
    }
}

fn scale_plane_nearest(
    input: &[u8],
    in_w: usize,
    in_h: usize,
    output: &mut [u8],
    out_w: usize,
    out_h: usize,
) {
    for out_y in 0..out_h {
        let in_y = (out_y * in_h / out_h).min(in_h - 1);
        for out_x in 0..out_w {
            let in_x = (out_x * in_w / out_w).min(in_w - 1);
            output[out_y * out_w + out_x] = input[in_y * in_w + in_x];
        }
    }
}

fn scale_plane_bilinear(
    input: &[u8],
    in_w: usize,
    in_h: usize,
    output: &mut [u8],
    out_w: usize,
    out_h: usize,
) {
    let x_ratio = (in_w as f32 - 1.0) / (out_w as f32).max(1.0);
    let y_ratio = (in_h as f32 - 1.0) / (out_h as f32).max(1.0);

    for out_y in 0..out_h {
        let src_y = out_y as f32 * y_ratio;
        let y0 = src_y.floor() as usize;
        let y1 = (y0 + 1).min(in_h - 1);
        let y_frac = src_y - y0 as f32;

        for out_x in 0..out_w {
            let src_x = out_x as f32 * x_ratio;
            let x0 = src_x.floor() as usize;
            let x1 = (x0 + 1).min(in_w - 1);
            let x_frac = src_x - x0 as f32;

            let p00 = input[y0 * in_w + x0] as f32;
            let p10 = input[y0 * in_w + x1] as f32;
            let p01 = input[y1 * in_w + x0] as f32;
            let p11 = input[y1 * in_w + x1] as f32;

            let top = p00 + x_frac * (p10 - p00);
            let bottom = p01 + x_frac * (p11 - p01);
            let value = top + y_frac * (bottom - top);

            output[out_y * out_w + out_x] = value.round() as u8;
        }
    }
}

fn scale_plane_box(
    input: &[u8],
    in_w: usize,
    in_h: usize,
    output: &mut [u8],
    out_w: usize,
    out_h: usize,
) {
    for out_y in 0..out_h {
        let y_start = out_y * in_h / out_h;
        let y_end = (((out_y + 1) * in_h).div_ceil(out_h)).min(in_h).max(y_start + 1);
        for out_x in 0..out_w {
            let x_start = out_x * in_w / out_w;
            let x_end = (((out_x + 1) * in_w).div_ceil(out_w)).min(in_w).max(x_start + 1);

            let mut sum: u32 = 0;
            for y in y_start..y_end {
                for x in x_start..x_end {
                    sum += input[y * in_w + x] as u32;
                }
            }
            let count = ((y_end - y_start) * (x_end - x_start)) as u32;
            output[out_y * out_w + out_x] = (sum / count) as u8;
        }
    }
}

/// Catmull-Rom weight for a normalized distance `t` in [0, 2).
fn catmull_rom_weight(t: f32) -> f32 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

fn scale_plane_catmull_rom(
    input: &[u8],
    in_w: usize,
    in_h: usize,
    output: &mut [u8],
    out_w: usize,
    out_h: usize,
) {
    let x_ratio = (in_w as f32 - 1.0) / (out_w as f32).max(1.0);
    let y_ratio = (in_h as f32 - 1.0) / (out_h as f32).max(1.0);

    let sample = |x: isize, y: isize| -> f32 {
        let x = x.clamp(0, in_w as isize - 1) as usize;
        let y = y.clamp(0, in_h as isize - 1) as usize;
        input[y * in_w + x] as f32
    };

    for out_y in 0..out_h {
        let src_y = out_y as f32 * y_ratio;
        let y0 = src_y.floor() as isize;
        let fy = src_y - y0 as f32;

        for out_x in 0..out_w {
            let src_x = out_x as f32 * x_ratio;
            let x0 = src_x.floor() as isize;
            let fx = src_x - x0 as f32;

            let mut acc = 0.0f32;
            let mut weight_sum = 0.0f32;
            for dy in -1..=2isize {
                let wy = catmull_rom_weight(dy as f32 - fy);
                if wy == 0.0 {
                    continue;
                }
                for dx in -1..=2isize {
                    let wx = catmull_rom_weight(dx as f32 - fx);
                    if wx == 0.0 {
                        continue;
                    }
                    acc += wx * wy * sample(x0 + dx, y0 + dy);
                    weight_sum += wx * wy;
                }
            }
            let value = if weight_sum != 0.0 { acc / weight_sum } else { 0.0 };
            output[out_y * out_w + out_x] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
}

// ============================================================================
// Colorspace conversion
// ============================================================================

/// Fixed-point BT.601 YUV to RGB (coefficients scaled by 1024).
#[inline]
fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as i32;
    let u = u as i32 - 128;
    let v = v as i32 - 128;

    // R = Y + 1.402 * V
    // G = Y - 0.344136 * U - 0.714136 * V
    // B = Y + 1.772 * U
    let r = y + ((1436 * v) >> 10);
    let g = y - ((352 * u + 731 * v) >> 10);
    let b = y + ((1815 * u) >> 10);

    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}

fn i420_to_packed(
    input: &[u8],
    width: u32,
    height: u32,
    output: &mut [u8],
    bgra: bool,
) -> Result<()> {
    check_dims(width, height)?;
    check_len(input.len(), i420_buffer_size(width, height))?;
    let w = width as usize;
    let h = height as usize;
    check_len(output.len(), w * h * 4)?;

    let y_plane = &input[0..w * h];
    let u_plane = &input[w * h..w * h + (w / 2) * (h / 2)];
    let v_plane = &input[w * h + (w / 2) * (h / 2)..];

    for row in 0..h {
        for col in 0..w {
            let y = y_plane[row * w + col];
            let u = u_plane[(row / 2) * (w / 2) + (col / 2)];
            let v = v_plane[(row / 2) * (w / 2) + (col / 2)];

            let (r, g, b) = yuv_to_rgb(y, u, v);

            let dst = (row * w + col) * 4;
            if bgra {
                output[dst] = b;
                output[dst + 1] = g;
                output[dst + 2] = r;
            } else {
                output[dst] = r;
                output[dst + 1] = g;
                output[dst + 2] = b;
            }
            output[dst + 3] = 255;
        }
    }
    Ok(())
}

/// Convert an I420 frame to packed BGRA.
pub fn i420_to_bgra(input: &[u8], width: u32, height: u32, output: &mut [u8]) -> Result<()> {
    i420_to_packed(input, width, height, output, true)
}

/// Convert an I420 frame to packed RGBA.
pub fn i420_to_rgba(input: &[u8], width: u32, height: u32, output: &mut [u8]) -> Result<()> {
    i420_to_packed(input, width, height, output, false)
}
