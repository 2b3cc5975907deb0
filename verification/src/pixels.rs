//! Frame pixel statistics shared by the liveness and quality gates.
//!
//! All measures work on the 8-bit luma plane. Kernels are the standard
//! small-window ones: a 4-neighbour Laplacian for focus, a separable
//! 7-tap box blur as the smoothing reference for micro-texture, and Sobel
//! gradients with a hard magnitude cutoff for edge density.

use rollcall_types::Frame;

/// Sobel gradient magnitude at or above this counts as a hard edge,
/// approximating the usual 80/120 hysteresis band of an edge detector.
const EDGE_GRADIENT_MIN: f64 = 120.0;

/// Mean luma of the frame.
pub(crate) fn mean(frame: &Frame) -> f64 {
    let sum: u64 = frame.pixels().iter().map(|&p| p as u64).sum();
    sum as f64 / frame.pixels().len() as f64
}

/// Population standard deviation of the luma plane.
pub(crate) fn stddev(frame: &Frame) -> f64 {
    let mu = mean(frame);
    let var = frame
        .pixels()
        .iter()
        .map(|&p| {
            let d = p as f64 - mu;
            d * d
        })
        .sum::<f64>()
        / frame.pixels().len() as f64;
    var.sqrt()
}

/// Variance of the 4-neighbour Laplacian response over interior pixels.
/// Low values indicate a flat, defocused, or printed surface.
pub(crate) fn laplacian_variance(frame: &Frame) -> f64 {
    let (w, h) = (frame.width(), frame.height());
    if w < 3 || h < 3 {
        return 0.0;
    }
    let mut responses = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = frame.luma(x, y) as f64;
            let around = frame.luma(x, y - 1) as f64
                + frame.luma(x, y + 1) as f64
                + frame.luma(x - 1, y) as f64
                + frame.luma(x + 1, y) as f64;
            responses.push(around - 4.0 * center);
        }
    }
    let mu = responses.iter().sum::<f64>() / responses.len() as f64;
    responses.iter().map(|r| (r - mu) * (r - mu)).sum::<f64>() / responses.len() as f64
}

/// Mean absolute difference between the frame and a 7x7 box-blurred copy
/// of itself. Skin has micro-texture that survives the comparison;
/// screens and paper come out nearly identical to their blur.
pub(crate) fn mean_abs_blur_diff(frame: &Frame) -> f64 {
    let blurred = box_blur_7(frame);
    let diff_sum: f64 = frame
        .pixels()
        .iter()
        .zip(&blurred)
        .map(|(&p, &b)| (p as f64 - b).abs())
        .sum();
    diff_sum / frame.pixels().len() as f64
}

/// Fraction of pixels whose Sobel gradient magnitude crosses the hard-edge
/// cutoff. Phone screens held to a camera produce bezel edges that push
/// this ratio far above a natural scene's.
pub(crate) fn edge_ratio(frame: &Frame) -> f64 {
    let (w, h) = (frame.width(), frame.height());
    if w < 3 || h < 3 {
        return 0.0;
    }
    let mut hits = 0usize;
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let p = |dx: i64, dy: i64| {
                frame.luma((x as i64 + dx) as u32, (y as i64 + dy) as u32) as f64
            };
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            if (gx * gx + gy * gy).sqrt() >= EDGE_GRADIENT_MIN {
                hits += 1;
            }
        }
    }
    hits as f64 / frame.pixels().len() as f64
}

/// Separable 7-tap box blur with clamped borders.
fn box_blur_7(frame: &Frame) -> Vec<f64> {
    const R: i64 = 3;
    let (w, h) = (frame.width() as i64, frame.height() as i64);

    // Horizontal pass.
    let mut horizontal = vec![0.0f64; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dx in -R..=R {
                let cx = (x + dx).clamp(0, w - 1);
                sum += frame.luma(cx as u32, y as u32) as f64;
            }
            horizontal[(y * w + x) as usize] = sum / 7.0;
        }
    }

    // Vertical pass.
    let mut blurred = vec![0.0f64; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut sum = 0.0;
            for dy in -R..=R {
                let cy = (y + dy).clamp(0, h - 1);
                sum += horizontal[(cy * w + x) as usize];
            }
            blurred[(y * w + x) as usize] = sum / 7.0;
        }
    }
    blurred
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: u8) -> Frame {
        Frame::new(16, 16, vec![value; 256]).unwrap()
    }

    /// Slow ramp plus small deterministic noise, the texture profile of
    /// a real capture.
    fn textured() -> Frame {
        let mut seed = 0x2545_f491u32;
        let pixels: Vec<u8> = (0..4096)
            .map(|i| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let base = 96 + (i % 64) as i32;
                let noise = (seed >> 24) as i32 % 17 - 8;
                (base + noise).clamp(0, 255) as u8
            })
            .collect();
        Frame::new(64, 64, pixels).unwrap()
    }

    #[test]
    fn uniform_frame_statistics() {
        let frame = uniform(128);
        assert_eq!(mean(&frame), 128.0);
        assert_eq!(stddev(&frame), 0.0);
        assert_eq!(laplacian_variance(&frame), 0.0);
        assert_eq!(mean_abs_blur_diff(&frame), 0.0);
        assert_eq!(edge_ratio(&frame), 0.0);
    }

    #[test]
    fn textured_frame_has_signal_everywhere() {
        let frame = textured();
        assert!(stddev(&frame) > 4.0);
        assert!(laplacian_variance(&frame) > 8.0);
        assert!(mean_abs_blur_diff(&frame) > 1.2);
        // Mild noise has no hard edges.
        assert!(edge_ratio(&frame) < 0.38);
    }

    #[test]
    fn hard_stripes_read_as_edges() {
        let pixels: Vec<u8> = (0..4096)
            .map(|i| if (i % 64) % 4 < 2 { 0 } else { 255 })
            .collect();
        let frame = Frame::new(64, 64, pixels).unwrap();
        assert!(edge_ratio(&frame) > 0.38);
    }

    #[test]
    fn tiny_frames_degrade_to_zero() {
        let frame = Frame::new(2, 2, vec![10, 200, 30, 90]).unwrap();
        assert_eq!(laplacian_variance(&frame), 0.0);
        assert_eq!(edge_ratio(&frame), 0.0);
    }
}
