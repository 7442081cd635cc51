use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Width of the anti-aliased band around a stroke edge, in physical pixels.
const AA_BAND: f32 = 1.0;

/// Axis-aligned dirty rectangle `(x, y, w, h)` in physical pixels.
pub type DirtyRect = (u32, u32, u32, u32);

/// Distance from `(px, py)` to the segment `a → b`.
#[inline]
fn dist_to_segment(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    let t = ((px - a.0) * dx + (py - a.1) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);
    let cx = a.0 + t * dx;
    let cy = a.1 + t * dy;
    ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt()
}

/// Smoothstep between edge0 and edge1.
#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Source-over blend of `color` at `coverage` onto one RGBA pixel.
#[inline]
fn blend_over(dst: &mut [u8], color: Rgba<u8>, coverage: f32) {
    let a = (color[3] as f32 / 255.0) * coverage;
    if a <= 0.0 {
        return;
    }
    let inv = 1.0 - a;
    for c in 0..3 {
        let v = color[c] as f32 * a + dst[c] as f32 * inv;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    let da = dst[3] as f32 / 255.0;
    dst[3] = ((a + da * inv) * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Paint a round-capped segment from `a` to `b` (physical coordinates) into
/// `image`.
///
/// Every pixel whose centre lies within `radius` of the segment is covered,
/// with a one-pixel smoothstep fade at the edge. Consecutive segments that
/// share an endpoint therefore meet with a round join. Geometry outside the
/// image is clipped.
///
/// Returns the touched rectangle, or `None` for a zero-length segment, a
/// non-positive radius, or a segment that lies entirely off-image.
pub fn stamp_segment(
    image: &mut RgbaImage,
    a: (f32, f32),
    b: (f32, f32),
    radius: f32,
    color: Rgba<u8>,
) -> Option<DirtyRect> {
    let dx = b.0 - a.0;
    let dy = b.1 - a.1;
    if dx * dx + dy * dy <= f32::EPSILON || !(radius > 0.0) || !radius.is_finite() {
        return None;
    }

    let (img_w, img_h) = image.dimensions();
    let pad = radius + AA_BAND;
    let x0 = ((a.0.min(b.0) - pad).floor() as i64).max(0);
    let y0 = ((a.1.min(b.1) - pad).floor() as i64).max(0);
    let x1 = ((a.0.max(b.0) + pad).ceil() as i64).min(img_w as i64);
    let y1 = ((a.1.max(b.1) + pad).ceil() as i64).min(img_h as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    let (x0, y0, x1, y1) = (x0 as usize, y0 as usize, x1 as usize, y1 as usize);

    let row_bytes = img_w as usize * 4;
    let half_band = AA_BAND * 0.5;
    let buf: &mut [u8] = &mut **image;

    buf[y0 * row_bytes..y1 * row_bytes]
        .par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, row_buf)| {
            let py = (y0 + row) as f32 + 0.5;
            for col in x0..x1 {
                let px = col as f32 + 0.5;
                let d = dist_to_segment(px, py, a, b) - radius;
                let coverage = smoothstep(half_band, -half_band, d);
                if coverage > 0.001 {
                    let idx = col * 4;
                    blend_over(&mut row_buf[idx..idx + 4], color, coverage);
                }
            }
        });

    Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
}

/// Merge two dirty rectangles into their bounding box.
pub fn union_rect(a: Option<DirtyRect>, b: Option<DirtyRect>) -> Option<DirtyRect> {
    match (a, b) {
        (None, r) | (r, None) => r,
        (Some((ax, ay, aw, ah)), Some((bx, by, bw, bh))) => {
            let x = ax.min(bx);
            let y = ay.min(by);
            let r = (ax + aw).max(bx + bw);
            let btm = (ay + ah).max(by + bh);
            Some((x, y, r - x, btm - y))
        }
    }
}
