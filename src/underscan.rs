//! Underscan geometry
//!
//! Underscan shrinks the visible image inside the raster by the same
//! relative amount on every side, keeping the raster's aspect ratio.

use crate::constants::geometry::MIN_VIEWPORT_OUT;
use crate::geometry::{Rect, Size};

/// Vertical inset matching a horizontal inset of `hpixels` on `raster`
fn vertical_inset(raster: Size, hpixels: i32) -> i32 {
    if raster.width <= 0 || raster.height <= 0 {
        return 0;
    }
    let aspect = f64::from(raster.width) / f64::from(raster.height);
    (f64::from(hpixels) / aspect).round() as i32
}

/// ViewPortOut for an underscan of `hpixels` on each side of `raster`
pub fn apply_underscan(raster: Size, hpixels: i32) -> Rect {
    let y = vertical_inset(raster, hpixels);
    Rect::new(
        hpixels,
        y,
        raster
            .width
            .saturating_sub(hpixels.saturating_mul(2))
            .max(MIN_VIEWPORT_OUT),
        raster
            .height
            .saturating_sub(y.saturating_mul(2))
            .max(MIN_VIEWPORT_OUT),
    )
}

/// Recover the horizontal inset and its percentage of the raster width
/// when `viewport_out` is exactly what [`apply_underscan`] would produce
pub fn underscan_from_viewport_out(raster: Size, viewport_out: Rect) -> Option<(i32, f64)> {
    let hpixels = viewport_out.x;
    if hpixels < 0 || raster.width <= 0 {
        return None;
    }
    if apply_underscan(raster, hpixels) != viewport_out {
        return None;
    }
    Some((hpixels, pixels_to_percent(raster.width, hpixels)))
}

/// Horizontal inset as a percentage of `width`
pub fn pixels_to_percent(width: i32, hpixels: i32) -> f64 {
    if width <= 0 {
        return 0.0;
    }
    f64::from(hpixels) * 100.0 / f64::from(width)
}

/// Horizontal inset in pixels for `percent` of `width`
pub fn percent_to_pixels(width: i32, percent: f64) -> i32 {
    (f64::from(width) * percent / 100.0).round() as i32
}
