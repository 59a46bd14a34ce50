use crate::config::Region;

/// Region-selection math.
///
/// The interactive overlay lives outside this crate; what it hands us is a
/// pair of corner points in display coordinates plus the scale at which the
/// screenshot was rendered. This module turns that into a screen-space
/// [`Region`] and enforces the selection invariants.

/// Minimum selection edge in screen pixels. Anything smaller is treated as
/// an accidental click and discarded.
pub const MIN_SELECTION_PX: u32 = 5;

/// Convert a completed drag into a screen region.
///
/// `start` and `end` are the drag corners in display coordinates (any
/// orientation), `scale` is display-pixels per screen-pixel, and
/// `screen_width`/`screen_height` bound the result. Returns `None` for
/// degenerate input or selections smaller than [`MIN_SELECTION_PX`] on
/// either edge.
pub fn region_from_drag(
    start: (f32, f32),
    end: (f32, f32),
    scale: f32,
    screen_width: u32,
    screen_height: u32,
) -> Option<Region> {
    if !scale.is_finite() || scale <= 0.0 || screen_width == 0 || screen_height == 0 {
        return None;
    }

    let display_w = screen_width as f32 * scale;
    let display_h = screen_height as f32 * scale;

    // Clamp both corners to the rendered image before normalizing.
    let sx = start.0.clamp(0.0, display_w);
    let sy = start.1.clamp(0.0, display_h);
    let ex = end.0.clamp(0.0, display_w);
    let ey = end.1.clamp(0.0, display_h);

    let x1 = sx.min(ex);
    let y1 = sy.min(ey);
    let x2 = sx.max(ex);
    let y2 = sy.max(ey);

    // Convert from display coordinates to actual screen coordinates.
    let x = ((x1 / scale).round() as i64).clamp(0, screen_width.saturating_sub(1) as i64);
    let y = ((y1 / scale).round() as i64).clamp(0, screen_height.saturating_sub(1) as i64);
    let mut w = ((x2 - x1) / scale).round() as i64;
    let mut h = ((y2 - y1) / scale).round() as i64;

    let max_w = (screen_width as i64).saturating_sub(x);
    let max_h = (screen_height as i64).saturating_sub(y);
    w = w.min(max_w);
    h = h.min(max_h);

    if w < MIN_SELECTION_PX as i64 || h < MIN_SELECTION_PX as i64 {
        return None;
    }

    Some(Region::new(x as i32, y as i32, w as u32, h as u32))
}
