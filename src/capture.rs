use image::RgbaImage;
use std::fs;
use std::path::PathBuf;
use xcap::Monitor;

use crate::config::Region;
use crate::error::CaptureError;

/// Directory captured frames are dumped into when debug captures are on.
pub const DEBUG_DIR: &str = "debug_scans";

/// Screen-region capturer.
///
/// Captures the configured rectangle from whichever monitor contains it.
/// An unconfigured region is a normal state, not a failure: `capture`
/// returns `None` without recording an error. Platform failures are
/// reported through the `last_error` side channel, which is scoped to the
/// most recent call only.
pub struct ScreenCapturer {
    last_error: Option<String>,
    debug_dir: Option<PathBuf>,
}

impl ScreenCapturer {
    pub fn new() -> Self {
        Self {
            last_error: None,
            debug_dir: None,
        }
    }

    /// Enable or disable debug-frame persistence. The loop resyncs this
    /// from config every iteration.
    pub fn set_debug_captures(&mut self, enabled: bool) {
        self.debug_dir = enabled.then(|| PathBuf::from(DEBUG_DIR));
    }

    /// Human-readable cause of the most recent capture failure, if any.
    /// Overwritten (or cleared) on every `capture` call.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Capture the given region, or `None` if the region is unconfigured or
    /// the platform capture failed (see [`last_error`](Self::last_error)).
    pub fn capture(&mut self, region: Option<&Region>, label: &str) -> Option<RgbaImage> {
        self.last_error = None;
        let region = region?;

        match self.grab(region) {
            Ok(frame) => {
                self.write_debug_frame(&frame, label);
                Some(frame)
            }
            Err(e) => {
                self.last_error = Some(friendly_capture_error(&e));
                None
            }
        }
    }

    fn grab(&self, region: &Region) -> Result<RgbaImage, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::MonitorEnumeration(Box::new(e)))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoDisplays);
        }

        let monitor = monitors
            .iter()
            .find(|m| monitor_contains(m, region.x, region.y))
            .ok_or(CaptureError::RegionOffScreen {
                x: region.x,
                y: region.y,
            })?;

        let rel_x = (region.x - monitor.x()) as u32;
        let rel_y = (region.y - monitor.y()) as u32;
        if rel_x + region.width > monitor.width() || rel_y + region.height > monitor.height() {
            return Err(CaptureError::RegionOutOfBounds {
                x: region.x,
                y: region.y,
                width: region.width,
                height: region.height,
            });
        }

        let image = monitor
            .capture_image()
            .map_err(|e| CaptureError::CaptureFailed(Box::new(e)))?;

        let frame =
            image::imageops::crop_imm(&image, rel_x, rel_y, region.width, region.height)
                .to_image();
        Ok(frame)
    }

    /// Best-effort debug dump. Must never fail or block the capture path.
    fn write_debug_frame(&self, frame: &RgbaImage, label: &str) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        let _ = fs::create_dir_all(dir);
        let path = dir.join(format!("debug_{}.png", label));
        if let Err(e) = frame.save(&path) {
            tracing::debug!("debug frame write failed for {}: {}", path.display(), e);
        }
    }
}

impl Default for ScreenCapturer {
    fn default() -> Self {
        Self::new()
    }
}

fn monitor_contains(monitor: &Monitor, x: i32, y: i32) -> bool {
    x >= monitor.x()
        && y >= monitor.y()
        && x < monitor.x() + monitor.width() as i32
        && y < monitor.y() + monitor.height() as i32
}

fn friendly_capture_error(err: &CaptureError) -> String {
    let message = err.to_string();

    #[cfg(target_os = "macos")]
    if message.contains("permission") || message.contains("denied") {
        return format!(
            "{} (grant Screen Recording permission under \
             System Settings > Privacy & Security)",
            message
        );
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_region_is_not_an_error() {
        let mut capturer = ScreenCapturer::new();
        assert!(capturer.capture(None, "local").is_none());
        assert!(capturer.last_error().is_none());
    }

    #[test]
    fn test_capture_result_and_error_are_consistent() {
        // Headless CI has no display; a desktop run captures fine. Either
        // way the frame/last_error pairing must hold.
        let mut capturer = ScreenCapturer::new();
        let region = Region::new(0, 0, 16, 16);

        match capturer.capture(Some(&region), "probe") {
            Some(frame) => {
                assert_eq!((frame.width(), frame.height()), (16, 16));
                assert!(capturer.last_error().is_none());
            }
            None => assert!(capturer.last_error().is_some()),
        }
    }

    #[test]
    fn test_last_error_cleared_by_next_call() {
        let mut capturer = ScreenCapturer::new();
        capturer.last_error = Some("stale".to_string());

        capturer.capture(None, "local");
        assert!(capturer.last_error().is_none());
    }
}
