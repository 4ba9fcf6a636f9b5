use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};

use crate::errors::{GuiActError, GuiActResult};
use crate::perception::traits::ScreenSource;
use crate::perception::types::ScreenshotMeta;

pub const SCREENSHOT_FORMAT: &str = "jpeg";
pub const SCREENSHOT_QUALITY: u8 = 85;

pub struct ScreenshotResult {
    pub image_base64: String,
    pub meta: ScreenshotMeta,
}

/// Capture device handle. The primary monitor is looked up on the first
/// capture and reused for every capture after that; dropping the handle
/// releases it.
#[derive(Default)]
pub struct ScreenCapturer {
    monitor: Option<xcap::Monitor>,
}

impl ScreenCapturer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any monitor can be enumerated right now. Nothing is captured.
    pub fn probe() -> bool {
        match xcap::Monitor::all() {
            Ok(monitors) => !monitors.is_empty(),
            Err(e) => {
                tracing::debug!(error = %e, "no capture device");
                false
            }
        }
    }

    fn monitor(&mut self) -> GuiActResult<&xcap::Monitor> {
        if self.monitor.is_none() {
            let monitors = xcap::Monitor::all()
                .map_err(|e| GuiActError::Perception(format!("enumerate monitors: {e}")))?;
            let primary = monitors
                .iter()
                .position(|m| m.is_primary())
                .unwrap_or(0);
            let monitor = monitors
                .into_iter()
                .nth(primary)
                .ok_or_else(|| GuiActError::Perception("no monitor available".into()))?;
            tracing::debug!(monitor = %monitor.name(), "capture monitor selected");
            self.monitor = Some(monitor);
        }
        self.monitor
            .as_ref()
            .ok_or_else(|| GuiActError::Perception("no monitor available".into()))
    }

    /// Captures the primary monitor and returns it JPEG-encoded as base64.
    pub fn capture_primary(&mut self) -> GuiActResult<ScreenshotResult> {
        let monitor = self.monitor()?;
        let monitor_name = monitor.name().to_string();
        let frame = monitor
            .capture_image()
            .map_err(|e| GuiActError::Perception(format!("capture: {e}")))?;
        let (width, height) = frame.dimensions();

        let jpeg = encode_jpeg(frame, SCREENSHOT_QUALITY)?;
        let image_base64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        tracing::info!(width, height, bytes = jpeg.len(), "screenshot captured");

        Ok(ScreenshotResult {
            image_base64,
            meta: ScreenshotMeta {
                monitor_name,
                physical_width: width,
                physical_height: height,
                format: SCREENSHOT_FORMAT.to_string(),
            },
        })
    }
}

impl ScreenSource for ScreenCapturer {
    fn capture(&mut self) -> GuiActResult<ScreenshotResult> {
        self.capture_primary()
    }
}

/// JPEG has no alpha channel, so the frame is flattened to RGB first.
pub fn encode_jpeg(frame: RgbaImage, quality: u8) -> GuiActResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(frame).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&rgb)
        .map_err(|e| GuiActError::Perception(format!("JPEG encode: {e}")))?;
    Ok(out)
}
