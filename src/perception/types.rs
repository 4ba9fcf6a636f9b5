use serde::{Deserialize, Serialize};

/// Width and height, in pixels, of the image the model looked at. Used only to
/// scale normalized coordinates; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotMeta {
    pub monitor_name: String,
    pub physical_width: u32,
    pub physical_height: u32,
    /// Encoded image format, as used in the data URI (`jpeg`).
    pub format: String,
}

impl ScreenshotMeta {
    pub fn geometry(&self) -> ScreenGeometry {
        ScreenGeometry::new(self.physical_width, self.physical_height)
    }
}
