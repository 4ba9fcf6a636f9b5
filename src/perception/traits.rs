use crate::errors::GuiActResult;
use crate::perception::screenshot::ScreenshotResult;

/// Anything that can hand the automation step a fresh screenshot.
/// The desktop implementation is [`ScreenCapturer`](crate::perception::screenshot::ScreenCapturer).
pub trait ScreenSource {
    fn capture(&mut self) -> GuiActResult<ScreenshotResult>;
}
