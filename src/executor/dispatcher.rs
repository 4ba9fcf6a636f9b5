use std::time::Duration;

use crate::actions::types::{CommandKind, ParsedCommand};
use crate::errors::{GuiActError, GuiActResult};
use crate::executor::coordinator::to_screen;
use crate::executor::input::InputBackend;
use crate::executor::keymap::KeyMap;
use crate::executor::text_input::{contains_cjk, preview, wants_enter};
use crate::perception::types::ScreenGeometry;

/// Scroll distance is a quarter of the screen, expressed in wheel clicks of
/// this many pixels.
pub const PIXELS_PER_SCROLL_CLICK: i32 = 15;

/// Every pause the dispatcher takes between and inside commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchTimings {
    /// Before every command except the first.
    pub settle: Duration,
    /// Between clipboard copy and the paste shortcut.
    pub clipboard: Duration,
    /// After the paste shortcut.
    pub post_paste: Duration,
    pub drag: Duration,
    pub wait: Duration,
    pub key_interval: Duration,
}

impl Default for DispatchTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(300),
            clipboard: Duration::from_millis(200),
            post_paste: Duration::from_millis(500),
            drag: Duration::from_secs(1),
            wait: Duration::from_secs(5),
            key_interval: Duration::from_millis(100),
        }
    }
}

impl DispatchTimings {
    /// No pauses at all.
    pub fn instant() -> Self {
        Self {
            settle: Duration::ZERO,
            clipboard: Duration::ZERO,
            post_paste: Duration::ZERO,
            drag: Duration::ZERO,
            wait: Duration::ZERO,
            key_interval: Duration::ZERO,
        }
    }
}

/// Executes parsed commands against an input backend, strictly in order.
pub struct Dispatcher<'a> {
    backend: &'a mut dyn InputBackend,
    keymap: KeyMap,
    timings: DispatchTimings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(backend: &'a mut dyn InputBackend, keymap: KeyMap) -> Self {
        Self {
            backend,
            keymap,
            timings: DispatchTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: DispatchTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Runs `commands` and returns one step token per executed action.
    ///
    /// Stops after `finished`. Unknown kinds, commands missing their
    /// coordinates and hotkeys naming a key the backend lacks are skipped
    /// without a step. Any other backend failure aborts the batch.
    pub async fn execute(
        &mut self,
        commands: &[ParsedCommand],
        geometry: ScreenGeometry,
        scale_factor: u32,
    ) -> GuiActResult<Vec<String>> {
        let mut steps = Vec::new();
        for (i, command) in commands.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.timings.settle).await;
            }
            if let Some(step) = self.dispatch(command, geometry, scale_factor).await? {
                tracing::info!(step = %step, "command executed");
                steps.push(step);
            }
            if command.kind == CommandKind::Finished {
                tracing::info!(remaining = commands.len() - i - 1, "finished, stopping");
                break;
            }
        }
        Ok(steps)
    }

    async fn dispatch(
        &mut self,
        command: &ParsedCommand,
        geometry: ScreenGeometry,
        scale_factor: u32,
    ) -> GuiActResult<Option<String>> {
        let target = |name: &str| {
            command
                .coordinate(name)
                .map(|c| to_screen(c, geometry, scale_factor))
        };

        let step = match &command.kind {
            CommandKind::Click
            | CommandKind::LeftDouble
            | CommandKind::RightSingle
            | CommandKind::Hover => {
                let Some((x, y)) = target("point").or_else(|| target("start_point")) else {
                    tracing::debug!(kind = %command.kind, "no target point, skipped");
                    return Ok(None);
                };
                let verb = match command.kind {
                    CommandKind::Click => {
                        self.backend.click(x, y)?;
                        "click"
                    }
                    CommandKind::LeftDouble => {
                        self.backend.double_click(x, y)?;
                        "double_click"
                    }
                    CommandKind::RightSingle => {
                        self.backend.right_click(x, y)?;
                        "right_click"
                    }
                    _ => {
                        self.backend.move_to(x, y)?;
                        "hover"
                    }
                };
                format!("{verb}:{x},{y}")
            }

            CommandKind::Drag | CommandKind::Select => {
                let (Some((sx, sy)), Some((ex, ey))) = (target("start_point"), target("end_point"))
                else {
                    tracing::debug!(kind = %command.kind, "drag endpoints missing, skipped");
                    return Ok(None);
                };
                self.backend.move_to(sx, sy)?;
                self.backend.drag_to(ex, ey, self.timings.drag)?;
                format!("drag:{sx},{sy}->{ex},{ey}")
            }

            CommandKind::Scroll => {
                let direction = command.text("direction").unwrap_or("").to_lowercase();
                let (_, screen_height) = self.backend.screen_size()?;
                let clicks = scroll_clicks(screen_height);
                let at = target("point");
                if direction.contains("up") {
                    self.backend.scroll(clicks, at)?;
                    "scroll:up".to_string()
                } else if direction.contains("down") {
                    self.backend.scroll(-clicks, at)?;
                    "scroll:down".to_string()
                } else {
                    tracing::debug!(direction = %direction, "unsupported scroll direction");
                    return Ok(None);
                }
            }

            CommandKind::Type => {
                let content = command.text("content").unwrap_or_default();
                if content.is_empty() {
                    return Ok(None);
                }
                tracing::debug!(chars = content.chars().count(), cjk = contains_cjk(content), "pasting text");
                self.backend.clipboard_copy(content)?;
                tokio::time::sleep(self.timings.clipboard).await;
                self.backend
                    .hotkey(&self.keymap.paste_chord(), self.timings.key_interval)?;
                tokio::time::sleep(self.timings.post_paste).await;
                if wants_enter(content) {
                    self.backend.press_key("enter")?;
                }
                format!("type:{}", preview(content))
            }

            CommandKind::Hotkey => {
                let combo = command
                    .text("content")
                    .filter(|c| !c.is_empty())
                    .or_else(|| command.text("key"))
                    .unwrap_or_default();
                let keys = self.keymap.chord(combo);
                if keys.is_empty() {
                    return Ok(None);
                }
                match self.backend.hotkey(&keys, self.timings.key_interval) {
                    Ok(()) => format!("hotkey:{}", keys.join("+")),
                    Err(GuiActError::UnknownKey(key)) => {
                        tracing::warn!(key = %key, combo = %combo, "hotkey names an unknown key, skipped");
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }

            CommandKind::Wait => {
                tokio::time::sleep(self.timings.wait).await;
                format!("wait:{}s", self.timings.wait.as_secs())
            }

            CommandKind::Finished => "finished".to_string(),

            CommandKind::Other(name) => {
                tracing::debug!(kind = %name, "unknown command kind ignored");
                return Ok(None);
            }
        };
        Ok(Some(step))
    }
}

/// Wheel clicks for one scroll command on a screen `screen_height` pixels tall.
pub fn scroll_clicks(screen_height: i32) -> i32 {
    let quarter = (screen_height as f64 * 0.25).floor() as i32;
    (quarter / PIXELS_PER_SCROLL_CLICK).max(1)
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingBackend;
    use super::*;
    use crate::actions::types::{BoundingBox, Point};

    const FHD: ScreenGeometry = ScreenGeometry {
        width: 1920,
        height: 1080,
    };

    fn click(x: f64, y: f64) -> ParsedCommand {
        ParsedCommand::new(CommandKind::Click).with_arg("point", Point::new(x, y))
    }

    async fn run(backend: &mut RecordingBackend, commands: &[ParsedCommand]) -> GuiActResult<Vec<String>> {
        Dispatcher::new(backend, KeyMap::for_os("linux"))
            .with_timings(DispatchTimings::instant())
            .execute(commands, FHD, 1000)
            .await
    }

    #[tokio::test]
    async fn finished_stops_the_batch() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            click(500.0, 500.0),
            ParsedCommand::new(CommandKind::Type).with_arg("content", "hi"),
            ParsedCommand::new(CommandKind::Finished),
            click(10.0, 10.0),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["click:960,540", "type:hi", "finished"]);
        assert!(!backend.calls.iter().any(|c| c == "click 19,11"));
    }

    #[tokio::test]
    async fn pointer_commands_normalize_targets() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::LeftDouble).with_arg("point", Point::new(1200.0, 50.0)),
            ParsedCommand::new(CommandKind::RightSingle)
                .with_arg("point", BoundingBox::new(100.0, 100.0, 300.0, 300.0)),
            ParsedCommand::new(CommandKind::Hover).with_arg("start_point", Point::new(0.0, 1000.0)),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(
            steps,
            vec!["double_click:1200,50", "right_click:384,216", "hover:0,1080"]
        );
        assert_eq!(
            backend.calls,
            vec!["double_click 1200,50", "right_click 384,216", "move 0,1080"]
        );
    }

    #[tokio::test]
    async fn click_without_point_is_a_no_op() {
        let mut backend = RecordingBackend::new();
        let steps = run(&mut backend, &[ParsedCommand::new(CommandKind::Click)])
            .await
            .unwrap();
        assert!(steps.is_empty());
        assert!(backend.calls.is_empty());
    }

    #[tokio::test]
    async fn drag_moves_then_drags() {
        let mut backend = RecordingBackend::new();
        let drag = ParsedCommand::new(CommandKind::Select)
            .with_arg("start_point", Point::new(0.0, 0.0))
            .with_arg("end_point", Point::new(500.0, 500.0));
        let steps = run(&mut backend, &[drag]).await.unwrap();
        assert_eq!(steps, vec!["drag:0,0->960,540"]);
        assert_eq!(backend.calls, vec!["move 0,0", "drag_to 960,540 0ms"]);
    }

    #[tokio::test]
    async fn scroll_uses_live_screen_height() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Scroll).with_arg("direction", "UP"),
            ParsedCommand::new(CommandKind::Scroll)
                .with_arg("direction", "down")
                .with_arg("point", Point::new(500.0, 500.0)),
            ParsedCommand::new(CommandKind::Scroll).with_arg("direction", "left"),
            // no direction at all scrolls nowhere
            ParsedCommand::new(CommandKind::Scroll),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["scroll:up", "scroll:down"]);
        // floor(1080 * 0.25) / 15 = 18
        assert_eq!(backend.calls, vec!["scroll 18", "scroll -18 @960,540"]);
    }

    #[test]
    fn scroll_clicks_never_drop_below_one() {
        assert_eq!(scroll_clicks(1080), 18);
        assert_eq!(scroll_clicks(2160), 36);
        assert_eq!(scroll_clicks(10), 1);
    }

    #[tokio::test]
    async fn type_pastes_and_presses_enter_on_trailing_newline() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Type).with_arg("content", "weather\\n"),
            ParsedCommand::new(CommandKind::Type).with_arg("content", ""),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["type:weather\\n"]);
        assert_eq!(
            backend.calls,
            vec!["copy weather\\n", "hotkey ctrl+v", "key enter"]
        );
    }

    #[tokio::test]
    async fn type_preview_is_truncated() {
        let mut backend = RecordingBackend::new();
        let text = "x".repeat(80);
        let steps = run(
            &mut backend,
            &[ParsedCommand::new(CommandKind::Type).with_arg("content", text.as_str())],
        )
        .await
        .unwrap();
        assert_eq!(steps, vec![format!("type:{}", "x".repeat(50))]);
    }

    #[tokio::test]
    async fn hotkey_maps_aliases() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Hotkey).with_arg("key", "Control Return"),
            ParsedCommand::new(CommandKind::Hotkey).with_arg("content", "cmd c"),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["hotkey:ctrl+enter", "hotkey:command+c"]);
    }

    #[tokio::test]
    async fn hotkey_with_unknown_key_is_skipped_not_fatal() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Hotkey).with_arg("key", "ctrl+c"),
            ParsedCommand::new(CommandKind::Hotkey).with_arg("key", "hyper x"),
            ParsedCommand::new(CommandKind::Hotkey).with_arg("key", "pgdn"),
            click(500.0, 500.0),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["hotkey:ctrl+c", "hotkey:pagedown", "click:960,540"]);
        assert_eq!(
            backend.calls,
            vec!["hotkey ctrl+c", "hotkey pagedown", "click 960,540"]
        );
    }

    #[tokio::test]
    async fn finished_with_content_is_the_last_step() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Finished).with_arg("content", "done"),
            ParsedCommand::new(CommandKind::Wait),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["finished"]);
        assert!(backend.calls.is_empty());
    }

    #[tokio::test]
    async fn wait_and_unknown_kinds() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            ParsedCommand::new(CommandKind::Other("launch".into())),
            ParsedCommand::new(CommandKind::Wait),
        ];
        let steps = run(&mut backend, &commands).await.unwrap();
        assert_eq!(steps, vec!["wait:0s"]);
    }

    #[tokio::test]
    async fn backend_failure_aborts_the_batch() {
        let mut backend = RecordingBackend::new();
        backend.fail_on = Some("click");
        let commands = vec![
            ParsedCommand::new(CommandKind::Hover).with_arg("point", Point::new(1.0, 1.0)),
            click(2.0, 2.0),
            ParsedCommand::new(CommandKind::Hover).with_arg("point", Point::new(3.0, 3.0)),
        ];
        let err = run(&mut backend, &commands).await.unwrap_err();
        assert!(err.to_string().contains("click failed"));
        assert_eq!(backend.calls.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_delay_runs_between_commands_only() {
        let mut backend = RecordingBackend::new();
        let commands = vec![
            click(1.0, 1.0),
            click(2.0, 2.0),
            ParsedCommand::new(CommandKind::Wait),
        ];
        let started = tokio::time::Instant::now();
        let steps = Dispatcher::new(&mut backend, KeyMap::for_os("linux"))
            .execute(&commands, FHD, 1000)
            .await
            .unwrap();
        assert_eq!(steps.last().map(String::as_str), Some("wait:5s"));
        // two settles plus the 5 s wait
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5600), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(5700), "{elapsed:?}");
    }
}
