use std::time::Duration;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::errors::{GuiActError, GuiActResult};

/// Physical input surface the dispatcher drives. Calls are blocking and are
/// never issued concurrently.
///
/// Key names are the canonical names produced by
/// [`KeyMap`](crate::executor::keymap::KeyMap): `ctrl`, `command`, `alt`,
/// `shift`, `enter`, `tab`, `escape`, `space`, `backspace`, `delete`, arrow
/// and paging names, lock keys, media keys, `f1`..`f20`, or a single
/// character. Names outside that set fail with
/// [`GuiActError::UnknownKey`] before any key is pressed.
pub trait InputBackend {
    /// Live size of the primary screen in pixels.
    fn screen_size(&mut self) -> GuiActResult<(i32, i32)>;
    fn move_to(&mut self, x: i32, y: i32) -> GuiActResult<()>;
    fn click(&mut self, x: i32, y: i32) -> GuiActResult<()>;
    fn double_click(&mut self, x: i32, y: i32) -> GuiActResult<()>;
    fn right_click(&mut self, x: i32, y: i32) -> GuiActResult<()>;
    /// Holds the left button from the current position to `(x, y)`.
    fn drag_to(&mut self, x: i32, y: i32, duration: Duration) -> GuiActResult<()>;
    /// Positive `clicks` scroll up, negative scroll down.
    fn scroll(&mut self, clicks: i32, at: Option<(i32, i32)>) -> GuiActResult<()>;
    fn press_key(&mut self, key: &str) -> GuiActResult<()>;
    /// Presses `keys` in order, then releases them in reverse.
    fn hotkey(&mut self, keys: &[String], interval: Duration) -> GuiActResult<()>;
    fn clipboard_copy(&mut self, text: &str) -> GuiActResult<()>;
}

/// Intermediate pointer positions per second of drag.
const DRAG_STEPS_PER_SEC: f64 = 60.0;

/// Desktop input through `enigo`, clipboard through `arboard`.
pub struct EnigoBackend {
    enigo: Enigo,
    // Kept alive so the clipboard contents survive until the paste on X11.
    clipboard: Option<arboard::Clipboard>,
}

impl EnigoBackend {
    pub fn new() -> GuiActResult<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| GuiActError::Executor(format!("Failed to initialize input backend: {e}")))?;
        Ok(Self {
            enigo,
            clipboard: None,
        })
    }

    fn clipboard(&mut self) -> GuiActResult<&mut arboard::Clipboard> {
        if self.clipboard.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|e| GuiActError::Executor(format!("Failed to open clipboard: {e}")))?;
            self.clipboard = Some(clipboard);
        }
        self.clipboard
            .as_mut()
            .ok_or_else(|| GuiActError::Executor("clipboard unavailable".into()))
    }

    fn button_at(&mut self, x: i32, y: i32, button: Button, clicks: u32) -> GuiActResult<()> {
        self.move_to(x, y)?;
        for _ in 0..clicks {
            self.enigo
                .button(button, Direction::Click)
                .map_err(|e| GuiActError::Executor(format!("Failed to click: {e}")))?;
        }
        Ok(())
    }

    fn key(&mut self, key: Key, direction: Direction) -> GuiActResult<()> {
        self.enigo
            .key(key, direction)
            .map_err(|e| GuiActError::Executor(format!("Failed to press key: {e}")))
    }
}

impl InputBackend for EnigoBackend {
    fn screen_size(&mut self) -> GuiActResult<(i32, i32)> {
        self.enigo
            .main_display()
            .map_err(|e| GuiActError::Executor(format!("Failed to query display size: {e}")))
    }

    fn move_to(&mut self, x: i32, y: i32) -> GuiActResult<()> {
        self.enigo
            .move_mouse(x, y, Coordinate::Abs)
            .map_err(|e| GuiActError::Executor(format!("Failed to move mouse: {e}")))
    }

    fn click(&mut self, x: i32, y: i32) -> GuiActResult<()> {
        self.button_at(x, y, Button::Left, 1)
    }

    fn double_click(&mut self, x: i32, y: i32) -> GuiActResult<()> {
        self.button_at(x, y, Button::Left, 2)
    }

    fn right_click(&mut self, x: i32, y: i32) -> GuiActResult<()> {
        self.button_at(x, y, Button::Right, 1)
    }

    fn drag_to(&mut self, x: i32, y: i32, duration: Duration) -> GuiActResult<()> {
        let (sx, sy) = self
            .enigo
            .location()
            .map_err(|e| GuiActError::Executor(format!("Failed to read pointer location: {e}")))?;
        self.enigo
            .button(Button::Left, Direction::Press)
            .map_err(|e| GuiActError::Executor(format!("Failed to press: {e}")))?;

        let steps = (duration.as_secs_f64() * DRAG_STEPS_PER_SEC).round().max(1.0) as u32;
        let pause = duration / steps;
        for (px, py) in drag_path((sx, sy), (x, y), steps) {
            std::thread::sleep(pause);
            if let Err(e) = self.move_to(px, py) {
                let _ = self.enigo.button(Button::Left, Direction::Release);
                return Err(e);
            }
        }

        self.enigo
            .button(Button::Left, Direction::Release)
            .map_err(|e| GuiActError::Executor(format!("Failed to release: {e}")))
    }

    fn scroll(&mut self, clicks: i32, at: Option<(i32, i32)>) -> GuiActResult<()> {
        if let Some((x, y)) = at {
            self.move_to(x, y)?;
        }
        // enigo scrolls down for positive lengths.
        self.enigo
            .scroll(-clicks, Axis::Vertical)
            .map_err(|e| GuiActError::Executor(format!("Failed to scroll: {e}")))
    }

    fn press_key(&mut self, key: &str) -> GuiActResult<()> {
        let key = key_for(key)?;
        self.key(key, Direction::Click)
    }

    fn hotkey(&mut self, keys: &[String], interval: Duration) -> GuiActResult<()> {
        let keys = keys
            .iter()
            .map(|k| key_for(k))
            .collect::<GuiActResult<Vec<_>>>()?;

        let mut held = Vec::with_capacity(keys.len());
        for key in &keys {
            if let Err(e) = self.key(*key, Direction::Press) {
                for k in held.into_iter().rev() {
                    let _ = self.enigo.key(k, Direction::Release);
                }
                return Err(e);
            }
            held.push(*key);
            std::thread::sleep(interval);
        }
        for key in held.into_iter().rev() {
            self.key(key, Direction::Release)?;
            std::thread::sleep(interval);
        }
        Ok(())
    }

    fn clipboard_copy(&mut self, text: &str) -> GuiActResult<()> {
        self.clipboard()?
            .set_text(text.to_string())
            .map_err(|e| GuiActError::Executor(format!("Failed to set clipboard: {e}")))
    }
}

/// Maps a canonical key name onto an `enigo` key.
pub fn key_for(name: &str) -> GuiActResult<Key> {
    let key = match name {
        "ctrl" => Key::Control,
        "command" | "meta" | "win" | "super" => Key::Meta,
        "alt" => Key::Alt,
        "shift" => Key::Shift,
        "enter" => Key::Return,
        "tab" => Key::Tab,
        "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "f13" => Key::F13,
        "f14" => Key::F14,
        "f15" => Key::F15,
        "f16" => Key::F16,
        "f17" => Key::F17,
        "f18" => Key::F18,
        "f19" => Key::F19,
        "f20" => Key::F20,
        "capslock" => Key::CapsLock,
        "volumeup" => Key::VolumeUp,
        "volumedown" => Key::VolumeDown,
        "volumemute" => Key::VolumeMute,
        "playpause" => Key::MediaPlayPause,
        "nexttrack" => Key::MediaNextTrack,
        "prevtrack" => Key::MediaPrevTrack,
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        "insert" => Key::Insert,
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        "pause" => Key::Pause,
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        "numlock" => Key::Numlock,
        #[cfg(any(target_os = "windows", all(unix, not(target_os = "macos"))))]
        "stop" => Key::MediaStop,
        #[cfg(target_os = "windows")]
        "printscreen" => Key::Snapshot,
        #[cfg(all(unix, not(target_os = "macos")))]
        "printscreen" => Key::Print,
        #[cfg(all(unix, not(target_os = "macos")))]
        "scrolllock" => Key::ScrollLock,
        other => {
            let mut chars = other.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return Err(GuiActError::UnknownKey(other.to_string())),
            }
        }
    };
    Ok(key)
}

/// Evenly spaced pointer positions from `from` (exclusive) to `to`
/// (inclusive).
fn drag_path(from: (i32, i32), to: (i32, i32), steps: u32) -> Vec<(i32, i32)> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let x = from.0 as f64 + (to.0 - from.0) as f64 * t;
            let y = from.1 as f64 + (to.1 - from.1) as f64 * t;
            (x.round() as i32, y.round() as i32)
        })
        .collect()
}
