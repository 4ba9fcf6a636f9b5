use std::collections::HashMap;

/// Key-name table handed to the dispatcher: maps the model's spellings onto
/// the canonical names an [`InputBackend`](crate::executor::input::InputBackend)
/// understands, and records which modifier pastes on this host.
#[derive(Debug, Clone)]
pub struct KeyMap {
    aliases: HashMap<String, String>,
    paste_modifier: String,
}

const ALIASES: &[(&str, &str)] = &[
    ("ctrl", "ctrl"),
    ("control", "ctrl"),
    ("ctrlleft", "ctrl"),
    ("ctrlright", "ctrl"),
    ("cmd", "command"),
    ("command", "command"),
    ("win", "command"),
    ("winleft", "command"),
    ("winright", "command"),
    ("windows", "command"),
    ("super", "command"),
    ("meta", "command"),
    ("alt", "alt"),
    ("altleft", "alt"),
    ("altright", "alt"),
    ("option", "alt"),
    ("optionleft", "alt"),
    ("optionright", "alt"),
    ("shift", "shift"),
    ("shiftleft", "shift"),
    ("shiftright", "shift"),
    ("enter", "enter"),
    ("return", "enter"),
    ("tab", "tab"),
    ("esc", "escape"),
    ("escape", "escape"),
    ("space", "space"),
    ("backspace", "backspace"),
    ("del", "delete"),
    ("delete", "delete"),
    ("ins", "insert"),
    ("pgup", "pageup"),
    ("page_up", "pageup"),
    ("pgdn", "pagedown"),
    ("page_down", "pagedown"),
    ("arrowup", "up"),
    ("arrowdown", "down"),
    ("arrowleft", "left"),
    ("arrowright", "right"),
    ("caps", "capslock"),
    ("caps_lock", "capslock"),
    ("prtsc", "printscreen"),
    ("prtscr", "printscreen"),
    ("prntscrn", "printscreen"),
    ("print", "printscreen"),
    ("num_lock", "numlock"),
    ("scroll_lock", "scrolllock"),
];

impl KeyMap {
    /// Table for the OS this binary was built for.
    pub fn for_host() -> Self {
        Self::for_os(std::env::consts::OS)
    }

    /// `command` pastes on macOS, `ctrl` everywhere else.
    pub fn for_os(os: &str) -> Self {
        let paste_modifier = if os == "macos" { "command" } else { "ctrl" };
        Self {
            aliases: ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            paste_modifier: paste_modifier.to_string(),
        }
    }

    /// Canonical name for `key`. Names without an alias pass through
    /// lowercased.
    pub fn canonical(&self, key: &str) -> String {
        let key = key.to_lowercase();
        self.aliases.get(&key).cloned().unwrap_or(key)
    }

    /// Splits a combo like `"Ctrl C"` or `"ctrl+shift+t"` into canonical key
    /// names. A token made only of `+` is the plus key itself.
    pub fn chord(&self, combo: &str) -> Vec<String> {
        combo
            .split_whitespace()
            .flat_map(|token| {
                if token.chars().all(|c| c == '+') {
                    vec!["+"]
                } else {
                    token.split('+').filter(|k| !k.is_empty()).collect()
                }
            })
            .map(|k| self.canonical(k))
            .collect()
    }

    pub fn paste_modifier(&self) -> &str {
        &self.paste_modifier
    }

    pub fn paste_chord(&self) -> Vec<String> {
        vec![self.paste_modifier.clone(), "v".to_string()]
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::for_host()
    }
}
