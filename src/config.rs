use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::actions::parser::{ParserBackend, ParserKind, ParserResolver};
use crate::errors::{GuiActError, GuiActResult};
use crate::executor::coordinator::COORDINATE_SCALE;

pub const ENV_API_KEY: &str = "GUI_VISION_API_KEY";
pub const ENV_MODEL: &str = "GUI_VISION_MODEL";
pub const ENV_BASE_URL: &str = "GUI_VISION_BASE_URL";
pub const ENV_ACTION_PARSER: &str = "GUI_VISION_ACTION_PARSER";
pub const ENV_ACTION_PARSER_CALLABLE: &str = "GUI_VISION_ACTION_PARSER_CALLABLE";
pub const ENV_CONFIG_PATH: &str = "GUI_ACT_CONFIG_PATH";

pub const DEFAULT_PROVIDER: &str = "openai-compatible";
const APP_DIR: &str = "gui-act";
const CONFIG_FILE: &str = "config.toml";

/// On-disk `config.toml`. Every field is optional so that the resolved
/// config can tell file values apart from defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// `builtin`, `registered` or `structured`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_parser: Option<String>,
    /// `"<module>:<symbol>"` of a registered parser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_parser_callable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_factor: Option<u32>,
}

/// Effective configuration after CLI, environment, file and defaults have
/// been merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub action_parser: ParserKind,
    pub action_parser_callable: Option<String>,
    pub scale_factor: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.into(),
            api_key: None,
            model: None,
            base_url: None,
            action_parser: ParserKind::default(),
            action_parser_callable: None,
            scale_factor: COORDINATE_SCALE,
        }
    }
}

impl AppConfig {
    /// Config view safe to print: the API key is masked.
    pub fn redacted(&self) -> serde_json::Value {
        serde_json::json!({
            "provider": self.provider,
            "api_key": mask_secret(self.api_key.as_deref().unwrap_or_default()),
            "model": self.model,
            "base_url": self.base_url,
            "action_parser": self.action_parser,
            "action_parser_callable": self.action_parser_callable,
            "scale_factor": self.scale_factor,
        })
    }

    /// Fields a `see`/`act` run cannot do without.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.api_key.is_none() {
            missing.push("api_key");
        }
        if self.model.is_none() {
            missing.push("model");
        }
        if self.base_url.is_none() {
            missing.push("base_url");
        }
        if self.action_parser == ParserKind::Registered && self.action_parser_callable.is_none() {
            missing.push("action_parser_callable");
        }
        missing
    }

    /// Resolves the configured parser backend. Runs before any screen
    /// interaction so a bad parser reference fails early.
    pub fn parser_backend(&self, resolver: &ParserResolver) -> GuiActResult<ParserBackend> {
        resolver.resolve(self.action_parser, self.action_parser_callable.as_deref())
    }
}

/// Where a resolved field came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Env,
    Config,
    Default,
    Unset,
}

pub type ConfigSources = BTreeMap<&'static str, ConfigSource>;

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub action_parser: Option<String>,
    pub action_parser_callable: Option<String>,
}

/// Process environment lookup. Empty values count as unset.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ── Paths ───────────────────────────────────────────────────────────────────

/// `<config dir>/gui-act/config.toml`.
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join(APP_DIR).join(CONFIG_FILE),
        None => user_fallback_config_path(),
    }
}

/// `~/.gui-act/config.toml`, used when the preferred location is not writable.
pub fn user_fallback_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(format!(".{APP_DIR}")).join(CONFIG_FILE),
        None => PathBuf::from(CONFIG_FILE),
    }
}

/// Candidate config files in lookup order.
pub fn candidate_config_paths(env: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = env(ENV_CONFIG_PATH) {
        candidates.push(PathBuf::from(path));
    }
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join(APP_DIR).join(CONFIG_FILE));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(format!(".{APP_DIR}")).join(CONFIG_FILE));
    }
    candidates.push(PathBuf::from(CONFIG_FILE));
    candidates
}

/// An explicit path wins; otherwise the first existing candidate, or the
/// first candidate when none exists yet.
pub fn resolve_config_path(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let candidates = candidate_config_paths(env);
    if let Some(found) = candidates.iter().find(|p| p.exists()) {
        tracing::debug!(path = %found.display(), "config file found");
        return found.clone();
    }
    candidates
        .into_iter()
        .next()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

// ── Load / save ─────────────────────────────────────────────────────────────

/// A missing file is an empty config, not an error.
pub fn load_file_config(path: &Path) -> GuiActResult<FileConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

pub fn save_file_config(config: &FileConfig, path: &Path) -> GuiActResult<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(path.to_path_buf())
}

// ── Resolution ──────────────────────────────────────────────────────────────

/// Merges CLI flags, environment and the file at `path` into the effective
/// config, recording where each field came from.
pub fn resolve_runtime_config(
    cli: &CliOverrides,
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> GuiActResult<(AppConfig, ConfigSources)> {
    let file = load_file_config(path)?;
    let mut sources = ConfigSources::new();

    let (provider, src) = pick(cli.provider.clone(), None, file.provider.clone());
    let provider = provider.unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    sources.insert("provider", or_default(src));

    let (api_key, src) = pick(cli.api_key.clone(), env(ENV_API_KEY), file.api_key.clone());
    sources.insert("api_key", src);

    let (model, src) = pick(cli.model.clone(), env(ENV_MODEL), file.model.clone());
    sources.insert("model", src);

    let (base_url, src) = pick(cli.base_url.clone(), env(ENV_BASE_URL), file.base_url.clone());
    sources.insert("base_url", src);

    let (parser, src) = pick(
        cli.action_parser.clone(),
        env(ENV_ACTION_PARSER),
        file.action_parser.clone(),
    );
    let action_parser = match parser {
        Some(name) => name
            .parse::<ParserKind>()
            .map_err(|e| GuiActError::Config(format!("Unsupported action_parser: {e}")))?,
        None => ParserKind::default(),
    };
    sources.insert("action_parser", or_default(src));

    let (action_parser_callable, src) = pick(
        cli.action_parser_callable.clone(),
        env(ENV_ACTION_PARSER_CALLABLE),
        file.action_parser_callable.clone(),
    );
    sources.insert("action_parser_callable", src);

    let scale_factor = match file.scale_factor {
        Some(scale) => {
            sources.insert("scale_factor", ConfigSource::Config);
            scale
        }
        None => {
            sources.insert("scale_factor", ConfigSource::Default);
            COORDINATE_SCALE
        }
    };

    let config = AppConfig {
        provider,
        api_key,
        model,
        base_url,
        action_parser,
        action_parser_callable,
        scale_factor,
    };
    tracing::debug!(path = %path.display(), parser = %config.action_parser, "runtime config resolved");
    Ok((config, sources))
}

fn pick(cli: Option<String>, env: Option<String>, file: Option<String>) -> (Option<String>, ConfigSource) {
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    if let Some(v) = present(cli) {
        return (Some(v), ConfigSource::Cli);
    }
    if let Some(v) = present(env) {
        return (Some(v), ConfigSource::Env);
    }
    if let Some(v) = present(file) {
        return (Some(v), ConfigSource::Config);
    }
    (None, ConfigSource::Unset)
}

fn or_default(source: ConfigSource) -> ConfigSource {
    match source {
        ConfigSource::Unset => ConfigSource::Default,
        other => other,
    }
}

/// `abc***xyz`; values of six characters or fewer are fully starred.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n <= 6 => "*".repeat(n),
        n => {
            let head: String = chars[..3].iter().collect();
            let tail: String = chars[n - 3..].iter().collect();
            format!("{head}***{tail}")
        }
    }
}
