use thiserror::Error;

#[derive(Debug, Error)]
pub enum GuiActError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Action parser resolution error: {0}")]
    ParserResolution(String),

    #[error("Missing optional capability: {0}")]
    MissingCapability(String),

    #[error("Action parser error: {0}")]
    Parser(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Executor error: {0}")]
    Executor(String),

    /// A key name the input backend has no mapping for.
    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl GuiActError {
    /// Short type tag used in the `error.type` field of CLI result envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            GuiActError::Config(_) => "ConfigError",
            GuiActError::ParserResolution(_) => "ParserResolutionError",
            GuiActError::MissingCapability(_) => "DependencyError",
            GuiActError::Parser(_) => "ParserError",
            GuiActError::LlmProvider(_) => "ProviderError",
            GuiActError::Perception(_) => "PerceptionError",
            GuiActError::Executor(_) | GuiActError::UnknownKey(_) => "ExecutorError",
            GuiActError::Io(_) => "IoError",
            GuiActError::Json(_) => "JsonError",
            GuiActError::Http(_) => "HttpError",
            GuiActError::TomlDe(_) | GuiActError::TomlSer(_) => "TomlError",
        }
    }
}

impl serde::Serialize for GuiActError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type GuiActResult<T> = Result<T, GuiActError>;
