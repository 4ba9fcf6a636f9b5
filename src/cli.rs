use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::CliOverrides;
use crate::report::JsonMode;

#[derive(Parser, Debug)]
#[command(name = "gui-act")]
#[command(about = "Vision-model driven desktop GUI automation")]
#[command(version)]
pub struct Cli {
    /// Result envelope layout on stdout
    #[arg(long = "json", global = true, value_enum, default_value = "compact")]
    pub json_mode: JsonMode,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write model and parser settings to the config file
    #[command(alias = "init")]
    Setup(SetupArgs),

    /// Show the effective configuration and where each value came from
    Status(StatusArgs),

    /// Analyze the current screen without acting
    See(RunArgs),

    /// Analyze the current screen and execute the model's actions
    Act(ActArgs),

    /// Interpret a model response offline and show the commands it yields
    Parse(ParseArgs),

    /// Inspect configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Same report as `status`
    Show(StatusArgs),
}

/// Flags shared by every command that resolves runtime config.
#[derive(Args, Debug, Clone, Default)]
pub struct ModelArgs {
    #[arg(long)]
    pub api_key: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long)]
    pub base_url: Option<String>,
    #[arg(long)]
    pub provider: Option<String>,
    /// builtin, registered or structured
    #[arg(long)]
    pub action_parser: Option<String>,
    /// Registered parser reference, `module:function`
    #[arg(long)]
    pub action_parser_callable: Option<String>,
    /// Config file to read instead of the default lookup
    #[arg(long, value_name = "FILE")]
    pub config_path: Option<PathBuf>,
}

impl ModelArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            provider: self.provider.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            action_parser: self.action_parser.clone(),
            action_parser_callable: self.action_parser_callable.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[command(flatten)]
    pub model: ModelArgs,

    /// Never prompt, even when stdin is a terminal
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, value_name = "FILE")]
    pub config_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Natural language GUI instruction
    pub instruction: String,

    #[command(flatten)]
    pub model: ModelArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ActArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Ask the model but do not touch mouse or keyboard
    #[arg(long)]
    pub no_exec: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Model response text to interpret
    pub text: String,

    /// Screen width the response refers to
    #[arg(long, default_value_t = 1920)]
    pub width: u32,

    /// Screen height the response refers to
    #[arg(long, default_value_t = 1080)]
    pub height: u32,

    #[arg(long)]
    pub action_parser: Option<String>,
    #[arg(long)]
    pub action_parser_callable: Option<String>,
    #[arg(long, value_name = "FILE")]
    pub config_path: Option<PathBuf>,
}
