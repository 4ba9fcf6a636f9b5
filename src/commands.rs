use std::io::{BufRead, ErrorKind, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;

use crate::actions::parser::{ParserKind, ParserRegistry, ParserResolver};
use crate::actions::structured::JsonActionParser;
use crate::actions::{interpret, ArgValue};
use crate::agent_engine::engine::AutomationEngine;
use crate::cli::{Cli, Command, ConfigArgs, ConfigCommand, ModelArgs, ParseArgs, RunArgs, SetupArgs, StatusArgs};
use crate::config::{
    self, process_env, resolve_config_path, resolve_runtime_config, AppConfig, CliOverrides, FileConfig,
};
use crate::errors::{GuiActError, GuiActResult};
use crate::executor::coordinator::to_screen;
use crate::executor::input::EnigoBackend;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::perception::screenshot::ScreenCapturer;
use crate::perception::types::ScreenGeometry;
use crate::report::{CommandReport, ReportBuilder, ReportError, ResultCode};

/// Parser backends this binary can resolve: the builtin grammar, the
/// registered `gui_act.parsers` module and the JSON structured parser.
pub fn default_resolver() -> ParserResolver {
    ParserResolver::new(ParserRegistry::with_builtin_module()).with_structured(Arc::new(JsonActionParser::new()))
}

/// Runs the selected command. Always produces a report; errors nobody
/// handled become `UNHANDLED_ERROR`.
pub async fn run(cli: Cli) -> CommandReport {
    let name = command_name(cli.command.as_ref());
    let result = match cli.command {
        Some(Command::Setup(args)) => handle_setup(&args),
        Some(Command::Status(args)) => handle_status(&args),
        Some(Command::See(args)) => handle_see_or_act(&args, "see", false).await,
        Some(Command::Act(args)) => handle_see_or_act(&args.run, "act", !args.no_exec).await,
        Some(Command::Parse(args)) => handle_parse(&args),
        Some(Command::Config(ConfigArgs {
            command: ConfigCommand::Show(args),
        })) => handle_status(&args),
        None => Ok(ReportBuilder::start("help").fail(
            ResultCode::UsageError,
            "No command provided.",
            ReportError::new(
                "ArgumentError",
                "Run `gui-act --help` for available commands.",
                Some("Use one of: see, act, parse, setup, status."),
            ),
            json!({}),
        )),
    };
    result.unwrap_or_else(|e| {
        tracing::error!(command = name, error = %e, "command failed");
        unhandled(name, &e)
    })
}

pub fn unhandled(command: &str, error: &GuiActError) -> CommandReport {
    ReportBuilder::start(command).fail(
        ResultCode::UnhandledError,
        "Command failed before completion.",
        ReportError::new(
            error.kind(),
            error.to_string(),
            Some("Run `gui-act --help` or check command arguments."),
        ),
        json!({}),
    )
}

fn command_name(command: Option<&Command>) -> &'static str {
    match command {
        Some(Command::Setup(_)) => "setup",
        Some(Command::Status(_)) | Some(Command::Config(_)) => "status",
        Some(Command::See(_)) => "see",
        Some(Command::Act(_)) => "act",
        Some(Command::Parse(_)) => "parse",
        None => "help",
    }
}

fn config_error(error: &GuiActError) -> ReportError {
    let hint = match error {
        GuiActError::MissingCapability(_) => "Choose another --action-parser or install the capability.",
        _ => "Run `gui-act setup --action-parser registered --action-parser-callable module:function`.",
    };
    ReportError::new(error.kind(), error.to_string(), Some(hint))
}

// ── setup ───────────────────────────────────────────────────────────────────

fn handle_setup(args: &SetupArgs) -> GuiActResult<CommandReport> {
    let builder = ReportBuilder::start("setup");
    let explicit = args.model.config_path.clone();
    let path = explicit
        .clone()
        .or_else(|| process_env(config::ENV_CONFIG_PATH).map(PathBuf::from))
        .unwrap_or_else(config::default_config_path);

    let mut cli = args.model.clone();
    if !args.non_interactive && std::io::stdin().is_terminal() {
        prompt_missing(&mut cli, &mut std::io::stdin().lock(), &mut std::io::stderr())?;
    }

    let action_parser = match cli.action_parser.as_deref() {
        Some(name) => match name.parse::<ParserKind>() {
            Ok(kind) => Some(kind.as_str().to_string()),
            Err(detail) => {
                return Ok(builder.fail(
                    ResultCode::ConfigInvalid,
                    "Invalid action parser backend.",
                    ReportError::new("ConfigError", detail, Some("Use one of: builtin, registered, structured.")),
                    json!({}),
                ))
            }
        },
        None => None,
    };

    let current = config::load_file_config(&path)?;
    let next = FileConfig {
        provider: cli.provider.clone().or_else(|| current.provider.clone()),
        api_key: cli.api_key.clone().or_else(|| current.api_key.clone()),
        model: cli.model.clone().or_else(|| current.model.clone()),
        base_url: cli.base_url.clone().or_else(|| current.base_url.clone()),
        action_parser: action_parser.or_else(|| current.action_parser.clone()),
        action_parser_callable: cli
            .action_parser_callable
            .clone()
            .or_else(|| current.action_parser_callable.clone()),
        scale_factor: current.scale_factor,
    };
    let updated_fields = changed_fields(&current, &next);

    let registered = next
        .action_parser
        .as_deref()
        .and_then(|p| p.parse::<ParserKind>().ok())
        == Some(ParserKind::Registered);
    if registered && next.action_parser_callable.as_deref().map_or(true, str::is_empty) {
        return Ok(builder.fail(
            ResultCode::ConfigInvalid,
            "Registered action parser requires a reference.",
            ReportError::new(
                "ConfigError",
                "action_parser is 'registered' but action_parser_callable is empty.",
                Some("Set --action-parser-callable as module:function."),
            ),
            json!({}),
        ));
    }

    let (saved_path, fallback_used) = match config::save_file_config(&next, &path) {
        Ok(saved) => (saved, false),
        Err(GuiActError::Io(e)) if e.kind() == ErrorKind::PermissionDenied && explicit.is_none() => {
            let fallback = config::user_fallback_config_path();
            tracing::warn!(preferred = %path.display(), fallback = %fallback.display(), "config dir not writable, using fallback");
            match config::save_file_config(&next, &fallback) {
                Ok(saved) => (saved, true),
                Err(e) => return Ok(write_failed(&builder, &fallback, &e)),
            }
        }
        Err(e) => return Ok(write_failed(&builder, &path, &e)),
    };

    Ok(builder.ok(
        ResultCode::ConfigUpdated,
        "Configuration has been saved.",
        json!({
            "config_path": saved_path.display().to_string(),
            "updated_fields": updated_fields,
            "validation": {
                "api_key_present": next.api_key.is_some(),
                "model_present": next.model.is_some(),
                "base_url_present": next.base_url.is_some(),
            },
            "fallback_used": fallback_used,
            "preferred_path": path.display().to_string(),
        }),
    ))
}

/// Asks for the API key, model and base URL when no flag supplied them.
/// Prompts go to `prompts` because stdout carries the result envelope. A blank
/// answer keeps whatever the config file already has.
fn prompt_missing(model: &mut ModelArgs, input: &mut impl BufRead, prompts: &mut impl Write) -> GuiActResult<()> {
    let fields = [
        (config::ENV_API_KEY, &mut model.api_key),
        (config::ENV_MODEL, &mut model.model),
        (config::ENV_BASE_URL, &mut model.base_url),
    ];
    for (label, slot) in fields {
        if slot.is_some() {
            continue;
        }
        write!(prompts, "{label} (leave blank to keep current): ")?;
        prompts.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let answer = line.trim();
        if !answer.is_empty() {
            *slot = Some(answer.to_string());
        }
    }
    Ok(())
}

fn write_failed(builder: &ReportBuilder, path: &Path, error: &GuiActError) -> CommandReport {
    builder.fail(
        ResultCode::ConfigWriteFailed,
        "Failed to write config.",
        ReportError::new(error.kind(), error.to_string(), Some("Use `--config-path` to set a writable location.")),
        json!({ "path": path.display().to_string() }),
    )
}

fn changed_fields(current: &FileConfig, next: &FileConfig) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if current.provider != next.provider {
        fields.push("provider");
    }
    if current.api_key != next.api_key {
        fields.push("api_key");
    }
    if current.model != next.model {
        fields.push("model");
    }
    if current.base_url != next.base_url {
        fields.push("base_url");
    }
    if current.action_parser != next.action_parser {
        fields.push("action_parser");
    }
    if current.action_parser_callable != next.action_parser_callable {
        fields.push("action_parser_callable");
    }
    fields
}

// ── status ──────────────────────────────────────────────────────────────────

fn handle_status(args: &StatusArgs) -> GuiActResult<CommandReport> {
    let builder = ReportBuilder::start("status");
    let path = resolve_config_path(args.config_path.as_deref(), process_env);
    let (effective, sources) = match resolve_runtime_config(&CliOverrides::default(), &path, process_env) {
        Ok(resolved) => resolved,
        Err(e @ GuiActError::Config(_)) | Err(e @ GuiActError::TomlDe(_)) => {
            return Ok(builder.fail(
                ResultCode::ConfigInvalid,
                "Configuration is invalid.",
                ReportError::new(e.kind(), e.to_string(), Some("Fix the config file or rerun `gui-act setup`.")),
                json!({ "config_path": path.display().to_string() }),
            ))
        }
        Err(e) => return Err(e),
    };
    let missing = effective.missing_fields();
    let code = if missing.is_empty() {
        ResultCode::StatusReady
    } else {
        ResultCode::StatusIncomplete
    };

    Ok(builder.ok(
        code,
        "Status collected.",
        json!({
            "config_path": path.display().to_string(),
            "config_exists": path.exists(),
            "effective_config": effective.redacted(),
            "sources": sources,
            "missing_fields": missing,
            "dependencies": dependency_report(&default_resolver()),
        }),
    ))
}

/// Which optional capabilities this host can provide. Probing opens and drops
/// a monitor list and an input connection; nothing is captured or pressed.
fn dependency_report(resolver: &ParserResolver) -> serde_json::Value {
    json!({
        "structured_parser": resolver.has_structured(),
        "screen_capture": ScreenCapturer::probe(),
        "input_backend": EnigoBackend::new().is_ok(),
    })
}

// ── see / act ───────────────────────────────────────────────────────────────

async fn handle_see_or_act(args: &RunArgs, command: &str, execute: bool) -> GuiActResult<CommandReport> {
    let builder = ReportBuilder::start(command);
    let path = resolve_config_path(args.model.config_path.as_deref(), process_env);
    let (effective, sources) = match resolve_runtime_config(&args.model.overrides(), &path, process_env) {
        Ok(resolved) => resolved,
        Err(e @ GuiActError::Config(_)) => {
            return Ok(builder.fail(ResultCode::ConfigInvalid, "Invalid configuration.", config_error(&e), json!({})))
        }
        Err(e) => return Err(e),
    };

    let Some(api_key) = effective.api_key.clone() else {
        return Ok(builder.fail(
            ResultCode::ConfigMissing,
            "Missing api key.",
            ReportError::new(
                "ConfigError",
                "GUI_VISION_API_KEY is not configured.",
                Some("Run `gui-act setup` or provide --api-key."),
            ),
            json!({ "sources": sources }),
        ));
    };

    // Parser selection fails here, before the screen is touched.
    let parser = match effective.parser_backend(&default_resolver()) {
        Ok(parser) => parser,
        Err(e) => {
            return Ok(builder.fail(
                ResultCode::ConfigInvalid,
                "Action parser could not be resolved.",
                config_error(&e),
                json!({ "sources": sources }),
            ))
        }
    };

    let model = OpenAiCompatibleProvider::new(api_key, effective.model.clone(), effective.base_url.clone())?;
    let mut engine = AutomationEngine::new(Box::new(ScreenCapturer::new()), Arc::new(model), parser)
        .with_scale_factor(effective.scale_factor);
    if execute {
        match EnigoBackend::new() {
            Ok(input) => engine = engine.with_input(Box::new(input)),
            Err(e) => {
                return Ok(builder.fail(
                    ResultCode::ActionFailed,
                    "Automation failed.",
                    ReportError::new(e.kind(), e.to_string(), Some("Check that a desktop session is available.")),
                    json!({}),
                ))
            }
        }
    }

    let result = engine.run(&args.instruction, execute).await;
    if !result.success {
        return Ok(builder.fail(
            ResultCode::ActionFailed,
            "Automation failed.",
            ReportError::new(
                "AutomationError",
                result.error.clone().unwrap_or_else(|| "Unknown automation error.".into()),
                Some("Check screen access and model configuration."),
            ),
            json!({ "result": result }),
        ));
    }

    let code = if execute {
        ResultCode::ActionDone
    } else {
        ResultCode::AnalysisDone
    };
    Ok(builder.ok(
        code,
        "Automation completed.",
        json!({
            "instruction": args.instruction,
            "model": model_summary(&effective, &sources),
            "analysis": {
                "response": result.response,
                "action_type": result.action_type,
            },
            "execution": {
                "executed": execute,
                "action_triggered": result.action_triggered,
                "steps": result.execution_result.clone().unwrap_or_default(),
            },
            "timing": result.timing,
            "image_size": result.image_size,
        }),
    ))
}

fn model_summary(effective: &AppConfig, sources: &config::ConfigSources) -> serde_json::Value {
    json!({
        "provider": effective.provider,
        "model": effective.model,
        "base_url": effective.base_url,
        "action_parser": effective.action_parser,
        "action_parser_callable": effective.action_parser_callable,
        "sources": sources,
    })
}

// ── parse ───────────────────────────────────────────────────────────────────

fn handle_parse(args: &ParseArgs) -> GuiActResult<CommandReport> {
    let builder = ReportBuilder::start("parse");
    let path = resolve_config_path(args.config_path.as_deref(), process_env);
    let overrides = CliOverrides {
        action_parser: args.action_parser.clone(),
        action_parser_callable: args.action_parser_callable.clone(),
        ..CliOverrides::default()
    };
    let resolved = resolve_runtime_config(&overrides, &path, process_env)
        .and_then(|(effective, _)| effective.parser_backend(&default_resolver()).map(|p| (effective, p)));
    let (effective, parser) = match resolved {
        Ok(resolved) => resolved,
        Err(e @ (GuiActError::Config(_) | GuiActError::ParserResolution(_) | GuiActError::MissingCapability(_))) => {
            return Ok(builder.fail(
                ResultCode::ConfigInvalid,
                "Action parser could not be resolved.",
                config_error(&e),
                json!({}),
            ))
        }
        Err(e) => return Err(e),
    };

    let geometry = ScreenGeometry::new(args.width, args.height);
    let commands = interpret(&args.text, geometry, effective.scale_factor, &parser)?;
    let described: Vec<serde_json::Value> = commands
        .iter()
        .map(|command| {
            let targets: serde_json::Map<String, serde_json::Value> = command
                .arguments
                .iter()
                .filter_map(|(name, value)| {
                    let coordinate = match value {
                        ArgValue::Text(_) => return None,
                        other => other.as_coordinate()?,
                    };
                    let (x, y) = to_screen(coordinate, geometry, effective.scale_factor);
                    Some((name.clone(), json!([x, y])))
                })
                .collect();
            json!({
                "kind": command.kind,
                "arguments": command.arguments,
                "targets": targets,
            })
        })
        .collect();

    Ok(builder.ok(
        ResultCode::ParseDone,
        "Response interpreted.",
        json!({
            "parser": parser.kind(),
            "scale_factor": effective.scale_factor,
            "image_size": [geometry.width, geometry.height],
            "action_triggered": !commands.is_empty(),
            "action_type": commands.first().map(|c| c.kind.to_string()),
            "commands": described,
        }),
    ))
}
