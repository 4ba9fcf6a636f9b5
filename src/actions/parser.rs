use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::actions::extractor::extract_actions;
use crate::actions::grammar::{
    find_argument, parse_arguments, parse_point_literal, split_call, ACTION_LABEL,
};
use crate::actions::structured::{StructuredParseError, StructuredParser};
use crate::actions::types::{CommandKind, ParsedCommand};
use crate::errors::{GuiActError, GuiActResult};
use crate::perception::types::ScreenGeometry;

// ── Builtin grammar ──────────────────────────────────────────────────────────

/// Parses one action expression with the builtin grammar.
///
/// Returns `None` when the call name is outside the closed command set or a
/// required argument is missing or malformed.
pub fn parse_builtin(expression: &str) -> Option<ParsedCommand> {
    let call = split_call(expression);
    let kind = CommandKind::from_name(&call.name)?;
    let args = parse_arguments(call.args);
    let point = |name: &str| find_argument(&args, name).and_then(parse_point_literal);
    let text = |name: &str| find_argument(&args, name).map(str::to_string);

    let command = ParsedCommand::new(kind.clone());
    let command = match kind {
        CommandKind::Click | CommandKind::LeftDouble | CommandKind::RightSingle | CommandKind::Hover => {
            let target = point("point").or_else(|| point("start_point"))?;
            command.with_arg("point", target)
        }
        CommandKind::Drag | CommandKind::Select => {
            let start = point("start_point")?;
            let end = point("end_point")?;
            command.with_arg("start_point", start).with_arg("end_point", end)
        }
        CommandKind::Scroll => {
            let direction = text("direction")
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "down".to_string());
            let command = command.with_arg("direction", direction);
            match point("point").or_else(|| point("start_point")) {
                Some(target) => command.with_arg("point", target),
                None => command,
            }
        }
        CommandKind::Type => command.with_arg("content", text("content")?),
        CommandKind::Hotkey => {
            let keys = text("key")
                .filter(|k| !k.is_empty())
                .or_else(|| text("content"))?;
            command.with_arg("key", keys)
        }
        CommandKind::Wait => command,
        CommandKind::Finished => match text("content").filter(|c| !c.is_empty()) {
            Some(content) => command.with_arg("content", content),
            None => command,
        },
        CommandKind::Other(_) => return None,
    };
    Some(command)
}

// ── Registered parsers ───────────────────────────────────────────────────────

/// What a registered parser function may return.
#[derive(Debug, Clone, PartialEq)]
pub enum ParserOutput {
    Nothing,
    One(ParsedCommand),
    Many(Vec<ParsedCommand>),
}

impl ParserOutput {
    pub fn into_commands(self) -> Vec<ParsedCommand> {
        match self {
            ParserOutput::Nothing => Vec::new(),
            ParserOutput::One(cmd) => vec![cmd],
            ParserOutput::Many(cmds) => cmds,
        }
    }
}

impl From<Option<ParsedCommand>> for ParserOutput {
    fn from(value: Option<ParsedCommand>) -> Self {
        value.map_or(ParserOutput::Nothing, ParserOutput::One)
    }
}

impl From<ParsedCommand> for ParserOutput {
    fn from(value: ParsedCommand) -> Self {
        ParserOutput::One(value)
    }
}

impl From<Vec<ParsedCommand>> for ParserOutput {
    fn from(value: Vec<ParsedCommand>) -> Self {
        ParserOutput::Many(value)
    }
}

/// Signature shared by all registered parsers:
/// `(text, image_width, image_height, scale_factor)`.
pub type ParserFn = dyn Fn(&str, u32, u32, u32) -> ParserOutput + Send + Sync;

/// A resolved `module:symbol` reference.
#[derive(Clone)]
pub struct RegisteredParser {
    reference: String,
    func: Arc<ParserFn>,
}

impl RegisteredParser {
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn call(&self, text: &str, geometry: ScreenGeometry, scale_factor: u32) -> ParserOutput {
        (self.func)(text, geometry.width, geometry.height, scale_factor)
    }
}

impl fmt::Debug for RegisteredParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredParser")
            .field("reference", &self.reference)
            .finish()
    }
}

/// Module name under which the crate registers its own parser functions.
pub const BUILTIN_MODULE: &str = "gui_act.parsers";

/// Named parser functions, grouped by module, that `module:symbol`
/// references resolve against.
#[derive(Clone, Default)]
pub struct ParserRegistry {
    modules: HashMap<String, HashMap<String, Arc<ParserFn>>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `gui_act.parsers:builtin`, which runs the
    /// extractor and builtin grammar over the full response.
    pub fn with_builtin_module() -> Self {
        let mut registry = Self::new();
        registry.register(BUILTIN_MODULE, "builtin", |text, _, _, _| {
            ParserOutput::Many(extract_actions(text).iter().filter_map(|a| parse_builtin(a)).collect())
        });
        registry
    }

    pub fn register<F>(&mut self, module: &str, symbol: &str, func: F)
    where
        F: Fn(&str, u32, u32, u32) -> ParserOutput + Send + Sync + 'static,
    {
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(symbol.to_string(), Arc::new(func));
    }

    /// Resolves `"<module>:<symbol>"`. Every failure here is a configuration
    /// error and must surface before any parsing is attempted.
    pub fn resolve(&self, reference: &str) -> GuiActResult<RegisteredParser> {
        let Some((module_name, symbol)) = reference.split_once(':') else {
            return Err(GuiActError::Config(format!(
                "Registered action parser must be in 'module:function' format, got: {reference}"
            )));
        };
        let (module_name, symbol) = (module_name.trim(), symbol.trim());
        if module_name.is_empty() || symbol.is_empty() {
            return Err(GuiActError::Config(format!(
                "Registered action parser must be in 'module:function' format, got: {reference}"
            )));
        }

        let module = self.modules.get(module_name).ok_or_else(|| {
            GuiActError::ParserResolution(format!("no parser module named '{module_name}'"))
        })?;
        let func = module.get(symbol).cloned().ok_or_else(|| {
            GuiActError::ParserResolution(format!(
                "parser module '{module_name}' has no function '{symbol}'"
            ))
        })?;

        tracing::debug!(reference, "registered action parser resolved");
        Ok(RegisteredParser {
            reference: format!("{module_name}:{symbol}"),
            func,
        })
    }
}

// ── Backend selection ───────────────────────────────────────────────────────

/// Which parser backend the configuration asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserKind {
    #[default]
    #[serde(alias = "doubao")]
    Builtin,
    #[serde(alias = "custom")]
    Registered,
    #[serde(alias = "ui_tars")]
    Structured,
}

impl ParserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserKind::Builtin => "builtin",
            ParserKind::Registered => "registered",
            ParserKind::Structured => "structured",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "builtin" | "doubao" => Ok(ParserKind::Builtin),
            "registered" | "custom" => Ok(ParserKind::Registered),
            "structured" | "ui_tars" => Ok(ParserKind::Structured),
            other => Err(format!(
                "unsupported action parser '{other}' (use one of: builtin, registered, structured)"
            )),
        }
    }
}

/// A parser backend, fully resolved and ready to run.
#[derive(Clone)]
pub enum ParserBackend {
    Builtin,
    Registered(RegisteredParser),
    Structured(Arc<dyn StructuredParser>),
}

impl fmt::Debug for ParserBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserBackend::Builtin => f.write_str("Builtin"),
            ParserBackend::Registered(p) => f.debug_tuple("Registered").field(p).finish(),
            ParserBackend::Structured(p) => f.debug_tuple("Structured").field(&p.name()).finish(),
        }
    }
}

impl ParserBackend {
    pub fn kind(&self) -> ParserKind {
        match self {
            ParserBackend::Builtin => ParserKind::Builtin,
            ParserBackend::Registered(_) => ParserKind::Registered,
            ParserBackend::Structured(_) => ParserKind::Structured,
        }
    }

    /// Turns a full model response into commands, in document order.
    ///
    /// The registered backend receives the raw response once and does its own
    /// extraction; the other two run per extracted expression.
    pub fn parse(
        &self,
        response: &str,
        geometry: ScreenGeometry,
        scale_factor: u32,
    ) -> GuiActResult<Vec<ParsedCommand>> {
        let commands = match self {
            ParserBackend::Builtin => extract_actions(response)
                .iter()
                .filter_map(|expression| {
                    let parsed = parse_builtin(expression);
                    if parsed.is_none() {
                        tracing::debug!(expression = %expression, "expression dropped by builtin parser");
                    }
                    parsed
                })
                .collect(),
            ParserBackend::Registered(parser) => {
                parser.call(response, geometry, scale_factor).into_commands()
            }
            ParserBackend::Structured(parser) => {
                let mut commands = Vec::new();
                for expression in extract_actions(response) {
                    let labelled = if expression.contains(ACTION_LABEL) {
                        expression
                    } else {
                        format!("{ACTION_LABEL} {expression}")
                    };
                    match parser.parse(&labelled, geometry, scale_factor) {
                        Ok(parsed) => commands.extend(parsed),
                        Err(StructuredParseError::InvalidValue(reason)) => {
                            tracing::debug!(expression = %labelled, %reason, "expression skipped by structured parser");
                        }
                        Err(StructuredParseError::Failed(reason)) => {
                            return Err(GuiActError::Parser(format!("{}: {reason}", parser.name())));
                        }
                    }
                }
                commands
            }
        };

        tracing::info!(
            backend = %self.kind(),
            commands = commands.len(),
            "action response parsed"
        );
        Ok(commands)
    }
}

/// Builds a [`ParserBackend`] from configuration. Resolution happens once, up
/// front, so a bad configuration fails before the screen is touched.
#[derive(Clone, Default)]
pub struct ParserResolver {
    registry: ParserRegistry,
    structured: Option<Arc<dyn StructuredParser>>,
}

impl ParserResolver {
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry,
            structured: None,
        }
    }

    /// Installs the optional structured parser capability.
    pub fn with_structured(mut self, parser: Arc<dyn StructuredParser>) -> Self {
        self.structured = Some(parser);
        self
    }

    pub fn has_structured(&self) -> bool {
        self.structured.is_some()
    }

    pub fn resolve(&self, kind: ParserKind, reference: Option<&str>) -> GuiActResult<ParserBackend> {
        match kind {
            ParserKind::Builtin => Ok(ParserBackend::Builtin),
            ParserKind::Registered => {
                let reference = reference.map(str::trim).filter(|r| !r.is_empty()).ok_or_else(|| {
                    GuiActError::Config(
                        "action_parser is 'registered' but action_parser_callable is not configured"
                            .into(),
                    )
                })?;
                Ok(ParserBackend::Registered(self.registry.resolve(reference)?))
            }
            ParserKind::Structured => self
                .structured
                .clone()
                .map(ParserBackend::Structured)
                .ok_or_else(|| {
                    GuiActError::MissingCapability(
                        "action parser 'structured' requires a structured parser to be installed"
                            .into(),
                    )
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::structured::JsonActionParser;
    use crate::actions::types::{BoundingBox, Coordinate, Point};

    fn geometry() -> ScreenGeometry {
        ScreenGeometry::new(1920, 1080)
    }

    fn point(x: f64, y: f64) -> Option<Coordinate> {
        Some(Coordinate::Point(Point::new(x, y)))
    }

    #[test]
    fn builtin_click_family() {
        let cmd = parse_builtin("click(point='<point>512 384</point>')").unwrap();
        assert_eq!(cmd.kind, CommandKind::Click);
        assert_eq!(cmd.coordinate("point"), point(512.0, 384.0));

        let cmd = parse_builtin("Action: right_single(start_point=\"<point>1 2</point>\")").unwrap();
        assert_eq!(cmd.kind, CommandKind::RightSingle);
        assert_eq!(cmd.coordinate("point"), point(1.0, 2.0));

        let cmd = parse_builtin("left_single(point='<point>3 4</point>')").unwrap();
        assert_eq!(cmd.kind, CommandKind::Click);

        let cmd = parse_builtin("hover(point='<point>10 10 30 30</point>')").unwrap();
        assert_eq!(
            cmd.coordinate("point"),
            Some(Coordinate::Box(BoundingBox::new(10.0, 10.0, 30.0, 30.0)))
        );
    }

    #[test]
    fn builtin_drops_click_without_point() {
        assert!(parse_builtin("click()").is_none());
        assert!(parse_builtin("left_double(point='<point>12</point>')").is_none());
    }

    #[test]
    fn builtin_drag_requires_both_endpoints() {
        let cmd = parse_builtin(
            "drag(start_point='<point>100 100</point>', end_point='<point>200 200</point>')",
        )
        .unwrap();
        assert_eq!(cmd.coordinate("start_point"), point(100.0, 100.0));
        assert_eq!(cmd.coordinate("end_point"), point(200.0, 200.0));
        assert!(parse_builtin("select(start_point='<point>1 1</point>')").is_none());
    }

    #[test]
    fn builtin_scroll_defaults_to_down() {
        let cmd = parse_builtin("scroll()").unwrap();
        assert_eq!(cmd.text("direction"), Some("down"));
        assert!(cmd.coordinate("point").is_none());

        let cmd = parse_builtin("scroll(point='<point>5 6</point>', direction='up')").unwrap();
        assert_eq!(cmd.text("direction"), Some("up"));
        assert_eq!(cmd.coordinate("point"), point(5.0, 6.0));
    }

    #[test]
    fn builtin_type_hotkey_wait_finished() {
        assert_eq!(
            parse_builtin("type(content='hello world')").unwrap().text("content"),
            Some("hello world")
        );
        assert_eq!(
            parse_builtin("type(content='')").unwrap().text("content"),
            Some("")
        );
        assert!(parse_builtin("type()").is_none());

        assert_eq!(parse_builtin("hotkey(key='ctrl c')").unwrap().text("key"), Some("ctrl c"));
        assert_eq!(parse_builtin("hotkey(content='alt tab')").unwrap().text("key"), Some("alt tab"));
        assert!(parse_builtin("hotkey()").is_none());

        assert_eq!(parse_builtin("WAIT()").unwrap().kind, CommandKind::Wait);

        let done = parse_builtin("finished(content='all set')").unwrap();
        assert_eq!(done.text("content"), Some("all set"));
        assert!(parse_builtin("finished()").unwrap().arguments.is_empty());
    }

    #[test]
    fn builtin_ignores_unknown_kinds_and_non_calls() {
        assert!(parse_builtin("foobar(x=1)").is_none());
        assert!(parse_builtin("Action: I am not sure what to do").is_none());
    }

    #[test]
    fn builtin_backend_keeps_order_and_drops_bad_expressions() {
        let response = "<action>click(point='<point>1 1</point>')</action>\
            <action>foobar(x=1)</action>\
            <action>type(content='hi')</action>";
        let commands = ParserBackend::Builtin.parse(response, geometry(), 1000).unwrap();
        let kinds: Vec<_> = commands.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(kinds, vec![CommandKind::Click, CommandKind::Type]);
    }

    #[test]
    fn type_content_ending_in_backslash_is_kept() {
        let cmd = parse_builtin(r"type(content='C:\Users\me\')").unwrap();
        assert_eq!(cmd.text("content"), Some(r"C:\Users\me\"));

        let response = r"<action>type(content='dir C:\')</action><action>hotkey(key='enter')</action>";
        let commands = ParserBackend::Builtin.parse(response, geometry(), 1000).unwrap();
        let kinds: Vec<_> = commands.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(kinds, vec![CommandKind::Type, CommandKind::Hotkey]);
        assert_eq!(commands[0].text("content"), Some(r"dir C:\"));
    }

    #[test]
    fn registry_reference_without_separator_is_a_config_error() {
        let registry = ParserRegistry::with_builtin_module();
        let err = registry.resolve("gui_act.parsers.builtin").unwrap_err();
        assert!(matches!(err, GuiActError::Config(_)), "{err}");
        let err = registry.resolve(":builtin").unwrap_err();
        assert!(matches!(err, GuiActError::Config(_)), "{err}");
    }

    #[test]
    fn registry_unknown_module_or_symbol_fails() {
        let registry = ParserRegistry::with_builtin_module();
        assert!(matches!(
            registry.resolve("nope:parse"),
            Err(GuiActError::ParserResolution(_))
        ));
        assert!(matches!(
            registry.resolve("gui_act.parsers:nope"),
            Err(GuiActError::ParserResolution(_))
        ));
    }

    #[test]
    fn registered_parser_receives_full_response_and_geometry() {
        let mut registry = ParserRegistry::new();
        registry.register("tests", "echo", |text, w, h, scale| {
            ParserOutput::One(
                ParsedCommand::new(CommandKind::Type).with_arg("content", format!("{w}x{h}@{scale}:{text}")),
            )
        });
        registry.register("tests", "none", |_, _, _, _| ParserOutput::Nothing);

        let resolver = ParserResolver::new(registry);
        let backend = resolver.resolve(ParserKind::Registered, Some("tests:echo")).unwrap();
        let commands = backend.parse("<action>wait()</action>", geometry(), 1000).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].text("content"),
            Some("1920x1080@1000:<action>wait()</action>")
        );

        let backend = resolver.resolve(ParserKind::Registered, Some("tests:none")).unwrap();
        assert!(backend.parse("anything", geometry(), 1000).unwrap().is_empty());
    }

    #[test]
    fn registered_kind_without_reference_is_a_config_error() {
        let resolver = ParserResolver::new(ParserRegistry::new());
        assert!(matches!(
            resolver.resolve(ParserKind::Registered, None),
            Err(GuiActError::Config(_))
        ));
    }

    #[test]
    fn builtin_module_is_resolvable() {
        let backend = ParserResolver::new(ParserRegistry::with_builtin_module())
            .resolve(ParserKind::Registered, Some("gui_act.parsers:builtin"))
            .unwrap();
        let commands = backend.parse("Action: wait()", geometry(), 1000).unwrap();
        assert_eq!(commands, vec![ParsedCommand::new(CommandKind::Wait)]);
    }

    #[test]
    fn structured_backend_requires_the_capability() {
        let resolver = ParserResolver::default();
        assert!(!resolver.has_structured());
        assert!(matches!(
            resolver.resolve(ParserKind::Structured, None),
            Err(GuiActError::MissingCapability(_))
        ));
        assert!(resolver
            .with_structured(Arc::new(JsonActionParser::new()))
            .has_structured());
    }

    #[test]
    fn structured_backend_skips_invalid_expressions() {
        let resolver = ParserResolver::default().with_structured(Arc::new(JsonActionParser::new()));
        let backend = resolver.resolve(ParserKind::Structured, None).unwrap();
        let response = r#"<action>{"action_type": "click", "action_inputs": {"start_box": "[1, 2]"}}</action>
<action>{"action_type": "click", "action_inputs": {"start_box": "oops"}}</action>
<action>{"action_type": "finished"}</action>"#;
        let commands = backend.parse(response, geometry(), 1000).unwrap();
        let kinds: Vec<_> = commands.iter().map(|c| c.kind.clone()).collect();
        assert_eq!(kinds, vec![CommandKind::Click, CommandKind::Finished]);
    }

    struct BrokenParser;

    impl StructuredParser for BrokenParser {
        fn name(&self) -> &str {
            "broken"
        }

        fn parse(
            &self,
            _expression: &str,
            _geometry: ScreenGeometry,
            _scale_factor: u32,
        ) -> Result<Vec<ParsedCommand>, StructuredParseError> {
            Err(StructuredParseError::Failed("model output unreadable".into()))
        }
    }

    #[test]
    fn structured_backend_propagates_other_failures() {
        let backend = ParserBackend::Structured(Arc::new(BrokenParser));
        assert!(matches!(
            backend.parse("<action>wait()</action>", geometry(), 1000),
            Err(GuiActError::Parser(_))
        ));
    }

    #[test]
    fn parser_kind_accepts_legacy_names() {
        assert_eq!("doubao".parse::<ParserKind>().unwrap(), ParserKind::Builtin);
        assert_eq!("Custom".parse::<ParserKind>().unwrap(), ParserKind::Registered);
        assert_eq!("ui_tars".parse::<ParserKind>().unwrap(), ParserKind::Structured);
        assert!("regex".parse::<ParserKind>().is_err());
    }
}
