use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::grammar::parse_point_literal;

/// Closed set of command kinds the dispatcher knows how to execute.
///
/// `Other` carries the name of anything else a parser backend produced; the
/// dispatcher ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandKind {
    Click,
    LeftDouble,
    RightSingle,
    Hover,
    Drag,
    Select,
    Scroll,
    Type,
    Hotkey,
    Wait,
    Finished,
    Other(String),
}

impl CommandKind {
    /// Every executable kind, in the order the action space is documented.
    pub const KNOWN: [CommandKind; 11] = [
        CommandKind::Click,
        CommandKind::LeftDouble,
        CommandKind::RightSingle,
        CommandKind::Hover,
        CommandKind::Drag,
        CommandKind::Select,
        CommandKind::Scroll,
        CommandKind::Type,
        CommandKind::Hotkey,
        CommandKind::Wait,
        CommandKind::Finished,
    ];

    /// Looks up a call name in the closed set. `left_single` is accepted as a
    /// deprecated spelling of `click`.
    pub fn from_name(name: &str) -> Option<CommandKind> {
        let kind = match name.trim().to_ascii_lowercase().as_str() {
            "click" | "left_single" => CommandKind::Click,
            "left_double" => CommandKind::LeftDouble,
            "right_single" => CommandKind::RightSingle,
            "hover" => CommandKind::Hover,
            "drag" => CommandKind::Drag,
            "select" => CommandKind::Select,
            "scroll" => CommandKind::Scroll,
            "type" => CommandKind::Type,
            "hotkey" => CommandKind::Hotkey,
            "wait" => CommandKind::Wait,
            "finished" => CommandKind::Finished,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandKind::Click => "click",
            CommandKind::LeftDouble => "left_double",
            CommandKind::RightSingle => "right_single",
            CommandKind::Hover => "hover",
            CommandKind::Drag => "drag",
            CommandKind::Select => "select",
            CommandKind::Scroll => "scroll",
            CommandKind::Type => "type",
            CommandKind::Hotkey => "hotkey",
            CommandKind::Wait => "wait",
            CommandKind::Finished => "finished",
            CommandKind::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CommandKind::Other(_))
    }
}

impl From<String> for CommandKind {
    fn from(name: String) -> Self {
        CommandKind::from_name(&name)
            .unwrap_or_else(|| CommandKind::Other(name.trim().to_ascii_lowercase()))
    }
}

impl From<&str> for CommandKind {
    fn from(name: &str) -> Self {
        CommandKind::from(name.to_string())
    }
}

impl From<CommandKind> for String {
    fn from(kind: CommandKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A position on either the normalized scale or in screen pixels.
/// Which one is decided by magnitude at normalization time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coordinate {
    Point(Point),
    Box(BoundingBox),
}

impl Coordinate {
    /// Boxes collapse to their center; points pass through.
    pub fn reduce(&self) -> Point {
        match self {
            Coordinate::Point(p) => *p,
            Coordinate::Box(b) => b.center(),
        }
    }
}

/// A single named argument of a parsed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Point(Point),
    Box(BoundingBox),
    Text(String),
}

impl ArgValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coordinate view of the value. Text is accepted when it holds a point
    /// literal such as `<point>512 384</point>`.
    pub fn as_coordinate(&self) -> Option<Coordinate> {
        match self {
            ArgValue::Point(p) => Some(Coordinate::Point(*p)),
            ArgValue::Box(b) => Some(Coordinate::Box(*b)),
            ArgValue::Text(s) => parse_point_literal(s),
        }
    }
}

impl From<Coordinate> for ArgValue {
    fn from(coord: Coordinate) -> Self {
        match coord {
            Coordinate::Point(p) => ArgValue::Point(p),
            Coordinate::Box(b) => ArgValue::Box(b),
        }
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        ArgValue::Text(s)
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        ArgValue::Text(s.to_string())
    }
}

impl From<Point> for ArgValue {
    fn from(p: Point) -> Self {
        ArgValue::Point(p)
    }
}

impl From<BoundingBox> for ArgValue {
    fn from(b: BoundingBox) -> Self {
        ArgValue::Box(b)
    }
}

/// Output of a parser backend, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub kind: CommandKind,
    #[serde(default)]
    pub arguments: BTreeMap<String, ArgValue>,
}

impl ParsedCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            arguments: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, name: &str, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(name.to_string(), value.into());
        self
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.arguments.get(name).and_then(ArgValue::as_text)
    }

    pub fn coordinate(&self, name: &str) -> Option<Coordinate> {
        self.arguments.get(name).and_then(ArgValue::as_coordinate)
    }
}
