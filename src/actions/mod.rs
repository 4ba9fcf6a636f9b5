//! Action-language interpreter: model text in, structured commands out.

pub mod extractor;
pub mod grammar;
pub mod parser;
pub mod structured;
pub mod types;

use crate::errors::GuiActResult;
use crate::perception::types::ScreenGeometry;

pub use parser::{ParserBackend, ParserKind, ParserRegistry, ParserResolver};
pub use types::{ArgValue, BoundingBox, CommandKind, Coordinate, ParsedCommand, Point};

/// Extracts and parses every action in `response` with the given backend.
/// An empty result means the response triggered no action; that is not an
/// error.
pub fn interpret(
    response: &str,
    geometry: ScreenGeometry,
    scale_factor: u32,
    backend: &ParserBackend,
) -> GuiActResult<Vec<ParsedCommand>> {
    backend.parse(response, geometry, scale_factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interprets_a_mixed_response() {
        let response = "Thought: fill the search box.\n\
            <action>click(point='<point>500 500</point>')</action>\n\
            <action>type(content='rust\\n')</action>\n\
            <action>finished(content='searched')</action>";
        let commands = interpret(response, ScreenGeometry::new(1920, 1080), 1000, &ParserBackend::Builtin).unwrap();
        let kinds: Vec<&str> = commands.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(kinds, vec!["click", "type", "finished"]);
        assert_eq!(commands[1].text("content"), Some("rust\\n"));
    }

    #[test]
    fn unrecognized_response_triggers_nothing() {
        let commands = interpret(
            "foobar(x=1)",
            ScreenGeometry::new(1920, 1080),
            1000,
            &ParserBackend::Builtin,
        )
        .unwrap();
        assert!(commands.is_empty());
    }
}
