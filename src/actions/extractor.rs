use std::sync::OnceLock;

use regex::Regex;

use crate::actions::grammar::{strip_label, ACTION_LABEL};

/// Call names the fallback scan recognises, including deprecated aliases.
const CALL_NAMES: [&str; 12] = [
    "click",
    "left_double",
    "right_single",
    "drag",
    "hotkey",
    "type",
    "scroll",
    "wait",
    "finished",
    "left_single",
    "hover",
    "select",
];

fn action_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<action>(.*?)</action>").expect("action tag pattern is valid")
    })
}

fn bare_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(r"(?i)(?:Action:\s*)?({})\s*\([^)]*\)", CALL_NAMES.join("|"));
        Regex::new(&pattern).expect("bare call pattern is valid")
    })
}

/// Splits a model response into candidate action expressions, in document
/// order.
///
/// 1. `<action>...</action>` spans win outright; their trimmed bodies are
///    returned and nothing else is scanned.
/// 2. Otherwise every bare `name(...)` call for a known name is returned,
///    labelled `Action: `.
/// 3. Otherwise the whole trimmed response is returned as one labelled
///    expression so a lone malformed action still gets a parse attempt.
pub fn extract_actions(response: &str) -> Vec<String> {
    let tagged: Vec<&str> = action_tag_re()
        .captures_iter(response)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect();

    if !tagged.is_empty() {
        let actions: Vec<String> = tagged
            .into_iter()
            .map(str::trim)
            .filter(|body| !body.is_empty())
            .map(str::to_string)
            .collect();
        tracing::debug!(count = actions.len(), "extracted tagged actions");
        return actions;
    }

    let bare: Vec<String> = bare_call_re()
        .find_iter(response)
        .map(|m| labelled(strip_label(m.as_str())))
        .collect();
    if !bare.is_empty() {
        tracing::debug!(count = bare.len(), "extracted bare action calls");
        return bare;
    }

    tracing::debug!("no action markers found, using whole response");
    vec![labelled(response.trim())]
}

fn labelled(expression: &str) -> String {
    format!("{ACTION_LABEL} {expression}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_spans_are_returned_trimmed_in_order() {
        let response = "Thought: open the menu\n\
            <action>click(point='<point>512 384</point>')</action>\n\
            <ACTION>\n  type(content='hello')\n</Action>\n\
            <action>hotkey(key='enter')</action>";
        assert_eq!(
            extract_actions(response),
            vec![
                "click(point='<point>512 384</point>')",
                "type(content='hello')",
                "hotkey(key='enter')",
            ]
        );
    }

    #[test]
    fn tagged_spans_suppress_the_fallback_scan() {
        let response = "click(point='<point>1 1</point>') <action>wait()</action>";
        assert_eq!(extract_actions(response), vec!["wait()"]);
    }

    #[test]
    fn empty_tagged_spans_are_dropped() {
        assert!(extract_actions("<action>   </action>").is_empty());
    }

    #[test]
    fn bare_calls_are_found_and_labelled() {
        let response = "I will click first.\nAction: click(point='<point>10 20</point>')\n\
            then LEFT_SINGLE(point='<point>1 2</point>') and finished(content='ok')";
        assert_eq!(
            extract_actions(response),
            vec![
                "Action: click(point='<point>10 20</point>')",
                "Action: LEFT_SINGLE(point='<point>1 2</point>')",
                "Action: finished(content='ok')",
            ]
        );
    }

    #[test]
    fn unknown_bare_calls_are_ignored() {
        let response = "foobar(x=1) wait()";
        assert_eq!(extract_actions(response), vec!["Action: wait()"]);
    }

    #[test]
    fn falls_back_to_whole_response() {
        assert_eq!(extract_actions("  nothing to do  "), vec!["Action: nothing to do"]);
    }
}
