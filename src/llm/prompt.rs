use crate::llm::types::{ChatMessage, ContentPart, ImageUrl, MessageContent};

/// Computer-use prompt. `{instruction}` is replaced with the user's request.
pub const COMPUTER_USE_PROMPT: &str = r#"You are a GUI agent. You are given a task and your action history, with screenshots. You need to perform actions to complete the task.

## Output Format (STRICT - Use XML tags)
Wrap EACH action in <action></action> tags. Output actions only, NO explanations.

Single action:
<action>click(point='<point>512 384</point>')</action>

Multiple actions (same screen, no UI change between):
<action>click(point='<point>512 384</point>')</action>
<action>type(content='hello')</action>
<action>hotkey(key='enter')</action>

IMPORTANT: Only use multiple <action> tags when they can execute on CURRENT screen without waiting.

## Action Space
click(point='<point>x1 y1</point>')
left_double(point='<point>x1 y1</point>')
right_single(point='<point>x1 y1</point>')
drag(start_point='<point>x1 y1</point>', end_point='<point>x2 y2</point>')
hotkey(key='ctrl c')
type(content='xxx')
scroll(point='<point>x1 y1</point>', direction='down or up or right or left')
wait()
finished(content='xxx')

## User Instruction
{instruction}
"#;

pub const SCREENSHOT_LABEL: &str = "[Current Screenshot]";

pub fn build_prompt(instruction: &str) -> String {
    COMPUTER_USE_PROMPT.replace("{instruction}", instruction)
}

/// Two user turns: the prompt, then the screenshot as a data URI.
pub fn build_conversation(instruction: &str, image_base64: &str, image_format: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::user(build_prompt(instruction)),
        ChatMessage::user(MessageContent::Parts(vec![
            ContentPart::Text {
                text: SCREENSHOT_LABEL.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/{image_format};base64,{image_base64}"),
                },
            },
        ])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_has_prompt_then_image() {
        let messages = build_conversation("open the settings", "QUJD", "jpeg");
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().all(|m| m.role == "user"));

        match &messages[0].content {
            MessageContent::Text(text) => {
                assert!(text.ends_with("## User Instruction\nopen the settings\n"));
                assert!(!text.contains("{instruction}"));
            }
            other => panic!("expected text prompt, got {other:?}"),
        }

        let json = serde_json::to_value(&messages[1]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "[Current Screenshot]");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/jpeg;base64,QUJD");
    }
}
