// Text entry goes through the clipboard and the paste shortcut, which handles
// CJK and other non-ASCII text the same way as Latin text.

/// Characters of typed content echoed into the step log.
pub const STEP_PREVIEW_CHARS: usize = 50;

/// Content asks for a trailing Enter when it ends in a real newline or in the
/// two characters `\` `n`, which models often emit instead.
pub fn wants_enter(content: &str) -> bool {
    content.ends_with('\n') || content.ends_with("\\n")
}

/// First [`STEP_PREVIEW_CHARS`] characters of `content`, on a char boundary.
pub fn preview(content: &str) -> &str {
    match content.char_indices().nth(STEP_PREVIEW_CHARS) {
        Some((end, _)) => &content[..end],
        None => content,
    }
}

/// Returns true if the text contains CJK (Chinese/Japanese/Korean) characters.
pub fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c)
        || ('\u{3040}'..='\u{309f}').contains(&c)
        || ('\u{30a0}'..='\u{30ff}').contains(&c))
}
