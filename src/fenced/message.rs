use serde::Serialize;

use super::{FencedDecoder, SegmentKind};

const DEFAULT_CODE_LANGUAGE: &str = "plaintext";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageBlockKind {
    Text,
    Code,
}

/// A block of a complete message, for rendering history rather than a live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageBlock {
    pub kind: MessageBlockKind,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl MessageBlock {
    fn text(content: impl Into<String>) -> Self {
        Self {
            kind: MessageBlockKind::Text,
            content: content.into(),
            language: None,
        }
    }
}

/// Split a complete message into text and fenced code blocks.
///
/// Code is trimmed and labelled `plaintext` when the fence has no language.
/// Inline code stays part of the surrounding text. Whitespace-only text is
/// dropped; a message with nothing left is returned as a single text block.
#[must_use]
pub fn split_message(content: &str) -> Vec<MessageBlock> {
    let mut decoder = FencedDecoder::new();
    decoder.parse(content);

    let mut blocks = Vec::new();
    let mut text = String::new();
    for segment in decoder.finish() {
        match segment.kind {
            SegmentKind::Text => text.push_str(&segment.content),
            SegmentKind::InlineCode => {
                text.push('`');
                text.push_str(&segment.content);
                if segment.complete {
                    text.push('`');
                }
            }
            SegmentKind::Code => {
                flush_text(&mut text, &mut blocks);
                blocks.push(MessageBlock {
                    kind: MessageBlockKind::Code,
                    content: segment.content.trim().to_string(),
                    language: Some(
                        segment
                            .language
                            .clone()
                            .unwrap_or_else(|| DEFAULT_CODE_LANGUAGE.to_string()),
                    ),
                });
            }
        }
    }
    flush_text(&mut text, &mut blocks);

    if blocks.is_empty() {
        blocks.push(MessageBlock::text(content));
    }
    blocks
}

fn flush_text(text: &mut String, blocks: &mut Vec<MessageBlock>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        blocks.push(MessageBlock::text(trimmed));
    }
    text.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_and_code_blocks() {
        let blocks = split_message("Please fix:\n```python\nprint(1)\n```\nThanks `a`!");
        assert_eq!(
            blocks,
            vec![
                MessageBlock::text("Please fix:"),
                MessageBlock {
                    kind: MessageBlockKind::Code,
                    content: "print(1)".into(),
                    language: Some("python".into()),
                },
                MessageBlock::text("Thanks `a`!"),
            ]
        );
    }

    #[test]
    fn code_without_language_defaults_to_plaintext() {
        let blocks = split_message("```\n  x = 1  \n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].content, "x = 1");
        assert_eq!(blocks[0].language.as_deref(), Some("plaintext"));
    }

    #[test]
    fn whitespace_only_message_is_kept_whole() {
        assert_eq!(split_message("   "), vec![MessageBlock::text("   ")]);
    }

    #[test]
    fn unterminated_code_still_becomes_a_block() {
        let blocks = split_message("see\n```rs\nfn main() {}");
        assert_eq!(blocks[1].kind, MessageBlockKind::Code);
        assert_eq!(blocks[1].content, "fn main() {}");
    }
}
