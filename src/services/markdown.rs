//! Message content as a tree of display blocks.
//!
//! Assistant replies are Markdown. Some replies are structured data instead
//! (a bare JSON object or array, or a fenced `json` block); those become
//! [`MessageBlock::Json`] so the front end can pretty-print them.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum MessageBlock {
    Paragraph(Vec<InlineSpan>),
    Heading {
        level: u8,
        spans: Vec<InlineSpan>,
    },
    Code {
        language: Option<String>,
        code: String,
    },
    Json(Value),
    Quote(Vec<MessageBlock>),
    List {
        /// First number of an ordered list.
        start: Option<u64>,
        items: Vec<Vec<MessageBlock>>,
    },
    Rule,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub text: String,
    pub style: Style,
    pub link_url: Option<String>,
}

/// Parse message content, treating whole-message JSON as data.
pub fn parse_message(content: &str) -> Vec<MessageBlock> {
    match detect_json(content) {
        Some(value) => vec![MessageBlock::Json(value)],
        None => parse_markdown(content),
    }
}

pub fn parse_markdown(input: &str) -> Vec<MessageBlock> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut builder = Builder::default();
    for event in Parser::new_ext(input, options) {
        builder.event(event);
    }
    builder.finish()
}

/// A JSON object or array spanning the whole text.
pub fn detect_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .filter(|v| v.is_object() || v.is_array())
}

/// Concatenated text of `spans` without formatting.
pub fn plain_text(spans: &[InlineSpan]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

enum Frame {
    Quote(Vec<MessageBlock>),
    List {
        start: Option<u64>,
        items: Vec<Vec<MessageBlock>>,
    },
    Item(Vec<MessageBlock>),
}

#[derive(Default)]
struct Builder {
    root: Vec<MessageBlock>,
    frames: Vec<Frame>,
    spans: Vec<InlineSpan>,
    style: Style,
    link_url: Option<String>,
    heading: Option<u8>,
    code: Option<(Option<String>, String)>,
}

impl Builder {
    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.code {
                Some((_, buf)) => buf.push_str(&text),
                None => self.span(text, self.style),
            },
            Event::Code(code) => {
                let style = Style {
                    code: true,
                    ..self.style
                };
                self.span(code, style);
            }
            Event::SoftBreak => self.span(" ".into(), self.style),
            Event::HardBreak => self.span("\n".into(), self.style),
            Event::Rule => {
                self.flush();
                self.emit(MessageBlock::Rule);
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Heading { level, .. } => {
                self.flush();
                self.heading = Some(heading_level(level));
            }
            Tag::Strong => self.style.bold = true,
            Tag::Emphasis => self.style.italic = true,
            Tag::Strikethrough => self.style.strikethrough = true,
            Tag::Link { dest_url, .. } => self.link_url = Some(dest_url.to_string()),
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) => {
                        Some(lang.trim().to_string()).filter(|l| !l.is_empty())
                    }
                    CodeBlockKind::Indented => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.frames.push(Frame::Quote(Vec::new()));
            }
            Tag::List(start) => {
                self.flush();
                self.frames.push(Frame::List {
                    start,
                    items: Vec::new(),
                });
            }
            Tag::Item => self.frames.push(Frame::Item(Vec::new())),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                if let Some(level) = self.heading.take() {
                    let spans = std::mem::take(&mut self.spans);
                    self.emit(MessageBlock::Heading { level, spans });
                }
            }
            TagEnd::Strong => self.style.bold = false,
            TagEnd::Emphasis => self.style.italic = false,
            TagEnd::Strikethrough => self.style.strikethrough = false,
            TagEnd::Link => self.link_url = None,
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code.take() {
                    self.emit(code_block(language, code));
                }
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                if let Some(Frame::Quote(blocks)) = self.frames.pop() {
                    self.emit(MessageBlock::Quote(blocks));
                }
            }
            TagEnd::Item => {
                // Tight list items carry bare text without a paragraph.
                self.flush();
                if let Some(Frame::Item(blocks)) = self.frames.pop() {
                    if let Some(Frame::List { items, .. }) = self.frames.last_mut() {
                        items.push(blocks);
                    }
                }
            }
            TagEnd::List(_) => {
                self.flush();
                if let Some(Frame::List { start, items }) = self.frames.pop() {
                    self.emit(MessageBlock::List { start, items });
                }
            }
            _ => {}
        }
    }

    fn span(&mut self, text: CowStr, style: Style) {
        self.spans.push(InlineSpan {
            text: text.to_string(),
            style,
            link_url: self.link_url.clone(),
        });
    }

    fn flush(&mut self) {
        if self.spans.is_empty() || self.heading.is_some() {
            return;
        }
        let spans = std::mem::take(&mut self.spans);
        self.emit(MessageBlock::Paragraph(spans));
    }

    fn emit(&mut self, block: MessageBlock) {
        match self.frames.last_mut() {
            Some(Frame::Quote(blocks)) | Some(Frame::Item(blocks)) => blocks.push(block),
            Some(Frame::List { items, .. }) => items.push(vec![block]),
            None => self.root.push(block),
        }
    }

    fn finish(mut self) -> Vec<MessageBlock> {
        self.flush();
        self.root
    }
}

fn code_block(language: Option<String>, code: String) -> MessageBlock {
    let code = code.trim_end_matches('\n').to_string();
    if language.as_deref().is_some_and(|l| l.eq_ignore_ascii_case("json")) {
        if let Some(value) = detect_json(&code) {
            return MessageBlock::Json(value);
        }
    }
    MessageBlock::Code { language, code }
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        let blocks = parse_message("Hello world");
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            MessageBlock::Paragraph(spans) => {
                assert_eq!(plain_text(spans), "Hello world");
                assert_eq!(spans[0].style, Style::default());
            }
            other => panic!("Expected Paragraph, got {:?}", other),
        }
    }

    #[test]
    fn test_inline_styles() {
        let blocks = parse_markdown("**bold**, *italic* and `code` with [a link](https://x.io)");
        let MessageBlock::Paragraph(spans) = &blocks[0] else {
            panic!("Expected Paragraph");
        };
        assert!(spans.iter().any(|s| s.style.bold && s.text == "bold"));
        assert!(spans.iter().any(|s| s.style.italic && s.text == "italic"));
        assert!(spans.iter().any(|s| s.style.code && s.text == "code"));
        assert!(spans
            .iter()
            .any(|s| s.text == "a link" && s.link_url.as_deref() == Some("https://x.io")));
    }

    #[test]
    fn test_heading_and_rule() {
        let blocks = parse_markdown("# Picks\n\nabove\n\n---\n\nbelow");
        assert!(matches!(&blocks[0], MessageBlock::Heading { level: 1, spans } if plain_text(spans) == "Picks"));
        assert!(blocks.contains(&MessageBlock::Rule));
        assert_eq!(blocks.len(), 4);
    }

    #[test]
    fn test_code_block() {
        let blocks = parse_markdown("```rust\nfn main() {}\n```");
        assert_eq!(
            blocks,
            vec![MessageBlock::Code {
                language: Some("rust".to_string()),
                code: "fn main() {}".to_string(),
            }]
        );
    }

    #[test]
    fn test_lists() {
        let blocks = parse_markdown("1. one\n2. two\n   - nested\n3. three");
        let MessageBlock::List { start, items } = &blocks[0] else {
            panic!("Expected List, got {:?}", blocks);
        };
        assert_eq!(*start, Some(1));
        assert_eq!(items.len(), 3);
        assert!(items[1]
            .iter()
            .any(|b| matches!(b, MessageBlock::List { start: None, items } if items.len() == 1)));

        let blocks = parse_markdown("- a\n- b");
        assert!(matches!(&blocks[0], MessageBlock::List { start: None, items } if items.len() == 2));
    }

    #[test]
    fn test_blockquote() {
        let blocks = parse_markdown("> quoted text");
        let MessageBlock::Quote(inner) = &blocks[0] else {
            panic!("Expected Quote");
        };
        assert!(matches!(&inner[0], MessageBlock::Paragraph(spans) if plain_text(spans) == "quoted text"));
    }

    #[test]
    fn test_whole_message_json() {
        let blocks = parse_message("  {\"mood\": \"happy\", \"movies\": [\"Up\"]}\n");
        assert_eq!(
            blocks,
            vec![MessageBlock::Json(serde_json::json!({
                "mood": "happy",
                "movies": ["Up"]
            }))]
        );
    }

    #[test]
    fn test_json_fence() {
        let blocks = parse_message("Here you go:\n\n```json\n[1, 2]\n```");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], MessageBlock::Json(serde_json::json!([1, 2])));

        // Invalid JSON stays a code block.
        let blocks = parse_message("```json\n{oops\n```");
        assert!(matches!(&blocks[0], MessageBlock::Code { .. }));
    }

    #[test]
    fn test_not_json() {
        assert_eq!(detect_json("42"), None);
        assert_eq!(detect_json("{not json}"), None);
        assert_eq!(detect_json("[x] done"), None);
    }
}
