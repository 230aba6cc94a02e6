//! Console rendering of conversations and messages

use chrono::Utc;
use colored::{ColoredString, Colorize};

use aura::config::{APP_NAME, GREETING};
use aura::models::{Conversation, DeliveryStatus, Message, Role};
use aura::services::conversation::group_by_date;
use aura::services::markdown::{parse_message, InlineSpan, MessageBlock};

/// Sidebar listing: conversations under date headers, newest first.
pub fn conversation_list(conversations: &[&Conversation], active_id: Option<&str>) -> String {
    if conversations.is_empty() {
        return format!("{}\n", "No conversations yet.".dimmed());
    }

    let mut output = String::new();
    for (label, items) in group_by_date(conversations, &Utc::now()) {
        output.push_str(&format!("{}\n", label.cyan().bold()));
        for conv in items {
            let marker = if Some(conv.id.as_str()) == active_id {
                "*"
            } else {
                " "
            };
            output.push_str(&format!(
                "{} {:>8}  {}\n",
                marker,
                conv.id.bright_black(),
                conv.title
            ));
        }
    }
    output
}

pub fn conversation_header(conversation: &Conversation) -> String {
    format!(
        "{} {}\n",
        format!("── {} ──", conversation.title).yellow().bold(),
        conversation.id.bright_black()
    )
}

pub fn message(msg: &Message, markdown: bool) -> String {
    let label = match msg.role {
        Role::User => "You".green().bold(),
        Role::Assistant => APP_NAME.magenta().bold(),
    };
    let body = match (msg.role, markdown) {
        (Role::Assistant, true) => blocks(&parse_message(&msg.content), 0),
        _ => format!("{}\n", msg.content),
    };
    let status = match msg.status {
        DeliveryStatus::Delivered => String::new(),
        DeliveryStatus::Pending => format!("{}\n", "sending...".dimmed()),
        DeliveryStatus::Failed => format!("{}\n", "(not delivered)".red()),
    };
    format!("{}\n{}{}", label, body, status)
}

/// The assistant's opening line, rendered like any assistant message.
pub fn greeting(markdown: bool) -> String {
    message(&Message::assistant(GREETING), markdown)
}

pub fn messages(msgs: &[Message], markdown: bool) -> String {
    msgs.iter()
        .map(|m| message(m, markdown))
        .collect::<Vec<_>>()
        .join("\n")
}

fn blocks(items: &[MessageBlock], indent: usize) -> String {
    items.iter().map(|b| block(b, indent)).collect()
}

fn block(item: &MessageBlock, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match item {
        MessageBlock::Paragraph(s) => format!("{}{}\n", pad, spans(s)),
        MessageBlock::Heading { spans: s, .. } => {
            format!("{}{}\n", pad, spans(s).bold().underline())
        }
        MessageBlock::Code { code, .. } => code
            .lines()
            .map(|line| format!("{}  {}\n", pad, line.yellow()))
            .collect(),
        MessageBlock::Json(value) => {
            let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            pretty
                .lines()
                .map(|line| format!("{}  {}\n", pad, line.green()))
                .collect()
        }
        MessageBlock::Quote(inner) => blocks(inner, 0)
            .lines()
            .map(|line| format!("{}{} {}\n", pad, "│".bright_black(), line))
            .collect(),
        MessageBlock::List { start, items } => {
            let mut output = String::new();
            for (i, entry) in items.iter().enumerate() {
                let bullet = match start {
                    Some(n) => format!("{}.", n + i as u64),
                    None => "•".to_string(),
                };
                let body = blocks(entry, indent + bullet.chars().count() + 1);
                let body = body.trim_start();
                output.push_str(&format!("{}{} {}", pad, bullet, body));
                if !body.ends_with('\n') {
                    output.push('\n');
                }
            }
            output
        }
        MessageBlock::Rule => format!("{}{}\n", pad, "─".repeat(40).bright_black()),
    }
}

fn spans(items: &[InlineSpan]) -> ColoredString {
    let text: String = items.iter().map(span).collect();
    text.normal()
}

fn span(item: &InlineSpan) -> String {
    let mut styled = item.text.normal();
    if item.style.code {
        styled = styled.yellow();
    }
    if item.style.bold {
        styled = styled.bold();
    }
    if item.style.italic {
        styled = styled.italic();
    }
    if item.style.strikethrough {
        styled = styled.strikethrough();
    }
    match &item.link_url {
        Some(url) if *url != item.text => format!("{} ({})", styled.underline(), url.blue()),
        Some(_) => styled.underline().to_string(),
        None => styled.to_string(),
    }
}

pub fn error(err: &anyhow::Error) -> String {
    format!("{} {:#}", "error:".red().bold(), err)
}

pub fn notice(text: &str) -> String {
    text.bright_black().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn plain() {
        colored::control::set_override(false);
    }

    fn conv(id: &str, title: &str, age: Duration) -> Conversation {
        Conversation {
            id: id.to_string(),
            title: title.to_string(),
            updated_at: Utc::now() - age,
        }
    }

    #[test]
    fn test_conversation_list_marks_active() {
        plain();
        let a = conv("1", "Movie night", Duration::minutes(1));
        let b = conv("2", "Old stuff", Duration::days(40));
        let out = conversation_list(&[&a, &b], Some("2"));
        assert!(out.starts_with("Today\n"));
        assert!(out.contains("Older\n"));
        assert!(out.contains("*        2  Old stuff"));
        assert!(out.contains("         1  Movie night"));
    }

    #[test]
    fn test_empty_list() {
        plain();
        assert_eq!(conversation_list(&[], None), "No conversations yet.\n");
    }

    #[test]
    fn test_assistant_markdown() {
        plain();
        let msg = Message::assistant("# Picks\n\n1. **Up**\n2. Coco\n\n> enjoy");
        let out = message(&msg, true);
        assert_eq!(out, "Aura\nPicks\n1. Up\n2. Coco\n│ enjoy\n");
    }

    #[test]
    fn test_greeting_is_an_assistant_message() {
        plain();
        let out = greeting(true);
        assert!(out.starts_with("Aura\n"));
        assert!(out.contains("AURA, your emotion-aware movie companion."));
        assert!(out.contains("How are you feeling today?"));
        assert!(!out.contains("**"));
    }

    #[test]
    fn test_json_reply_is_pretty_printed() {
        plain();
        let msg = Message::assistant(r#"{"mood":"happy"}"#);
        let out = message(&msg, true);
        assert_eq!(out, "Aura\n  {\n    \"mood\": \"happy\"\n  }\n");
    }

    #[test]
    fn test_raw_and_failed_user_message() {
        plain();
        let mut msg = Message::pending_user("**not bold**");
        msg.status = DeliveryStatus::Failed;
        let out = message(&msg, true);
        assert_eq!(out, "You\n**not bold**\n(not delivered)\n");
    }

    #[test]
    fn test_link_shows_url() {
        plain();
        let msg = Message::assistant("see [docs](https://x.io)");
        assert_eq!(message(&msg, true), "Aura\nsee docs (https://x.io)\n");
    }
}
