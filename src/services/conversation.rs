use chrono::{DateTime, Datelike, Utc};

use crate::models::Conversation;

/// Truncate text to a short title for conversations.
pub fn truncate_title(text: &str) -> String {
    let first_line = text.trim().lines().next().unwrap_or_default().trim();
    if first_line.chars().count() > 50 {
        let boundary = first_line
            .char_indices()
            .take_while(|(i, _)| *i < 47)
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(47);
        format!("{}...", &first_line[..boundary])
    } else {
        first_line.to_string()
    }
}

/// Most recently updated first. Ties keep their current order.
pub fn sort_by_recent(conversations: &mut [&Conversation]) {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Classify a timestamp into a date group label relative to `now`.
pub fn date_group(dt: &DateTime<Utc>, now: &DateTime<Utc>) -> &'static str {
    let today = now.date_naive();
    let date = dt.date_naive();

    if date >= today {
        "Today"
    } else if Some(date) == today.pred_opt() {
        "Yesterday"
    } else if date.iso_week() == today.iso_week() {
        "This Week"
    } else {
        "Older"
    }
}

/// Group already-ordered conversations under their date label, keeping the
/// order of first appearance for the groups.
pub fn group_by_date<'a>(
    conversations: &[&'a Conversation],
    now: &DateTime<Utc>,
) -> Vec<(&'static str, Vec<&'a Conversation>)> {
    let mut groups: Vec<(&'static str, Vec<&'a Conversation>)> = Vec::new();
    for conv in conversations {
        let label = date_group(&conv.updated_at, now);
        match groups.iter_mut().find(|(l, _)| *l == label) {
            Some((_, items)) => items.push(conv),
            None => groups.push((label, vec![conv])),
        }
    }
    groups
}

/// Case-insensitive title search. An empty query matches everything.
pub fn filter_by_title<'a>(conversations: &[&'a Conversation], query: &str) -> Vec<&'a Conversation> {
    let query = query.trim().to_lowercase();
    conversations
        .iter()
        .copied()
        .filter(|c| query.is_empty() || c.title.to_lowercase().contains(&query))
        .collect()
}
