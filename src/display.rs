use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};

use crate::catalog::MessageSummary;

/// Truncate a string to at most `max` characters, appending "..." if truncated.
/// Safe for multi-byte UTF-8.
pub fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Drop the numeric zone suffix, e.g. `Mon, 6 Jan 2025 10:00:00 +0000`.
fn short_date(date: &str) -> &str {
    match date.find(" +").or_else(|| date.find(" -")) {
        Some(pos) => &date[..pos],
        None => date,
    }
}

pub fn messages_table(messages: &[MessageSummary]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["UID", "From", "Subject", "Date", "Snippet"]);

    for msg in messages {
        table.add_row(vec![
            Cell::new(msg.uid),
            Cell::new(truncate_str(&msg.from, 40)),
            Cell::new(truncate_str(&msg.subject, 60)),
            Cell::new(short_date(&msg.date)),
            Cell::new(truncate_str(&msg.snippet.replace(['\r', '\n'], " "), 80)),
        ]);
    }
    table
}

pub fn display_messages(messages: &[MessageSummary]) {
    if messages.is_empty() {
        println!("No messages found.");
        return;
    }
    println!("{}", messages_table(messages));
    println!("{} message(s)", messages.len());
}

pub fn display_folders(folders: &[String]) {
    if folders.is_empty() {
        println!("No folders found.");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Folder"]);
    for name in folders {
        table.add_row(vec![name.as_str()]);
    }
    println!("{table}");
}
