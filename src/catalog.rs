use mailparse::{MailHeaderMap, MailParseError, ParsedMail};
use serde::Serialize;
use tracing::{debug, warn};

use crate::connection::{Connector, Uid};
use crate::error::{Error, Result};
use crate::session::Session;

/// Longest snippet, in characters.
pub const SNIPPET_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSummary {
    pub uid: Uid,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub snippet: String,
}

/// Folder names on the server. A NO/BAD answer to LIST yields an empty list.
pub fn list_folders<C: Connector>(session: &mut Session<C>) -> Result<Vec<String>> {
    match session.list_folders() {
        Ok(folders) => Ok(folders),
        Err(Error::Rejected { reason, .. }) => {
            warn!(%reason, "folder listing refused, returning no folders");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// Summaries of the `limit` most recently arrived messages in `folder`,
/// newest first.
///
/// Messages the server refuses to return, or that cannot be parsed, are
/// skipped. A fatal error fails the whole call; the session has already
/// dropped the connection by then.
pub fn fetch_recent<C: Connector>(
    session: &mut Session<C>,
    folder: &str,
    limit: usize,
) -> Result<Vec<MessageSummary>> {
    session.select(folder)?;
    let uids = session.search("ALL")?;
    let newest = &uids[uids.len().saturating_sub(limit)..];
    debug!(folder, total = uids.len(), fetching = newest.len(), "listing recent messages");

    let mut summaries = Vec::with_capacity(newest.len());
    for &uid in newest.iter().rev() {
        let raw = match session.fetch(uid) {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(uid, error = %e, "skipping message that could not be fetched");
                continue;
            }
        };
        match parse_summary(uid, &raw) {
            Ok(summary) => summaries.push(summary),
            Err(e) => warn!(uid, error = %e, "skipping message that could not be parsed"),
        }
    }
    Ok(summaries)
}

/// Extract the displayable fields of a raw RFC 822 message.
pub fn parse_summary(uid: Uid, raw: &[u8]) -> std::result::Result<MessageSummary, MailParseError> {
    let parsed = mailparse::parse_mail(raw)?;
    let header = |name: &str| parsed.headers.get_first_value(name).unwrap_or_default();

    Ok(MessageSummary {
        uid,
        // get_first_value decodes RFC 2047 encoded words.
        subject: header("Subject"),
        from: header("From"),
        date: header("Date"),
        snippet: snippet(&body_text(&parsed).unwrap_or_default()),
    })
}

/// First text/plain part, else the first text/html part rendered as text.
fn body_text(mail: &ParsedMail) -> Option<String> {
    if let Some(plain) = find_part(mail, "text/plain") {
        return plain.get_body().ok();
    }
    let html = find_part(mail, "text/html")?.get_body().ok()?;
    html2text::from_read(html.as_bytes(), 100).ok()
}

fn find_part<'a>(mail: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if mail.subparts.is_empty() {
        return mail
            .ctype
            .mimetype
            .eq_ignore_ascii_case(mimetype)
            .then_some(mail);
    }
    mail.subparts.iter().find_map(|part| find_part(part, mimetype))
}

/// Trim, cap at [`SNIPPET_LEN`] characters, and trim again.
pub fn snippet(text: &str) -> String {
    let capped: String = text.trim().chars().take(SNIPPET_LEN).collect();
    capped.trim_end().to_string()
}
