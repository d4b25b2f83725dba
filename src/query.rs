use chrono::{Days, Local, NaiveDate};

use crate::connection::Uid;
use crate::error::{Error, Result};

/// Filter for destructive operations. At least one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Match messages whose internal date is older than this many days.
    pub max_age_days: Option<u32>,
    /// Match messages whose From header contains this string.
    pub from_sender: Option<String>,
}

impl FilterCriteria {
    /// True when no predicate would narrow the search. A sender that is blank
    /// once control characters are stripped counts as absent, since
    /// `FROM ""` matches every message.
    pub fn is_empty(&self) -> bool {
        self.max_age_days.is_none() && self.sender().is_none()
    }

    /// The sender filter as it will be sent, if anything is left of it.
    pub fn sender(&self) -> Option<String> {
        let clean = sanitize(self.from_sender.as_deref()?);
        let clean = clean.trim();
        (!clean.is_empty()).then(|| clean.to_string())
    }
}

/// Longest UID set put on one command line. RFC 3501 only guarantees
/// servers accept 8000 octets per line.
pub const MAX_UID_SET_LENGTH: usize = 4000;

/// Strip CRLF and control chars to prevent IMAP command injection.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

/// Escape a string for use inside IMAP quoted strings (RFC 9051 §4.3).
pub fn imap_quote(s: &str) -> String {
    let clean = sanitize(s);
    let escaped = clean.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// IMAP `date` grammar: `DD-Mon-YYYY`.
fn format_imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// Build the SEARCH expression for `criteria`, using the local date as "now".
pub fn build(criteria: &FilterCriteria) -> Result<String> {
    build_at(criteria, Local::now().date_naive())
}

/// Build the SEARCH expression relative to `today`.
///
/// Predicates are joined with a space, which IMAP treats as AND.
pub fn build_at(criteria: &FilterCriteria, today: NaiveDate) -> Result<String> {
    if criteria.is_empty() {
        return Err(Error::Criteria);
    }

    let mut parts = Vec::new();

    if let Some(days) = criteria.max_age_days {
        let cutoff = today
            .checked_sub_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        parts.push(format!("BEFORE {}", format_imap_date(cutoff)));
    }
    if let Some(from) = criteria.sender() {
        parts.push(format!("FROM {}", imap_quote(&from)));
    }

    Ok(parts.join(" "))
}

/// Render UIDs as an IMAP sequence set, compressing consecutive runs into
/// `start:end` ranges.
pub fn uid_set(uids: &[Uid]) -> String {
    let mut sorted: Vec<Uid> = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let Some((&first, rest)) = sorted.split_first() else {
        return String::new();
    };

    let mut ranges: Vec<(Uid, Uid)> = Vec::new();
    let (mut start, mut end) = (first, first);
    for &uid in rest {
        if uid == end + 1 {
            end = uid;
        } else {
            ranges.push((start, end));
            start = uid;
            end = uid;
        }
    }
    ranges.push((start, end));

    ranges
        .iter()
        .map(|&(s, e)| if s == e { s.to_string() } else { format!("{s}:{e}") })
        .collect::<Vec<_>>()
        .join(",")
}

/// Split sorted `uids` into consecutive batches of at most `batch_size`
/// UIDs, each paired with its rendered set. A batch is cut short only when
/// its set would exceed [`MAX_UID_SET_LENGTH`].
pub fn uid_batches(uids: &[Uid], batch_size: usize) -> Vec<(&[Uid], String)> {
    let batch_size = batch_size.max(1);
    let fits = |batch: &[Uid]| uid_set(batch).len() <= MAX_UID_SET_LENGTH;

    let mut batches = Vec::new();
    let mut rest = uids;
    while !rest.is_empty() {
        let max = rest.len().min(batch_size);
        let len = if fits(&rest[..max]) {
            max
        } else {
            // Set length only grows with the prefix, so bisect for the
            // longest prefix that still fits. A single UID always does.
            let (mut lo, mut hi) = (1, max);
            while lo < hi {
                let mid = (lo + hi).div_ceil(2);
                if fits(&rest[..mid]) {
                    lo = mid;
                } else {
                    hi = mid - 1;
                }
            }
            lo
        };
        let (batch, tail) = rest.split_at(len);
        batches.push((batch, uid_set(batch)));
        rest = tail;
    }
    batches
}
