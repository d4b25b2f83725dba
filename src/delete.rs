//! Destructive operations: single delete, batched bulk delete, and move.

use std::fmt;

use tracing::{info, warn};

use crate::connection::{Connector, Uid};
use crate::error::{Error, Result};
use crate::query::{self, FilterCriteria};
use crate::session::Session;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// A batch whose flag-and-expunge did not complete.
#[derive(Debug)]
pub struct BatchFailure {
    /// 1-based batch number.
    pub batch: usize,
    pub uids: Vec<Uid>,
    /// STORE succeeded and only EXPUNGE failed. These messages stay flagged
    /// `\Deleted`; the next successful EXPUNGE removes them and they are
    /// then counted in `total_processed`.
    pub flagged: bool,
    pub error: Error,
}

/// Outcome of a bulk delete, accumulated over all batches.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub total_matched: usize,
    pub total_processed: usize,
    pub per_batch_errors: Vec<BatchFailure>,
}

impl BatchResult {
    /// Some batches failed after others had already been committed.
    pub fn is_partial(&self) -> bool {
        !self.per_batch_errors.is_empty()
    }
}

impl fmt::Display for BatchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_matched == 0 {
            return write!(f, "No emails found matching criteria.");
        }
        if !self.is_partial() {
            return write!(f, "Deleted {} emails matching criteria", self.total_processed);
        }
        write!(
            f,
            "Deleted {} of {} emails matching criteria; {} batch(es) failed",
            self.total_processed,
            self.total_matched,
            self.per_batch_errors.len()
        )
    }
}

/// Reported after each batch of a bulk delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch: usize,
    pub batches: usize,
    pub processed: usize,
    pub total: usize,
}

/// Flag one message deleted and expunge it right away.
pub fn delete_one<C: Connector>(session: &mut Session<C>, uid: Uid, folder: &str) -> Result<()> {
    session.select(folder)?;
    session.store_deleted(&uid.to_string())?;
    session.expunge()?;
    info!(uid, folder, "deleted message");
    Ok(())
}

/// Delete every message in `folder` matching `criteria`, `batch_size` UIDs
/// per STORE + EXPUNGE round trip. A batch is cut shorter when its UID set
/// would not fit on one command line.
///
/// Empty criteria and a zero batch size are rejected before any command is
/// sent. A rejected batch is recorded and the next one attempted; a fatal
/// error is recorded and ends the run. Committed batches stay deleted.
pub fn bulk_delete<C: Connector>(
    session: &mut Session<C>,
    criteria: &FilterCriteria,
    folder: &str,
    batch_size: usize,
    mut on_progress: impl FnMut(&BatchProgress),
) -> Result<BatchResult> {
    let search = query::build(criteria)?;
    if batch_size == 0 {
        return Err(Error::InvalidBatchSize);
    }

    session.select(folder)?;
    let mut uids = session.search(&search)?;
    uids.sort_unstable();
    uids.dedup();

    let mut result = BatchResult {
        total_matched: uids.len(),
        ..BatchResult::default()
    };
    if uids.is_empty() {
        info!(folder, %search, "no messages match");
        return Ok(result);
    }

    let batches = query::uid_batches(&uids, batch_size);
    let count = batches.len();
    info!(folder, %search, matched = uids.len(), batches = count, "bulk delete");

    // Flagged but not yet expunged, carried over from failed expunges.
    let mut flagged = 0;
    for (i, (batch, set)) in batches.iter().enumerate() {
        let (stored, outcome) = match session.store_deleted(set) {
            Ok(()) => {
                flagged += batch.len();
                (true, session.expunge())
            }
            Err(e) => (false, Err(e)),
        };
        match outcome {
            Ok(()) => {
                result.total_processed += flagged;
                flagged = 0;
            }
            Err(error) => {
                let fatal = error.is_fatal();
                warn!(batch = i + 1, batches = count, %error, "batch failed");
                result.per_batch_errors.push(BatchFailure {
                    batch: i + 1,
                    uids: batch.to_vec(),
                    flagged: stored,
                    error,
                });
                if fatal {
                    break;
                }
            }
        }
        on_progress(&BatchProgress {
            batch: i + 1,
            batches: count,
            processed: result.total_processed,
            total: result.total_matched,
        });
    }

    Ok(result)
}

/// Copy one message to `target` and only then delete it from `source`.
///
/// If the copy fails the original is left untouched.
pub fn move_one<C: Connector>(
    session: &mut Session<C>,
    uid: Uid,
    target: &str,
    source: &str,
) -> Result<()> {
    session.select(source)?;
    let set = uid.to_string();
    session.copy(&set, target)?;
    session.store_deleted(&set)?;
    session.expunge()?;
    info!(uid, source, target, "moved message");
    Ok(())
}
