//! Single entry point composing the session, catalog and mutators.

use std::path::PathBuf;

use tracing::debug;

use crate::catalog::{self, MessageSummary};
use crate::config::Settings;
use crate::connection::{Account, Connector, ImapConnector, Uid};
use crate::delete::{self, BatchProgress, BatchResult};
use crate::error::{Error, Result};
use crate::query::FilterCriteria;
use crate::session::Session;

/// Outbound delivery, provided by the caller. The mailbox engine never uses it.
pub trait MessageSender {
    fn send(&self, to: &str, subject: &str, body: &str, attachments: &[PathBuf]) -> Result<String>;
}

pub struct Manager<C: Connector = ImapConnector> {
    session: Session<C>,
    batch_size: usize,
    sender: Option<Box<dyn MessageSender>>,
}

impl Manager<ImapConnector> {
    pub fn from_settings(settings: &Settings) -> Self {
        Manager::new(ImapConnector, settings.imap_account()).with_batch_size(settings.batch_size)
    }
}

impl<C: Connector> Manager<C> {
    /// No connection is made until the first command.
    pub fn new(connector: C, account: Account) -> Self {
        Self {
            session: Session::new(connector, account),
            batch_size: delete::DEFAULT_BATCH_SIZE,
            sender: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_sender(mut self, sender: impl MessageSender + 'static) -> Self {
        self.sender = Some(Box::new(sender));
        self
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    fn connected(&mut self) -> Result<&mut Session<C>> {
        self.session.connect()?;
        Ok(&mut self.session)
    }

    pub fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachments: &[PathBuf],
    ) -> Result<String> {
        let sender = self.sender.as_ref().ok_or(Error::SenderUnavailable)?;
        sender.send(to, subject, body, attachments)
    }

    pub fn list_folders(&mut self) -> Result<Vec<String>> {
        catalog::list_folders(self.connected()?)
    }

    pub fn get_recent_emails(&mut self, folder: &str, limit: usize) -> Result<Vec<MessageSummary>> {
        catalog::fetch_recent(self.connected()?, folder, limit)
    }

    pub fn delete_email(&mut self, uid: Uid, folder: &str) -> Result<String> {
        delete::delete_one(self.connected()?, uid, folder)?;
        Ok(format!("Email {uid} deleted"))
    }

    pub fn bulk_delete(
        &mut self,
        days_old: Option<u32>,
        from_sender: Option<&str>,
        folder: &str,
        batch_size: Option<usize>,
    ) -> Result<BatchResult> {
        self.bulk_delete_with_progress(days_old, from_sender, folder, batch_size, |_| {})
    }

    /// Like [`Manager::bulk_delete`], calling `on_progress` after each batch.
    pub fn bulk_delete_with_progress(
        &mut self,
        days_old: Option<u32>,
        from_sender: Option<&str>,
        folder: &str,
        batch_size: Option<usize>,
        on_progress: impl FnMut(&BatchProgress),
    ) -> Result<BatchResult> {
        let criteria = FilterCriteria {
            max_age_days: days_old,
            from_sender: from_sender.map(str::to_string),
        };
        // Reject before connecting.
        if criteria.is_empty() {
            return Err(Error::Criteria);
        }
        let batch_size = batch_size.unwrap_or(self.batch_size);
        debug!(?criteria, folder, batch_size, "bulk delete requested");
        delete::bulk_delete(self.connected()?, &criteria, folder, batch_size, on_progress)
    }

    pub fn move_email(&mut self, uid: Uid, target_folder: &str, source_folder: &str) -> Result<String> {
        delete::move_one(self.connected()?, uid, target_folder, source_folder)?;
        Ok(format!("Email {uid} moved to {target_folder}"))
    }

    /// Log out. A later command reconnects.
    pub fn close(&mut self) {
        self.session.logout();
    }
}
