//! Authenticated, folder-scoped access to one IMAP connection.
//!
//! A [`Session`] is the only owner of the underlying [`Mailstore`]. It tracks
//! whether the connection is authenticated and which folder is selected, and
//! refuses folder-scoped commands until both hold. A fatal error (transport
//! failure or an unparseable response) drops the connection; the next
//! [`Session::connect`] opens a fresh one.

use tracing::{debug, info, warn};

use crate::connection::{Account, Connector, Mailstore, Uid};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Authenticated,
}

pub struct Session<C: Connector> {
    connector: C,
    account: Account,
    store: Option<C::Store>,
    selected: Option<String>,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, account: Account) -> Self {
        Self {
            connector,
            account,
            store: None,
            selected: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.store.is_some() {
            ConnectionState::Authenticated
        } else {
            ConnectionState::Unauthenticated
        }
    }

    pub fn selected_folder(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Open and authenticate a connection unless one is already open.
    pub fn connect(&mut self) -> Result<()> {
        if self.store.is_some() {
            return Ok(());
        }
        let store = self.connector.connect(&self.account)?;
        info!(host = %self.account.host, user = %self.account.user, "IMAP session authenticated");
        self.store = Some(store);
        self.selected = None;
        Ok(())
    }

    /// Make `folder` the scope of subsequent folder-scoped commands.
    pub fn select(&mut self, folder: &str) -> Result<()> {
        if folder.is_empty() || folder.chars().any(char::is_control) {
            return Err(Error::FolderNotFound(folder.escape_debug().to_string()));
        }
        // A failed SELECT leaves no folder selected on the server.
        self.selected = None;
        match self.run(|store| store.select(folder)) {
            Ok(()) => {
                debug!(folder, "selected");
                self.selected = Some(folder.to_string());
                Ok(())
            }
            Err(Error::Rejected { .. }) => Err(Error::FolderNotFound(folder.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Release the connection. Safe to call when already disconnected.
    pub fn logout(&mut self) {
        self.selected = None;
        if let Some(mut store) = self.store.take() {
            match store.logout() {
                Ok(()) => info!(host = %self.account.host, "IMAP session closed"),
                Err(e) => debug!(error = %e, "LOGOUT failed, dropping connection"),
            }
        }
    }

    pub fn list_folders(&mut self) -> Result<Vec<String>> {
        self.run(|store| store.list_folders())
    }

    pub fn search(&mut self, query: &str) -> Result<Vec<Uid>> {
        self.run_in_folder(|store| store.uid_search(query))
    }

    pub fn fetch(&mut self, uid: Uid) -> Result<Vec<u8>> {
        self.run_in_folder(|store| store.uid_fetch_message(uid))
    }

    pub fn store_deleted(&mut self, uid_set: &str) -> Result<()> {
        self.run_in_folder(|store| store.uid_store_deleted(uid_set))
    }

    pub fn copy(&mut self, uid_set: &str, dest: &str) -> Result<()> {
        self.run_in_folder(|store| store.uid_copy(uid_set, dest))
    }

    pub fn expunge(&mut self) -> Result<()> {
        self.run_in_folder(|store| store.expunge())
    }

    fn run_in_folder<T>(&mut self, op: impl FnOnce(&mut C::Store) -> Result<T>) -> Result<T> {
        if self.store.is_some() && self.selected.is_none() {
            return Err(Error::NoFolderSelected);
        }
        self.run(op)
    }

    fn run<T>(&mut self, op: impl FnOnce(&mut C::Store) -> Result<T>) -> Result<T> {
        let store = self.store.as_mut().ok_or(Error::NotConnected)?;
        let result = op(store);
        if let Err(e) = &result {
            if e.is_fatal() {
                warn!(error = %e, "dropping IMAP connection after fatal error");
                self.store = None;
                self.selected = None;
            }
        }
        result
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.logout();
    }
}
