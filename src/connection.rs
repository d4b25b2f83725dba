use imap::Session;
use std::net::TcpStream;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

pub type PlainSession = Session<TcpStream>;
pub type TlsSession = Session<native_tls::TlsStream<TcpStream>>;

/// Server-assigned, folder-scoped message identifier.
pub type Uid = u32;

/// Where and as whom to log in.
#[derive(Clone)]
pub struct Account {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub user: String,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// The IMAP primitives the session engine is built on.
///
/// Implementations issue exactly one protocol command per call. Mailbox
/// arguments are passed verbatim; quoting is the implementation's job.
pub trait Mailstore {
    fn list_folders(&mut self) -> Result<Vec<String>>;
    fn select(&mut self, folder: &str) -> Result<()>;
    /// UID SEARCH. The returned UIDs are in ascending order.
    fn uid_search(&mut self, query: &str) -> Result<Vec<Uid>>;
    /// Fetch the full RFC 822 message without setting `\Seen`.
    fn uid_fetch_message(&mut self, uid: Uid) -> Result<Vec<u8>>;
    fn uid_store_deleted(&mut self, uid_set: &str) -> Result<()>;
    fn uid_copy(&mut self, uid_set: &str, dest: &str) -> Result<()>;
    fn expunge(&mut self) -> Result<()>;
    fn logout(&mut self) -> Result<()>;
}

/// Opens authenticated [`Mailstore`] connections.
pub trait Connector {
    type Store: Mailstore;

    fn connect(&self, account: &Account) -> Result<Self::Store>;
}

pub enum ImapSession {
    Plain(PlainSession),
    Tls(TlsSession),
}

impl Mailstore for ImapSession {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let names = match self {
            ImapSession::Plain(s) => s.list(Some(""), Some("*")),
            ImapSession::Tls(s) => s.list(Some(""), Some("*")),
        }
        .map_err(|e| Error::from_imap("LIST", e))?;
        Ok(names.iter().map(|n| n.name().to_string()).collect())
    }

    fn select(&mut self, folder: &str) -> Result<()> {
        match self {
            ImapSession::Plain(s) => s.select(folder),
            ImapSession::Tls(s) => s.select(folder),
        }
        .map_err(|e| Error::from_imap("SELECT", e))?;
        Ok(())
    }

    fn uid_search(&mut self, query: &str) -> Result<Vec<Uid>> {
        let found = match self {
            ImapSession::Plain(s) => s.uid_search(query),
            ImapSession::Tls(s) => s.uid_search(query),
        }
        .map_err(|e| Error::from_imap("UID SEARCH", e))?;
        let mut uids: Vec<Uid> = found.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn uid_fetch_message(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let fetches = match self {
            ImapSession::Plain(s) => s.uid_fetch(&uid.to_string(), "BODY.PEEK[]"),
            ImapSession::Tls(s) => s.uid_fetch(&uid.to_string(), "BODY.PEEK[]"),
        }
        .map_err(|e| Error::from_imap("UID FETCH", e))?;
        fetches
            .iter()
            .find(|f| f.uid == Some(uid))
            .and_then(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Rejected {
                command: "UID FETCH",
                reason: format!("no body returned for UID {uid}"),
            })
    }

    fn uid_store_deleted(&mut self, uid_set: &str) -> Result<()> {
        match self {
            ImapSession::Plain(s) => s.uid_store(uid_set, "+FLAGS.SILENT (\\Deleted)").map(drop),
            ImapSession::Tls(s) => s.uid_store(uid_set, "+FLAGS.SILENT (\\Deleted)").map(drop),
        }
        .map_err(|e| Error::from_imap("UID STORE", e))
    }

    fn uid_copy(&mut self, uid_set: &str, dest: &str) -> Result<()> {
        match self {
            ImapSession::Plain(s) => s.uid_copy(uid_set, dest),
            ImapSession::Tls(s) => s.uid_copy(uid_set, dest),
        }
        .map_err(|e| Error::from_imap("UID COPY", e))
    }

    fn expunge(&mut self) -> Result<()> {
        match self {
            ImapSession::Plain(s) => s.expunge().map(drop),
            ImapSession::Tls(s) => s.expunge().map(drop),
        }
        .map_err(|e| Error::from_imap("EXPUNGE", e))
    }

    fn logout(&mut self) -> Result<()> {
        match self {
            ImapSession::Plain(s) => s.logout(),
            ImapSession::Tls(s) => s.logout(),
        }
        .map_err(|e| Error::from_imap("LOGOUT", e))
    }
}

fn is_loopback(host: &str) -> bool {
    host == "127.0.0.1" || host == "::1" || host == "localhost"
}

fn login_error(user: &str, err: imap::error::Error) -> Error {
    match Error::from_imap("LOGIN", err) {
        Error::Rejected { reason, .. } => Error::Authentication {
            user: user.to_string(),
            reason,
        },
        other => other,
    }
}

/// Connects over TCP, with TLS unless the account disables it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImapConnector;

impl Connector for ImapConnector {
    type Store = ImapSession;

    fn connect(&self, account: &Account) -> Result<ImapSession> {
        connect(account)
    }
}

pub fn connect(account: &Account) -> Result<ImapSession> {
    let Account {
        host,
        port,
        tls,
        user,
        password,
    } = account;
    let port = *port;

    if !tls && !is_loopback(host) {
        warn!(%host, "connecting without TLS, credentials will be sent in plaintext");
    }
    debug!(%host, port, tls, %user, "opening IMAP connection");

    if *tls {
        let tls_connector = native_tls::TlsConnector::builder()
            .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
            .build()
            .map_err(|e| Error::Transport(format!("failed to create TLS connector: {e}")))?;
        let client = imap::connect((host.as_str(), port), host, &tls_connector)
            .map_err(|e| Error::from_imap("CONNECT", e))?;
        let session = client
            .login(user, password.as_str())
            .map_err(|(e, _)| login_error(user, e))?;
        Ok(ImapSession::Tls(session))
    } else {
        let tcp = TcpStream::connect((host.as_str(), port))
            .map_err(|e| Error::Transport(format!("failed to connect to {host}:{port}: {e}")))?;
        let client = imap::Client::new(tcp);
        let session = client
            .login(user, password.as_str())
            .map_err(|(e, _)| login_error(user, e))?;
        Ok(ImapSession::Plain(session))
    }
}
