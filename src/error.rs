use thiserror::Error;

/// Errors raised by the mailbox session and the operations built on it.
#[derive(Debug, Error)]
pub enum Error {
    /// The server rejected the login.
    #[error("IMAP login failed for {user}: {reason}")]
    Authentication { user: String, reason: String },

    /// Network or TLS failure. The connection is unusable afterwards.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server does not know the folder, or the name is not selectable.
    #[error("Folder '{0}' does not exist")]
    FolderNotFound(String),

    /// A mutation was requested with no filter at all.
    #[error("No criteria specified for bulk delete")]
    Criteria,

    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    /// NO or BAD response for a command.
    #[error("{command} rejected by server: {reason}")]
    Rejected {
        command: &'static str,
        reason: String,
    },

    /// The server sent something the client could not parse.
    #[error("protocol error during {command}: {reason}")]
    Protocol {
        command: &'static str,
        reason: String,
    },

    #[error("not connected to the IMAP server")]
    NotConnected,

    #[error("no folder selected")]
    NoFolderSelected,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("no message sender configured")]
    SenderUnavailable,
}

impl Error {
    /// Whether the connection must be dropped after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Protocol { .. })
    }

    /// Classify an error from the `imap` crate for the given command.
    pub(crate) fn from_imap(command: &'static str, err: imap::error::Error) -> Self {
        use imap::error::Error as E;
        match err {
            E::Io(e) => Error::Transport(e.to_string()),
            E::Tls(e) => Error::Transport(e.to_string()),
            E::TlsHandshake(e) => Error::Transport(e.to_string()),
            E::ConnectionLost => Error::Transport("connection lost".to_string()),
            E::Parse(e) => Error::Protocol {
                command,
                reason: e.to_string(),
            },
            // NO/BAD answers, plus arguments the client refused to send.
            other => Error::Rejected {
                command,
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
