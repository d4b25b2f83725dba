use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::connection::Account;
use crate::delete::DEFAULT_BATCH_SIZE;
use crate::error::{Error, Result};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_IMAP_HOST: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;

/// Contents of the optional TOML config file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub email: Option<String>,
    pub password: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub imap_host: Option<String>,
    pub imap_port: Option<u16>,
    pub imap_tls: Option<bool>,
    pub batch_size: Option<usize>,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("failed to parse config file {}: {e}", path.display()))
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("gm-connect").join("config.toml"))
    }
}

/// Fully resolved configuration handed to the [`Manager`](crate::manager::Manager).
#[derive(Clone)]
pub struct Settings {
    pub email_address: String,
    pub password: Zeroizing<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub imap_host: String,
    pub imap_port: u16,
    pub imap_tls: bool,
    pub batch_size: usize,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("email_address", &self.email_address)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("imap_host", &self.imap_host)
            .field("imap_port", &self.imap_port)
            .field("imap_tls", &self.imap_tls)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

fn parsed<T: FromStr>(var: &str, value: Option<String>) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {var} '{v}': {e}")))
        })
        .transpose()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Resolve settings: `lookup` (normally the environment) > file > defaults.
    ///
    /// Fails when the address or password is missing from both sources.
    pub fn resolve(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let email_address = non_empty(lookup("EMAIL_ADDRESS"))
            .or(non_empty(file.email))
            .ok_or_else(|| {
                Error::Config("missing email address (set EMAIL_ADDRESS or `email`)".into())
            })?;
        let password = non_empty(lookup("EMAIL_PASSWORD"))
            .or(non_empty(file.password))
            .map(Zeroizing::new)
            .ok_or_else(|| {
                Error::Config("missing password (set EMAIL_PASSWORD or `password`)".into())
            })?;

        let batch_size = file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }

        Ok(Self {
            email_address,
            password,
            smtp_host: non_empty(lookup("SMTP_HOST"))
                .or(file.smtp_host)
                .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: parsed("SMTP_PORT", lookup("SMTP_PORT"))?
                .or(file.smtp_port)
                .unwrap_or(DEFAULT_SMTP_PORT),
            imap_host: non_empty(lookup("IMAP_HOST"))
                .or(file.imap_host)
                .unwrap_or_else(|| DEFAULT_IMAP_HOST.to_string()),
            imap_port: parsed("IMAP_PORT", lookup("IMAP_PORT"))?
                .or(file.imap_port)
                .unwrap_or(DEFAULT_IMAP_PORT),
            imap_tls: parsed("IMAP_TLS", lookup("IMAP_TLS"))?
                .or(file.imap_tls)
                .unwrap_or(true),
            batch_size,
        })
    }

    /// Resolve against the process environment.
    pub fn from_env(file: FileConfig) -> Result<Self> {
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    pub fn imap_account(&self) -> Account {
        Account {
            host: self.imap_host.clone(),
            port: self.imap_port,
            tls: self.imap_tls,
            user: self.email_address.clone(),
            password: self.password.clone(),
        }
    }
}
