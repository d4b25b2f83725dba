//! Scripted in-memory IMAP server used by the unit tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

use chrono::NaiveDate;
use zeroize::Zeroizing;

use crate::connection::{Account, Connector, Mailstore, Uid};
use crate::error::{Error, Result};

pub(crate) struct FakeMessage {
    pub uid: Uid,
    pub from: String,
    pub date: NaiveDate,
    pub raw: Vec<u8>,
    pub deleted: bool,
}

#[derive(Default)]
pub(crate) struct FakeFolder {
    pub messages: Vec<FakeMessage>,
    next_uid: Uid,
}

#[derive(Default)]
pub(crate) struct FakeServer {
    pub folders: BTreeMap<String, FakeFolder>,
    /// Every command received, in order, e.g. `UID STORE 1:3`.
    pub commands: Vec<String>,
    pub connects: usize,
    pub reject_login: bool,
    pub reject_list: bool,
    pub reject_copy: bool,
    pub broken_fetch: HashSet<Uid>,
    /// 1-based UID STORE calls answered with NO.
    pub reject_store_calls: HashSet<usize>,
    /// 1-based UID STORE call on which the connection drops.
    pub drop_on_store_call: Option<usize>,
    /// 1-based EXPUNGE calls answered with NO.
    pub reject_expunge_calls: HashSet<usize>,
    /// 1-based UID FETCH call on which the connection drops.
    pub drop_on_fetch_call: Option<usize>,
    store_calls: usize,
    expunge_calls: usize,
    fetch_calls: usize,
}

pub(crate) type Shared = Rc<RefCell<FakeServer>>;

impl FakeServer {
    pub fn shared() -> Shared {
        let mut server = FakeServer::default();
        server.create("INBOX");
        Rc::new(RefCell::new(server))
    }

    pub fn create(&mut self, folder: &str) {
        self.folders.entry(folder.to_string()).or_insert_with(|| FakeFolder {
            messages: Vec::new(),
            next_uid: 1,
        });
    }

    pub fn deliver(&mut self, folder: &str, raw: Vec<u8>, from: &str, date: NaiveDate) -> Uid {
        self.create(folder);
        let f = self.folders.get_mut(folder).unwrap();
        let uid = f.next_uid;
        f.next_uid += 1;
        f.messages.push(FakeMessage {
            uid,
            from: from.to_string(),
            date,
            raw,
            deleted: false,
        });
        uid
    }

    /// Deliver a plain text message.
    pub fn deliver_text(
        &mut self,
        folder: &str,
        from: &str,
        subject: &str,
        body: &str,
        date: NaiveDate,
    ) -> Uid {
        self.deliver(folder, rfc822(from, subject, body), from, date)
    }

    pub fn uids(&self, folder: &str) -> Vec<Uid> {
        self.folders
            .get(folder)
            .map(|f| f.messages.iter().map(|m| m.uid).collect())
            .unwrap_or_default()
    }

    pub fn is_flagged_deleted(&self, folder: &str, uid: Uid) -> bool {
        self.folders[folder]
            .messages
            .iter()
            .any(|m| m.uid == uid && m.deleted)
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.commands.iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&mut self, command: String) {
        self.commands.push(command);
    }
}

pub(crate) fn rfc822(from: &str, subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\n\
         Date: Mon, 6 Jan 2025 10:00:00 +0000\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n{body}"
    )
    .into_bytes()
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub(crate) fn account() -> Account {
    Account {
        host: "imap.example.com".into(),
        port: 993,
        tls: true,
        user: "me@example.com".into(),
        password: Zeroizing::new("app-password".into()),
    }
}

fn parse_uid_set(set: &str) -> Vec<Uid> {
    let mut uids = Vec::new();
    for part in set.split(',') {
        match part.split_once(':') {
            Some((s, e)) => uids.extend(s.parse::<Uid>().unwrap()..=e.parse::<Uid>().unwrap()),
            None => uids.push(part.parse().unwrap()),
        }
    }
    uids
}

/// Supports `ALL`, `BEFORE <date>` and `FROM "<text>"`, conjoined.
fn matches(query: &str, msg: &FakeMessage) -> bool {
    let mut rest = query.trim();
    let mut ok = true;
    while !rest.is_empty() {
        if let Some(r) = rest.strip_prefix("ALL") {
            rest = r.trim_start();
        } else if let Some(r) = rest.strip_prefix("BEFORE ") {
            let (d, r) = r.split_once(' ').unwrap_or((r, ""));
            let cutoff = NaiveDate::parse_from_str(d, "%d-%b-%Y").unwrap();
            ok &= msg.date < cutoff;
            rest = r.trim_start();
        } else if let Some(r) = rest.strip_prefix("FROM \"") {
            let end = r.find('"').unwrap();
            ok &= msg.from.to_lowercase().contains(&r[..end].to_lowercase());
            rest = r[end + 1..].trim_start();
        } else {
            panic!("fake server cannot evaluate query: {query}");
        }
    }
    ok
}

pub(crate) struct FakeStore {
    server: Shared,
    selected: Option<String>,
}

impl FakeStore {
    fn selected(&self) -> String {
        self.selected.clone().expect("command issued without SELECT")
    }
}

impl Mailstore for FakeStore {
    fn list_folders(&mut self) -> Result<Vec<String>> {
        let mut server = self.server.borrow_mut();
        server.log("LIST".into());
        if server.reject_list {
            return Err(Error::Rejected {
                command: "LIST",
                reason: "NO listing unavailable".into(),
            });
        }
        Ok(server.folders.keys().cloned().collect())
    }

    fn select(&mut self, folder: &str) -> Result<()> {
        let mut server = self.server.borrow_mut();
        server.log(format!("SELECT {folder}"));
        if !server.folders.contains_key(folder) {
            return Err(Error::Rejected {
                command: "SELECT",
                reason: "NO mailbox does not exist".into(),
            });
        }
        self.selected = Some(folder.to_string());
        Ok(())
    }

    fn uid_search(&mut self, query: &str) -> Result<Vec<Uid>> {
        let folder = self.selected();
        let mut server = self.server.borrow_mut();
        server.log(format!("UID SEARCH {query}"));
        Ok(server.folders[&folder]
            .messages
            .iter()
            .filter(|m| matches(query, m))
            .map(|m| m.uid)
            .collect())
    }

    fn uid_fetch_message(&mut self, uid: Uid) -> Result<Vec<u8>> {
        let folder = self.selected();
        let mut server = self.server.borrow_mut();
        server.log(format!("UID FETCH {uid}"));
        server.fetch_calls += 1;
        if server.drop_on_fetch_call == Some(server.fetch_calls) {
            return Err(Error::Transport("connection reset by peer".into()));
        }
        if server.broken_fetch.contains(&uid) {
            return Err(Error::Rejected {
                command: "UID FETCH",
                reason: "NO message unavailable".into(),
            });
        }
        server.folders[&folder]
            .messages
            .iter()
            .find(|m| m.uid == uid)
            .map(|m| m.raw.clone())
            .ok_or_else(|| Error::Rejected {
                command: "UID FETCH",
                reason: format!("no body returned for UID {uid}"),
            })
    }

    fn uid_store_deleted(&mut self, uid_set: &str) -> Result<()> {
        let folder = self.selected();
        let mut server = self.server.borrow_mut();
        server.log(format!("UID STORE {uid_set}"));
        server.store_calls += 1;
        let call = server.store_calls;
        if server.drop_on_store_call == Some(call) {
            return Err(Error::Transport("connection reset by peer".into()));
        }
        if server.reject_store_calls.contains(&call) {
            return Err(Error::Rejected {
                command: "UID STORE",
                reason: "NO store failed".into(),
            });
        }
        let uids = parse_uid_set(uid_set);
        let f = server.folders.get_mut(&folder).unwrap();
        for m in f.messages.iter_mut().filter(|m| uids.contains(&m.uid)) {
            m.deleted = true;
        }
        Ok(())
    }

    fn uid_copy(&mut self, uid_set: &str, dest: &str) -> Result<()> {
        let folder = self.selected();
        let mut server = self.server.borrow_mut();
        server.log(format!("UID COPY {uid_set} {dest}"));
        if server.reject_copy || !server.folders.contains_key(dest) {
            return Err(Error::Rejected {
                command: "UID COPY",
                reason: "NO [TRYCREATE] copy failed".into(),
            });
        }
        let uids = parse_uid_set(uid_set);
        let copies: Vec<(Vec<u8>, String, NaiveDate)> = server.folders[&folder]
            .messages
            .iter()
            .filter(|m| uids.contains(&m.uid))
            .map(|m| (m.raw.clone(), m.from.clone(), m.date))
            .collect();
        for (raw, from, date) in copies {
            server.deliver(dest, raw, &from, date);
        }
        Ok(())
    }

    fn expunge(&mut self) -> Result<()> {
        let folder = self.selected();
        let mut server = self.server.borrow_mut();
        server.log("EXPUNGE".into());
        server.expunge_calls += 1;
        if server.reject_expunge_calls.contains(&server.expunge_calls) {
            return Err(Error::Rejected {
                command: "EXPUNGE",
                reason: "NO expunge failed".into(),
            });
        }
        let f = server.folders.get_mut(&folder).unwrap();
        f.messages.retain(|m| !m.deleted);
        Ok(())
    }

    fn logout(&mut self) -> Result<()> {
        self.server.borrow_mut().log("LOGOUT".into());
        Ok(())
    }
}

pub(crate) struct FakeConnector {
    pub server: Shared,
}

impl Connector for FakeConnector {
    type Store = FakeStore;

    fn connect(&self, account: &Account) -> Result<FakeStore> {
        let mut server = self.server.borrow_mut();
        server.connects += 1;
        server.log(format!("LOGIN {}", account.user));
        if server.reject_login {
            return Err(Error::Authentication {
                user: account.user.clone(),
                reason: "NO [AUTHENTICATIONFAILED] Invalid credentials".into(),
            });
        }
        Ok(FakeStore {
            server: Rc::clone(&self.server),
            selected: None,
        })
    }
}
