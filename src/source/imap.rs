//! IMAP mailbox source.

use anyhow::{Context, Result};
use imap::Session;
use native_tls::TlsStream;
use std::collections::HashSet;
use std::net::TcpStream;
use tracing::{debug, info, warn};

use super::{MailboxSource, parse_message};
use crate::config::MailboxConfig;
use crate::types::{Direction, Message};

type ImapSession = Session<TlsStream<TcpStream>>;

fn connect_imap(host: &str, port: u16, starttls: bool, user: &str, password: &str) -> Result<ImapSession> {
    let mut tls_builder = native_tls::TlsConnector::builder();

    // Local bridges (ProtonMail Bridge) present self-signed certificates.
    if starttls || host == "127.0.0.1" || host == "localhost" {
        tls_builder.danger_accept_invalid_certs(true);
        tls_builder.danger_accept_invalid_hostnames(true);
    }

    let tls = tls_builder.build()?;

    let client = if starttls {
        imap::connect_starttls((host, port), host, &tls)?
    } else {
        imap::connect((host, port), host, &tls)?
    };

    let session = client.login(user, password).map_err(|e| e.0)?;
    Ok(session)
}

/// Reads the inbox and sent folder of one IMAP account. Message ids are UIDs.
pub struct ImapSource {
    config: MailboxConfig,
    session: ImapSession,
}

impl ImapSource {
    pub fn connect(config: &MailboxConfig) -> Result<Self> {
        let password = config.resolve_password()?;
        info!(host = %config.imap_host, port = config.imap_port, user = %config.user, "Connecting to IMAP");
        let session = connect_imap(
            &config.imap_host,
            config.imap_port,
            config.imap_starttls,
            &config.user,
            &password,
        )
        .with_context(|| format!("IMAP login to {} failed", config.imap_host))?;
        Ok(Self {
            config: config.clone(),
            session,
        })
    }

    fn fetch_uids(&mut self, folder: &str, query: &str, direction: Direction, known: &HashSet<String>) -> Result<Vec<Message>> {
        self.session
            .select(folder)
            .with_context(|| format!("cannot select folder {:?}", folder))?;
        let mut uids: Vec<u32> = self.session.uid_search(query)?.into_iter().collect();
        uids.sort_unstable();
        uids.retain(|uid| !known.contains(&uid.to_string()));
        debug!(folder, count = uids.len(), "Fetching messages");

        let mut messages = Vec::with_capacity(uids.len());
        for uid in uids {
            // BODY.PEEK leaves \Seen alone; commit sets it explicitly.
            let fetches = self.session.uid_fetch(uid.to_string(), "BODY.PEEK[]")?;
            let Some(raw) = fetches.iter().next().and_then(|f| f.body()) else {
                continue;
            };
            match parse_message(&uid.to_string(), raw, direction) {
                Ok(msg) => messages.push(msg),
                Err(e) => warn!(folder, uid, error = %e, "Skipping unparseable message"),
            }
        }
        Ok(messages)
    }
}

impl MailboxSource for ImapSource {
    fn fetch_unread(&mut self) -> Result<Vec<Message>> {
        let inbox = self.config.inbox_folder.clone();
        self.fetch_uids(&inbox, "UNSEEN", Direction::Received, &HashSet::new())
    }

    fn fetch_all(&mut self, folder: &str, direction: Direction, known: &HashSet<String>) -> Result<Vec<Message>> {
        self.fetch_uids(folder, "ALL", direction, known)
    }

    fn commit(&mut self, msg: &Message) -> Result<()> {
        if msg.direction != Direction::Received {
            return Ok(());
        }
        self.session.select(&self.config.inbox_folder)?;
        self.session.uid_store(&msg.id, "+FLAGS (\\Seen)")?;
        Ok(())
    }
}

impl Drop for ImapSource {
    fn drop(&mut self) {
        // Some servers answer LOGOUT with responses the imap crate rejects.
        let _ = self.session.logout();
    }
}
