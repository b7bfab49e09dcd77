// Session directory: login -> connected client
use std::collections::HashMap;
use std::path::PathBuf;

/// A connected login and its lazily opened outbound channel.
#[derive(Debug)]
pub struct Client<W> {
    login: String,
    channel: PathBuf,
    /// Opened on first delivery, dropped on write failure so the next one reopens.
    pub(crate) outbound: Option<W>,
}

impl<W> Client<W> {
    pub fn new(login: impl Into<String>, channel: PathBuf) -> Self {
        Client {
            login: login.into(),
            channel,
            outbound: None,
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn channel(&self) -> &PathBuf {
        &self.channel
    }

    pub fn has_outbound(&self) -> bool {
        self.outbound.is_some()
    }

    /// Drop the cached outbound handle, closing it.
    pub fn close_outbound(&mut self) {
        self.outbound = None;
    }
}

/// At most one live session per login.
#[derive(Debug)]
pub struct SessionDirectory<W> {
    clients: HashMap<String, Client<W>>,
}

impl<W> Default for SessionDirectory<W> {
    fn default() -> Self {
        SessionDirectory {
            clients: HashMap::new(),
        }
    }
}

impl<W> SessionDirectory<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns false, leaving the existing one untouched,
    /// when the login is already connected.
    pub fn register(&mut self, login: &str, channel: PathBuf) -> bool {
        if self.clients.contains_key(login) {
            return false;
        }
        self.clients
            .insert(login.to_string(), Client::new(login, channel));
        true
    }

    pub fn remove(&mut self, login: &str) -> Option<Client<W>> {
        self.clients.remove(login)
    }

    pub fn contains(&self, login: &str) -> bool {
        self.clients.contains_key(login)
    }

    pub fn get(&self, login: &str) -> Option<&Client<W>> {
        self.clients.get(login)
    }

    pub fn get_mut(&mut self, login: &str) -> Option<&mut Client<W>> {
        self.clients.get_mut(login)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn logins(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Remove every session, yielding them for teardown.
    pub fn drain(&mut self) -> impl Iterator<Item = Client<W>> + '_ {
        self.clients.drain().map(|(_, client)| client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_register_keeps_the_first_session() {
        let mut sessions: SessionDirectory<()> = SessionDirectory::new();
        assert!(sessions.register("alice", PathBuf::from("/tmp/a")));
        sessions.get_mut("alice").unwrap().outbound = Some(());

        assert!(!sessions.register("alice", PathBuf::from("/tmp/other")));
        assert_eq!(sessions.len(), 1);
        let alice = sessions.get("alice").unwrap();
        assert_eq!(alice.channel(), &PathBuf::from("/tmp/a"));
        assert!(alice.has_outbound());
    }

    #[test]
    fn remove_and_drain() {
        let mut sessions: SessionDirectory<()> = SessionDirectory::new();
        sessions.register("alice", PathBuf::from("/tmp/a"));
        sessions.register("bob", PathBuf::from("/tmp/b"));

        assert!(sessions.remove("carol").is_none());
        assert_eq!(sessions.remove("alice").map(|c| c.login().to_string()), Some("alice".into()));
        assert_eq!(sessions.drain().count(), 1);
        assert!(sessions.is_empty());
    }
}
