// client: chat client library for session holders, control tools, tests, etc.
use im_core::{is_channel_safe, ChannelNames, Command, GroupMessage, LineFramer};
use im_transport::{ChannelError, ChannelTransport};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server not running? {0}")]
    ServerUnavailable(#[source] ChannelError),

    #[error("cannot set up inbox: {0}")]
    Inbox(#[source] ChannelError),

    #[error("cannot reach group '{group}': {source}")]
    GroupUnavailable {
        group: String,
        #[source]
        source: ChannelError,
    },

    #[error("{kind} {name:?} must be a single word without '/'")]
    InvalidName { kind: &'static str, name: String },

    #[error("message text must be a single non-empty line")]
    InvalidText,

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

fn check_name(kind: &'static str, name: &str) -> Result<(), ClientError> {
    if is_channel_safe(name) && !name.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ClientError::InvalidName {
            kind,
            name: name.to_string(),
        })
    }
}

fn check_text(text: &str) -> Result<(), ClientError> {
    if text.is_empty() || text.contains(&['\n', '\r'][..]) {
        Err(ClientError::InvalidText)
    } else {
        Ok(())
    }
}

/// Write side of the shared control channel.
pub struct ControlLink<T: ChannelTransport> {
    transport: T,
    writer: T::Writer,
}

impl<T: ChannelTransport> ControlLink<T> {
    /// Fails with [`ClientError::ServerUnavailable`] while no server reads the channel.
    pub fn open(transport: T, names: &ChannelNames) -> Result<Self, ClientError> {
        let writer = transport
            .open_write(&names.control())
            .map_err(ClientError::ServerUnavailable)?;
        Ok(ControlLink { transport, writer })
    }

    pub fn send(&mut self, command: &Command) -> Result<(), ClientError> {
        let line = command.to_line();
        // One record per command: embedded line breaks would smuggle in more
        if line.trim_end_matches('\n').contains(&['\n', '\r'][..]) {
            return Err(ClientError::InvalidText);
        }
        self.transport.write_all(&mut self.writer, line.as_bytes())?;
        Ok(())
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

/// Write one `MSG` record straight into a group channel.
pub fn post_to_group<T: ChannelTransport>(
    transport: &T,
    names: &ChannelNames,
    login: &str,
    group: &str,
    text: &str,
) -> Result<(), ClientError> {
    check_name("group", group)?;
    check_text(text)?;
    let mut writer = transport
        .open_write(&names.group(group))
        .map_err(|source| ClientError::GroupUnavailable {
            group: group.to_string(),
            source,
        })?;
    let record = GroupMessage {
        from: login.to_string(),
        text: text.to_string(),
    };
    transport.write_all(&mut writer, record.to_line().as_bytes())?;
    Ok(())
}

/// A connected login: owns its inbox channel and a control link.
///
/// Dropping the client disconnects it and removes the inbox.
pub struct ImClient<T: ChannelTransport> {
    login: String,
    names: ChannelNames,
    inbox_path: PathBuf,
    inbox: T::Reader,
    // Keeps the inbox from reporting end-of-stream between server writes
    _inbox_keepalive: Option<T::Writer>,
    framer: LineFramer,
    link: ControlLink<T>,
    connected: bool,
}

impl<T: ChannelTransport> ImClient<T> {
    pub fn connect(transport: T, names: &ChannelNames, login: &str) -> Result<Self, ClientError> {
        check_name("login", login)?;
        let control = transport
            .open_write(&names.control())
            .map_err(ClientError::ServerUnavailable)?;
        let inbox_path = names.client(login);

        // A previous run may have left a stale inbox behind
        transport.delete(&inbox_path).map_err(ClientError::Inbox)?;
        transport.create(&inbox_path).map_err(ClientError::Inbox)?;
        let inbox = match transport.open_read(&inbox_path) {
            Ok(reader) => reader,
            Err(e) => {
                if let Err(cleanup) = transport.delete(&inbox_path) {
                    log::debug!("cannot remove inbox after failed open: {}", cleanup);
                }
                return Err(ClientError::Inbox(e));
            }
        };
        let keepalive = transport.open_write(&inbox_path).ok();

        // The inbox is listening before the server learns about us
        let mut link = ControlLink {
            transport,
            writer: control,
        };
        link.send(&Command::Connect {
            login: login.to_string(),
        })?;
        log::debug!("connected as '{}'", login);

        Ok(ImClient {
            login: login.to_string(),
            names: names.clone(),
            inbox_path,
            inbox,
            _inbox_keepalive: keepalive,
            framer: LineFramer::new(),
            link,
            connected: true,
        })
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn inbox_path(&self) -> &PathBuf {
        &self.inbox_path
    }

    pub fn send_private(&mut self, to: &str, text: &str) -> Result<(), ClientError> {
        check_name("login", to)?;
        check_text(text)?;
        self.link.send(&Command::Send {
            from: self.login.clone(),
            to: to.to_string(),
            text: text.to_string(),
        })
    }

    pub fn create_group(&mut self, group: &str) -> Result<(), ClientError> {
        check_name("group", group)?;
        self.link.send(&Command::CreateGroup {
            from: self.login.clone(),
            group: group.to_string(),
        })
    }

    pub fn delete_group(&mut self, group: &str) -> Result<(), ClientError> {
        check_name("group", group)?;
        self.link.send(&Command::DeleteGroup {
            from: self.login.clone(),
            group: group.to_string(),
        })
    }

    pub fn join_group(&mut self, group: &str) -> Result<(), ClientError> {
        check_name("group", group)?;
        self.link.send(&Command::JoinGroup {
            from: self.login.clone(),
            group: group.to_string(),
        })
    }

    pub fn leave_group(&mut self, group: &str) -> Result<(), ClientError> {
        check_name("group", group)?;
        self.link.send(&Command::LeaveGroup {
            from: self.login.clone(),
            group: group.to_string(),
        })
    }

    pub fn post_to_group(&self, group: &str, text: &str) -> Result<(), ClientError> {
        post_to_group(self.link.transport(), &self.names, &self.login, group, text)
    }

    /// Block up to `timeout` for inbox data.
    pub fn wait_readable(&self, timeout: Duration) -> Result<bool, ClientError> {
        let ready = self
            .link
            .transport()
            .wait_readable(&[&self.inbox], timeout)?;
        Ok(ready.first().copied().unwrap_or(false))
    }

    /// Every complete line received so far, without line terminators.
    pub fn receive_lines(&mut self) -> Result<Vec<String>, ClientError> {
        let bytes = self.link.transport().read_available(&mut self.inbox)?;
        Ok(self
            .framer
            .push(&bytes)
            .map(|record| {
                String::from_utf8_lossy(&record)
                    .trim_end_matches(&['\n', '\r'][..])
                    .to_string()
            })
            .collect())
    }

    pub fn disconnect(mut self) -> Result<(), ClientError> {
        self.leave()
    }

    fn leave(&mut self) -> Result<(), ClientError> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        let sent = self.link.send(&Command::Disconnect {
            login: self.login.clone(),
        });
        self.link.transport().delete(&self.inbox_path)?;
        sent
    }
}

impl<T: ChannelTransport> Drop for ImClient<T> {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            log::warn!("disconnect of '{}' incomplete: {}", self.login, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use im_transport::MemoryTransport;

    fn server_side(transport: &MemoryTransport, names: &ChannelNames) -> im_transport::MemoryReader {
        transport.create(&names.control()).unwrap();
        transport.open_read(&names.control()).unwrap()
    }

    #[test]
    fn connect_without_server_fails() {
        let transport = MemoryTransport::new();
        let names = ChannelNames::new("/run/im");
        let err = ImClient::connect(transport, &names, "alice").err().unwrap();
        assert!(matches!(err, ClientError::ServerUnavailable(_)));
    }

    #[test]
    fn commands_are_written_to_the_control_channel() {
        let transport = MemoryTransport::new();
        let names = ChannelNames::new("/run/im");
        let mut control = server_side(&transport, &names);

        let mut client = ImClient::connect(transport.clone(), &names, "alice").unwrap();
        assert!(transport.exists(&names.client("alice")));
        client.send_private("bob", "hi there").unwrap();
        client.create_group("proj").unwrap();
        client.disconnect().unwrap();

        let written = transport.read_available(&mut control).unwrap();
        assert_eq!(
            String::from_utf8(written).unwrap(),
            "CONNECT alice\nSEND alice bob hi there\nCREATEGROUP alice proj\nDISCONNECT alice\n"
        );
        assert!(!transport.exists(&names.client("alice")));
    }

    #[test]
    fn invalid_input_never_reaches_the_wire() {
        let transport = MemoryTransport::new();
        let names = ChannelNames::new("/run/im");
        let mut control = server_side(&transport, &names);

        let mut client = ImClient::connect(transport.clone(), &names, "alice").unwrap();
        let _ = transport.read_available(&mut control).unwrap();

        assert!(matches!(client.send_private("bob", "two\nlines"), Err(ClientError::InvalidText)));
        assert!(matches!(client.join_group("a b"), Err(ClientError::InvalidName { .. })));
        assert!(matches!(client.create_group("../x"), Err(ClientError::InvalidName { .. })));
        assert!(transport.read_available(&mut control).unwrap().is_empty());
        assert!(ImClient::connect(transport.clone(), &names, "").is_err());
    }

    #[test]
    fn group_posts_go_to_the_group_channel() {
        let transport = MemoryTransport::new();
        let names = ChannelNames::new("/run/im");
        let _control = server_side(&transport, &names);
        let client = ImClient::connect(transport.clone(), &names, "alice").unwrap();

        let err = client.post_to_group("proj", "hello").unwrap_err();
        assert!(matches!(err, ClientError::GroupUnavailable { .. }));

        transport.create(&names.group("proj")).unwrap();
        let mut group = transport.open_read(&names.group("proj")).unwrap();
        client.post_to_group("proj", "hello all").unwrap();
        assert_eq!(transport.read_available(&mut group).unwrap(), b"MSG alice hello all\n");
        // The posting writer is closed again right away.
        assert_eq!(transport.writer_count(&names.group("proj")), 0);
    }

    #[test]
    fn inbox_lines_are_framed() {
        let transport = MemoryTransport::new();
        let names = ChannelNames::new("/run/im");
        let _control = server_side(&transport, &names);
        let mut client = ImClient::connect(transport.clone(), &names, "alice").unwrap();

        let mut server = transport.open_write(&names.client("alice")).unwrap();
        transport.write_all(&mut server, b"SERVER: connected as 'alice'\n[pm] bo").unwrap();
        assert!(client.wait_readable(Duration::from_millis(1)).unwrap());
        assert_eq!(client.receive_lines().unwrap(), vec!["SERVER: connected as 'alice'"]);

        transport.write_all(&mut server, b"b: hi\n").unwrap();
        assert_eq!(client.receive_lines().unwrap(), vec!["[pm] bob: hi"]);
    }
}
