// Dispatcher: single-threaded event loop multiplexing the control channel
// and every group channel onto the directories and the router.
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::group::{Group, GroupDirectory};
use crate::router::Router;
use crate::session::SessionDirectory;
use im_core::{
    is_channel_safe, parse_command, parse_group_record, ChannelNames, Command, LineFramer,
    Notice, ParseError, Verb,
};
use im_transport::ChannelTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

struct ControlChannel<R, W> {
    reader: R,
    keepalive: Option<W>,
    framer: LineFramer,
}

/// Owns both directories for the lifetime of the server.
pub struct Dispatcher<T: ChannelTransport> {
    transport: T,
    names: ChannelNames,
    poll_timeout: Duration,
    control: Option<ControlChannel<T::Reader, T::Writer>>,
    sessions: SessionDirectory<T::Writer>,
    groups: GroupDirectory<T::Reader, T::Writer>,
    state: LoopState,
}

impl<T: ChannelTransport> Dispatcher<T> {
    /// Create and open the control channel. Failure here is fatal.
    pub fn start(transport: T, config: &BrokerConfig) -> Result<Self, BrokerError> {
        config.validate()?;
        let names = config.channel_names();
        let path = names.control();

        transport.create(&path).map_err(BrokerError::ControlChannel)?;
        let reader = transport
            .open_read(&path)
            .map_err(BrokerError::ControlChannel)?;
        let keepalive = match transport.open_write(&path) {
            Ok(writer) => Some(writer),
            Err(e) => {
                log::warn!("no keepalive writer on control channel: {}", e);
                None
            }
        };

        log::info!("control channel ready at {}", path.display());
        Ok(Dispatcher {
            transport,
            names,
            poll_timeout: config.poll_timeout,
            control: Some(ControlChannel {
                reader,
                keepalive,
                framer: LineFramer::new(),
            }),
            sessions: SessionDirectory::new(),
            groups: GroupDirectory::new(),
            state: LoopState::Running,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn sessions(&self) -> &SessionDirectory<T::Writer> {
        &self.sessions
    }

    pub fn groups(&self) -> &GroupDirectory<T::Reader, T::Writer> {
        &self.groups
    }

    pub fn names(&self) -> &ChannelNames {
        &self.names
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run until `shutdown` is raised, then tear everything down.
    /// The flag is checked between iterations, so shutdown latency is
    /// bounded by the poll timeout.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!("dispatcher running");
        while self.state == LoopState::Running {
            if shutdown.load(Ordering::Relaxed) {
                self.state = LoopState::Stopping;
                break;
            }
            self.turn();
        }
        self.stop();
    }

    /// One loop iteration: wait for readiness, then drain the control
    /// channel followed by every readable group channel.
    pub fn turn(&mut self) {
        let Some(control) = self.control.as_ref() else {
            return;
        };

        let group_names: Vec<String> = self.groups.names().map(str::to_string).collect();
        let mut wait_set = Vec::with_capacity(group_names.len() + 1);
        wait_set.push(&control.reader);
        wait_set.extend(group_names.iter().filter_map(|n| self.groups.get(n).map(Group::inbound)));

        let ready = match self.transport.wait_readable(&wait_set, self.poll_timeout) {
            Ok(ready) => ready,
            Err(e) => {
                log::error!("{}", e);
                return;
            }
        };

        if ready.first().copied().unwrap_or(false) {
            self.drain_control();
        }

        for (name, _) in group_names
            .iter()
            .zip(ready.iter().skip(1))
            .filter(|(_, ready)| **ready)
        {
            self.drain_group(name);
        }
    }

    fn drain_control(&mut self) {
        let Some(control) = self.control.as_mut() else {
            return;
        };
        let bytes = match self.transport.read_available(&mut control.reader) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("control channel: {}", e);
                return;
            }
        };
        let records: Vec<Vec<u8>> = control.framer.push(&bytes).collect();
        let discarded = control.framer.take_discarded();
        if discarded > 0 {
            log::warn!("control channel: dropped {} bytes of an oversized record", discarded);
        }
        for record in records {
            self.handle_record(&String::from_utf8_lossy(&record));
        }
    }

    fn handle_record(&mut self, record: &str) {
        match parse_command(record) {
            Ok(Some(command)) => self.apply(command),
            Ok(None) => {}
            Err(ParseError::MissingField {
                verb: Verb::Send,
                from: Some(from),
                ..
            }) => {
                log::debug!("incomplete SEND from '{}'", from);
                Router::new(&self.transport).notify(&mut self.sessions, &from, Notice::SendUsage);
            }
            Err(e) => log::debug!("dropping record: {}", e),
        }
    }

    /// Apply one control command to the directories and notify the requester.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { login } => self.connect(&login),
            Command::Disconnect { login } => self.disconnect(&login),
            Command::Send { from, to, text } => self.send(&from, &to, &text),
            Command::CreateGroup { from, group } => self.create_group(&from, &group),
            Command::DeleteGroup { from, group } => self.delete_group(&from, &group),
            Command::JoinGroup { from, group } => self.join_group(&from, &group),
            Command::LeaveGroup { from, group } => self.leave_group(&from, &group),
            Command::Unknown { raw } => {
                let tag = raw.split_whitespace().next().unwrap_or_default();
                log::warn!("UNKNOWN CMD: {}", tag);
            }
        }
    }

    fn connect(&mut self, login: &str) {
        let router = Router::new(&self.transport);
        if self.sessions.contains(login) {
            router.notify(&mut self.sessions, login, Notice::AlreadyConnected);
            return;
        }
        if !is_channel_safe(login) {
            log::warn!("refusing CONNECT for unusable login {:?}", login);
            return;
        }

        let channel = self.names.client(login);
        // The client normally creates its inbox first; this covers a late client.
        if let Err(e) = self.transport.create(&channel) {
            log::warn!("{}", e);
        }
        self.sessions.register(login, channel);

        log::info!("CONNECT {}", login);
        router.notify(&mut self.sessions, login, Notice::Connected { login });
    }

    fn disconnect(&mut self, login: &str) {
        if let Some(mut client) = self.sessions.remove(login) {
            log::info!("DISCONNECT {}", login);
            client.close_outbound();
        }
        self.groups.prune_member(login);
    }

    fn send(&mut self, from: &str, to: &str, text: &str) {
        let router = Router::new(&self.transport);
        if !self.sessions.contains(to) {
            router.notify(&mut self.sessions, from, Notice::NotConnected { to });
            return;
        }
        router.notify(&mut self.sessions, to, Notice::Private { from, text });
        router.notify(&mut self.sessions, from, Notice::Delivered { to });
        log::info!("SEND {}->{} '{}'", from, to, text);
    }

    fn create_group(&mut self, from: &str, name: &str) {
        let router = Router::new(&self.transport);
        if self.groups.contains(name) {
            router.notify(&mut self.sessions, from, Notice::GroupExists);
            return;
        }
        if !is_channel_safe(name) {
            log::warn!("refusing CREATEGROUP for unusable name {:?}", name);
            router.notify(&mut self.sessions, from, Notice::GroupCreateFailed);
            return;
        }

        let channel = self.names.group(name);
        if let Err(e) = self.transport.create(&channel) {
            log::warn!("{}", e);
            router.notify(&mut self.sessions, from, Notice::GroupCreateFailed);
            return;
        }
        let inbound = match self.transport.open_read(&channel) {
            Ok(reader) => reader,
            Err(e) => {
                log::warn!("{}", e);
                if let Err(e) = self.transport.delete(&channel) {
                    log::warn!("{}", e);
                }
                router.notify(&mut self.sessions, from, Notice::GroupOpenFailed);
                return;
            }
        };
        let keepalive = match self.transport.open_write(&channel) {
            Ok(writer) => Some(writer),
            Err(e) => {
                log::warn!("no keepalive writer for group '{}': {}", name, e);
                None
            }
        };

        let group = Group::new(name, channel, inbound, keepalive, from);
        if self.groups.insert(group).is_err() {
            return;
        }
        log::info!("CREATEGROUP {} by {}", name, from);
        router.notify(&mut self.sessions, from, Notice::GroupCreated { group: name });
    }

    fn delete_group(&mut self, from: &str, name: &str) {
        let router = Router::new(&self.transport);
        let Some(group) = self.groups.remove(name) else {
            router.notify(&mut self.sessions, from, Notice::GroupNotFound);
            return;
        };

        log::info!("DELETEGROUP {}", name);
        let channel = group.channel().clone();
        drop(group);
        if let Err(e) = self.transport.delete(&channel) {
            log::warn!("{}", e);
        }
        router.notify(&mut self.sessions, from, Notice::GroupDeleted { group: name });
    }

    fn join_group(&mut self, from: &str, name: &str) {
        let router = Router::new(&self.transport);
        let Some(group) = self.groups.get_mut(name) else {
            router.notify(&mut self.sessions, from, Notice::GroupNotFound);
            return;
        };
        group.join(from);
        log::info!("JOINGROUP {} -> {}", from, name);
        router.notify(&mut self.sessions, from, Notice::Joined { group: name });
    }

    fn leave_group(&mut self, from: &str, name: &str) {
        let router = Router::new(&self.transport);
        let Some(group) = self.groups.get_mut(name) else {
            router.notify(&mut self.sessions, from, Notice::GroupNotFound);
            return;
        };
        group.leave(from);
        log::info!("LEAVEGROUP {} <- {}", from, name);
        router.notify(&mut self.sessions, from, Notice::Left { group: name });
    }

    fn drain_group(&mut self, name: &str) {
        // Deleted earlier in this iteration.
        let Some(group) = self.groups.get_mut(name) else {
            return;
        };
        let bytes = match self.transport.read_available(&mut group.inbound) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::error!("group '{}': {}", name, e);
                return;
            }
        };
        let records: Vec<Vec<u8>> = group.framer.push(&bytes).collect();
        let discarded = group.framer.take_discarded();
        if discarded > 0 {
            log::warn!("group '{}': dropped {} bytes of an oversized record", name, discarded);
        }

        let router = Router::new(&self.transport);
        for record in records {
            let Some(message) = parse_group_record(&String::from_utf8_lossy(&record)) else {
                continue;
            };
            log::info!("GROUPMSG [{}] {}: {}", name, message.from, message.text);
            router.broadcast_to_group(&mut self.sessions, group, &message.from, &message.text);
        }
    }

    /// Close every client channel, close and delete every group channel and
    /// the control channel. Best effort: failures are logged and skipped.
    pub fn stop(&mut self) {
        if self.state == LoopState::Stopped {
            return;
        }
        self.state = LoopState::Stopping;
        log::info!("stopping, cleaning up channels");

        for mut client in self.sessions.drain() {
            client.close_outbound();
        }
        for group in self.groups.drain() {
            let channel = group.channel().clone();
            drop(group);
            if let Err(e) = self.transport.delete(&channel) {
                log::error!("{}", e);
            }
        }
        if let Some(control) = self.control.take() {
            drop(control);
            if let Err(e) = self.transport.delete(&self.names.control()) {
                log::error!("{}", e);
            }
        }
        self.state = LoopState::Stopped;
    }
}

impl<T: ChannelTransport> Drop for Dispatcher<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
