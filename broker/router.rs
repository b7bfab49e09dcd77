// Router: best-effort delivery of text lines into client channels
use crate::group::Group;
use crate::session::SessionDirectory;
use im_core::Notice;
use im_transport::ChannelTransport;

/// Outcome of one delivery attempt. Informational only, nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No session for the login; the line was dropped.
    NoSession,
    /// The client channel could not be opened (usually nobody reading yet).
    Unreachable,
    /// The write failed; the cached handle was closed for reopening next time.
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
}

/// Resolves logins to their outbound channels. Reads the directories,
/// only ever touching a client's cached handle.
pub struct Router<'a, T: ChannelTransport> {
    transport: &'a T,
}

impl<'a, T: ChannelTransport> Router<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Router { transport }
    }

    pub fn send_to_login(
        &self,
        sessions: &mut SessionDirectory<T::Writer>,
        login: &str,
        text: &str,
    ) -> Delivery {
        let client = match sessions.get_mut(login) {
            Some(client) => client,
            None => return Delivery::NoSession,
        };

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        if !line.ends_with('\n') {
            line.push('\n');
        }

        let mut writer = match client.outbound.take() {
            Some(writer) => writer,
            None => match self.transport.open_write(client.channel()) {
                Ok(writer) => writer,
                Err(e) => {
                    log::debug!("dropping line for '{}': {}", login, e);
                    return Delivery::Unreachable;
                }
            },
        };
        match self.transport.write_all(&mut writer, line.as_bytes()) {
            Ok(()) => {
                client.outbound = Some(writer);
                Delivery::Delivered
            }
            // The handle is dropped here and reopened on the next delivery
            Err(e) => {
                log::debug!("delivery to '{}' failed, closing its channel: {}", login, e);
                Delivery::Failed
            }
        }
    }

    pub fn notify(
        &self,
        sessions: &mut SessionDirectory<T::Writer>,
        login: &str,
        notice: Notice<'_>,
    ) -> Delivery {
        self.send_to_login(sessions, login, &notice.to_string())
    }

    /// Deliver `[group:<name>] <from>: <text>` to every member independently.
    pub fn broadcast_to_group(
        &self,
        sessions: &mut SessionDirectory<T::Writer>,
        group: &Group<T::Reader, T::Writer>,
        from: &str,
        text: &str,
    ) -> BroadcastReport {
        let line = Notice::Group {
            group: group.name(),
            from,
            text,
        }
        .to_string();

        let mut report = BroadcastReport::default();
        for member in group.members() {
            report.attempted += 1;
            if self.send_to_login(sessions, member, &line) == Delivery::Delivered {
                report.delivered += 1;
            }
        }
        report
    }
}
