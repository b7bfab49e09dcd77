// Command protocol: one newline-terminated UTF-8 record per command
use std::fmt;

/// Command tags accepted on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Connect,
    Disconnect,
    Send,
    CreateGroup,
    DeleteGroup,
    JoinGroup,
    LeaveGroup,
}

impl Verb {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "CONNECT" => Some(Verb::Connect),
            "DISCONNECT" => Some(Verb::Disconnect),
            "SEND" => Some(Verb::Send),
            "CREATEGROUP" => Some(Verb::CreateGroup),
            "DELETEGROUP" => Some(Verb::DeleteGroup),
            "JOINGROUP" => Some(Verb::JoinGroup),
            "LEAVEGROUP" => Some(Verb::LeaveGroup),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Verb::Connect => "CONNECT",
            Verb::Disconnect => "DISCONNECT",
            Verb::Send => "SEND",
            Verb::CreateGroup => "CREATEGROUP",
            Verb::DeleteGroup => "DELETEGROUP",
            Verb::JoinGroup => "JOINGROUP",
            Verb::LeaveGroup => "LEAVEGROUP",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A parsed control-channel record. Built per record and consumed immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { login: String },
    Disconnect { login: String },
    Send { from: String, to: String, text: String },
    CreateGroup { from: String, group: String },
    DeleteGroup { from: String, group: String },
    JoinGroup { from: String, group: String },
    LeaveGroup { from: String, group: String },
    Unknown { raw: String },
}

impl Command {
    /// Wire form including the terminating newline.
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::Connect { login } => write!(f, "{} {}", Verb::Connect, login),
            Command::Disconnect { login } => write!(f, "{} {}", Verb::Disconnect, login),
            Command::Send { from, to, text } => write!(f, "{} {} {} {}", Verb::Send, from, to, text),
            Command::CreateGroup { from, group } => write!(f, "{} {} {}", Verb::CreateGroup, from, group),
            Command::DeleteGroup { from, group } => write!(f, "{} {} {}", Verb::DeleteGroup, from, group),
            Command::JoinGroup { from, group } => write!(f, "{} {} {}", Verb::JoinGroup, from, group),
            Command::LeaveGroup { from, group } => write!(f, "{} {} {}", Verb::LeaveGroup, from, group),
            Command::Unknown { raw } => f.write_str(raw),
        }
    }
}

/// Record written by clients straight into a group channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMessage {
    pub from: String,
    pub text: String,
}

pub const GROUP_MESSAGE_TAG: &str = "MSG";

impl GroupMessage {
    pub fn to_line(&self) -> String {
        format!("{}\n", self)
    }
}

impl fmt::Display for GroupMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} {}", GROUP_MESSAGE_TAG, self.from, self.text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// A recognised command lacks a positional field. `from` is set when the
    /// sender could still be identified.
    #[error("{verb} record is missing its {field} field")]
    MissingField {
        verb: Verb,
        field: &'static str,
        from: Option<String>,
    },
}

// Whitespace-separated positional fields, last field taken verbatim.
struct Fields<'a> {
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(line: &'a str) -> Self {
        Fields { rest: line }
    }

    fn next_token(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        let end = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        let (token, rest) = trimmed.split_at(end);
        self.rest = rest;
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    // At most one separating space is stripped, anything else is payload.
    fn remainder(self) -> &'a str {
        self.rest.strip_prefix(' ').unwrap_or(self.rest)
    }
}

fn strip_line_ending(record: &str) -> &str {
    record.trim_end_matches(&['\n', '\r'][..])
}

fn required<'a>(
    fields: &mut Fields<'a>,
    verb: Verb,
    field: &'static str,
    from: Option<&str>,
) -> Result<&'a str, ParseError> {
    fields.next_token().ok_or_else(|| ParseError::MissingField {
        verb,
        field,
        from: from.map(str::to_string),
    })
}

/// Parse one framed control record.
///
/// Empty lines yield `Ok(None)`. Unrecognised tags yield [`Command::Unknown`].
pub fn parse_command(record: &str) -> Result<Option<Command>, ParseError> {
    let line = strip_line_ending(record);
    let mut fields = Fields::new(line);
    let tag = match fields.next_token() {
        Some(tag) => tag,
        None => return Ok(None),
    };

    let verb = match Verb::from_tag(tag) {
        Some(verb) => verb,
        None => {
            return Ok(Some(Command::Unknown {
                raw: line.to_string(),
            }))
        }
    };

    let command = match verb {
        Verb::Connect | Verb::Disconnect => {
            let login = required(&mut fields, verb, "login", None)?.to_string();
            if verb == Verb::Connect {
                Command::Connect { login }
            } else {
                Command::Disconnect { login }
            }
        }
        Verb::Send => {
            let from = required(&mut fields, verb, "from", None)?;
            let to = required(&mut fields, verb, "to", Some(from))?;
            let text = fields.remainder();
            if text.is_empty() {
                return Err(ParseError::MissingField {
                    verb,
                    field: "text",
                    from: Some(from.to_string()),
                });
            }
            Command::Send {
                from: from.to_string(),
                to: to.to_string(),
                text: text.to_string(),
            }
        }
        Verb::CreateGroup | Verb::DeleteGroup | Verb::JoinGroup | Verb::LeaveGroup => {
            let from = required(&mut fields, verb, "from", None)?.to_string();
            let group = required(&mut fields, verb, "group", Some(from.as_str()))?.to_string();
            match verb {
                Verb::CreateGroup => Command::CreateGroup { from, group },
                Verb::DeleteGroup => Command::DeleteGroup { from, group },
                Verb::JoinGroup => Command::JoinGroup { from, group },
                _ => Command::LeaveGroup { from, group },
            }
        }
    };
    Ok(Some(command))
}

/// Parse one framed group-channel record. Anything other than a complete
/// `MSG <from> <text>` is ignored.
pub fn parse_group_record(record: &str) -> Option<GroupMessage> {
    let mut fields = Fields::new(strip_line_ending(record));
    if fields.next_token()? != GROUP_MESSAGE_TAG {
        return None;
    }
    let from = fields.next_token()?;
    let text = fields.remainder();
    if text.is_empty() {
        return None;
    }
    Some(GroupMessage {
        from: from.to_string(),
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(record: &str) -> Option<Command> {
        parse_command(record).expect("record should parse")
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(
            parse("CONNECT alice\n"),
            Some(Command::Connect { login: "alice".into() })
        );
        assert_eq!(
            parse("DISCONNECT alice\r\n"),
            Some(Command::Disconnect { login: "alice".into() })
        );
        assert_eq!(
            parse("CREATEGROUP alice proj\n"),
            Some(Command::CreateGroup { from: "alice".into(), group: "proj".into() })
        );
        assert_eq!(
            parse("DELETEGROUP alice proj\n"),
            Some(Command::DeleteGroup { from: "alice".into(), group: "proj".into() })
        );
        assert_eq!(
            parse("JOINGROUP bob proj\n"),
            Some(Command::JoinGroup { from: "bob".into(), group: "proj".into() })
        );
        assert_eq!(
            parse("LEAVEGROUP bob proj\n"),
            Some(Command::LeaveGroup { from: "bob".into(), group: "proj".into() })
        );
    }

    #[test]
    fn send_text_is_the_verbatim_remainder() {
        assert_eq!(
            parse("SEND alice bob hi  there\tfriend\n"),
            Some(Command::Send {
                from: "alice".into(),
                to: "bob".into(),
                text: "hi  there\tfriend".into(),
            })
        );
        // Only one separating space is eaten.
        assert_eq!(
            parse("SEND alice bob   indented\n"),
            Some(Command::Send {
                from: "alice".into(),
                to: "bob".into(),
                text: "  indented".into(),
            })
        );
    }

    #[test]
    fn leading_whitespace_before_fields_is_skipped() {
        assert_eq!(
            parse("  CONNECT    alice  \n"),
            Some(Command::Connect { login: "alice".into() })
        );
    }

    #[test]
    fn empty_lines_parse_to_nothing() {
        assert_eq!(parse("\n"), None);
        assert_eq!(parse("   \r\n"), None);
    }

    #[test]
    fn unknown_tag_keeps_the_raw_line() {
        assert_eq!(
            parse("PING server\n"),
            Some(Command::Unknown { raw: "PING server".into() })
        );
        assert_eq!(
            parse("connect alice\n"),
            Some(Command::Unknown { raw: "connect alice".into() })
        );
    }

    #[test]
    fn missing_fields_report_the_sender_when_known() {
        assert_eq!(
            parse_command("CONNECT\n"),
            Err(ParseError::MissingField { verb: Verb::Connect, field: "login", from: None })
        );
        assert_eq!(
            parse_command("SEND alice\n"),
            Err(ParseError::MissingField {
                verb: Verb::Send,
                field: "to",
                from: Some("alice".into()),
            })
        );
        assert_eq!(
            parse_command("SEND alice bob\n"),
            Err(ParseError::MissingField {
                verb: Verb::Send,
                field: "text",
                from: Some("alice".into()),
            })
        );
        assert_eq!(
            parse_command("JOINGROUP bob\n"),
            Err(ParseError::MissingField {
                verb: Verb::JoinGroup,
                field: "group",
                from: Some("bob".into()),
            })
        );
    }

    #[test]
    fn encoding_matches_the_wire_format() {
        let cmd = Command::Send { from: "alice".into(), to: "bob".into(), text: "hi there".into() };
        assert_eq!(cmd.to_line(), "SEND alice bob hi there\n");
        assert_eq!(parse(&cmd.to_line()), Some(cmd));

        let msg = GroupMessage { from: "alice".into(), text: "hello".into() };
        assert_eq!(msg.to_line(), "MSG alice hello\n");
    }

    #[test]
    fn group_records_require_tag_sender_and_text() {
        assert_eq!(
            parse_group_record("MSG alice hello world\n"),
            Some(GroupMessage { from: "alice".into(), text: "hello world".into() })
        );
        assert_eq!(parse_group_record("MSG alice\n"), None);
        assert_eq!(parse_group_record("MSG alice \n"), None);
        assert_eq!(parse_group_record("MSG\n"), None);
        assert_eq!(parse_group_record("NOTE alice hello\n"), None);
        assert_eq!(parse_group_record("\n"), None);
    }
}
