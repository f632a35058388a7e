use memifctl_api::{MessageKind, ReplyExpectation, Request};

use crate::cmd::{dump, interface, socket};
use crate::input::{InputError, TokenInput};

/// Turns a command's tokens into a validated request.
pub type ParseFn = fn(&mut TokenInput) -> Result<Request, InputError>;

/// One API command the CLI can issue.
#[derive(Debug, Clone, Copy)]
pub struct CommandDescriptor {
    /// The dataplane message name.
    pub name: &'static str,
    /// Short name accepted on the command line.
    pub alias: &'static str,
    pub kind: MessageKind,
    pub usage: &'static str,
    pub parse: ParseFn,
}

impl CommandDescriptor {
    pub fn parse_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Request, InputError> {
        let mut input = TokenInput::new(tokens);
        (self.parse)(&mut input)
    }

    /// `true` when the dataplane answers with a record stream.
    pub fn is_dump(&self) -> bool {
        matches!(self.kind.expectation(), Some(ReplyExpectation::Stream(_)))
    }
}

/// Immutable name → command mapping, built once at startup.
#[derive(Debug)]
pub struct CommandRegistry {
    commands: Vec<CommandDescriptor>,
}

impl CommandRegistry {
    pub fn builtin() -> Self {
        let commands = vec![
            CommandDescriptor {
                name: MessageKind::SocketFilenameAddDel.name(),
                alias: "socket",
                kind: MessageKind::SocketFilenameAddDel,
                usage: "id <id> [filename <path>] [add|del]",
                parse: socket::add_del,
            },
            CommandDescriptor {
                name: MessageKind::SocketFilenameAddDelV2.name(),
                alias: "socket-v2",
                kind: MessageKind::SocketFilenameAddDelV2,
                usage: "id <id> [filename <path>] [add|del]",
                parse: socket::add_del_v2,
            },
            CommandDescriptor {
                name: MessageKind::Create.name(),
                alias: "create",
                kind: MessageKind::Create,
                usage: "[id <id>] [socket-id <id>] [secret <string>] [ring_size <size>] \
                        [buffer_size <size>] [hw_addr <mac>] [mode ip|ethernet] \
                        [master|slave] [rx-queues <n>] [tx-queues <n>]",
                parse: interface::create,
            },
            CommandDescriptor {
                name: MessageKind::Delete.name(),
                alias: "delete",
                kind: MessageKind::Delete,
                usage: "sw_if_index <index>",
                parse: interface::delete,
            },
            CommandDescriptor {
                name: MessageKind::Dump.name(),
                alias: "dump",
                kind: MessageKind::Dump,
                usage: "",
                parse: dump::interfaces,
            },
            CommandDescriptor {
                name: MessageKind::SocketFilenameDump.name(),
                alias: "socket-dump",
                kind: MessageKind::SocketFilenameDump,
                usage: "",
                parse: dump::sockets,
            },
        ];
        Self { commands }
    }

    /// Find a command by message name or alias.
    pub fn lookup(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands
            .iter()
            .find(|command| command.name == name || command.alias == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.iter()
    }
}
