use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Every message type this client sends or understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SocketFilenameAddDel,
    SocketFilenameAddDelReply,
    SocketFilenameAddDelV2,
    SocketFilenameAddDelV2Reply,
    Create,
    CreateReply,
    Delete,
    DeleteReply,
    Dump,
    Details,
    SocketFilenameDump,
    SocketFilenameDetails,
    ControlPing,
    ControlPingReply,
}

impl MessageKind {
    pub const ALL: [MessageKind; 14] = [
        MessageKind::SocketFilenameAddDel,
        MessageKind::SocketFilenameAddDelReply,
        MessageKind::SocketFilenameAddDelV2,
        MessageKind::SocketFilenameAddDelV2Reply,
        MessageKind::Create,
        MessageKind::CreateReply,
        MessageKind::Delete,
        MessageKind::DeleteReply,
        MessageKind::Dump,
        MessageKind::Details,
        MessageKind::SocketFilenameDump,
        MessageKind::SocketFilenameDetails,
        MessageKind::ControlPing,
        MessageKind::ControlPingReply,
    ];

    /// The dataplane's name for this message.
    pub const fn name(self) -> &'static str {
        match self {
            MessageKind::SocketFilenameAddDel => "memif_socket_filename_add_del",
            MessageKind::SocketFilenameAddDelReply => "memif_socket_filename_add_del_reply",
            MessageKind::SocketFilenameAddDelV2 => "memif_socket_filename_add_del_v2",
            MessageKind::SocketFilenameAddDelV2Reply => "memif_socket_filename_add_del_v2_reply",
            MessageKind::Create => "memif_create",
            MessageKind::CreateReply => "memif_create_reply",
            MessageKind::Delete => "memif_delete",
            MessageKind::DeleteReply => "memif_delete_reply",
            MessageKind::Dump => "memif_dump",
            MessageKind::Details => "memif_details",
            MessageKind::SocketFilenameDump => "memif_socket_filename_dump",
            MessageKind::SocketFilenameDetails => "memif_socket_filename_details",
            MessageKind::ControlPing => "control_ping",
            MessageKind::ControlPingReply => "control_ping_reply",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// True for messages the client sends.
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            MessageKind::SocketFilenameAddDel
                | MessageKind::SocketFilenameAddDelV2
                | MessageKind::Create
                | MessageKind::Delete
                | MessageKind::Dump
                | MessageKind::SocketFilenameDump
                | MessageKind::ControlPing
        )
    }

    /// How the dataplane answers a request of this kind.
    ///
    /// `None` for reply kinds.
    pub const fn expectation(self) -> Option<ReplyExpectation> {
        let expectation = match self {
            MessageKind::SocketFilenameAddDel => {
                ReplyExpectation::Single(MessageKind::SocketFilenameAddDelReply)
            }
            MessageKind::SocketFilenameAddDelV2 => {
                ReplyExpectation::Single(MessageKind::SocketFilenameAddDelV2Reply)
            }
            MessageKind::Create => ReplyExpectation::Single(MessageKind::CreateReply),
            MessageKind::Delete => ReplyExpectation::Single(MessageKind::DeleteReply),
            MessageKind::ControlPing => ReplyExpectation::Single(MessageKind::ControlPingReply),
            MessageKind::Dump => ReplyExpectation::Stream(MessageKind::Details),
            MessageKind::SocketFilenameDump => {
                ReplyExpectation::Stream(MessageKind::SocketFilenameDetails)
            }
            _ => return None,
        };
        Some(expectation)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What resolves a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyExpectation {
    /// The first reply of this kind.
    Single(MessageKind),
    /// Any number of records of this kind, closed by the control-ping reply.
    Stream(MessageKind),
}

/// One row of the dataplane message table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntry {
    pub name: String,
    pub id: u16,
}

/// Name ↔ id mapping announced by the dataplane.
///
/// Unknown names are kept (other plugins share the channel) but only
/// [`MessageKind`]s can be resolved by kind.
#[derive(Debug, Clone, Default)]
pub struct MessageTable {
    by_name: HashMap<String, u16>,
    by_id: HashMap<u16, MessageKind>,
}

impl MessageTable {
    /// Base id of the memif plugin range in [`MessageTable::standard`].
    pub const STANDARD_MEMIF_BASE: u16 = 600;

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = MessageEntry>,
    {
        let mut table = Self::default();
        for entry in entries {
            if let Some(kind) = MessageKind::from_name(&entry.name) {
                table.by_id.insert(entry.id, kind);
            }
            table.by_name.insert(entry.name, entry.id);
        }
        table
    }

    /// Reference numbering: control ping at 1/2, memif messages from
    /// [`Self::STANDARD_MEMIF_BASE`] in declaration order.
    pub fn standard() -> Self {
        let mut next_memif = Self::STANDARD_MEMIF_BASE;
        Self::from_entries(MessageKind::ALL.into_iter().map(|kind| {
            let id = match kind {
                MessageKind::ControlPing => 1,
                MessageKind::ControlPingReply => 2,
                _ => {
                    let id = next_memif;
                    next_memif += 1;
                    id
                }
            };
            MessageEntry {
                name: kind.name().to_string(),
                id,
            }
        }))
    }

    /// Wire id for `kind`.
    pub fn id(&self, kind: MessageKind) -> Result<u16> {
        self.by_name
            .get(kind.name())
            .copied()
            .ok_or(ApiError::UnsupportedMessage(kind.name()))
    }

    /// Wire id for an arbitrary message name.
    pub fn id_by_name(&self, name: &str) -> Option<u16> {
        self.by_name.get(name).copied()
    }

    /// The kind carried under `id`, if it is one this client understands.
    pub fn kind(&self, id: u16) -> Option<MessageKind> {
        self.by_id.get(&id).copied()
    }

    /// Entries sorted by id.
    pub fn entries(&self) -> Vec<MessageEntry> {
        let mut entries: Vec<MessageEntry> = self
            .by_name
            .iter()
            .map(|(name, id)| MessageEntry {
                name: name.clone(),
                id: *id,
            })
            .collect();
        entries.sort_by_key(|entry| entry.id);
        entries
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// True when every memif request and its replies have ids.
    pub fn supports_memif(&self) -> bool {
        MessageKind::ALL
            .into_iter()
            .all(|kind| self.by_name.contains_key(kind.name()))
    }
}
