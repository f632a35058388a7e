//! A simulated dataplane for tests and demos.
//!
//! Speaks the real handshake and message codec over a Unix socket and keeps
//! socket and interface tables in memory. [`SimBehavior`] makes it
//! misbehave in the ways the correlation engine has to survive.

use std::collections::BTreeMap;
use std::path::Path;
use std::thread::{self, JoinHandle};

use memifctl_api::bits::{is_pow2, min_log2};
use memifctl_api::{
    CreateInterface, InterfaceDetails, InterfaceMode, InterfaceRole, MacAddress, MessageTable,
    Reply, Request, SocketFilenameAddDel, SocketFilenameDetails,
};
use memifctl_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_PAYLOAD};
use memifctl_transport::{ControlSocket, ControlStream};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::handshake::{handshake_server_with_config, HandshakeConfig};

/// Unknown socket id or sw_if_index.
pub const ERR_NO_SUCH_ENTRY: i32 = -2;
/// Socket id or (socket, id) pair already taken.
pub const ERR_ENTRY_EXISTS: i32 = -3;
/// Socket still referenced by an interface.
pub const ERR_IN_USE: i32 = -4;
/// Field value the dataplane refuses.
pub const ERR_INVALID_VALUE: i32 = -5;

/// Socket id every dataplane starts with.
pub const DEFAULT_SOCKET_ID: u32 = 0;
pub const DEFAULT_SOCKET_FILENAME: &str = "/run/vpp/memif.sock";

const DEFAULT_RING_SIZE: u32 = 1024;
const DEFAULT_BUFFER_SIZE: u16 = 2048;

/// Ways to misbehave.
#[derive(Debug, Clone, Default)]
pub struct SimBehavior {
    /// Hold dump records back until after the control-ping reply.
    pub ping_before_details: bool,
    /// Sever the connection right after this many detail records.
    pub disconnect_after_details: Option<usize>,
}

/// One interface in the simulated table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimInterface {
    pub sw_if_index: u32,
    pub socket_id: u32,
    pub id: u32,
    pub role: InterfaceRole,
    pub mode: InterfaceMode,
    pub log2_ring_size: u32,
    pub buffer_size: u16,
    pub rx_queues: u8,
    pub tx_queues: u8,
    pub hw_addr: MacAddress,
    pub secret: Option<String>,
}

impl SimInterface {
    pub fn name(&self) -> String {
        format!("memif{}/{}", self.socket_id, self.id)
    }

    fn details(&self) -> InterfaceDetails {
        InterfaceDetails {
            sw_if_index: self.sw_if_index,
            hw_addr: self.hw_addr,
            id: self.id,
            role: self.role,
            mode: self.mode,
            socket_id: self.socket_id,
            ring_size: 1 << self.log2_ring_size,
            buffer_size: self.buffer_size,
            admin_up: false,
            link_up: false,
            if_name: self.name(),
        }
    }
}

struct Session {
    client_index: u32,
    details_sent: usize,
    deferred: Vec<Reply>,
}

/// Serves the memif control API on a Unix socket.
pub struct SimDataplane {
    socket: ControlSocket,
    table: MessageTable,
    handshake_config: HandshakeConfig,
    behavior: SimBehavior,
    vpe_pid: u32,
    sockets: BTreeMap<u32, String>,
    interfaces: BTreeMap<u32, SimInterface>,
    next_sw_if_index: u32,
    next_client_index: u32,
    requests: Vec<Request>,
}

impl SimDataplane {
    /// Bind the API socket. Nothing is served until [`serve_one`](Self::serve_one).
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let socket = ControlSocket::bind(path)?;
        let mut sockets = BTreeMap::new();
        sockets.insert(DEFAULT_SOCKET_ID, DEFAULT_SOCKET_FILENAME.to_string());
        Ok(Self {
            socket,
            table: MessageTable::standard(),
            handshake_config: HandshakeConfig::default(),
            behavior: SimBehavior::default(),
            vpe_pid: std::process::id(),
            sockets,
            interfaces: BTreeMap::new(),
            next_sw_if_index: 1,
            next_client_index: 1,
            requests: Vec::new(),
        })
    }

    pub fn with_behavior(mut self, behavior: SimBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Announce a different message numbering.
    pub fn with_message_table(mut self, table: MessageTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_handshake_config(mut self, config: HandshakeConfig) -> Self {
        self.handshake_config = config;
        self
    }

    pub fn path(&self) -> &Path {
        self.socket.path()
    }

    /// Every request decoded so far, in arrival order.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn sockets(&self) -> &BTreeMap<u32, String> {
        &self.sockets
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &SimInterface> {
        self.interfaces.values()
    }

    /// Add or delete a socket mapping; returns the result code.
    pub fn socket_add_del(&mut self, req: &SocketFilenameAddDel) -> i32 {
        if req.is_add {
            if self.sockets.contains_key(&req.socket_id) {
                return ERR_ENTRY_EXISTS;
            }
            if req.filename.is_empty() {
                return ERR_INVALID_VALUE;
            }
            self.sockets.insert(req.socket_id, req.filename.clone());
            return 0;
        }

        if !self.sockets.contains_key(&req.socket_id) {
            return ERR_NO_SUCH_ENTRY;
        }
        if self
            .interfaces
            .values()
            .any(|iface| iface.socket_id == req.socket_id)
        {
            return ERR_IN_USE;
        }
        self.sockets.remove(&req.socket_id);
        0
    }

    /// Create an interface; returns its sw_if_index or a result code.
    pub fn add_interface(&mut self, req: &CreateInterface) -> std::result::Result<u32, i32> {
        if !self.sockets.contains_key(&req.socket_id) {
            return Err(ERR_NO_SUCH_ENTRY);
        }
        if self
            .interfaces
            .values()
            .any(|iface| iface.socket_id == req.socket_id && iface.id == req.id)
        {
            return Err(ERR_ENTRY_EXISTS);
        }

        let ring_size = match req.ring_size {
            0 => DEFAULT_RING_SIZE,
            n if is_pow2(u64::from(n)) => n,
            _ => return Err(ERR_INVALID_VALUE),
        };
        let buffer_size = match req.buffer_size {
            0 => DEFAULT_BUFFER_SIZE,
            n => n,
        };

        let sw_if_index = self.next_sw_if_index;
        self.next_sw_if_index += 1;

        let hw_addr = if req.hw_addr.is_zero() {
            let [.., hi, lo] = sw_if_index.to_be_bytes();
            MacAddress([0x02, 0xfe, 0, 0, hi, lo])
        } else {
            req.hw_addr
        };

        self.interfaces.insert(
            sw_if_index,
            SimInterface {
                sw_if_index,
                socket_id: req.socket_id,
                id: req.id,
                role: req.role,
                mode: req.mode,
                log2_ring_size: min_log2(u64::from(ring_size)),
                buffer_size,
                rx_queues: req.rx_queues,
                tx_queues: req.tx_queues,
                hw_addr,
                secret: req.secret.clone(),
            },
        );
        Ok(sw_if_index)
    }

    pub fn delete_interface(&mut self, sw_if_index: u32) -> i32 {
        match self.interfaces.remove(&sw_if_index) {
            Some(_) => 0,
            None => ERR_NO_SUCH_ENTRY,
        }
    }

    /// Serve `connections` clients one after another.
    pub fn serve(&mut self, connections: usize) -> Result<()> {
        for _ in 0..connections {
            self.serve_one()?;
        }
        Ok(())
    }

    /// Serve on a background thread; the dataplane is handed back when done.
    pub fn spawn(mut self, connections: usize) -> JoinHandle<Result<Self>> {
        thread::spawn(move || {
            self.serve(connections)?;
            Ok(self)
        })
    }

    /// Accept one client and serve it until it disconnects.
    pub fn serve_one(&mut self) -> Result<()> {
        let stream = self.socket.accept()?;
        let reader_stream = stream.try_clone()?;

        let frame_config = FrameConfig {
            max_payload_size: self.handshake_config.max_handshake_payload,
            read_timeout: Some(self.handshake_config.timeout),
            write_timeout: Some(self.handshake_config.timeout),
        };
        let mut reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())?;
        let mut writer = FrameWriter::with_config_stream(stream, frame_config)?;

        let client_index = self.next_client_index;
        self.next_client_index += 1;
        let hello = handshake_server_with_config(
            &mut reader,
            &mut writer,
            client_index,
            &self.table,
            &self.handshake_config,
        )?;
        reader.set_max_payload_size(DEFAULT_MAX_PAYLOAD);
        writer.set_max_payload_size(DEFAULT_MAX_PAYLOAD);
        reader.set_read_timeout(None)?;
        info!(client_index, client = %hello.client_name, "sim: client connected");

        let mut session = Session {
            client_index,
            details_sent: 0,
            deferred: Vec::new(),
        };

        loop {
            let frame = match reader.read_frame() {
                Ok(frame) => frame,
                Err(FrameError::ConnectionClosed) => {
                    debug!(client_index, "sim: client disconnected");
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            let Some(kind) = self.table.kind(frame.msg_id) else {
                warn!(msg_id = frame.msg_id, "sim: unknown message id");
                continue;
            };
            let request = match Request::decode(kind, frame.payload) {
                Ok((_, request)) => request,
                Err(err) => {
                    warn!(message = %kind, error = %err, "sim: undecodable request");
                    continue;
                }
            };
            debug!(message = %kind, "sim: request");
            self.requests.push(request.clone());

            let replies = self.handle(&request, &session);
            if !self.emit(&mut writer, &mut session, replies)? {
                info!(client_index, "sim: severing connection");
                writer.get_ref().shutdown()?;
                return Ok(());
            }
        }
    }

    fn handle(&mut self, request: &Request, session: &Session) -> Vec<Reply> {
        match request {
            Request::SocketFilenameAddDel(req) => vec![Reply::SocketFilenameAddDel {
                retval: self.socket_add_del(req),
            }],
            Request::SocketFilenameAddDelV2(req) => vec![Reply::SocketFilenameAddDelV2 {
                retval: self.socket_add_del(req),
                socket_id: req.socket_id,
            }],
            Request::Create(req) => {
                let reply = match self.add_interface(req) {
                    Ok(sw_if_index) => Reply::Create {
                        retval: 0,
                        sw_if_index,
                    },
                    Err(retval) => Reply::Create {
                        retval,
                        sw_if_index: 0,
                    },
                };
                vec![reply]
            }
            Request::Delete(req) => vec![Reply::Delete {
                retval: self.delete_interface(req.sw_if_index),
            }],
            Request::Dump => self
                .interfaces
                .values()
                .map(|iface| Reply::Details(iface.details()))
                .collect(),
            Request::SocketFilenameDump => self
                .sockets
                .iter()
                .map(|(socket_id, filename)| {
                    Reply::SocketFilenameDetails(SocketFilenameDetails {
                        socket_id: *socket_id,
                        socket_filename: filename.clone(),
                    })
                })
                .collect(),
            Request::ControlPing => vec![Reply::ControlPing {
                retval: 0,
                client_index: session.client_index,
                vpe_pid: self.vpe_pid,
            }],
        }
    }

    /// Send replies under the configured behavior. `false` means sever.
    fn emit(
        &self,
        writer: &mut FrameWriter<ControlStream>,
        session: &mut Session,
        replies: Vec<Reply>,
    ) -> Result<bool> {
        for reply in replies {
            match reply {
                Reply::Details(_) | Reply::SocketFilenameDetails(_) => {
                    if self.behavior.ping_before_details {
                        session.deferred.push(reply);
                    } else if !self.send_record(writer, session, &reply)? {
                        return Ok(false);
                    }
                }
                Reply::ControlPing { .. } => {
                    self.send(writer, &reply)?;
                    for record in std::mem::take(&mut session.deferred) {
                        if !self.send_record(writer, session, &record)? {
                            return Ok(false);
                        }
                    }
                }
                _ => self.send(writer, &reply)?,
            }
        }
        Ok(true)
    }

    fn send_record(
        &self,
        writer: &mut FrameWriter<ControlStream>,
        session: &mut Session,
        record: &Reply,
    ) -> Result<bool> {
        self.send(writer, record)?;
        session.details_sent += 1;
        Ok(self.behavior.disconnect_after_details != Some(session.details_sent))
    }

    fn send(&self, writer: &mut FrameWriter<ControlStream>, reply: &Reply) -> Result<()> {
        let msg_id = self.table.id(reply.kind())?;
        writer.send(msg_id, &reply.encode()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim() -> (SimDataplane, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "memifctl-sim-unit-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        let sim = SimDataplane::bind(dir.join("api.sock")).expect("sim should bind");
        (sim, dir)
    }

    #[test]
    fn socket_table_rules() {
        let (mut sim, dir) = sim();
        let add = |socket_id: u32, filename: &str| SocketFilenameAddDel {
            is_add: true,
            socket_id,
            filename: filename.to_string(),
        };

        assert_eq!(sim.socket_add_del(&add(5, "/tmp/a.sock")), 0);
        assert_eq!(sim.socket_add_del(&add(5, "/tmp/b.sock")), ERR_ENTRY_EXISTS);

        sim.add_interface(&CreateInterface {
            socket_id: 5,
            ..CreateInterface::default()
        })
        .unwrap();
        let del = SocketFilenameAddDel {
            is_add: false,
            socket_id: 5,
            filename: String::new(),
        };
        assert_eq!(sim.socket_add_del(&del), ERR_IN_USE);
        assert_eq!(
            sim.socket_add_del(&SocketFilenameAddDel {
                socket_id: 6,
                ..del.clone()
            }),
            ERR_NO_SUCH_ENTRY
        );

        assert_eq!(sim.delete_interface(1), 0);
        assert_eq!(sim.socket_add_del(&del), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn interfaces_get_sequential_indexes_and_defaults() {
        let (mut sim, dir) = sim();

        let first = sim.add_interface(&CreateInterface::default()).unwrap();
        let second = sim
            .add_interface(&CreateInterface {
                id: 1,
                ring_size: 4096,
                ..CreateInterface::default()
            })
            .unwrap();
        assert_eq!((first, second), (1, 2));
        assert_eq!(
            sim.add_interface(&CreateInterface::default()),
            Err(ERR_ENTRY_EXISTS)
        );
        assert_eq!(
            sim.add_interface(&CreateInterface {
                socket_id: 9,
                ..CreateInterface::default()
            }),
            Err(ERR_NO_SUCH_ENTRY)
        );

        let ifaces: Vec<&SimInterface> = sim.interfaces().collect();
        assert_eq!(ifaces[0].details().ring_size, DEFAULT_RING_SIZE);
        assert_eq!(ifaces[0].details().buffer_size, DEFAULT_BUFFER_SIZE);
        assert_eq!(ifaces[1].log2_ring_size, 12);
        assert_eq!(ifaces[1].name(), "memif0/1");
        assert_eq!(ifaces[1].hw_addr, MacAddress([0x02, 0xfe, 0, 0, 0, 2]));
        assert_eq!(sim.delete_interface(42), ERR_NO_SUCH_ENTRY);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn non_power_of_two_ring_is_refused() {
        let (mut sim, dir) = sim();
        assert_eq!(
            sim.add_interface(&CreateInterface {
                ring_size: 100,
                ..CreateInterface::default()
            }),
            Err(ERR_INVALID_VALUE)
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
