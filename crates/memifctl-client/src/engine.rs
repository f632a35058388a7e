//! Call correlation over the shared dataplane channel.
//!
//! Replies carry no correlation token: they are matched to the outstanding
//! call by message kind alone. That only works while at most one call is in
//! flight, so [`Client::call`] refuses to start a second one.
//!
//! Dumps have no end-of-list marker. The client follows the dump request
//! with a control ping on the same ordered channel; the ping reply closes
//! the record stream.

use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use memifctl_api::{
    ApiError, InterfaceDetails, MessageKind, MessageTable, Reply, ReplyExpectation, Request,
    SocketFilenameDetails,
};
use memifctl_frame::{FrameError, FrameReader, FrameWriter};
use memifctl_transport::{ControlStream, TransportError};
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::handshake::HandshakeResult;

/// Result code for input rejected before anything was sent.
pub const LOCAL_ERROR: i32 = -99;

/// Result code for a channel failure while a call was outstanding.
pub const TRANSPORT_ERROR: i32 = -100;

/// How a call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Result code of the resolving reply. Negative values come straight
    /// from the dataplane.
    pub retval: i32,
    /// The ack, or the control-ping reply that closed a dump.
    pub reply: Reply,
    /// Detail records in arrival order. Always empty for single replies.
    pub records: Vec<Reply>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.retval == 0
    }

    /// Socket id or sw_if_index assigned by the dataplane, on success only.
    pub fn assigned_handle(&self) -> Option<u32> {
        if !self.is_success() {
            return None;
        }
        match self.reply {
            Reply::SocketFilenameAddDelV2 { socket_id, .. } => Some(socket_id),
            Reply::Create { sw_if_index, .. } => Some(sw_if_index),
            _ => None,
        }
    }

    /// Dataplane process id carried by a control-ping reply.
    pub fn vpe_pid(&self) -> Option<u32> {
        match self.reply {
            Reply::ControlPing { vpe_pid, .. } => Some(vpe_pid),
            _ => None,
        }
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceDetails> {
        self.records.iter().filter_map(|record| match record {
            Reply::Details(details) => Some(details),
            _ => None,
        })
    }

    pub fn sockets(&self) -> impl Iterator<Item = &SocketFilenameDetails> {
        self.records.iter().filter_map(|record| match record {
            Reply::SocketFilenameDetails(details) => Some(details),
            _ => None,
        })
    }
}

/// Caller-side state of the one outstanding call.
struct InFlightCall {
    request: MessageKind,
    expectation: ReplyExpectation,
    records: Vec<Reply>,
    /// First decode failure inside a stream; reported when the stream closes.
    failure: Option<ApiError>,
    done: SyncSender<Result<Completion>>,
}

impl InFlightCall {
    fn accepts(&self, kind: MessageKind) -> bool {
        match self.expectation {
            ReplyExpectation::Single(expected) => kind == expected,
            ReplyExpectation::Stream(record) => {
                kind == record || kind == MessageKind::ControlPingReply
            }
        }
    }

    /// Feed one accepted reply. Returns the result once resolved.
    fn offer(&mut self, reply: Reply) -> Option<Result<Completion>> {
        if let ReplyExpectation::Stream(record) = self.expectation {
            if reply.kind() == record {
                if self.failure.is_none() {
                    self.records.push(reply);
                }
                return None;
            }
        }
        if let Some(err) = self.failure.take() {
            return Some(Err(ClientError::Api(err)));
        }
        Some(Ok(Completion {
            retval: reply.retval().unwrap_or_default(),
            reply,
            records: std::mem::take(&mut self.records),
        }))
    }

    /// An accepted reply failed to decode.
    ///
    /// A bad stream record does not end the call: the rest of the stream and
    /// its control-ping reply still belong to it and must be drained first.
    fn reject(&mut self, kind: MessageKind, err: ApiError) -> Option<Result<Completion>> {
        match self.expectation {
            ReplyExpectation::Stream(record) if kind == record => {
                self.records.clear();
                self.failure.get_or_insert(err);
                None
            }
            _ => Some(Err(ClientError::Api(err))),
        }
    }

    fn resolve(self, result: Result<Completion>) {
        // The receiver is gone only if the caller stopped waiting.
        let _ = self.done.send(result);
    }
}

#[derive(Default)]
struct EngineState {
    in_flight: Option<InFlightCall>,
    /// Set once the delivery thread has stopped.
    closed: Option<String>,
}

fn lock(state: &Mutex<EngineState>) -> MutexGuard<'_, EngineState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A connected dataplane client.
///
/// Calls block the issuing thread until resolution. Replies are read on a
/// dedicated delivery thread which hands the result back over a rendezvous
/// channel. There is no internal timeout: a silent dataplane blocks the
/// caller until the channel fails.
pub struct Client {
    writer: Mutex<FrameWriter<ControlStream>>,
    state: Arc<Mutex<EngineState>>,
    table: Arc<MessageTable>,
    client_index: u32,
    protocol_version: String,
    closer: ControlStream,
    delivery: Option<JoinHandle<()>>,
}

impl Client {
    /// Start the engine on a connection that finished its handshake.
    pub fn start(
        mut reader: FrameReader<ControlStream>,
        writer: FrameWriter<ControlStream>,
        handshake: HandshakeResult,
    ) -> Result<Self> {
        reader.set_read_timeout(None)?;
        let closer = writer.get_ref().try_clone()?;

        let table = Arc::new(handshake.message_table);
        let state = Arc::new(Mutex::new(EngineState::default()));

        let delivery = thread::Builder::new()
            .name("memifctl-delivery".to_string())
            .spawn({
                let table = Arc::clone(&table);
                let state = Arc::clone(&state);
                move || deliver(reader, &table, &state)
            })
            .map_err(TransportError::from)?;

        info!(
            client_index = handshake.client_index,
            version = %handshake.protocol_version,
            messages = table.len(),
            "dataplane connection established"
        );

        Ok(Self {
            writer: Mutex::new(writer),
            state,
            table,
            client_index: handshake.client_index,
            protocol_version: handshake.protocol_version,
            closer,
            delivery: Some(delivery),
        })
    }

    pub fn client_index(&self) -> u32 {
        self.client_index
    }

    pub fn message_table(&self) -> &MessageTable {
        &self.table
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// `(uid, gid, pid)` of the dataplane process, where the platform reports it.
    pub fn peer_credentials(&self) -> Option<(u32, u32, u32)> {
        self.closer.peer_credentials()
    }

    /// False once the channel has failed; every later call is refused.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).closed.is_none()
    }

    /// Send `request` and block until its reply (or record stream) resolves.
    ///
    /// A dataplane rejection is not an error: it comes back as a
    /// [`Completion`] with a negative `retval`.
    pub fn call(&self, request: &Request) -> Result<Completion> {
        let kind = request.kind();
        let expectation = request.expectation()?;

        let msg_id = self.table.id(kind)?;
        let payload = request.encode(self.client_index)?;
        let sentinel = match expectation {
            ReplyExpectation::Stream(_) => Some((
                self.table.id(MessageKind::ControlPing)?,
                Request::ControlPing.encode(self.client_index)?,
            )),
            ReplyExpectation::Single(_) => None,
        };

        let (done, completed) = mpsc::sync_channel(1);
        {
            let mut state = lock(&self.state);
            if let Some(reason) = &state.closed {
                return Err(ClientError::Disconnected(reason.clone()));
            }
            if let Some(outstanding) = &state.in_flight {
                debug!(outstanding = %outstanding.request, rejected = %kind, "call refused");
                return Err(ClientError::CallInProgress);
            }
            state.in_flight = Some(InFlightCall {
                request: kind,
                expectation,
                records: Vec::new(),
                failure: None,
                done,
            });
        }

        debug!(message = %kind, msg_id, bytes = payload.len(), "sending request");
        let sent = {
            let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            writer.send(msg_id, &payload).and_then(|()| match &sentinel {
                Some((ping_id, ping)) => {
                    debug!(msg_id = *ping_id, "sending control ping sentinel");
                    writer.send(*ping_id, ping)
                }
                None => Ok(()),
            })
        };

        if let Err(err) = sent {
            warn!(message = %kind, error = %err, "send failed; abandoning call");
            lock(&self.state).in_flight = None;
            return Err(err.into());
        }

        completed.recv().unwrap_or_else(|_| {
            Err(ClientError::Disconnected(
                "delivery thread stopped".to_string(),
            ))
        })
    }

    /// Round-trip a bare control ping.
    pub fn ping(&self) -> Result<Completion> {
        self.call(&Request::ControlPing)
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.closer.shutdown();
        if let Some(delivery) = self.delivery.take() {
            let _ = delivery.join();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("client_index", &self.client_index)
            .field("protocol_version", &self.protocol_version)
            .field("messages", &self.table.len())
            .finish_non_exhaustive()
    }
}

fn deliver(
    mut reader: FrameReader<ControlStream>,
    table: &MessageTable,
    state: &Mutex<EngineState>,
) {
    let reason = loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break "connection closed by dataplane".to_string(),
            Err(err) => break err.to_string(),
        };

        let Some(kind) = table.kind(frame.msg_id) else {
            debug!(msg_id = frame.msg_id, "ignoring message with unknown id");
            continue;
        };

        let mut guard = lock(state);
        let Some(call) = guard.in_flight.as_mut() else {
            debug!(message = %kind, "no call outstanding; ignoring");
            continue;
        };
        if !call.accepts(kind) {
            debug!(message = %kind, outstanding = %call.request, "unrelated message; ignoring");
            continue;
        }

        let resolved = match Reply::decode(kind, frame.payload) {
            Ok(reply) => call.offer(reply),
            Err(err) => {
                warn!(message = %kind, error = %err, "malformed reply; failing call");
                call.reject(kind, err)
            }
        };
        if let Some(result) = resolved {
            if let Some(call) = guard.in_flight.take() {
                debug!(message = %call.request, records = call.records.len(), "call resolved");
                call.resolve(result);
            }
        }
    };

    info!(reason = %reason, "delivery stopped");
    let mut guard = lock(state);
    guard.closed = Some(reason.clone());
    if let Some(call) = guard.in_flight.take() {
        warn!(
            message = %call.request,
            discarded = call.records.len(),
            "channel lost with a call outstanding"
        );
        call.resolve(Err(ClientError::Disconnected(reason)));
    }
}
