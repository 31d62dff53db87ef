//! RPC header, broker and bind handshake.
//!
//! The broker is sans-io: [`RpcBroker::receive`] feeds inbound bytes
//! through a splitter and dispatches whole frames; outbound frames
//! accumulate in a bounded buffer the hosting driver drains. A codec
//! error on any broker path terminates the connection; a response whose
//! token is unknown is logged and dropped with the pending table left
//! intact.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use crate::buffer::RingBuf;
use crate::error::{DecodeError, DecodeErrorKind};
use crate::registry::Registry;
use crate::schema;
use crate::service::{MethodDescriptor, MethodRequest, MethodResponse, ServiceDescriptor};
use crate::split::RpcSplitter;
use crate::value::{MessageValue, Value};

/// Service id marking a response frame.
pub const RESPONSE_SERVICE_ID: u32 = 254;

/// Export id of the built-in connection service on every broker.
pub const CONNECTION_EXPORT_ID: u32 = 0;

/// Typed view of `BnetPacketHeader`. Optional fields encode only when
/// present, so request and response headers keep their distinct wire
/// shapes.
#[derive(Clone, Debug, PartialEq)]
pub struct RpcHeader {
    pub service_id: u32,
    pub method_id: Option<u32>,
    pub token: u32,
    pub object_id: Option<u32>,
    pub size: u32,
    pub status: Option<u32>,
    pub error: Vec<MessageValue>,
    /// Carried through unmodified; the broker never enforces it.
    pub timeout: Option<u64>,
}

impl RpcHeader {
    pub fn request(service_id: u32, method_id: u32, token: u32) -> RpcHeader {
        RpcHeader {
            service_id,
            method_id: Some(method_id),
            token,
            object_id: None,
            size: 0,
            status: None,
            error: Vec::new(),
            timeout: None,
        }
    }

    pub fn response(token: u32) -> RpcHeader {
        RpcHeader {
            service_id: RESPONSE_SERVICE_ID,
            method_id: None,
            token,
            object_id: None,
            size: 0,
            status: Some(0),
            error: Vec::new(),
            timeout: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> RpcHeader {
        self.size = size;
        self
    }

    pub fn is_response(&self) -> bool {
        self.service_id == RESPONSE_SERVICE_ID
    }

    pub fn decode(buf: &[u8]) -> Result<RpcHeader, DecodeError> {
        let registry = schema::registry();
        let value = MessageValue::decode(registry, schema::packet_header_type(), buf)?;
        Ok(RpcHeader::from_value(registry, &value))
    }

    fn from_value(registry: &Registry, value: &MessageValue) -> RpcHeader {
        RpcHeader {
            service_id: value.get_u32(registry, "ServiceId").unwrap_or(0),
            method_id: value.get_u32(registry, "MethodId"),
            token: value.get_u32(registry, "Token").unwrap_or(0),
            object_id: value.get_u32(registry, "ObjectId"),
            size: value.get_u32(registry, "Size").unwrap_or(0),
            status: value.get_u32(registry, "Status"),
            error: value
                .get_repeated(registry, "Error")
                .iter()
                .filter_map(|v| v.as_message().cloned())
                .collect(),
            timeout: value.get_u64(registry, "Timeout"),
        }
    }

    fn to_value(&self, registry: &Registry) -> MessageValue {
        let mut value = MessageValue::new(registry, schema::packet_header_type());
        value.set(registry, "ServiceId", Value::Uint(u64::from(self.service_id)));
        if let Some(method_id) = self.method_id {
            value.set(registry, "MethodId", Value::Uint(u64::from(method_id)));
        }
        value.set(registry, "Token", Value::Uint(u64::from(self.token)));
        if let Some(object_id) = self.object_id {
            value.set(registry, "ObjectId", Value::Uint(u64::from(object_id)));
        }
        value.set(registry, "Size", Value::Uint(u64::from(self.size)));
        if let Some(status) = self.status {
            value.set(registry, "Status", Value::Uint(u64::from(status)));
        }
        for error in &self.error {
            value.push(registry, "Error", Value::Message(error.clone()));
        }
        if let Some(timeout) = self.timeout {
            value.set(registry, "Timeout", Value::Uint(timeout));
        }
        value
    }

    /// Assembles a whole RPC envelope frame:
    /// `[header_len: u16 BE][header][body]`.
    pub fn encode_frame(&self, body: &[u8]) -> Vec<u8> {
        let registry = schema::registry();
        let header = self.to_value(registry);
        let header_len = header.encoded_len(registry);
        let mut frame = Vec::with_capacity(2 + header_len + body.len());
        frame.extend_from_slice(&(header_len as u16).to_be_bytes());
        header.encode_raw(registry, &mut frame);
        frame.extend_from_slice(body);
        frame
    }
}

/// An opaque `(Label, Epoch)` process identity exchanged during connect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessId {
    pub label: u32,
    pub epoch: u32,
}

impl ProcessId {
    pub fn new(label: u32, epoch: u32) -> ProcessId {
        ProcessId { label, epoch }
    }

    fn to_value(self, registry: &Registry) -> MessageValue {
        let mut value = MessageValue::new(
            registry,
            lookup_type(registry, "BnetProcessId"),
        );
        value.set(registry, "Label", Value::Uint(u64::from(self.label)));
        value.set(registry, "Epoch", Value::Uint(u64::from(self.epoch)));
        value
    }
}

fn lookup_type(registry: &Registry, name: &str) -> crate::registry::TypeId {
    match registry.lookup(name) {
        Some(id) => id,
        None => panic!("schema does not register {name}"),
    }
}

/// What a request handler produced.
pub enum Reply {
    /// Nothing; a declared response is defaulted by the broker.
    None,
    One(MessageValue),
    /// A finite sequence of responses, each sent with the request token.
    /// This is how a server pushes intermediate updates before a final
    /// reply.
    Stream(Vec<MessageValue>),
}

/// A served method implementation.
///
/// Handlers run on the connection's event loop and must not block. The
/// request is `None` when the method's request type is not implemented;
/// the raw body is available in that case for logging.
pub trait ServiceHandler {
    fn call(
        &mut self,
        core: &mut BrokerCore,
        method: &MethodDescriptor,
        request: Option<MessageValue>,
    ) -> Reply;
}

/// Continuation invoked when a matching response arrives.
pub type ResponseCallback = Box<dyn FnOnce(&mut RpcBroker, &RpcHeader, Option<MessageValue>)>;

struct Pending {
    service_id: u32,
    method_id: u32,
    resp: MethodResponse,
    action: PendingAction,
}

enum PendingAction {
    Discard,
    Callback(ResponseCallback),
    /// A connect request awaiting its bind result; the payload is the
    /// hash list we asked the peer to import, in request order.
    Bind(Vec<u32>),
}

struct Import {
    descriptor: &'static ServiceDescriptor,
    bound_id: Option<u32>,
}

enum ExportKind {
    /// The built-in connection service (bind, echo, keep-alive).
    Connection,
    Handler(Box<dyn ServiceHandler>),
    /// Stand-in for a service the peer imported but nobody exports. It
    /// logs requests and answers with empty responses so the peer is
    /// never stalled.
    Placeholder,
}

struct Export {
    hash: u32,
    descriptor: Option<&'static ServiceDescriptor>,
    kind: ExportKind,
}

/// The shared half of a broker that request handlers may use while
/// their own export entry is borrowed: the token allocator, the
/// pending-response table, the import bindings and the outbound buffer.
pub struct BrokerCore {
    outbound: RingBuf,
    pending: HashMap<u32, Pending>,
    next_token: u32,
    imports: Vec<Import>,
    imports_by_hash: HashMap<u32, usize>,
}

impl BrokerCore {
    fn alloc_token(&mut self) -> u32 {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        token
    }

    /// The buffer of assembled outbound frames, for the driver to push.
    pub fn outbound(&mut self) -> &mut RingBuf {
        &mut self.outbound
    }

    fn send_frame(&mut self, header: &RpcHeader, body: &[u8]) -> Result<(), DecodeError> {
        self.outbound.append(&header.encode_frame(body))
    }

    /// Sends a response frame echoing the request token. `body` of
    /// `None` sends an empty (default) response.
    pub fn send_response(
        &mut self,
        token: u32,
        body: Option<&MessageValue>,
    ) -> Result<(), DecodeError> {
        let registry = schema::registry();
        let encoded = body.map(|b| b.encode_to_vec(registry)).unwrap_or_default();
        let header = RpcHeader::response(token).with_size(encoded.len() as u32);
        debug!("send response token={} size={}", token, encoded.len());
        self.send_frame(&header, &encoded)
    }

    /// Calls a method on an imported service. The import must have been
    /// bound by a bind handshake. Returns the allocated token.
    pub fn call(
        &mut self,
        service_name: &str,
        method_name: &str,
        body: Option<&MessageValue>,
        callback: Option<ResponseCallback>,
    ) -> Result<u32, DecodeError> {
        let registry = schema::registry();
        let descriptor = schema::services().get_by_name(service_name).ok_or(
            DecodeError::new(DecodeErrorKind::ProtocolViolation("unknown service name")),
        )?;
        let import_index = self
            .imports_by_hash
            .get(&descriptor.hash())
            .copied()
            .ok_or(DecodeError::new(DecodeErrorKind::ProtocolViolation(
                "service is not imported",
            )))?;
        let import = &self.imports[import_index];
        let service_id = import.bound_id.ok_or(DecodeError::new(
            DecodeErrorKind::ProtocolViolation("service import is not bound"),
        ))?;
        let method = descriptor
            .method_by_name(method_name)
            .ok_or(DecodeError::new(DecodeErrorKind::NotImplemented))?;

        let encoded = body.map(|b| b.encode_to_vec(registry)).unwrap_or_default();
        let token = self.alloc_token();
        let header =
            RpcHeader::request(service_id, method.id, token).with_size(encoded.len() as u32);

        if method.resp.expects_response() {
            self.pending.insert(
                token,
                Pending {
                    service_id,
                    method_id: method.id,
                    resp: method.resp,
                    action: match callback {
                        Some(callback) => PendingAction::Callback(callback),
                        None => PendingAction::Discard,
                    },
                },
            );
        }
        debug!(
            "send request {}:{} token={}",
            service_name, method_name, token
        );
        self.send_frame(&header, &encoded)?;
        Ok(token)
    }
}

/// One connection's RPC state: imported and exported services, pending
/// responses and the per-direction splitter.
pub struct RpcBroker {
    core: BrokerCore,
    exports: Vec<Export>,
    exports_by_hash: HashMap<u32, u32>,
    splitter: RpcSplitter,
    server_id: ProcessId,
    client_id: ProcessId,
}

impl RpcBroker {
    pub fn new() -> RpcBroker {
        RpcBroker::with_process_ids(ProcessId::new(0xABCD, 0xAFFE), ProcessId::new(0xB0FF, 0xAFFE))
    }

    pub fn with_process_ids(server_id: ProcessId, client_id: ProcessId) -> RpcBroker {
        let mut broker = RpcBroker {
            core: BrokerCore {
                outbound: RingBuf::new(),
                pending: HashMap::new(),
                next_token: 0,
                imports: Vec::new(),
                imports_by_hash: HashMap::new(),
            },
            exports: Vec::new(),
            exports_by_hash: HashMap::new(),
            splitter: RpcSplitter::new(),
            server_id,
            client_id,
        };
        let connection = schema::services()
            .get_by_name(schema::CONNECTION_SERVICE)
            .unwrap_or_else(|| panic!("schema does not register the connection service"));
        broker.push_export(connection.hash(), Some(connection), ExportKind::Connection);
        broker
    }

    fn push_export(
        &mut self,
        hash: u32,
        descriptor: Option<&'static ServiceDescriptor>,
        kind: ExportKind,
    ) -> u32 {
        let id = self.exports.len() as u32;
        self.exports.push(Export {
            hash,
            descriptor,
            kind,
        });
        self.exports_by_hash.insert(hash, id);
        id
    }

    /// Exports a service under the next free export id.
    pub fn add_export(
        &mut self,
        service_name: &'static str,
        handler: Box<dyn ServiceHandler>,
    ) -> Result<u32, DecodeError> {
        let descriptor = schema::services().get_by_name(service_name).ok_or(
            DecodeError::new(DecodeErrorKind::ProtocolViolation("unknown service name")),
        )?;
        Ok(self.push_export(descriptor.hash(), Some(descriptor), ExportKind::Handler(handler)))
    }

    /// Registers a service this side intends to call. The numeric id is
    /// assigned by the peer during the bind handshake.
    pub fn add_import(&mut self, service_name: &'static str) -> Result<(), DecodeError> {
        let descriptor = schema::services().get_by_name(service_name).ok_or(
            DecodeError::new(DecodeErrorKind::ProtocolViolation("unknown service name")),
        )?;
        let index = self.core.imports.len();
        self.core.imports.push(Import {
            descriptor,
            bound_id: None,
        });
        self.core.imports_by_hash.insert(descriptor.hash(), index);
        Ok(())
    }

    pub fn core(&mut self) -> &mut BrokerCore {
        &mut self.core
    }

    /// The buffer of assembled outbound frames, for the driver to push.
    pub fn outbound(&mut self) -> &mut RingBuf {
        &mut self.core.outbound
    }

    /// Drains every buffered outbound byte. Test and capture drivers
    /// use this instead of a socket push.
    pub fn drain_outbound(&mut self) -> Vec<u8> {
        let used = self.core.outbound.used();
        let bytes = self.core.outbound.peek(used, 0).to_vec();
        self.core.outbound.consume(used);
        bytes
    }

    /// Feeds inbound stream bytes and dispatches every whole frame.
    ///
    /// An error terminates the connection: the caller must stop feeding
    /// and close the transport.
    pub fn receive(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.splitter.feed(data)?;
        while let Some((header, body)) = self.splitter.pull_segment()? {
            self.handle_packet(header, body)?;
        }
        Ok(())
    }

    /// Releases every pending response. Called on connection teardown.
    pub fn close(&mut self) {
        let released = self.core.pending.len();
        if released > 0 {
            debug!("connection closed, releasing {released} pending responses");
        }
        self.core.pending.clear();
    }

    fn handle_packet(&mut self, header: RpcHeader, body: Vec<u8>) -> Result<(), DecodeError> {
        if header.is_response() {
            self.handle_response(header, body)
        } else {
            self.handle_request(header, body)
        }
    }

    fn handle_response(&mut self, header: RpcHeader, body: Vec<u8>) -> Result<(), DecodeError> {
        let registry = schema::registry();
        let pending = match self.core.pending.remove(&header.token) {
            Some(pending) => pending,
            None => {
                warn!(
                    "{}: response with unknown token {}",
                    DecodeErrorKind::ProtocolViolation("response token unknown"),
                    header.token
                );
                return Ok(());
            }
        };

        let decoded = match pending.resp {
            MethodResponse::Type(type_id) => {
                Some(MessageValue::decode(registry, type_id, &body[..]).map_err(|err| {
                    warn!(
                        "failed to decode response for service {} method {}: {}",
                        pending.service_id, pending.method_id, err
                    );
                    err
                })?)
            }
            MethodResponse::NotImplemented => {
                let raw = crate::encoding::read_fields(&mut &body[..]).unwrap_or_default();
                debug!(
                    "response for service {} method {} has no implemented type: {:?}",
                    pending.service_id, pending.method_id, raw
                );
                None
            }
            MethodResponse::NoResponse => None,
        };

        match pending.action {
            PendingAction::Discard => {}
            PendingAction::Callback(callback) => callback(self, &header, decoded),
            PendingAction::Bind(requested) => self.apply_bind_response(&requested, decoded),
        }
        Ok(())
    }

    fn handle_request(&mut self, header: RpcHeader, body: Vec<u8>) -> Result<(), DecodeError> {
        let registry = schema::registry();
        let export_index = header.service_id as usize;
        if export_index >= self.exports.len() {
            warn!("request for unknown export id {}", header.service_id);
            return Ok(());
        }

        if matches!(self.exports[export_index].kind, ExportKind::Connection) {
            return self.handle_connection_request(header, body);
        }

        let export = &self.exports[export_index];
        let method_id = header.method_id.unwrap_or(0);

        if matches!(export.kind, ExportKind::Placeholder) {
            warn!(
                "request for unexported service 0x{:08x} method {}",
                export.hash, method_id
            );
            let respond = match export.descriptor.and_then(|d| d.method(method_id)) {
                Some(method) => method.resp.expects_response(),
                // Unknown table: answer anyway so the peer is not stalled.
                None => true,
            };
            if respond {
                self.core.send_response(header.token, None)?;
            }
            return Ok(());
        }

        let descriptor = match export.descriptor {
            Some(descriptor) => descriptor,
            None => {
                warn!("export {} has no descriptor", header.service_id);
                return Ok(());
            }
        };
        let method = match descriptor.method(method_id) {
            Some(method) => method,
            None => {
                warn!(
                    "request for unknown method {} of {}",
                    method_id,
                    descriptor.name()
                );
                return Ok(());
            }
        };
        debug!(
            "request for {}:{} token={}",
            descriptor.name(),
            method.name,
            header.token
        );

        let request = match method.req {
            MethodRequest::Type(type_id) => {
                Some(MessageValue::decode(registry, type_id, &body[..]).map_err(|err| {
                    warn!(
                        "failed to decode request for {}:{}: {}",
                        descriptor.name(),
                        method.name,
                        err
                    );
                    err
                })?)
            }
            MethodRequest::NotImplemented => {
                let raw = crate::encoding::read_fields(&mut &body[..]).unwrap_or_default();
                debug!(
                    "request for {}:{} has no implemented type: {:?}",
                    descriptor.name(),
                    method.name,
                    raw
                );
                None
            }
        };

        let reply = match &mut self.exports[export_index].kind {
            ExportKind::Handler(handler) => handler.call(&mut self.core, method, request),
            _ => Reply::None,
        };

        if method.resp.expects_response() {
            let responses = match reply {
                Reply::None => Vec::new(),
                Reply::One(response) => vec![response],
                Reply::Stream(responses) => responses,
            };
            if responses.is_empty() {
                // Missing handler or empty reply: default response so
                // the peer is not stalled.
                self.core.send_response(header.token, None)?;
            } else {
                for response in &responses {
                    self.core.send_response(header.token, Some(response))?;
                }
            }
        }
        Ok(())
    }

    /// Serves `ConnectionService` directly: the bind handshake mutates
    /// the export table, which no external handler may touch.
    fn handle_connection_request(
        &mut self,
        header: RpcHeader,
        body: Vec<u8>,
    ) -> Result<(), DecodeError> {
        let registry = schema::registry();
        match header.method_id {
            Some(1) => {
                let request = MessageValue::decode(
                    registry,
                    lookup_type(registry, "BnetConnectRequest"),
                    &body[..],
                )?;
                let response = self.handle_connect(registry, &request);
                self.core.send_response(header.token, Some(&response))
            }
            Some(3) => {
                let request = MessageValue::decode(
                    registry,
                    lookup_type(registry, "BnetEchoRequest"),
                    &body[..],
                )?;
                let mut response = MessageValue::new(registry, lookup_type(registry, "BnetEchoResponse"));
                if let Some(time) = request.get(registry, "time") {
                    response.set(registry, "time", time.clone());
                }
                if let Some(payload) = request.get(registry, "payload") {
                    response.set(registry, "payload", payload.clone());
                }
                self.core.send_response(header.token, Some(&response))
            }
            Some(5) => {
                // KeepAlive is fire-and-forget.
                debug!("keep-alive token={}", header.token);
                Ok(())
            }
            Some(other) => {
                let respond = schema::services()
                    .get_by_name(schema::CONNECTION_SERVICE)
                    .and_then(|d| d.method(other))
                    .is_some_and(|m| m.resp.expects_response());
                warn!("unhandled connection service method {other}");
                if respond {
                    self.core.send_response(header.token, None)?;
                }
                Ok(())
            }
            None => {
                warn!("connection service request without method id");
                Ok(())
            }
        }
    }

    /// Server side of the bind handshake.
    fn handle_connect(&mut self, registry: &Registry, request: &MessageValue) -> MessageValue {
        let mut imported_ids = Vec::new();

        if let Some(bind) = request.get_message(registry, "BindRequest") {
            for hash_value in bind.get_repeated(registry, "ImportedServiceHash") {
                let hash = hash_value.as_u32().unwrap_or(0);
                let id = match self.exports_by_hash.get(&hash) {
                    Some(&id) => id,
                    None => {
                        warn!("client imports unexported service 0x{hash:08x}, installing placeholder");
                        self.push_export(hash, schema::services().get(hash), ExportKind::Placeholder)
                    }
                };
                debug!("bound client import 0x{hash:08x} to export id {id}");
                imported_ids.push(id);
            }

            for exported in bind.get_repeated(registry, "ExportedService") {
                let Some(bound) = exported.as_message() else { continue };
                let hash = bound.get_u32(registry, "Hash").unwrap_or(0);
                let id = bound.get_u32(registry, "Id").unwrap_or(0);
                match self.core.imports_by_hash.get(&hash).copied() {
                    Some(index) => {
                        debug!("bound our import 0x{hash:08x} to client id {id}");
                        self.core.imports[index].bound_id = Some(id);
                    }
                    None => warn!("ignoring client export with hash 0x{hash:08x}"),
                }
            }
        }

        let mut bind_response =
            MessageValue::new(registry, lookup_type(registry, "BnetBindResponse"));
        for id in imported_ids {
            bind_response.push(registry, "ImportedServices", Value::Uint(u64::from(id)));
        }

        let mut response =
            MessageValue::new(registry, lookup_type(registry, "BnetConnectResponse"));
        response.set(registry, "ServerId", Value::Message(self.server_id.to_value(registry)));
        response.set(registry, "ClientId", Value::Message(self.client_id.to_value(registry)));
        response.set(registry, "BindResult", Value::Uint(0));
        response.set(registry, "BindResponse", Value::Message(bind_response));
        response.set(registry, "ServerTime", Value::Uint(unix_millis()));
        response
    }

    /// Client side of the bind handshake: requests every registered
    /// import and offers every non-builtin export under its slot id.
    pub fn send_connect(&mut self) -> Result<u32, DecodeError> {
        let registry = schema::registry();
        let requested: Vec<u32> = self
            .core
            .imports
            .iter()
            .map(|import| import.descriptor.hash())
            .collect();

        let mut bind = MessageValue::new(registry, lookup_type(registry, "BnetBindRequest"));
        for hash in &requested {
            bind.push(registry, "ImportedServiceHash", Value::Uint(u64::from(*hash)));
        }
        for (id, export) in self.exports.iter().enumerate() {
            if matches!(export.kind, ExportKind::Connection) {
                continue;
            }
            let mut bound =
                MessageValue::new(registry, lookup_type(registry, "BnetBoundService"));
            bound.set(registry, "Hash", Value::Uint(u64::from(export.hash)));
            bound.set(registry, "Id", Value::Uint(id as u64));
            bind.push(registry, "ExportedService", Value::Message(bound));
        }

        let mut request =
            MessageValue::new(registry, lookup_type(registry, "BnetConnectRequest"));
        request.set(registry, "ClientId", Value::Message(self.client_id.to_value(registry)));
        request.set(registry, "BindRequest", Value::Message(bind));

        let encoded = request.encode_to_vec(registry);
        let token = self.core.alloc_token();
        let header = RpcHeader::request(CONNECTION_EXPORT_ID, 1, token)
            .with_size(encoded.len() as u32);
        self.core.pending.insert(
            token,
            Pending {
                service_id: CONNECTION_EXPORT_ID,
                method_id: 1,
                resp: MethodResponse::Type(lookup_type(registry, "BnetConnectResponse")),
                action: PendingAction::Bind(requested),
            },
        );
        self.core.send_frame(&header, &encoded)?;
        Ok(token)
    }

    /// Client side of the bind result. A length mismatch against the
    /// request is a protocol violation: logged, dropped, nothing bound.
    fn apply_bind_response(&mut self, requested: &[u32], decoded: Option<MessageValue>) {
        let registry = schema::registry();
        let Some(response) = decoded else {
            warn!("connect response carried no body");
            return;
        };
        let Some(bind_response) = response.get_message(registry, "BindResponse") else {
            warn!(
                "{}",
                DecodeErrorKind::ProtocolViolation("connect response without bind result")
            );
            return;
        };
        let ids = bind_response.get_repeated(registry, "ImportedServices");
        if ids.len() != requested.len() {
            warn!(
                "{}: requested {} imports, peer answered {}",
                DecodeErrorKind::ProtocolViolation("bind response length mismatches request"),
                requested.len(),
                ids.len()
            );
            return;
        }
        for (hash, id) in requested.iter().zip(ids) {
            let Some(id) = id.as_u32() else { continue };
            if let Some(index) = self.core.imports_by_hash.get(hash).copied() {
                debug!("import 0x{hash:08x} bound to id {id}");
                self.core.imports[index].bound_id = Some(id);
            }
        }
    }

    /// The id a bind assigned to an import, if any yet.
    pub fn import_binding(&self, service_name: &str) -> Option<u32> {
        let descriptor = schema::services().get_by_name(service_name)?;
        let index = self.core.imports_by_hash.get(&descriptor.hash())?;
        self.core.imports[*index].bound_id
    }

    #[cfg(test)]
    fn pending_tokens(&self) -> Vec<u32> {
        self.core.pending.keys().copied().collect()
    }
}

impl Default for RpcBroker {
    fn default() -> RpcBroker {
        RpcBroker::new()
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let registry = schema::registry();
        let header = RpcHeader::request(3, 1, 41).with_size(17);
        let encoded = header.to_value(registry).encode_to_vec(registry);
        let decoded = RpcHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        // Request headers carry no status.
        assert_eq!(decoded.status, None);
    }

    #[test]
    fn response_header_shape() {
        let header = RpcHeader::response(7);
        assert!(header.is_response());
        assert_eq!(header.status, Some(0));
        assert_eq!(header.method_id, None);

        let decoded = RpcHeader::decode(&header.to_value(schema::registry()).encode_to_vec(schema::registry())).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn frame_layout() {
        let header = RpcHeader::response(7).with_size(0);
        let frame = header.encode_frame(&[]);
        let header_len = usize::from(u16::from_be_bytes([frame[0], frame[1]]));
        assert_eq!(frame.len(), 2 + header_len);
    }

    #[test]
    fn token_allocation_wraps() {
        let mut broker = RpcBroker::new();
        broker.core.next_token = u32::MAX;
        assert_eq!(broker.core.alloc_token(), u32::MAX);
        assert_eq!(broker.core.alloc_token(), 0);
        assert_eq!(broker.core.alloc_token(), 1);
    }

    #[test]
    fn unknown_token_dropped_and_table_intact() {
        let mut broker = RpcBroker::new();
        broker.core.pending.insert(
            3,
            Pending {
                service_id: 1,
                method_id: 1,
                resp: MethodResponse::NotImplemented,
                action: PendingAction::Discard,
            },
        );

        let frame = RpcHeader::response(99).with_size(0).encode_frame(&[]);
        broker.receive(&frame).unwrap();
        assert_eq!(broker.pending_tokens(), [3]);
    }

    #[test]
    fn request_to_unknown_export_dropped() {
        let mut broker = RpcBroker::new();
        let frame = RpcHeader::request(40, 1, 0).with_size(0).encode_frame(&[]);
        broker.receive(&frame).unwrap();
        assert!(broker.drain_outbound().is_empty());
    }

    #[test]
    fn keep_alive_sends_nothing() {
        let mut broker = RpcBroker::new();
        let frame = RpcHeader::request(0, 5, 2).with_size(0).encode_frame(&[]);
        broker.receive(&frame).unwrap();
        assert!(broker.drain_outbound().is_empty());
    }

    #[test]
    fn echo_mirrors_payload() {
        let registry = schema::registry();
        let mut broker = RpcBroker::new();

        let mut echo = MessageValue::new(registry, registry.lookup("BnetEchoRequest").unwrap());
        echo.set(registry, "time", Value::Uint(0x1122));
        echo.set(registry, "payload", Value::Bytes(b"abc".to_vec()));
        let body = echo.encode_to_vec(registry);
        let frame = RpcHeader::request(0, 3, 11)
            .with_size(body.len() as u32)
            .encode_frame(&body);
        broker.receive(&frame).unwrap();

        let out = broker.drain_outbound();
        let mut splitter = RpcSplitter::new();
        splitter.feed(&out).unwrap();
        let (header, body) = splitter.pull_segment().unwrap().unwrap();
        assert!(header.is_response());
        assert_eq!(header.token, 11);
        let response = MessageValue::decode(
            registry,
            registry.lookup("BnetEchoResponse").unwrap(),
            &body[..],
        )
        .unwrap();
        assert_eq!(response.get_u64(registry, "time"), Some(0x1122));
        assert_eq!(response.get_bytes(registry, "payload"), Some(&b"abc"[..]));
    }

    #[test]
    fn close_releases_pending() {
        let mut broker = RpcBroker::new();
        broker.add_import(schema::AUTHENTICATION_CLIENT).unwrap();
        broker.send_connect().unwrap();
        assert_eq!(broker.pending_tokens().len(), 1);
        broker.close();
        assert!(broker.pending_tokens().is_empty());
    }
}
