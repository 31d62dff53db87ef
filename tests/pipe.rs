//! Interception pipe scenarios: mode transitions, accept/reject byte
//! accounting, passive forwarding and half-close.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use aurora::buffer::RingBuf;
use aurora::endpoint::{Endpoint, EndpointEvent};
use aurora::packet::{encode_packet, Packet, PacketType};
use aurora::pipe::{Action, InterceptHandler, InterceptPipe, Mode};
use aurora::schema;
use aurora::value::{MessageValue, Value};

#[derive(Default)]
struct EndpointState {
    inbox: VecDeque<Vec<u8>>,
    sent: Vec<u8>,
    closed: bool,
    want_pull: bool,
    want_push: bool,
}

#[derive(Clone, Default)]
struct Handle(Rc<RefCell<EndpointState>>);

impl Handle {
    fn queue(&self, bytes: &[u8]) {
        self.0.borrow_mut().inbox.push_back(bytes.to_vec());
    }

    fn sent(&self) -> Vec<u8> {
        self.0.borrow().sent.clone()
    }

    fn is_closed(&self) -> bool {
        self.0.borrow().closed
    }
}

/// An in-memory endpoint observable from outside through its [`Handle`].
struct MemEndpoint(Handle);

impl Endpoint for MemEndpoint {
    fn pull(&mut self, buf: &mut RingBuf) -> io::Result<usize> {
        let mut state = self.0 .0.borrow_mut();
        let Some(chunk) = state.inbox.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.free());
        buf.append(&chunk[..n]).map_err(io::Error::from)?;
        if n < chunk.len() {
            state.inbox.push_front(chunk[n..].to_vec());
        }
        Ok(n)
    }

    fn push(&mut self, buf: &mut RingBuf) -> io::Result<usize> {
        let mut state = self.0 .0.borrow_mut();
        let used = buf.used();
        state.sent.extend_from_slice(buf.peek(used, 0));
        buf.consume(used);
        Ok(used)
    }

    fn want_pull(&mut self, want: bool) {
        self.0 .0.borrow_mut().want_pull = want;
    }

    fn want_push(&mut self, want: bool) {
        self.0 .0.borrow_mut().want_push = want;
    }

    fn close(&mut self, _reason: &str) {
        self.0 .0.borrow_mut().closed = true;
    }

    fn is_closed(&self) -> bool {
        self.0 .0.borrow().closed
    }
}

/// Records handler callbacks and answers with a fixed action.
struct Recorder {
    action: Action,
    started: usize,
    packets: Vec<(usize, PacketType)>,
}

impl Recorder {
    fn new(action: Action) -> Recorder {
        Recorder {
            action,
            started: 0,
            packets: Vec::new(),
        }
    }
}

impl InterceptHandler for Recorder {
    fn on_start_intercept(&mut self, first: &Packet) {
        assert_eq!(first.packet_type, PacketType::AuroraHandshake);
        self.started += 1;
    }

    fn on_packet(&mut self, endpoint: usize, packet: &mut Packet) -> Action {
        self.packets.push((endpoint, packet.packet_type));
        self.action
    }
}

fn make_pipe(action: Action) -> (InterceptPipe<Recorder>, [Handle; 2]) {
    let handles = [Handle::default(), Handle::default()];
    let pipe = InterceptPipe::new(
        Box::new(MemEndpoint(handles[0].clone())),
        Box::new(MemEndpoint(handles[1].clone())),
        Recorder::new(action),
    );
    (pipe, handles)
}

/// Drives events until nothing makes progress.
fn pump(pipe: &mut InterceptPipe<Recorder>, handles: &[Handle; 2]) {
    loop {
        let mut progressed = false;
        for epid in 0..2 {
            let (ready, closed) = {
                let state = handles[epid].0.borrow();
                (state.want_pull && !state.inbox.is_empty(), state.closed)
            };
            if ready && !closed {
                pipe.on_event(epid, EndpointEvent::MayPull);
                progressed = true;
            }
            let pushable = {
                let state = handles[epid].0.borrow();
                state.want_push && !state.closed
            };
            if pushable {
                pipe.on_event(epid, EndpointEvent::MayPush);
                progressed = true;
            }
        }
        if !progressed {
            return;
        }
    }
}

fn handshake_frame() -> Vec<u8> {
    let registry = schema::registry();
    let mut body = MessageValue::new(registry, registry.lookup("AuroraHandshake").unwrap());
    body.set(registry, "GameHandle", Value::Int(4242));
    body.set(registry, "Password", Value::Str("hunter2".to_owned()));
    body.set(registry, "ClientHandle", Value::Int(900_001));
    body.set(registry, "Version", Value::Str("3.0.0.7234".to_owned()));
    encode_packet(registry, &Packet::new(PacketType::AuroraHandshake, body))
}

fn option_frame() -> Vec<u8> {
    let registry = schema::registry();
    let mut body = MessageValue::new(registry, registry.lookup("ChooseOption").unwrap());
    body.set(registry, "Id", Value::Int(3));
    body.set(registry, "Index", Value::Int(1));
    body.set(registry, "Target", Value::Int(12));
    encode_packet(registry, &Packet::new(PacketType::ChooseOption, body))
}

fn ping_frame() -> Vec<u8> {
    let registry = schema::registry();
    let body = MessageValue::new(registry, registry.lookup("Ping").unwrap());
    encode_packet(registry, &Packet::new(PacketType::Ping, body))
}

#[test]
fn handshake_upgrades_to_intercept() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    let mut stream = handshake_frame();
    stream.extend_from_slice(&option_frame());
    handles[0].queue(&stream);
    pump(&mut pipe, &handles);

    assert_eq!(pipe.mode(), Mode::Intercept);
    assert_eq!(pipe.handler().started, 1);
    assert_eq!(pipe.handler().packets, [(0, PacketType::ChooseOption)]);
    // Accept-all intercept is byte-transparent: re-encoding a decoded
    // frame reproduces it exactly.
    assert_eq!(handles[1].sent(), stream);
    assert!(handles[0].sent().is_empty());
}

#[test]
fn reject_forwards_nothing_after_the_handshake() {
    let (mut pipe, handles) = make_pipe(Action::Reject);

    let handshake = handshake_frame();
    let mut stream = handshake.clone();
    stream.extend_from_slice(&option_frame());
    stream.extend_from_slice(&ping_frame());
    handles[0].queue(&stream);
    pump(&mut pipe, &handles);

    assert_eq!(pipe.mode(), Mode::Intercept);
    assert_eq!(
        pipe.handler().packets,
        [(0, PacketType::ChooseOption), (0, PacketType::Ping)]
    );
    // Only the sniffed handshake passed through before interception.
    assert_eq!(handles[1].sent(), handshake);
}

#[test]
fn chunked_delivery_matches_single_feed() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    let mut stream = handshake_frame();
    stream.extend_from_slice(&option_frame());
    stream.extend_from_slice(&ping_frame());

    // Deliver in awkward slices, pumping between each.
    for chunk in stream.chunks(7) {
        handles[0].queue(chunk);
        pump(&mut pipe, &handles);
    }

    assert_eq!(pipe.mode(), Mode::Intercept);
    assert_eq!(pipe.handler().started, 1);
    assert_eq!(
        pipe.handler().packets,
        [(0, PacketType::ChooseOption), (0, PacketType::Ping)]
    );
    assert_eq!(handles[1].sent(), stream);
}

#[test]
fn non_handshake_first_frame_demotes_to_passive() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    let mut stream = ping_frame();
    stream.extend_from_slice(&option_frame());
    handles[0].queue(&stream);
    pump(&mut pipe, &handles);

    assert_eq!(pipe.mode(), Mode::Passive);
    assert_eq!(pipe.handler().started, 0);
    assert!(pipe.handler().packets.is_empty());
    // Passive forwarding is byte-for-byte.
    assert_eq!(handles[1].sent(), stream);
}

#[test]
fn undecodable_first_frame_demotes_to_passive() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    // A frame with an unknown packet type id.
    let mut stream = vec![0xEE, 0x00, 0x00, 0x00, 4, 0, 0, 0, 1, 2, 3, 4];
    stream.extend_from_slice(b"and some trailing bytes");
    handles[0].queue(&stream);
    pump(&mut pipe, &handles);

    assert_eq!(pipe.mode(), Mode::Passive);
    assert_eq!(handles[1].sent(), stream);
}

#[test]
fn passive_forwards_both_directions() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    let forward = ping_frame();
    handles[0].queue(&forward);
    pump(&mut pipe, &handles);
    assert_eq!(pipe.mode(), Mode::Passive);

    let backward = b"arbitrary reply bytes, not even framed";
    handles[1].queue(backward);
    handles[0].queue(b"more forward bytes");
    pump(&mut pipe, &handles);

    assert_eq!(handles[0].sent(), backward);
    let mut expected = forward.clone();
    expected.extend_from_slice(b"more forward bytes");
    assert_eq!(handles[1].sent(), expected);
}

#[test]
fn close_propagates_after_flush() {
    let (mut pipe, handles) = make_pipe(Action::Accept);

    handles[0].queue(&ping_frame());
    pump(&mut pipe, &handles);

    handles[0].0.borrow_mut().closed = true;
    pipe.on_event(0, EndpointEvent::Closed);

    // Everything was already flushed, so the peer closes too.
    assert!(handles[1].is_closed());
}
