//! The interception pipe.
//!
//! Joins two endpoints through a pair of ring buffers and forwards
//! bytes in both directions. A fresh pipe lurks: bytes flow through
//! untouched while a side splitter sniffs for the first whole frame.
//! If that frame is the Aurora handshake the pipe starts intercepting:
//! from then on bytes are stolen off the forward path, decoded, shown
//! to the handler and re-encoded (or dropped). Anything unexpected
//! demotes the pipe to passive forwarding, which is terminal.

use log::{debug, warn};

use crate::buffer::RingBuf;
use crate::endpoint::{Endpoint, EndpointEvent};
use crate::packet::{decode_packet, encode_packet, Packet, PacketType};
use crate::schema;
use crate::split::AuroraSplitter;

/// Pipe mode. `Passive` is terminal; `Intercept` never demotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Lurking,
    Intercept,
    Passive,
}

/// Verdict of a handler on one intercepted packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Re-encode the (possibly modified) packet and forward it.
    Accept,
    /// Drop the packet silently.
    Reject,
}

/// Observer and arbiter of an intercepted session.
pub trait InterceptHandler {
    /// Called once when the handshake frame upgrades the pipe to
    /// intercept mode.
    fn on_start_intercept(&mut self, first: &Packet) {
        let _ = first;
    }

    /// Called for every whole frame after the handshake. `endpoint` is
    /// the side the frame came from.
    fn on_packet(&mut self, endpoint: usize, packet: &mut Packet) -> Action;
}

/// A bidirectional pipe between endpoints `0` and `1`.
///
/// `bufs[i]` holds bytes travelling toward endpoint `i`;
/// `splitters[i]` reassembles frames originating at endpoint `i`.
pub struct InterceptPipe<H> {
    endpoints: [Box<dyn Endpoint>; 2],
    bufs: [RingBuf; 2],
    splitters: [AuroraSplitter; 2],
    mode: Mode,
    handler: H,
}

impl<H: InterceptHandler> InterceptPipe<H> {
    pub fn new(a: Box<dyn Endpoint>, b: Box<dyn Endpoint>, handler: H) -> InterceptPipe<H> {
        let mut pipe = InterceptPipe {
            endpoints: [a, b],
            bufs: [RingBuf::new(), RingBuf::new()],
            splitters: [AuroraSplitter::new(), AuroraSplitter::new()],
            mode: Mode::Lurking,
            handler,
        };
        pipe.endpoints[0].want_pull(true);
        pipe.endpoints[1].want_pull(true);
        pipe
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Drives the pipe from one endpoint event.
    ///
    /// Written reentrancy-safe: every precondition is re-read after
    /// each atomic I/O action, because a push or pull may synchronously
    /// close either endpoint.
    pub fn on_event(&mut self, epid: usize, event: EndpointEvent) {
        assert!(epid < 2, "endpoint id out of range");
        let opid = 1 - epid;

        match event {
            EndpointEvent::MayPush => {
                if self.bufs[epid].used() > 0 {
                    if let Err(err) = self.endpoints[epid].push(&mut self.bufs[epid]) {
                        warn!("push to endpoint {epid} failed: {err}");
                        self.endpoints[epid].close("push failed");
                    }
                }
                let used = self.bufs[epid].used();
                self.endpoints[epid].want_push(used > 0);
                let closed = self.endpoints[epid].is_closed();
                let free = self.bufs[epid].free();
                self.endpoints[opid].want_pull(!closed && free > 0);
            }
            EndpointEvent::MayPull => {
                let pulled = match self.endpoints[epid].pull(&mut self.bufs[opid]) {
                    Ok(pulled) => pulled,
                    Err(err) => {
                        warn!("pull from endpoint {epid} failed: {err}");
                        self.endpoints[epid].close("pull failed");
                        0
                    }
                };
                self.on_pull(epid, pulled);
                let free = self.bufs[opid].free();
                self.endpoints[epid].want_pull(free > 0);
                let closed = self.endpoints[epid].is_closed();
                let used = self.bufs[opid].used();
                self.endpoints[opid].want_push(!closed && used > 0);
            }
            EndpointEvent::Closed => {
                // Half-close: flush outstanding data first, then close
                // the peer.
                if !self.endpoints[opid].is_closed() && self.bufs[opid].used() == 0 {
                    self.endpoints[opid].close("remote closed");
                }
            }
        }

        if self.endpoints[opid].is_closed()
            && !self.endpoints[epid].is_closed()
            && self.bufs[epid].used() == 0
        {
            self.endpoints[epid].close("remote closed");
        }
    }

    fn on_pull(&mut self, epid: usize, pulled: usize) {
        if pulled == 0 {
            return;
        }
        match self.mode {
            Mode::Intercept => self.on_pull_intercept(epid, pulled),
            Mode::Lurking => self.on_pull_lurking(epid, pulled),
            Mode::Passive => {}
        }
    }

    /// Forwards transparently while sniffing for the first whole frame
    /// of this direction.
    fn on_pull_lurking(&mut self, epid: usize, pulled: usize) {
        let opid = 1 - epid;

        if self.splitters[epid].free() < pulled {
            warn!("sniff buffer exhausted before a whole frame, demoting to passive");
            self.mode = Mode::Passive;
            return;
        }

        let fresh = self.bufs[opid].last(pulled).to_vec();
        if self.splitters[epid].feed(&fresh).is_err() {
            self.mode = Mode::Passive;
            return;
        }

        let Some((packet_type, body)) = self.splitters[epid].pull_segment() else {
            return;
        };

        // Bytes of the pull that belong to frames after the first one.
        let trailing = self.splitters[epid].used();
        debug_assert!(trailing < pulled, "missed the pull completing the first frame");
        self.splitters[epid].clear();

        match decode_packet(schema::registry(), packet_type, &body) {
            Ok(packet) if packet.packet_type == PacketType::AuroraHandshake => {
                debug!("first frame is the handshake, intercepting");
                self.mode = Mode::Intercept;
                self.handler.on_start_intercept(&packet);
                self.on_pull_intercept(epid, trailing);
            }
            Ok(packet) => {
                warn!(
                    "first frame is {:?}, not a handshake, demoting to passive",
                    packet.packet_type
                );
                self.mode = Mode::Passive;
            }
            Err(err) => {
                warn!("failed to decode first frame ({err}), demoting to passive");
                self.mode = Mode::Passive;
            }
        }
    }

    /// Steals freshly pulled bytes off the forward path, then decodes,
    /// arbitrates and re-encodes whole frames.
    fn on_pull_intercept(&mut self, epid: usize, pulled: usize) {
        let opid = 1 - epid;
        let registry = schema::registry();

        if pulled > 0 {
            let fresh = self.bufs[opid].last(pulled).to_vec();
            self.bufs[opid].truncate_last(pulled);
            if let Err(err) = self.splitters[epid].feed(&fresh) {
                warn!("intercept splitter overflow: {err}");
                self.close_both("intercept buffer overflow");
                return;
            }
        }

        while let Some((packet_type, body)) = self.splitters[epid].pull_segment() {
            let mut packet = match decode_packet(registry, packet_type, &body) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!("failed to decode intercepted frame: {err}");
                    self.close_both("undecodable intercepted frame");
                    return;
                }
            };
            match self.handler.on_packet(epid, &mut packet) {
                Action::Reject => {}
                Action::Accept => {
                    let frame = encode_packet(registry, &packet);
                    if self.bufs[opid].append(&frame).is_err() {
                        self.close_both("forward buffer overflow");
                        return;
                    }
                }
            }
        }
    }

    fn close_both(&mut self, reason: &str) {
        for endpoint in &mut self.endpoints {
            if !endpoint.is_closed() {
                endpoint.close(reason);
            }
        }
    }
}
