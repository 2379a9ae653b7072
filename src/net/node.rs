//! A wireless sensor node: an ordered protocol stack bridged to one
//! link-layer device.
//!
//! Lifecycle: a node is created with its protocols and a fresh device,
//! then placed (position and medium bound), addressed (short address and
//! PAN), initialized (`init_protocols` wires the device callbacks), and
//! only then active. There are no reverse transitions; nodes live until
//! simulation teardown.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use crate::link::{
    AddressConfig, AddressMode, DataConfirm, DataHandler, DataRequest, Device, Medium, Packet,
    PanConfig, PanId, ShortAddress,
};
use crate::net::point::Vector3;
use crate::net::protocol::{Protocol, TxOutcome};
use crate::sim::{Scheduler, SimTime};
use crate::trace::Tracer;

/// Parameters of one `send_packet` call. The default value is an empty
/// broadcast with no delay and no acknowledgement request.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub data: Vec<u8>,
    pub destination: ShortAddress,
    pub delay: SimTime,
    pub ack: bool,
}

impl Default for SendRequest {
    fn default() -> SendRequest {
        SendRequest {
            data: Vec::new(),
            destination: ShortAddress::BROADCAST,
            delay: SimTime::ZERO,
            ack: false,
        }
    }
}

pub struct Node {
    protocols: RefCell<Vec<Box<dyn Protocol>>>,
    device: Rc<Device>,
    // Back-reference filled in by `into_shared`; the device's handler
    // registration points at it.
    handle: RefCell<Weak<Node>>,
    sink: bool,
}

impl Node {
    /// Build a node owning `protocols`. The protocol list is fixed for the
    /// node's lifetime.
    pub fn new(
        protocols: Vec<Box<dyn Protocol>>,
        scheduler: &Rc<Scheduler>,
        tracer: &Rc<Tracer>,
    ) -> Node {
        Node::build(protocols, scheduler, tracer, false)
    }

    /// Sink variant: a node intended to terminate traffic rather than
    /// relay it. Only the `is_sink` capability probe differs; no sink
    /// behavior is wired into the core.
    pub fn new_sink(
        protocols: Vec<Box<dyn Protocol>>,
        scheduler: &Rc<Scheduler>,
        tracer: &Rc<Tracer>,
    ) -> Node {
        Node::build(protocols, scheduler, tracer, true)
    }

    fn build(
        protocols: Vec<Box<dyn Protocol>>,
        scheduler: &Rc<Scheduler>,
        tracer: &Rc<Tracer>,
        sink: bool,
    ) -> Node {
        Node {
            protocols: RefCell::new(protocols),
            device: Device::new(scheduler.clone(), tracer.clone()),
            handle: RefCell::new(Weak::new()),
            sink,
        }
    }

    /// Move the node behind a shared handle so the link layer can call
    /// back into it. The deployment manager does this during placement.
    pub fn into_shared(self) -> Rc<Node> {
        let node = Rc::new(self);
        *node.handle.borrow_mut() = Rc::downgrade(&node);
        node
    }

    /// Bind the spatial position used by the propagation models.
    /// Idempotent, last write wins.
    pub fn set_position(&self, position: impl Into<Vector3>) {
        self.device.phy_mut().set_position(position.into());
    }

    /// Bind the device to a shared medium. Required before any
    /// transmission; idempotent.
    pub fn set_channel(&self, medium: &Rc<Medium>) {
        self.device.phy_mut().set_medium(medium.clone());
        medium.attach(&self.device);
    }

    /// Apply or allocate the link-layer short address.
    pub fn set_address(&self, config: AddressConfig) {
        self.device.mac_mut().set_short_address(config.resolve());
    }

    /// Join a PAN and mark the node associated.
    pub fn set_pan(&self, config: PanConfig) {
        self.device.mac_mut().set_pan(config.resolve());
    }

    /// Register this node as the device's confirm/indication handler, then
    /// run `init` on every protocol in registration order.
    ///
    /// Call once, after addressing and before sending or expecting
    /// deliveries. Calling it again re-registers the handler idempotently
    /// but re-runs every protocol's `init`.
    pub fn init_protocols(&self) {
        let weak = self.handle.borrow().clone();
        if weak.upgrade().is_none() {
            warn!("init_protocols on an unshared node, device events will not reach it");
        }
        let handler: Weak<dyn DataHandler> = weak;
        self.device.mac_mut().set_handler(handler);
        for protocol in self.protocols.borrow_mut().iter_mut() {
            protocol.init(self);
        }
    }

    /// Schedule a transmission at `now + delay` on the node's joined PAN.
    /// Returns immediately; the outcome reaches every protocol through
    /// `on_tx`.
    pub fn send_packet(&self, request: SendRequest) {
        let SendRequest {
            data,
            destination,
            delay,
            ack,
        } = request;
        let params = DataRequest {
            destination,
            dst_pan: self.device.mac().pan_id(),
            src_mode: AddressMode::Short,
            dst_mode: AddressMode::Short,
            msdu_handle: 0,
            ack,
        };
        debug!(
            "{} scheduling send to {} in {} (ack={})",
            self.address(),
            destination,
            delay,
            ack
        );
        let device = self.device.clone();
        self.device.scheduler().schedule(delay, move || {
            device.data_request(params, data);
        });
    }

    /// Override the device's transmit power (dBm).
    pub fn set_tx_power_dbm(&self, dbm: f64) {
        self.device.phy_mut().set_tx_power_dbm(dbm);
    }

    /// Capability probe for traffic-terminating node variants. The core
    /// never branches on it.
    pub fn is_sink(&self) -> bool {
        self.sink
    }

    pub fn enable_pcap(
        &self,
        prefix: &str,
        promiscuous: bool,
        explicit_filename: bool,
    ) -> io::Result<()> {
        self.device
            .tracer()
            .enable_pcap(prefix, &self.device, promiscuous, explicit_filename)
    }

    pub fn enable_ascii(&self, prefix: &str, explicit_filename: bool) -> io::Result<()> {
        self.device
            .tracer()
            .enable_ascii(prefix, &self.device, explicit_filename)
    }

    pub fn address(&self) -> ShortAddress {
        self.device.mac().short_address()
    }

    pub fn pan_id(&self) -> PanId {
        self.device.mac().pan_id()
    }

    pub fn position(&self) -> Option<Vector3> {
        self.device.phy().position()
    }

    fn type_tag(&self) -> &'static str {
        if self.sink { "SinkNode" } else { "Node" }
    }
}

impl DataHandler for Node {
    fn data_confirm(&self, confirm: DataConfirm) {
        let outcome = TxOutcome::from(confirm.status);
        for protocol in self.protocols.borrow_mut().iter_mut() {
            protocol.on_tx(self, outcome);
        }
    }

    fn data_indication(&self, packet: &Packet, link_quality: u8) {
        debug!(
            "{} delivering packet from {} (lqi={})",
            self.address(),
            packet.src,
            link_quality
        );
        for protocol in self.protocols.borrow_mut().iter_mut() {
            protocol.on_rx(self, packet);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{address: {}", self.type_tag(), self.address())?;
        if let Some(position) = self.position() {
            write!(f, ", position: {position}")?;
        }
        write!(f, "}}")
    }
}
