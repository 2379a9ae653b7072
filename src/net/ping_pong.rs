//! Ping-pong exchange protocol.
//!
//! The initiator broadcasts a ping after a start delay; every peer running
//! the protocol answers with a pong unicast back to the ping's source,
//! requesting an acknowledgement. A pong that draws no acknowledgement is
//! retransmitted once from within `on_tx`. Foreign payloads are ignored;
//! the dispatch layer delivers everything and the payload opcode is the
//! only discriminator.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info, warn};

use crate::link::{Packet, ShortAddress};
use crate::sim::SimTime;

use super::node::{Node, SendRequest};
use super::protocol::{Protocol, TxOutcome};

const PING: u8 = 0x01;
const PONG: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Initiator,
    Responder,
}

/// Counters observable from outside the owning node.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PingPongStats {
    pub pings_sent: u32,
    pub pongs_sent: u32,
    pub pings_received: u32,
    pub pongs_received: u32,
}

pub struct PingPong {
    role: Role,
    start_delay: SimTime,
    stats: Rc<RefCell<PingPongStats>>,
    // One retry for the last pong; cleared on any definite outcome.
    retry_destination: Option<ShortAddress>,
}

impl PingPong {
    /// Initiator variant; pings one second after `init`.
    pub fn initiator() -> PingPong {
        PingPong::with_start_delay(SimTime::from_secs(1))
    }

    pub fn with_start_delay(start_delay: SimTime) -> PingPong {
        PingPong {
            role: Role::Initiator,
            start_delay,
            stats: Rc::new(RefCell::new(PingPongStats::default())),
            retry_destination: None,
        }
    }

    pub fn responder() -> PingPong {
        PingPong {
            role: Role::Responder,
            start_delay: SimTime::ZERO,
            stats: Rc::new(RefCell::new(PingPongStats::default())),
            retry_destination: None,
        }
    }

    /// Shared handle to the counters; grab it before moving the protocol
    /// into its node.
    pub fn stats(&self) -> Rc<RefCell<PingPongStats>> {
        self.stats.clone()
    }

    fn send_pong(&mut self, node: &Node, destination: ShortAddress) {
        node.send_packet(SendRequest {
            data: vec![PONG],
            destination,
            delay: SimTime::ZERO,
            ack: true,
        });
        self.stats.borrow_mut().pongs_sent += 1;
    }
}

impl Protocol for PingPong {
    fn init(&mut self, node: &Node) {
        if self.role == Role::Initiator {
            debug!("{} pinging in {}", node.address(), self.start_delay);
            node.send_packet(SendRequest {
                data: vec![PING],
                destination: ShortAddress::BROADCAST,
                delay: self.start_delay,
                ack: false,
            });
            self.stats.borrow_mut().pings_sent += 1;
        }
    }

    fn on_tx(&mut self, node: &Node, outcome: TxOutcome) {
        match outcome {
            TxOutcome::Acknowledged => {
                self.retry_destination = None;
            }
            TxOutcome::NoAck => {
                if let Some(destination) = self.retry_destination.take() {
                    info!(
                        "{} pong to {} unacknowledged, retrying once",
                        node.address(),
                        destination
                    );
                    self.send_pong(node, destination);
                }
            }
            TxOutcome::Unknown => {
                warn!("{} transmission ended with an unknown outcome", node.address());
            }
        }
    }

    fn on_rx(&mut self, node: &Node, packet: &Packet) {
        match packet.payload().first() {
            Some(&PING) => {
                self.stats.borrow_mut().pings_received += 1;
                info!("{} ponging {}", node.address(), packet.src);
                self.retry_destination = Some(packet.src);
                self.send_pong(node, packet.src);
            }
            Some(&PONG) => {
                self.stats.borrow_mut().pongs_received += 1;
                info!("{} received pong from {}", node.address(), packet.src);
            }
            _ => {} // foreign traffic
        }
    }
}
