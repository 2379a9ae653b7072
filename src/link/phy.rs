//! PHY sublayer: spatial position, medium binding, and the O-QPSK radio
//! timing constants the medium uses to model transmissions.

use std::rc::Rc;

use super::medium::Medium;
use crate::net::point::Vector3;
use crate::sim::SimTime;

/// Receiver sensitivity for the 2.4 GHz O-QPSK PHY (dBm). Frames arriving
/// below this power are not received.
pub const RX_SENSITIVITY_DBM: f64 = -106.58;

/// Default transmit power (dBm).
pub const DEFAULT_TX_POWER_DBM: f64 = 0.0;

/// Synchronization header plus PHY header: 4-byte preamble, SFD, PHR.
pub const PHY_HEADER_BYTES: usize = 6;

/// aTurnaroundTime, 12 symbols at 16 us.
pub const TURNAROUND_TIME: SimTime = SimTime::from_micros(192);

/// macAckWaitDuration, 54 symbols at 16 us. A confirm with `NoAck` fires
/// once this much time passes after the frame without an acknowledgement.
pub const ACK_WAIT_DURATION: SimTime = SimTime::from_micros(864);

/// MPDU length of an acknowledgement frame (FCF, sequence, FCS).
pub const ACK_MPDU_BYTES: usize = 5;

/// On-air time of a frame with the given MPDU length at 250 kbit/s
/// (4 us per bit), including the synchronization and PHY headers.
pub fn frame_airtime(mpdu_len: usize) -> SimTime {
    let bits = (PHY_HEADER_BYTES + mpdu_len) as u64 * 8;
    SimTime::from_nanos(bits * 4_000)
}

/// Per-device PHY state.
pub struct Phy {
    position: Option<Vector3>,
    medium: Option<Rc<Medium>>,
    tx_power_dbm: f64,
}

impl Phy {
    pub fn new() -> Phy {
        Phy {
            position: None,
            medium: None,
            tx_power_dbm: DEFAULT_TX_POWER_DBM,
        }
    }

    pub fn position(&self) -> Option<Vector3> {
        self.position
    }

    /// Last write wins.
    pub fn set_position(&mut self, position: Vector3) {
        self.position = Some(position);
    }

    pub fn medium(&self) -> Option<Rc<Medium>> {
        self.medium.clone()
    }

    pub fn set_medium(&mut self, medium: Rc<Medium>) {
        self.medium = Some(medium);
    }

    pub fn tx_power_dbm(&self) -> f64 {
        self.tx_power_dbm
    }

    pub fn set_tx_power_dbm(&mut self, dbm: f64) {
        self.tx_power_dbm = dbm;
    }
}

impl Default for Phy {
    fn default() -> Self {
        Phy::new()
    }
}
