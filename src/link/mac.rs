//! MAC sublayer: addressing state, data-service primitives, and the frame
//! representation exchanged over the medium.
//!
//! The data service follows the request/confirm/indication shape: a
//! `DataRequest` enters the MAC, the outcome comes back as a `DataConfirm`,
//! and deliveries surface as indications on the registered `DataHandler`.

use std::rc::{Rc, Weak};

use super::address::{PanId, ShortAddress};

/// Largest payload a single frame carries: aMaxPhyPacketSize (127) minus
/// the minimal MPDU overhead (9).
pub const MAX_MAC_PAYLOAD: usize = 118;

/// Addressing mode carried in a frame's control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    None,
    Short,
    Extended,
}

impl AddressMode {
    fn fcf_bits(self) -> u16 {
        match self {
            AddressMode::None => 0b00,
            AddressMode::Short => 0b10,
            AddressMode::Extended => 0b11,
        }
    }
}

/// Parameters of a transmission request handed to the device.
#[derive(Debug, Clone, Copy)]
pub struct DataRequest {
    pub destination: ShortAddress,
    pub dst_pan: PanId,
    pub src_mode: AddressMode,
    pub dst_mode: AddressMode,
    /// Caller-chosen identifier echoed back in the confirm.
    pub msdu_handle: u8,
    pub ack: bool,
}

/// Status reported in a data confirm.
///
/// `Success` and `NoAck` are the statuses the upper layer maps to definite
/// outcomes. The remaining variants cover the failure modes this engine can
/// produce; the set is intentionally incomplete and grows as the engine
/// models more of the standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacStatus {
    Success,
    NoAck,
    ChannelAccessFailure,
    FrameTooLong,
    InvalidParameter,
}

/// Asynchronous outcome of a prior `DataRequest`.
#[derive(Debug, Clone, Copy)]
pub struct DataConfirm {
    pub msdu_handle: u8,
    pub status: MacStatus,
}

/// A frame in flight: opaque payload plus addressing metadata. Exists only
/// for the duration of one transmission.
#[derive(Debug, Clone)]
pub struct Packet {
    pub src: ShortAddress,
    pub dst: ShortAddress,
    pub pan: PanId,
    pub src_mode: AddressMode,
    pub dst_mode: AddressMode,
    pub ack_request: bool,
    pub handle: u8,
    pub sequence: u8,
    payload: Vec<u8>,
}

impl Packet {
    pub(crate) fn new(
        src: ShortAddress,
        request: &DataRequest,
        sequence: u8,
        payload: Vec<u8>,
    ) -> Packet {
        Packet {
            src,
            dst: request.destination,
            pan: request.dst_pan,
            src_mode: request.src_mode,
            dst_mode: request.dst_mode,
            ack_request: request.ack,
            handle: request.msdu_handle,
            sequence,
            payload,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialized MPDU without a trailing FCS: frame control, sequence
    /// number, destination PAN, destination and source short addresses
    /// (PAN-id compression, so the source PAN is elided), then the payload.
    pub fn mpdu_bytes(&self) -> Vec<u8> {
        const FRAME_TYPE_DATA: u16 = 0b001;
        const ACK_REQUEST: u16 = 1 << 5;
        const PAN_ID_COMPRESSION: u16 = 1 << 6;

        let mut fcf = FRAME_TYPE_DATA | PAN_ID_COMPRESSION;
        if self.ack_request {
            fcf |= ACK_REQUEST;
        }
        fcf |= self.dst_mode.fcf_bits() << 10;
        fcf |= self.src_mode.fcf_bits() << 14;

        let mut bytes = Vec::with_capacity(9 + self.payload.len());
        bytes.extend_from_slice(&fcf.to_le_bytes());
        bytes.push(self.sequence);
        bytes.extend_from_slice(&self.pan.to_u16().to_le_bytes());
        bytes.extend_from_slice(&self.dst.to_u16().to_le_bytes());
        bytes.extend_from_slice(&self.src.to_u16().to_le_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Narrow interface the engine drives to report device events. The node
/// registers itself here; a test harness can invoke it directly.
pub trait DataHandler {
    fn data_confirm(&self, confirm: DataConfirm);
    fn data_indication(&self, packet: &Packet, link_quality: u8);
}

/// Per-device MAC state.
pub struct Mac {
    short_address: ShortAddress,
    pan_id: PanId,
    associated: bool,
    sequence: u8,
    handler: Option<Weak<dyn DataHandler>>,
}

impl Mac {
    pub fn new() -> Mac {
        Mac {
            short_address: ShortAddress::UNASSIGNED,
            pan_id: PanId::BROADCAST,
            associated: false,
            sequence: 0,
            handler: None,
        }
    }

    pub fn short_address(&self) -> ShortAddress {
        self.short_address
    }

    pub fn set_short_address(&mut self, address: ShortAddress) {
        self.short_address = address;
    }

    pub fn pan_id(&self) -> PanId {
        self.pan_id
    }

    /// Joining a PAN also marks the device associated.
    pub fn set_pan(&mut self, pan: PanId) {
        self.pan_id = pan;
        self.associated = true;
    }

    pub fn is_associated(&self) -> bool {
        self.associated
    }

    /// Register the event handler. Replaces any previous registration.
    pub fn set_handler(&mut self, handler: Weak<dyn DataHandler>) {
        self.handler = Some(handler);
    }

    pub fn handler(&self) -> Option<Rc<dyn DataHandler>> {
        self.handler.as_ref()?.upgrade()
    }

    pub fn next_sequence(&mut self) -> u8 {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        seq
    }

    /// Receive filter: destination PAN must match the joined PAN (or the
    /// broadcast PAN), and the destination address must be this device or
    /// broadcast.
    pub fn accepts(&self, packet: &Packet) -> bool {
        let pan_match = packet.pan == self.pan_id || packet.pan == PanId::BROADCAST;
        let addr_match = packet.dst == self.short_address || packet.dst.is_broadcast();
        pan_match && addr_match
    }
}

impl Default for Mac {
    fn default() -> Self {
        Mac::new()
    }
}
