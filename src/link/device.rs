//! Link-layer device: one PHY and one MAC plus the orchestration between
//! them, the medium, and the tracing collaborator.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU32, Ordering};

use log::{debug, warn};

use super::mac::{AddressMode, DataConfirm, DataRequest, MAX_MAC_PAYLOAD, Mac, MacStatus, Packet};
use super::phy::Phy;
use crate::sim::{Scheduler, SimTime};
use crate::trace::Tracer;

static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

pub struct Device {
    id: u32,
    phy: RefCell<Phy>,
    mac: RefCell<Mac>,
    scheduler: Rc<Scheduler>,
    tracer: Rc<Tracer>,
    // Self-handle; devices only exist behind an Rc.
    weak: Weak<Device>,
}

impl Device {
    pub fn new(scheduler: Rc<Scheduler>, tracer: Rc<Tracer>) -> Rc<Device> {
        Rc::new_cyclic(|weak| Device {
            id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            phy: RefCell::new(Phy::new()),
            mac: RefCell::new(Mac::new()),
            scheduler,
            tracer,
            weak: weak.clone(),
        })
    }

    /// Process-unique device identifier, used to key trace artifacts.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn phy(&self) -> Ref<'_, Phy> {
        self.phy.borrow()
    }

    pub fn phy_mut(&self) -> RefMut<'_, Phy> {
        self.phy.borrow_mut()
    }

    pub fn mac(&self) -> Ref<'_, Mac> {
        self.mac.borrow()
    }

    pub fn mac_mut(&self) -> RefMut<'_, Mac> {
        self.mac.borrow_mut()
    }

    pub fn scheduler(&self) -> &Rc<Scheduler> {
        &self.scheduler
    }

    pub fn tracer(&self) -> &Rc<Tracer> {
        &self.tracer
    }

    pub(crate) fn accepts(&self, packet: &Packet) -> bool {
        self.mac.borrow().accepts(packet)
    }

    /// Transmission request. Returns immediately; the outcome arrives later
    /// as a `DataConfirm` on the registered handler.
    pub fn data_request(&self, request: DataRequest, payload: Vec<u8>) {
        if request.src_mode != AddressMode::Short || request.dst_mode != AddressMode::Short {
            warn!(
                "device {}: only short addressing is modeled, rejecting request",
                self.id
            );
            self.fail(request.msdu_handle, MacStatus::InvalidParameter);
            return;
        }
        if payload.len() > MAX_MAC_PAYLOAD {
            warn!(
                "device {}: payload of {} bytes exceeds the {} byte maximum",
                self.id,
                payload.len(),
                MAX_MAC_PAYLOAD
            );
            self.fail(request.msdu_handle, MacStatus::FrameTooLong);
            return;
        }
        let Some(medium) = self.phy.borrow().medium() else {
            warn!("device {}: no medium bound, dropping request", self.id);
            self.fail(request.msdu_handle, MacStatus::ChannelAccessFailure);
            return;
        };
        let Some(this) = self.weak.upgrade() else {
            return;
        };

        let packet = {
            let mut mac = self.mac.borrow_mut();
            let sequence = mac.next_sequence();
            Packet::new(mac.short_address(), &request, sequence, payload)
        };

        debug!(
            "device {}: tx seq={} {} -> {} pan={} ack={} len={}",
            self.id,
            packet.sequence,
            packet.src,
            packet.dst,
            packet.pan,
            packet.ack_request,
            packet.payload().len()
        );
        self.tracer
            .packet_tx(self.id, self.scheduler.now(), &packet);
        medium.transmit(&this, packet);
    }

    /// Frame arrival from the medium. Filters against the MAC state and
    /// forwards accepted frames to the registered handler.
    pub fn receive(&self, packet: Packet, link_quality: u8) {
        let accepted = self.mac.borrow().accepts(&packet);
        self.tracer
            .packet_rx(self.id, self.scheduler.now(), &packet, accepted);
        if !accepted {
            return;
        }
        debug!(
            "device {}: rx seq={} from {} lqi={}",
            self.id, packet.sequence, packet.src, link_quality
        );
        let handler = self.mac.borrow().handler();
        if let Some(handler) = handler {
            handler.data_indication(&packet, link_quality);
        }
    }

    /// Deliver a confirm to the registered handler.
    pub(crate) fn confirm(&self, confirm: DataConfirm) {
        debug!("device {}: confirm {:?}", self.id, confirm.status);
        let handler = self.mac.borrow().handler();
        if let Some(handler) = handler {
            handler.data_confirm(confirm);
        }
    }

    fn fail(&self, msdu_handle: u8, status: MacStatus) {
        let weak = self.weak.clone();
        self.scheduler.schedule(SimTime::ZERO, move || {
            if let Some(device) = weak.upgrade() {
                device.confirm(DataConfirm {
                    msdu_handle,
                    status,
                });
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::address::{PanId, ShortAddress};
    use crate::link::mac::DataHandler;

    #[derive(Default)]
    struct ConfirmLog {
        statuses: RefCell<Vec<MacStatus>>,
    }

    impl DataHandler for ConfirmLog {
        fn data_confirm(&self, confirm: DataConfirm) {
            self.statuses.borrow_mut().push(confirm.status);
        }

        fn data_indication(&self, _packet: &Packet, _link_quality: u8) {}
    }

    fn device_with_log() -> (Rc<Scheduler>, Rc<Device>, Rc<ConfirmLog>) {
        let scheduler = Rc::new(Scheduler::new());
        let device = Device::new(scheduler.clone(), Rc::new(Tracer::new()));
        device.mac_mut().set_short_address(ShortAddress::new(0x0001));
        device.mac_mut().set_pan(PanId::DEFAULT);
        let log = Rc::new(ConfirmLog::default());
        let handler: Rc<dyn DataHandler> = log.clone();
        let weak: Weak<dyn DataHandler> = Rc::downgrade(&handler);
        device.mac_mut().set_handler(weak);
        (scheduler, device, log)
    }

    fn short_request() -> DataRequest {
        DataRequest {
            destination: ShortAddress::BROADCAST,
            dst_pan: PanId::DEFAULT,
            src_mode: AddressMode::Short,
            dst_mode: AddressMode::Short,
            msdu_handle: 7,
            ack: false,
        }
    }

    #[test]
    fn oversized_payload_confirms_frame_too_long() {
        let (scheduler, device, log) = device_with_log();
        device.data_request(short_request(), vec![0u8; MAX_MAC_PAYLOAD + 1]);
        scheduler.run();
        assert_eq!(*log.statuses.borrow(), vec![MacStatus::FrameTooLong]);
    }

    #[test]
    fn missing_medium_confirms_channel_access_failure() {
        let (scheduler, device, log) = device_with_log();
        device.data_request(short_request(), vec![1]);
        scheduler.run();
        assert_eq!(*log.statuses.borrow(), vec![MacStatus::ChannelAccessFailure]);
    }

    #[test]
    fn extended_addressing_is_rejected() {
        let (scheduler, device, log) = device_with_log();
        let mut request = short_request();
        request.dst_mode = AddressMode::Extended;
        device.data_request(request, Vec::new());
        scheduler.run();
        assert_eq!(*log.statuses.borrow(), vec![MacStatus::InvalidParameter]);
    }

    #[test]
    fn device_ids_are_unique() {
        let scheduler = Rc::new(Scheduler::new());
        let a = Device::new(scheduler.clone(), Rc::new(Tracer::new()));
        let b = Device::new(scheduler, Rc::new(Tracer::new()));
        assert_ne!(a.id(), b.id());
    }
}
