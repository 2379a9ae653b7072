//! Shared wireless medium.
//!
//! Every device bound to the medium references the same instance. A
//! transmission is evaluated against each attached device: the loss model
//! yields the received power, receivers below sensitivity never hear the
//! frame, and deliveries are scheduled at the end of the frame's airtime
//! plus the propagation delay for the link distance. The medium also
//! resolves acknowledgements and schedules the sender's data confirm.
//!
//! Medium-access arbitration (collisions, CSMA) is not modeled here.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::{debug, warn};

use super::device::Device;
use super::mac::{DataConfirm, MacStatus, Packet};
use super::phy::{
    ACK_MPDU_BYTES, ACK_WAIT_DURATION, RX_SENSITIVITY_DBM, TURNAROUND_TIME, frame_airtime,
};
use super::propagation::{PropagationDelay, PropagationLoss};
use crate::sim::{Scheduler, SimTime};

/// Link quality indicator from the margin over receiver sensitivity,
/// saturating at 255.
fn lqi_from_rx_power(rx_power_dbm: f64) -> u8 {
    let margin = rx_power_dbm - RX_SENSITIVITY_DBM;
    (margin * 4.0).round().clamp(0.0, 255.0) as u8
}

pub struct Medium {
    scheduler: Rc<Scheduler>,
    loss: Box<dyn PropagationLoss>,
    delay: Box<dyn PropagationDelay>,
    devices: RefCell<Vec<Weak<Device>>>,
}

impl Medium {
    pub fn new(
        scheduler: Rc<Scheduler>,
        loss: Box<dyn PropagationLoss>,
        delay: Box<dyn PropagationDelay>,
    ) -> Medium {
        Medium {
            scheduler,
            loss,
            delay,
            devices: RefCell::new(Vec::new()),
        }
    }

    /// Bind a device to this medium. Idempotent: a device already attached
    /// is not attached twice.
    pub fn attach(&self, device: &Rc<Device>) {
        let mut devices = self.devices.borrow_mut();
        devices.retain(|w| w.strong_count() > 0);
        if devices
            .iter()
            .any(|w| w.upgrade().is_some_and(|d| d.id() == device.id()))
        {
            return;
        }
        devices.push(Rc::downgrade(device));
    }

    pub fn device_count(&self) -> usize {
        self.devices
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Put a frame on the air. Called by the sending device at the frame's
    /// transmission start time.
    ///
    /// Acknowledgement rules: broadcast frames are never acknowledged, so
    /// they (and frames sent without the ack option) confirm `Success` at
    /// the end of the airtime. A unicast frame with the ack option confirms
    /// `Success` after the ack exchange when an in-range device accepts the
    /// destination, and `NoAck` after the ack wait when none does.
    pub fn transmit(&self, sender: &Rc<Device>, packet: Packet) {
        let Some(sender_position) = sender.phy().position() else {
            warn!(
                "device {} transmitting without a position, dropping frame",
                sender.id()
            );
            Medium::schedule_confirm(
                &self.scheduler,
                sender,
                SimTime::ZERO,
                DataConfirm {
                    msdu_handle: packet.handle,
                    status: MacStatus::ChannelAccessFailure,
                },
            );
            return;
        };

        let airtime = frame_airtime(packet.mpdu_bytes().len());
        let tx_power = sender.phy().tx_power_dbm();
        let want_ack = packet.ack_request && !packet.dst.is_broadcast();
        let mut ack_at: Option<SimTime> = None;

        for weak in self.devices.borrow().iter() {
            let Some(device) = weak.upgrade() else {
                continue;
            };
            if device.id() == sender.id() {
                continue;
            }
            let Some(position) = device.phy().position() else {
                debug!("device {} has no position, skipping delivery", device.id());
                continue;
            };

            let distance = sender_position.distance(&position);
            let rx_power = self.loss.rx_power_dbm(tx_power, distance);
            if rx_power < RX_SENSITIVITY_DBM {
                continue;
            }

            let delivery = airtime + self.delay.delay(distance);
            let lqi = lqi_from_rx_power(rx_power);
            let target = Rc::downgrade(&device);
            let delivered = packet.clone();
            self.scheduler.schedule(delivery, move || {
                if let Some(device) = target.upgrade() {
                    device.receive(delivered, lqi);
                }
            });

            if want_ack && device.accepts(&packet) {
                let ack_arrival = delivery
                    + TURNAROUND_TIME
                    + frame_airtime(ACK_MPDU_BYTES)
                    + self.delay.delay(distance);
                ack_at = Some(match ack_at {
                    Some(existing) => existing.min(ack_arrival),
                    None => ack_arrival,
                });
            }
        }

        let confirm_at = if !want_ack {
            airtime
        } else if let Some(at) = ack_at {
            at
        } else {
            airtime + ACK_WAIT_DURATION
        };
        let status = if !want_ack || ack_at.is_some() {
            MacStatus::Success
        } else {
            MacStatus::NoAck
        };

        Medium::schedule_confirm(
            &self.scheduler,
            sender,
            confirm_at,
            DataConfirm {
                msdu_handle: packet.handle,
                status,
            },
        );
    }

    fn schedule_confirm(
        scheduler: &Rc<Scheduler>,
        sender: &Rc<Device>,
        delay: SimTime,
        confirm: DataConfirm,
    ) {
        let weak = Rc::downgrade(sender);
        scheduler.schedule(delay, move || {
            if let Some(device) = weak.upgrade() {
                device.confirm(confirm);
            }
        });
    }
}
