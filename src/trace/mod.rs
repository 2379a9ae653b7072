//! Tracing collaborator producing on-disk capture artifacts.
//!
//! A `Tracer` is an explicit handle injected wherever tracing is needed;
//! there is no process-wide instance. Devices report every transmitted and
//! arriving frame here, and the tracer fans the events out to whatever
//! sinks were enabled for that device. Pcap sinks can be promiscuous
//! (capture everything the PHY hears) or filtered (own transmissions and
//! accepted arrivals only); ascii sinks always record filtered drops with
//! their own marker.

mod ascii;
mod pcap;

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use log::{info, warn};

use crate::link::{Device, Packet};
use crate::sim::SimTime;

use ascii::AsciiSink;
use pcap::PcapSink;

pub struct Tracer {
    output_dir: PathBuf,
    pcap: RefCell<HashMap<u32, PcapSink>>,
    ascii: RefCell<HashMap<u32, AsciiSink>>,
}

impl Tracer {
    pub fn new() -> Tracer {
        Tracer::with_output_dir(".")
    }

    pub fn with_output_dir(dir: impl Into<PathBuf>) -> Tracer {
        Tracer {
            output_dir: dir.into(),
            pcap: RefCell::new(HashMap::new()),
            ascii: RefCell::new(HashMap::new()),
        }
    }

    /// Artifact path for a device. With `explicit_filename` the prefix is
    /// the file name verbatim; otherwise the device id and extension are
    /// appended.
    fn artifact_path(
        &self,
        prefix: &str,
        device_id: u32,
        explicit_filename: bool,
        extension: &str,
    ) -> PathBuf {
        if explicit_filename {
            self.output_dir.join(prefix)
        } else {
            self.output_dir
                .join(format!("{prefix}-{device_id}.{extension}"))
        }
    }

    /// Start a pcap capture for `device`. Replaces a previous capture for
    /// the same device.
    pub fn enable_pcap(
        &self,
        prefix: &str,
        device: &Device,
        promiscuous: bool,
        explicit_filename: bool,
    ) -> io::Result<()> {
        let path = self.artifact_path(prefix, device.id(), explicit_filename, "pcap");
        let sink = PcapSink::create(&path, promiscuous)?;
        info!("pcap trace for device {} -> {}", device.id(), path.display());
        self.pcap.borrow_mut().insert(device.id(), sink);
        Ok(())
    }

    /// Start an ascii trace for `device`. Replaces a previous trace for the
    /// same device.
    pub fn enable_ascii(
        &self,
        prefix: &str,
        device: &Device,
        explicit_filename: bool,
    ) -> io::Result<()> {
        let path = self.artifact_path(prefix, device.id(), explicit_filename, "tr");
        let sink = AsciiSink::create(&path)?;
        info!("ascii trace for device {} -> {}", device.id(), path.display());
        self.ascii.borrow_mut().insert(device.id(), sink);
        Ok(())
    }

    pub(crate) fn packet_tx(&self, device_id: u32, at: SimTime, packet: &Packet) {
        if let Some(sink) = self.pcap.borrow_mut().get_mut(&device_id) {
            if let Err(err) = sink.record(at, packet) {
                warn!("pcap write failed for device {device_id}: {err}");
            }
        }
        if let Some(sink) = self.ascii.borrow_mut().get_mut(&device_id) {
            if let Err(err) = sink.record('t', at, device_id, packet) {
                warn!("ascii write failed for device {device_id}: {err}");
            }
        }
    }

    pub(crate) fn packet_rx(&self, device_id: u32, at: SimTime, packet: &Packet, accepted: bool) {
        if let Some(sink) = self.pcap.borrow_mut().get_mut(&device_id) {
            if accepted || sink.promiscuous {
                if let Err(err) = sink.record(at, packet) {
                    warn!("pcap write failed for device {device_id}: {err}");
                }
            }
        }
        if let Some(sink) = self.ascii.borrow_mut().get_mut(&device_id) {
            let marker = if accepted { 'r' } else { 'd' };
            if let Err(err) = sink.record(marker, at, device_id, packet) {
                warn!("ascii write failed for device {device_id}: {err}");
            }
        }
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Tracer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::address::{PanId, ShortAddress};
    use crate::link::mac::{AddressMode, DataRequest, Packet};
    use crate::sim::Scheduler;
    use std::fs;
    use std::path::Path;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicU32, Ordering};

    static UNIQUE: AtomicU32 = AtomicU32::new(0);

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "wsn-trace-test-{}-{}",
            std::process::id(),
            UNIQUE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_packet() -> Packet {
        let request = DataRequest {
            destination: ShortAddress::BROADCAST,
            dst_pan: PanId::DEFAULT,
            src_mode: AddressMode::Short,
            dst_mode: AddressMode::Short,
            msdu_handle: 0,
            ack: false,
        };
        Packet::new(ShortAddress::new(0x0001), &request, 0, vec![0xab, 0xcd])
    }

    #[test]
    fn artifact_paths_follow_prefix_rules() {
        let tracer = Tracer::with_output_dir("/out");
        assert_eq!(
            tracer.artifact_path("capture", 3, false, "pcap"),
            Path::new("/out/capture-3.pcap")
        );
        assert_eq!(
            tracer.artifact_path("capture.pcap", 3, true, "pcap"),
            Path::new("/out/capture.pcap")
        );
    }

    #[test]
    fn pcap_artifact_has_valid_header_and_record() {
        let dir = temp_dir();
        let tracer = Rc::new(Tracer::with_output_dir(&dir));
        let scheduler = Rc::new(Scheduler::new());
        let device = Device::new(scheduler, tracer.clone());
        tracer
            .enable_pcap("capture.pcap", &device, false, true)
            .unwrap();

        let packet = sample_packet();
        tracer.packet_tx(device.id(), SimTime::from_secs(2), &packet);

        let bytes = fs::read(dir.join("capture.pcap")).unwrap();
        assert_eq!(&bytes[0..4], &0xa1b2_c3d4u32.to_le_bytes());
        assert_eq!(&bytes[20..24], &230u32.to_le_bytes()); // 802.15.4 no-FCS
        let mpdu = packet.mpdu_bytes();
        // Record header: ts_sec, ts_usec, incl_len, orig_len.
        assert_eq!(&bytes[24..28], &2u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &(mpdu.len() as u32).to_le_bytes());
        assert_eq!(&bytes[40..], &mpdu[..]);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn promiscuous_pcap_captures_filtered_frames() {
        let dir = temp_dir();
        let tracer = Rc::new(Tracer::with_output_dir(&dir));
        let scheduler = Rc::new(Scheduler::new());
        let device = Device::new(scheduler, tracer.clone());
        tracer
            .enable_pcap("filtered.pcap", &device, false, true)
            .unwrap();

        let packet = sample_packet();
        tracer.packet_rx(device.id(), SimTime::ZERO, &packet, false);
        let filtered_len = fs::read(dir.join("filtered.pcap")).unwrap().len();
        assert_eq!(filtered_len, 24); // header only, frame was not accepted

        tracer
            .enable_pcap("promisc.pcap", &device, true, true)
            .unwrap();
        tracer.packet_rx(device.id(), SimTime::ZERO, &packet, false);
        let promisc_len = fs::read(dir.join("promisc.pcap")).unwrap().len();
        assert!(promisc_len > 24);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn ascii_trace_records_tx_rx_and_drops() {
        let dir = temp_dir();
        let tracer = Rc::new(Tracer::with_output_dir(&dir));
        let scheduler = Rc::new(Scheduler::new());
        let device = Device::new(scheduler, tracer.clone());
        tracer.enable_ascii("events.tr", &device, true).unwrap();

        let packet = sample_packet();
        tracer.packet_tx(device.id(), SimTime::from_secs(1), &packet);
        tracer.packet_rx(device.id(), SimTime::from_secs(2), &packet, true);
        tracer.packet_rx(device.id(), SimTime::from_secs(3), &packet, false);

        let text = fs::read_to_string(dir.join("events.tr")).unwrap();
        let markers: Vec<char> = text.lines().filter_map(|l| l.chars().next()).collect();
        assert_eq!(markers, vec!['t', 'r', 'd']);
        assert!(text.contains("00:01 -> ff:ff"));
        fs::remove_dir_all(&dir).ok();
    }
}
