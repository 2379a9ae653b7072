//! Pcap capture sink.
//!
//! Writes the classic pcap container (microsecond timestamps) with the
//! IEEE 802.15.4 no-FCS link type, one record per traced frame.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::link::Packet;
use crate::sim::SimTime;

const PCAP_MAGIC: u32 = 0xa1b2_c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;
/// LINKTYPE_IEEE802_15_4_NOFCS.
const LINKTYPE: u32 = 230;
const SNAPLEN: u32 = 65_535;

pub struct PcapSink {
    writer: BufWriter<File>,
    pub promiscuous: bool,
}

impl PcapSink {
    pub fn create(path: &Path, promiscuous: bool) -> io::Result<PcapSink> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&PCAP_MAGIC.to_le_bytes())?;
        writer.write_all(&PCAP_VERSION_MAJOR.to_le_bytes())?;
        writer.write_all(&PCAP_VERSION_MINOR.to_le_bytes())?;
        writer.write_all(&0i32.to_le_bytes())?; // thiszone
        writer.write_all(&0u32.to_le_bytes())?; // sigfigs
        writer.write_all(&SNAPLEN.to_le_bytes())?;
        writer.write_all(&LINKTYPE.to_le_bytes())?;
        writer.flush()?;
        Ok(PcapSink { writer, promiscuous })
    }

    pub fn record(&mut self, at: SimTime, packet: &Packet) -> io::Result<()> {
        let bytes = packet.mpdu_bytes();
        let nanos = at.as_nanos();
        let ts_sec = (nanos / 1_000_000_000) as u32;
        let ts_usec = ((nanos % 1_000_000_000) / 1_000) as u32;
        self.writer.write_all(&ts_sec.to_le_bytes())?;
        self.writer.write_all(&ts_usec.to_le_bytes())?;
        self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
        self.writer.write_all(&bytes)?;
        self.writer.flush()
    }
}
