//! Line-oriented ascii trace sink.
//!
//! One line per traced event: `t` for a transmitted frame, `r` for an
//! accepted arrival, `d` for an arrival the MAC filtered out.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::link::Packet;
use crate::sim::SimTime;

pub struct AsciiSink {
    writer: BufWriter<File>,
}

impl AsciiSink {
    pub fn create(path: &Path) -> io::Result<AsciiSink> {
        Ok(AsciiSink {
            writer: BufWriter::new(File::create(path)?),
        })
    }

    pub fn record(
        &mut self,
        marker: char,
        at: SimTime,
        device_id: u32,
        packet: &Packet,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "{} {} dev={} seq={} {} -> {} pan={} ack={} len={}",
            marker,
            at,
            device_id,
            packet.sequence,
            packet.src,
            packet.dst,
            packet.pan,
            packet.ack_request,
            packet.payload().len()
        )?;
        self.writer.flush()
    }
}
