//! ebg.original_edges format - one record per edge-expanded edge
//!
//! ```text
//! [u32 count]
//! count x { u32 via_node, u32 name_id, u8 turn_instruction, u8 compressed,
//!           u8 travel_mode, u8 0 }
//! ```
//!
//! The count is unknown while streaming, so a placeholder is written first and
//! patched once all records are out.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::ebg::{OriginalEdgeData, TurnInstruction};

pub const RECORD_SIZE: usize = 12;

/// Records are buffered and flushed in batches of this size
const FLUSH_THRESHOLD: usize = 10 * 1024 * 1024;

pub struct OriginalEdgeDataWriter<W: Write + Seek> {
    writer: W,
    buffer: Vec<OriginalEdgeData>,
    count: u32,
}

impl<W: Write + Seek> OriginalEdgeDataWriter<W> {
    pub fn new(mut writer: W) -> io::Result<Self> {
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            writer,
            buffer: Vec::new(),
            count: 0,
        })
    }

    pub fn push(&mut self, record: OriginalEdgeData) -> io::Result<()> {
        self.buffer.push(record);
        self.count += 1;
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        for record in self.buffer.drain(..) {
            self.writer.write_all(&encode(&record))?;
        }
        Ok(())
    }

    /// Number of records pushed so far
    pub fn len(&self) -> u32 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Write the remaining records and patch the count. Returns the writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush_buffer()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&self.count.to_le_bytes())?;
        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

fn encode(record: &OriginalEdgeData) -> [u8; RECORD_SIZE] {
    let mut bytes = [0u8; RECORD_SIZE];
    bytes[0..4].copy_from_slice(&record.via_node.to_le_bytes());
    bytes[4..8].copy_from_slice(&record.name_id.to_le_bytes());
    bytes[8] = record.turn_instruction.as_u8();
    bytes[9] = record.compressed as u8;
    bytes[10] = record.travel_mode;
    bytes
}

/// Read a complete ebg.original_edges stream
pub fn read_original_edges<R: Read>(mut reader: R) -> io::Result<Vec<OriginalEdgeData>> {
    let mut count = [0u8; 4];
    reader.read_exact(&mut count)?;
    let count = u32::from_le_bytes(count);

    let mut records = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let mut bytes = [0u8; RECORD_SIZE];
        reader.read_exact(&mut bytes)?;
        let turn_instruction = TurnInstruction::from_u8(bytes[8]).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown turn instruction {}", bytes[8]),
            )
        })?;
        records.push(OriginalEdgeData {
            via_node: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            name_id: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            turn_instruction,
            compressed: bytes[9] != 0,
            travel_mode: bytes[10],
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(via_node: u32, turn_instruction: TurnInstruction, compressed: bool) -> OriginalEdgeData {
        OriginalEdgeData {
            via_node,
            name_id: 7,
            turn_instruction,
            compressed,
            travel_mode: 1,
        }
    }

    #[test]
    fn test_count_is_patched() {
        let mut writer = OriginalEdgeDataWriter::new(Cursor::new(Vec::new())).unwrap();
        writer.push(record(3, TurnInstruction::TurnLeft, false)).unwrap();
        writer.push(record(0, TurnInstruction::NoTurn, true)).unwrap();
        assert_eq!(writer.len(), 2);
        let bytes = writer.finish().unwrap().into_inner();

        assert_eq!(bytes.len(), 4 + 2 * RECORD_SIZE);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        // first record: via 3, name 7, TurnLeft, uncompressed, mode 1, pad
        assert_eq!(&bytes[4..16], &[3, 0, 0, 0, 7, 0, 0, 0, 7, 0, 1, 0]);

        let records = read_original_edges(Cursor::new(bytes)).unwrap();
        assert_eq!(records[1], record(0, TurnInstruction::NoTurn, true));
    }

    #[test]
    fn test_empty_stream() {
        let writer = OriginalEdgeDataWriter::new(Cursor::new(Vec::new())).unwrap();
        assert!(writer.is_empty());
        let bytes = writer.finish().unwrap().into_inner();
        assert_eq!(bytes, 0u32.to_le_bytes());
        assert!(read_original_edges(Cursor::new(bytes)).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_unknown_instruction() {
        let mut bytes = 1u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0, 42, 0, 1, 0]);
        let err = read_original_edges(Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
