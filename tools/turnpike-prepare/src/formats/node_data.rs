//! ebg.node_data format - uncompressed geometry per edge-based node
//!
//! Body: for every edge-based node id in order, `u32 segment count` followed
//! by that many 40-byte segments `{u64 way_id, f64 lat1, f64 lon1, f64 lat2,
//! f64 lon2}`.

use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::frame::{FrameHeader, FrameReader, FrameWriter};
use crate::ebg::{EdgeBasedNodeData, SegmentInfo};

const MAGIC: u32 = 0x45424744; // "EBGD"
const VERSION: u16 = 1;
const SEGMENT_SIZE: usize = 40;

#[derive(Debug)]
pub struct NodeDataTable {
    pub created_unix: u64,
    pub inputs_sha: [u8; 32],
    pub nodes: Vec<EdgeBasedNodeData>,
}

pub struct NodeDataFile;

impl NodeDataFile {
    pub fn write<P: AsRef<Path>>(path: P, data: &NodeDataTable) -> Result<()> {
        let header = FrameHeader {
            count: data.nodes.len() as u32,
            created_unix: data.created_unix,
            inputs_sha: data.inputs_sha,
        };
        let mut writer =
            FrameWriter::new(BufWriter::new(File::create(path)?), MAGIC, VERSION, &header)?;

        for node in &data.nodes {
            writer.write_all(&(node.segments.len() as u32).to_le_bytes())?;
            for segment in &node.segments {
                let mut record = [0u8; SEGMENT_SIZE];
                record[0..8].copy_from_slice(&segment.way_id.to_le_bytes());
                record[8..16].copy_from_slice(&segment.lat1.to_le_bytes());
                record[16..24].copy_from_slice(&segment.lon1.to_le_bytes());
                record[24..32].copy_from_slice(&segment.lat2.to_le_bytes());
                record[32..40].copy_from_slice(&segment.lon2.to_le_bytes());
                writer.write_all(&record)?;
            }
        }
        writer.finish()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<NodeDataTable> {
        let file = BufReader::new(File::open(path)?);
        let (mut reader, header) = FrameReader::new(file, "ebg.node_data", MAGIC, VERSION)?;

        let mut nodes = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let mut count = [0u8; 4];
            reader.read_exact(&mut count)?;
            let count = u32::from_le_bytes(count);

            let mut segments = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut record = [0u8; SEGMENT_SIZE];
                reader.read_exact(&mut record)?;
                let word = |at: usize| {
                    let mut bytes = [0u8; 8];
                    bytes.copy_from_slice(&record[at..at + 8]);
                    bytes
                };
                segments.push(SegmentInfo {
                    way_id: u64::from_le_bytes(word(0)),
                    lat1: f64::from_le_bytes(word(8)),
                    lon1: f64::from_le_bytes(word(16)),
                    lat2: f64::from_le_bytes(word(24)),
                    lon2: f64::from_le_bytes(word(32)),
                });
            }
            nodes.push(EdgeBasedNodeData { segments });
        }
        reader.finish()?;

        Ok(NodeDataTable {
            created_unix: header.created_unix,
            inputs_sha: header.inputs_sha,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write as IoWrite};
    use tempfile::NamedTempFile;

    fn make_table() -> NodeDataTable {
        NodeDataTable {
            created_unix: 1700000000,
            inputs_sha: [0x5A; 32],
            nodes: vec![
                EdgeBasedNodeData {
                    segments: vec![
                        SegmentInfo {
                            way_id: 100,
                            lat1: 52.5,
                            lon1: 13.4,
                            lat2: 52.501,
                            lon2: 13.4,
                        },
                        SegmentInfo {
                            way_id: 101,
                            lat1: 52.501,
                            lon1: 13.4,
                            lat2: 52.501,
                            lon2: 13.401,
                        },
                    ],
                },
                EdgeBasedNodeData::default(),
            ],
        }
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let data = make_table();
        let tmp = NamedTempFile::new()?;
        NodeDataFile::write(tmp.path(), &data)?;
        let loaded = NodeDataFile::read(tmp.path())?;

        assert_eq!(loaded.nodes, data.nodes);
        assert_eq!(loaded.created_unix, 1700000000);
        Ok(())
    }

    #[test]
    fn test_crc_detects_body_corruption() -> Result<()> {
        let tmp = NamedTempFile::new()?;
        NodeDataFile::write(tmp.path(), &make_table())?;

        // Flip a coordinate byte of the first segment
        {
            let mut file = std::fs::OpenOptions::new().write(true).open(tmp.path())?;
            file.seek(SeekFrom::Start(64 + 4 + 10))?;
            file.write_all(&[0x7F])?;
        }

        let err = NodeDataFile::read(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("CRC64 mismatch"), "{err}");
        Ok(())
    }
}
