//! ebg.edges format - turns of the edge-expanded graph

use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::frame::{FrameHeader, FrameReader, FrameWriter};
use crate::ebg::EdgeBasedEdge;

const MAGIC: u32 = 0x45424745; // "EBGE"
const VERSION: u16 = 1;
const RECORD_SIZE: usize = 20;

const FLAG_FORWARD: u8 = 0b01;
const FLAG_BACKWARD: u8 = 0b10;

#[derive(Debug)]
pub struct EbgEdges {
    pub created_unix: u64,
    pub inputs_sha: [u8; 32],
    pub edges: Vec<EdgeBasedEdge>,
}

pub struct EbgEdgesFile;

impl EbgEdgesFile {
    pub fn write<P: AsRef<Path>>(path: P, data: &EbgEdges) -> Result<()> {
        let header = FrameHeader {
            count: data.edges.len() as u32,
            created_unix: data.created_unix,
            inputs_sha: data.inputs_sha,
        };
        let mut writer =
            FrameWriter::new(BufWriter::new(File::create(path)?), MAGIC, VERSION, &header)?;

        // Body: count records (20 bytes each)
        for edge in &data.edges {
            let mut record = [0u8; RECORD_SIZE];
            record[0..4].copy_from_slice(&edge.source.to_le_bytes());
            record[4..8].copy_from_slice(&edge.target.to_le_bytes());
            record[8..12].copy_from_slice(&edge.edge_id.to_le_bytes());
            record[12..16].copy_from_slice(&edge.weight.to_le_bytes());
            let mut flags = 0u8;
            if edge.forward {
                flags |= FLAG_FORWARD;
            }
            if edge.backward {
                flags |= FLAG_BACKWARD;
            }
            record[16] = flags;
            writer.write_all(&record)?;
        }
        writer.finish()?;
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<EbgEdges> {
        let file = BufReader::new(File::open(path)?);
        let (mut reader, header) = FrameReader::new(file, "ebg.edges", MAGIC, VERSION)?;

        let mut edges = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let mut r = [0u8; RECORD_SIZE];
            reader.read_exact(&mut r)?;
            edges.push(EdgeBasedEdge {
                source: u32::from_le_bytes([r[0], r[1], r[2], r[3]]),
                target: u32::from_le_bytes([r[4], r[5], r[6], r[7]]),
                edge_id: u32::from_le_bytes([r[8], r[9], r[10], r[11]]),
                weight: i32::from_le_bytes([r[12], r[13], r[14], r[15]]),
                forward: r[16] & FLAG_FORWARD != 0,
                backward: r[16] & FLAG_BACKWARD != 0,
            });
        }
        reader.finish()?;

        Ok(EbgEdges {
            created_unix: header.created_unix,
            inputs_sha: header.inputs_sha,
            edges,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_roundtrip() -> Result<()> {
        let data = EbgEdges {
            created_unix: 1700000000,
            inputs_sha: [0x11; 32],
            edges: vec![
                EdgeBasedEdge {
                    source: 0,
                    target: 3,
                    edge_id: 0,
                    weight: 120,
                    forward: true,
                    backward: false,
                },
                EdgeBasedEdge {
                    source: 3,
                    target: 1,
                    edge_id: 1,
                    weight: 75,
                    forward: true,
                    backward: true,
                },
            ],
        };
        let tmp = NamedTempFile::new()?;
        EbgEdgesFile::write(tmp.path(), &data)?;
        let loaded = EbgEdgesFile::read(tmp.path())?;

        assert_eq!(loaded.edges, data.edges);
        assert_eq!(loaded.inputs_sha, [0x11; 32]);
        Ok(())
    }

    #[test]
    fn test_truncated_file_fails() -> Result<()> {
        let data = EbgEdges {
            created_unix: 0,
            inputs_sha: [0; 32],
            edges: vec![EdgeBasedEdge {
                source: 0,
                target: 1,
                edge_id: 0,
                weight: 1,
                forward: true,
                backward: false,
            }],
        };
        let tmp = NamedTempFile::new()?;
        EbgEdgesFile::write(tmp.path(), &data)?;

        let len = std::fs::metadata(tmp.path())?.len();
        std::fs::OpenOptions::new()
            .write(true)
            .open(tmp.path())?
            .set_len(len - 8)?;
        assert!(EbgEdgesFile::read(tmp.path()).is_err());
        Ok(())
    }
}
