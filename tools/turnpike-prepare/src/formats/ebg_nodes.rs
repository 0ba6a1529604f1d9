//! ebg.nodes format - edge-based node table (one record per segment)

use anyhow::Result;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use super::frame::{FrameHeader, FrameReader, FrameWriter};
use crate::ebg::EdgeBasedNode;

const MAGIC: u32 = 0x4542474E; // "EBGN"
const VERSION: u16 = 2;
const RECORD_SIZE: usize = 68;

#[derive(Debug)]
pub struct EbgNodes {
    pub created_unix: u64,
    pub inputs_sha: [u8; 32],
    pub nodes: Vec<EdgeBasedNode>,
}

pub struct EbgNodesFile;

impl EbgNodesFile {
    /// Write edge-based nodes to file
    pub fn write<P: AsRef<Path>>(path: P, data: &EbgNodes) -> Result<()> {
        let header = FrameHeader {
            count: data.nodes.len() as u32,
            created_unix: data.created_unix,
            inputs_sha: data.inputs_sha,
        };
        let mut writer =
            FrameWriter::new(BufWriter::new(File::create(path)?), MAGIC, VERSION, &header)?;

        for node in &data.nodes {
            writer.write_all(&encode(node))?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Read edge-based nodes from file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<EbgNodes> {
        let file = BufReader::new(File::open(path)?);
        let (mut reader, header) = FrameReader::new(file, "ebg.nodes", MAGIC, VERSION)?;

        let mut nodes = Vec::with_capacity(header.count as usize);
        for _ in 0..header.count {
            let mut record = [0u8; RECORD_SIZE];
            reader.read_exact(&mut record)?;
            nodes.push(decode(&record));
        }
        reader.finish()?;

        Ok(EbgNodes {
            created_unix: header.created_unix,
            inputs_sha: header.inputs_sha,
            nodes,
        })
    }
}

fn encode(node: &EdgeBasedNode) -> [u8; RECORD_SIZE] {
    let mut record = [0u8; RECORD_SIZE];
    record[0..8].copy_from_slice(&node.forward_way_id.to_le_bytes());
    record[8..16].copy_from_slice(&node.reverse_way_id.to_le_bytes());
    record[16..20].copy_from_slice(&node.forward_edge_based_node_id.to_le_bytes());
    record[20..24].copy_from_slice(&node.reverse_edge_based_node_id.to_le_bytes());
    record[24..28].copy_from_slice(&node.u.to_le_bytes());
    record[28..32].copy_from_slice(&node.v.to_le_bytes());
    record[32..36].copy_from_slice(&node.name_id.to_le_bytes());
    record[36..40].copy_from_slice(&node.forward_weight.to_le_bytes());
    record[40..44].copy_from_slice(&node.reverse_weight.to_le_bytes());
    record[44..48].copy_from_slice(&node.forward_offset.to_le_bytes());
    record[48..52].copy_from_slice(&node.reverse_offset.to_le_bytes());
    record[52..56].copy_from_slice(&node.packed_geometry_id.to_le_bytes());
    record[56..60].copy_from_slice(&node.component_id.to_le_bytes());
    record[60..64].copy_from_slice(&node.fwd_segment_position.to_le_bytes());
    record[64] = node.forward_travel_mode;
    record[65] = node.backward_travel_mode;
    record
}

fn decode(record: &[u8; RECORD_SIZE]) -> EdgeBasedNode {
    let u32_at = |at: usize| {
        u32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
    };
    let i32_at = |at: usize| {
        i32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
    };
    let u64_at = |at: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&record[at..at + 8]);
        u64::from_le_bytes(bytes)
    };

    EdgeBasedNode {
        forward_way_id: u64_at(0),
        reverse_way_id: u64_at(8),
        forward_edge_based_node_id: u32_at(16),
        reverse_edge_based_node_id: u32_at(20),
        u: u32_at(24),
        v: u32_at(28),
        name_id: u32_at(32),
        forward_weight: i32_at(36),
        reverse_weight: i32_at(40),
        forward_offset: i32_at(44),
        reverse_offset: i32_at(48),
        packed_geometry_id: u32_at(52),
        component_id: u32_at(56),
        fwd_segment_position: u32_at(60),
        forward_travel_mode: record[64],
        backward_travel_mode: record[65],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write as IoWrite};
    use tempfile::NamedTempFile;
    use turnpike_common::SPECIAL_EDGEID;

    fn make_test_nodes() -> EbgNodes {
        let base = EdgeBasedNode {
            forward_way_id: 42,
            reverse_way_id: 42,
            forward_edge_based_node_id: 0,
            reverse_edge_based_node_id: 1,
            u: 0,
            v: 1,
            name_id: 3,
            forward_weight: 50,
            reverse_weight: 50,
            forward_offset: 0,
            reverse_offset: 0,
            packed_geometry_id: SPECIAL_EDGEID,
            component_id: 0,
            fwd_segment_position: 0,
            forward_travel_mode: 1,
            backward_travel_mode: 1,
        };
        EbgNodes {
            created_unix: 1700000000,
            inputs_sha: [0xAB; 32],
            nodes: vec![
                base,
                EdgeBasedNode {
                    reverse_edge_based_node_id: SPECIAL_EDGEID,
                    u: 1,
                    v: 2,
                    forward_offset: 50,
                    reverse_offset: -1,
                    packed_geometry_id: 7,
                    component_id: 4,
                    fwd_segment_position: 1,
                    backward_travel_mode: 0,
                    ..base
                },
            ],
        }
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let data = make_test_nodes();
        let tmp = NamedTempFile::new()?;
        EbgNodesFile::write(tmp.path(), &data)?;
        let loaded = EbgNodesFile::read(tmp.path())?;

        assert_eq!(loaded.created_unix, 1700000000);
        assert_eq!(loaded.inputs_sha, [0xAB; 32]);
        assert_eq!(loaded.nodes, data.nodes);
        assert!(loaded.nodes[1].is_compressed());
        Ok(())
    }

    #[test]
    fn test_crc_detects_body_corruption() -> Result<()> {
        let data = make_test_nodes();
        let tmp = NamedTempFile::new()?;
        EbgNodesFile::write(tmp.path(), &data)?;

        // Corrupt a byte in the body (first node record, offset 64)
        {
            let mut file = std::fs::OpenOptions::new().write(true).open(tmp.path())?;
            file.seek(SeekFrom::Start(64))?;
            file.write_all(&[0xFF])?;
        }

        let result = EbgNodesFile::read(tmp.path());
        assert!(result.is_err(), "corrupted file should fail CRC check");
        let err_msg = result.unwrap_err().to_string();
        assert!(
            err_msg.contains("CRC64 mismatch"),
            "error should mention CRC: {}",
            err_msg
        );
        Ok(())
    }
}
