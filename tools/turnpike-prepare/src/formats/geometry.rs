//! ebg.geometry format - node lists of compressed edges
//!
//! Written by [`GeometryCompressor::serialize`](crate::compressor::GeometryCompressor::serialize);
//! list `i` holds the nodes of bucket slot `i`, the slot id an
//! [`EdgeBasedNode`](crate::ebg::EdgeBasedNode) carries as packed geometry id.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use turnpike_common::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedGeometry {
    /// Prefix sums into `node_ids`, one more than there are lists
    pub offsets: Vec<u32>,
    pub node_ids: Vec<NodeId>,
}

impl PackedGeometry {
    pub fn number_of_lists(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Nodes of bucket slot `slot`
    pub fn list(&self, slot: u32) -> &[NodeId] {
        let slot = slot as usize;
        if slot + 1 >= self.offsets.len() {
            return &[];
        }
        &self.node_ids[self.offsets[slot] as usize..self.offsets[slot + 1] as usize]
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        let number_of_offsets = read_u32(&mut reader)?;
        let mut offsets = Vec::with_capacity(number_of_offsets as usize);
        for _ in 0..number_of_offsets {
            offsets.push(read_u32(&mut reader)?);
        }

        let total = read_u32(&mut reader)?;
        let ordered = offsets.windows(2).all(|pair| pair[0] <= pair[1]);
        if !ordered || offsets.last().copied().unwrap_or(0) != total {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "geometry offsets do not add up to the node count",
            ));
        }

        let mut node_ids = Vec::with_capacity(total as usize);
        for _ in 0..total {
            node_ids.push(read_u32(&mut reader)?);
        }
        Ok(Self { offsets, node_ids })
    }

    pub fn read_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}
