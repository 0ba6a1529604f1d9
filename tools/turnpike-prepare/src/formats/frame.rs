//! CRC-framed container shared by the edge-expanded outputs
//!
//! ```text
//! header (64 bytes): magic u32, version u16, reserved u16, count u32,
//!                    created_unix u64, inputs_sha [u8; 32], padding
//! body
//! footer (16 bytes): body_crc u64, file_crc u64
//! ```
//!
//! `body_crc` covers the body alone, `file_crc` covers header and body.
//! Both are CRC-64/GO-ISO.

use anyhow::Result;
use crc::{Crc, Digest, CRC_64_GO_ISO};
use std::io::{Read, Write};

pub const HEADER_SIZE: usize = 64;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Running body and file digests of one frame
struct FrameDigests {
    body: Digest<'static, u64>,
    file: Digest<'static, u64>,
}

impl FrameDigests {
    fn new(header: &[u8]) -> Self {
        let mut file = CRC64.digest();
        file.update(header);
        Self {
            body: CRC64.digest(),
            file,
        }
    }

    fn update(&mut self, bytes: &[u8]) {
        self.body.update(bytes);
        self.file.update(bytes);
    }

    /// `(body_crc, file_crc)`
    fn finalize(self) -> (u64, u64) {
        (self.body.finalize(), self.file.finalize())
    }
}

/// Header fields that are not fixed per format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub count: u32,
    pub created_unix: u64,
    pub inputs_sha: [u8; 32],
}

/// Writes one frame, hashing everything that goes through it
pub struct FrameWriter<W: Write> {
    writer: W,
    digests: FrameDigests,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(mut writer: W, magic: u32, version: u16, header: &FrameHeader) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&version.to_le_bytes());
        bytes[8..12].copy_from_slice(&header.count.to_le_bytes());
        bytes[12..20].copy_from_slice(&header.created_unix.to_le_bytes());
        bytes[20..52].copy_from_slice(&header.inputs_sha);

        writer.write_all(&bytes)?;
        Ok(Self {
            writer,
            digests: FrameDigests::new(&bytes),
        })
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.digests.update(bytes);
        Ok(())
    }

    /// Append the footer and flush
    pub fn finish(mut self) -> Result<W> {
        let (body_crc, file_crc) = self.digests.finalize();
        self.writer.write_all(&body_crc.to_le_bytes())?;
        self.writer.write_all(&file_crc.to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads one frame; [`FrameReader::finish`] verifies both CRCs
pub struct FrameReader<R: Read> {
    reader: R,
    digests: FrameDigests,
    name: &'static str,
}

impl<R: Read> FrameReader<R> {
    pub fn new(
        mut reader: R,
        name: &'static str,
        magic: u32,
        version: u16,
    ) -> Result<(Self, FrameHeader)> {
        let mut bytes = [0u8; HEADER_SIZE];
        reader.read_exact(&mut bytes)?;

        let found_magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        anyhow::ensure!(
            found_magic == magic,
            "bad magic in {}: expected 0x{:08X}, found 0x{:08X}",
            name,
            magic,
            found_magic
        );
        let found_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        anyhow::ensure!(
            found_version == version,
            "unsupported {} version {}",
            name,
            found_version
        );

        let count = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        let mut created_unix = [0u8; 8];
        created_unix.copy_from_slice(&bytes[12..20]);
        let mut inputs_sha = [0u8; 32];
        inputs_sha.copy_from_slice(&bytes[20..52]);

        Ok((
            Self {
                reader,
                digests: FrameDigests::new(&bytes),
                name,
            },
            FrameHeader {
                count,
                created_unix: u64::from_le_bytes(created_unix),
                inputs_sha,
            },
        ))
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader.read_exact(buf)?;
        self.digests.update(buf);
        Ok(())
    }

    /// Verify both CRC64s against the footer
    pub fn finish(mut self) -> Result<()> {
        let (body_crc, file_crc) = self.digests.finalize();
        let mut footer = [0u8; 16];
        self.reader.read_exact(&mut footer)?;
        let stored_body_crc = u64::from_le_bytes(footer[0..8].try_into()?);
        let stored_file_crc = u64::from_le_bytes(footer[8..16].try_into()?);
        anyhow::ensure!(
            body_crc == stored_body_crc,
            "body CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
            self.name,
            body_crc,
            stored_body_crc
        );
        anyhow::ensure!(
            file_crc == stored_file_crc,
            "file CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
            self.name,
            file_crc,
            stored_file_crc
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const MAGIC: u32 = 0x54455354; // "TEST"

    fn header() -> FrameHeader {
        FrameHeader {
            count: 2,
            created_unix: 1_700_000_000,
            inputs_sha: [0xAB; 32],
        }
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut writer = FrameWriter::new(Vec::new(), MAGIC, 1, &header()).unwrap();
        writer.write_all(body).unwrap();
        writer.finish().unwrap()
    }

    #[test]
    fn test_frame_roundtrip() -> Result<()> {
        let bytes = framed(&[1, 2, 3, 4]);
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 16);

        let (mut reader, loaded) = FrameReader::new(Cursor::new(bytes), "test", MAGIC, 1)?;
        assert_eq!(loaded, header());
        let mut body = [0u8; 4];
        reader.read_exact(&mut body)?;
        assert_eq!(body, [1, 2, 3, 4]);
        reader.finish()
    }

    #[test]
    fn test_wrong_magic_and_version() {
        let bytes = framed(&[]);
        assert!(FrameReader::new(Cursor::new(bytes.clone()), "test", MAGIC + 1, 1).is_err());
        assert!(FrameReader::new(Cursor::new(bytes), "test", MAGIC, 2).is_err());
    }

    #[test]
    fn test_crc_detects_corruption() -> Result<()> {
        let mut bytes = framed(&[1, 2, 3, 4]);
        bytes[HEADER_SIZE + 1] ^= 0xFF;

        let (mut reader, _) = FrameReader::new(Cursor::new(bytes), "test", MAGIC, 1)?;
        let mut body = [0u8; 4];
        reader.read_exact(&mut body)?;
        let err = reader.finish().unwrap_err();
        assert!(err.to_string().contains("CRC64 mismatch"), "{err}");
        Ok(())
    }

    #[test]
    fn test_footer_holds_body_and_file_crc() {
        let body = [9u8, 8, 7];
        let bytes = framed(&body);
        let footer = &bytes[bytes.len() - 16..];
        let body_crc = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let file_crc = u64::from_le_bytes(footer[8..16].try_into().unwrap());

        assert_eq!(body_crc, CRC64.checksum(&body));
        assert_eq!(file_crc, CRC64.checksum(&bytes[..bytes.len() - 16]));
        assert_ne!(body_crc, file_crc);
    }

    #[test]
    fn test_file_crc_detects_header_corruption() -> Result<()> {
        let mut bytes = framed(&[1, 2, 3, 4]);
        // padding is not parsed, only the file CRC sees it
        bytes[HEADER_SIZE - 1] ^= 0xFF;

        let (mut reader, _) = FrameReader::new(Cursor::new(bytes), "test", MAGIC, 1)?;
        let mut body = [0u8; 4];
        reader.read_exact(&mut body)?;
        let err = reader.finish().unwrap_err();
        assert!(err.to_string().contains("file CRC64 mismatch"), "{err}");
        Ok(())
    }
}
