//! Compressed block codec
//!
//! Block layout on the wire:
//! 1. payload length -- 32bit unsigned, big-endian
//! 2. payload -- LZ4 compressed bincode serialization, uncompressed size prepended

use std::io::{Read, Write};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use serde::{de::DeserializeOwned, Serialize};

use super::params::ParamSet;
use crate::error::{FarmError, Result};

/// Largest payload accepted in one block (256 MiB)
pub const MAX_BLOCK_LEN: u32 = 256 * 1024 * 1024;

/// Write length header followed by the payload
pub fn write_block<W: Write>(writer: &mut W, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u64;
    if len > MAX_BLOCK_LEN as u64 {
        return Err(FarmError::BlockTooLarge(len));
    }
    writer.write_u32::<NetworkEndian>(len as u32)?;
    writer.write_all(payload)?;
    Ok(())
}

/// Read length header, then exactly that many bytes
pub fn read_block<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = reader.read_u32::<NetworkEndian>()?;
    if len > MAX_BLOCK_LEN {
        return Err(FarmError::BlockTooLarge(len as u64));
    }
    let mut payload = vec![0; len as usize];
    reader.read_exact(&mut payload)?;
    Ok(payload)
}

/// Serialize and compress `value` into a block payload
pub fn compress<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let raw = bincode::serde::encode_to_vec(value, bincode::config::standard())?;
    Ok(lz4_flex::compress_prepend_size(&raw))
}

/// Decompress and deserialize block payload
pub fn decompress<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let raw = lz4_flex::decompress_size_prepended(payload)?;
    let (value, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
    Ok(value)
}

impl ParamSet {
    /// Encode into a framed block (length header included)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let payload = compress(self)?;
        let mut block = Vec::with_capacity(payload.len() + 4);
        write_block(&mut block, &payload)?;
        Ok(block)
    }

    /// Decode a framed block produced by [`ParamSet::encode`]
    pub fn decode(block: &[u8]) -> Result<ParamSet> {
        let mut slice = block;
        let params = ParamSet::read_from(&mut slice)?;
        if !slice.is_empty() {
            return Err(FarmError::malformed(
                "ParamSet",
                format!("{} trailing bytes after block", slice.len()),
            ));
        }
        Ok(params)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let payload = compress(self)?;
        write_block(writer, &payload)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<ParamSet> {
        let payload = read_block(reader)?;
        decompress(&payload)
    }
}
