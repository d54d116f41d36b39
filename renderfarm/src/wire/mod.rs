//! Wire level building blocks
//!
//! Parameter sets travel as compressed binary blocks, command names and
//! numeric arguments travel as text lines.

mod codec;
mod hash;
mod params;
pub mod parse;

pub use codec::{compress, decompress, read_block, write_block, MAX_BLOCK_LEN};
pub use hash::djb_hash;
pub use params::{ParamItem, ParamKind, ParamSet, ParamValue};

use std::io::{BufRead, Read};

use crate::error::{FarmError, Result};

/// Longest text line accepted, terminator excluded
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Read one text line, without the line terminator
///
/// End of stream is reported as [`FarmError::ConnectionClosed`]. A line
/// that is not UTF-8 is consumed and reported as malformed, a line longer
/// than [`MAX_LINE_LEN`] as [`FarmError::LineTooLong`].
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut buf = Vec::new();
    let read = reader
        .by_ref()
        .take(MAX_LINE_LEN as u64 + 1)
        .read_until(b'\n', &mut buf)?;
    if read == 0 {
        return Err(FarmError::ConnectionClosed);
    }
    if buf.last() != Some(&b'\n') && buf.len() > MAX_LINE_LEN {
        return Err(FarmError::LineTooLong(MAX_LINE_LEN));
    }

    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|e| {
        FarmError::malformed(
            "text line",
            format!("not UTF-8 after {} bytes", e.utf8_error().valid_up_to()),
        )
    })
}
