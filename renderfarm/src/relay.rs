//! File relay
//!
//! Files referenced by scene parameters are sent inline after the command.
//! Frame layout: decimal byte count on its own line, then exactly that many raw bytes.
//! Zero length means "no file".

use std::{
    fs::File,
    io::{self, BufRead, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use log::{debug, warn};
use tempfile::TempDir;

use crate::{
    error::{FarmError, Result},
    wire::read_line,
};

const CHUNK_LEN: usize = 64 * 1024;

/// Session scoped directory of received files
///
/// Directory and everything in it is removed when the arena is dropped.
#[derive(Debug)]
pub struct TempArena {
    dir: TempDir,
    prefix: String,
    sequence: u32,
    files: Vec<PathBuf>,
}

impl TempArena {
    /// Create arena in `work_dir`, file names derive from `port`
    pub fn new(work_dir: &Path, port: u16) -> Result<TempArena> {
        let prefix = format!("{port:05}");
        let dir = tempfile::Builder::new()
            .prefix(&format!("renderfarm_{prefix}_"))
            .tempdir_in(work_dir)?;
        debug!("Temporary file arena at {}", dir.path().display());
        Ok(TempArena {
            dir,
            prefix,
            sequence: 0,
            files: Vec::new(),
        })
    }

    /// Next local path for a file originally named `original`
    ///
    /// Path is `{prefix}_{sequence:08}{ext}`, sequence starts at 1.
    pub fn reserve(&mut self, original: &str) -> PathBuf {
        self.sequence += 1;
        let name = format!("{}_{:08}{}", self.prefix, self.sequence, extension(original));
        let path = self.dir.path().join(name);
        self.files.push(path.clone());
        path
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Paths handed out so far
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Remove directory now, reporting failure
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_owned();
        self.dir.close()?;
        debug!("Removed temporary file arena {}", path.display());
        Ok(())
    }
}

/// Extension of `original` with the leading dot, or empty
///
/// Only plain alphanumeric extensions are kept.
fn extension(original: &str) -> String {
    Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Send local file as one frame
///
/// Missing or unreadable file is sent as an empty frame.
pub fn send_file<W: Write>(writer: &mut W, path: &Path) -> Result<()> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Cannot read file {} ({e}), sending empty file", path.display());
            Vec::new()
        }
    };
    writeln!(writer, "{}", data.len())?;
    writer.write_all(&data)?;
    Ok(())
}

/// Receive one frame
///
/// Returns path of the created file, `None` for an empty frame.
/// The frame is always consumed whole, also when the file cannot be written,
/// so the stream stays aligned.
pub fn receive_file<R: BufRead>(
    reader: &mut R,
    arena: Option<&mut TempArena>,
    original: &str,
) -> Result<Option<PathBuf>> {
    let line = read_line(reader)?;
    let len: u64 = line
        .trim()
        .parse()
        .map_err(|_| FarmError::malformed("file transfer", format!("bad length '{line}'")))?;

    if len == 0 {
        debug!("Empty file frame for '{original}'");
        return Ok(None);
    }

    let arena = match arena {
        Some(arena) => arena,
        None => {
            warn!("No session, discarding {len} bytes of file '{original}'");
            drain(reader, len)?;
            return Ok(None);
        }
    };

    let path = arena.reserve(original);
    let mut out = match File::create(&path) {
        Ok(file) => Some(BufWriter::new(file)),
        Err(e) => {
            warn!("Cannot create {} ({e})", path.display());
            None
        }
    };

    let mut remaining = len;
    let mut buf = vec![0; CHUNK_LEN];
    while remaining > 0 {
        let take = remaining.min(CHUNK_LEN as u64) as usize;
        reader.read_exact(&mut buf[..take])?;
        remaining -= take as u64;

        if let Some(file) = out.as_mut() {
            if let Err(e) = file.write_all(&buf[..take]) {
                warn!("Cannot write {} ({e})", path.display());
                out = None;
            }
        }
    }
    if let Some(mut file) = out {
        if let Err(e) = file.flush() {
            warn!("Cannot write {} ({e})", path.display());
        }
    }

    debug!("Received '{original}' ({len} bytes) as {}", path.display());
    Ok(Some(path))
}

fn drain<R: Read>(reader: &mut R, len: u64) -> Result<()> {
    let copied = io::copy(&mut reader.take(len), &mut io::sink())?;
    if copied != len {
        return Err(FarmError::ConnectionClosed);
    }
    Ok(())
}
