use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use byteorder::{NetworkEndian, WriteBytesExt};
use log::{debug, error, warn};
use parking_lot::Mutex;

use super::{FilmBuffer, FilmSnapshot};
use crate::{
    error::{FarmError, Result},
    wire::{write_block, MAX_BLOCK_LEN},
};

/// Write a file through `{path}.temp` and a rename
///
/// When `fill` fails, the temp file is removed and an existing file at
/// `path` stays untouched. Returns the path holding the data: `path`, or
/// the temp path when only the rename failed.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<PathBuf>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let mut temp = path.as_os_str().to_owned();
    temp.push(".temp");
    let temp = PathBuf::from(temp);

    let written = File::create(&temp).map_err(FarmError::from).and_then(|file| {
        let mut out = BufWriter::new(file);
        fill(&mut out)?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    });
    if let Err(e) = written {
        if let Err(remove) = fs::remove_file(&temp) {
            if remove.kind() != io::ErrorKind::NotFound {
                warn!("Cannot remove {} ({remove})", temp.display());
            }
        }
        return Err(e);
    }

    match fs::rename(&temp, path) {
        Ok(()) => Ok(path.to_owned()),
        Err(e) => {
            warn!(
                "Cannot rename {} to {} ({e}), using the temporary file",
                temp.display(),
                path.display()
            );
            Ok(temp)
        }
    }
}

/// How `luxGetFilm` answers
#[derive(Debug, Clone)]
pub enum FilmTransmitter {
    /// Serialize straight into the connection
    Direct,
    /// Persist a resume file first, then stream it
    Snapshot(PathBuf),
}

impl FilmTransmitter {
    /// Transmitter for one worker, snapshot file named after `prefix`
    pub fn new(write_film: bool, work_dir: &Path, prefix: &str) -> FilmTransmitter {
        if write_film {
            FilmTransmitter::Snapshot(work_dir.join(format!("server_resume_{prefix}.flm")))
        } else {
            FilmTransmitter::Direct
        }
    }

    /// Send film as one block
    ///
    /// The lock is held only while copying the film.
    pub fn transmit<W: Write>(&self, writer: &mut W, film: &Mutex<FilmBuffer>) -> Result<()> {
        let snapshot = film.lock().snapshot();
        debug!(
            "Transmitting film {}x{}, {} samples",
            snapshot.width, snapshot.height, snapshot.total_samples
        );

        match self {
            FilmTransmitter::Direct => {
                let payload = snapshot.encode()?;
                write_block(writer, &payload)
            }
            FilmTransmitter::Snapshot(path) => self.transmit_file(writer, &snapshot, path),
        }
    }

    fn transmit_file<W: Write>(
        &self,
        writer: &mut W,
        snapshot: &FilmSnapshot,
        path: &Path,
    ) -> Result<()> {
        let written = write_atomic(path, |out| {
            out.write_all(&snapshot.encode()?)?;
            Ok(())
        });
        let source = match written {
            Ok(source) => source,
            Err(e) => {
                error!("Cannot write film to {} ({e})", path.display());
                return send_empty(writer);
            }
        };

        let len = fs::metadata(&source)?.len();
        if len > MAX_BLOCK_LEN as u64 {
            return Err(FarmError::BlockTooLarge(len));
        }
        let mut file = File::open(&source)?;
        writer.write_u32::<NetworkEndian>(len as u32)?;
        let copied = io::copy(&mut file, writer)?;
        if copied != len {
            return Err(FarmError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("film file shrank from {len} to {copied} bytes"),
            )));
        }
        debug!("Sent film from {}", source.display());
        Ok(())
    }
}

/// Block of length zero, "no film"
pub(crate) fn send_empty<W: Write>(writer: &mut W) -> Result<()> {
    write_block(writer, &[])
}
