//! Film accumulation and transfer
//!
//! Sampling threads splat into a shared [`FilmBuffer`], `luxGetFilm` copies
//! a [`FilmSnapshot`] out of it and sends it as a compressed block.

mod transmit;

pub(crate) use transmit::send_empty;
pub use transmit::{write_atomic, FilmTransmitter};

use serde::{Deserialize, Serialize};

use crate::{
    error::{FarmError, Result},
    wire::{compress, decompress},
};

/// Accumulated radiance of one pixel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pixel {
    /// Sum of weighted samples
    pub rgb: [f32; 3],
    /// Sum of weights
    pub weight: f32,
}

impl Pixel {
    pub fn add(&mut self, rgb: [f32; 3], weight: f32) {
        for (acc, c) in self.rgb.iter_mut().zip(rgb) {
            *acc += c * weight;
        }
        self.weight += weight;
    }

    /// Average color, black when nothing was added
    pub fn resolve(&self) -> [f32; 3] {
        if self.weight <= 0.0 {
            return [0.0; 3];
        }
        self.rgb.map(|c| c / self.weight)
    }
}

/// Film being rendered into
#[derive(Debug, Clone)]
pub struct FilmBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Pixel>,
    total_samples: u64,
}

impl FilmBuffer {
    pub fn new(width: u32, height: u32) -> FilmBuffer {
        FilmBuffer {
            width,
            height,
            pixels: vec![Pixel::default(); width as usize * height as usize],
            total_samples: 0,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&Pixel> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y as usize * self.width as usize + x as usize)
    }

    /// Add one finished row of samples
    ///
    /// `row` holds accumulated pixels of row `y`, `samples` is how many
    /// samples went into it.
    pub fn splat_row(&mut self, y: u32, row: &[Pixel], samples: u64) {
        if y >= self.height || row.len() != self.width as usize {
            return;
        }
        let start = y as usize * self.width as usize;
        for (acc, add) in self.pixels[start..start + row.len()].iter_mut().zip(row) {
            for i in 0..3 {
                acc.rgb[i] += add.rgb[i];
            }
            acc.weight += add.weight;
        }
        self.total_samples += samples;
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> FilmSnapshot {
        FilmSnapshot {
            width: self.width,
            height: self.height,
            total_samples: self.total_samples,
            pixels: self.pixels.clone(),
        }
    }
}

/// Film as transferred between worker and master
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmSnapshot {
    pub width: u32,
    pub height: u32,
    pub total_samples: u64,
    pub pixels: Vec<Pixel>,
}

impl FilmSnapshot {
    /// Empty film of the given size
    pub fn empty(width: u32, height: u32) -> FilmSnapshot {
        FilmBuffer::new(width, height).snapshot()
    }

    /// Compressed block payload
    pub fn encode(&self) -> Result<Vec<u8>> {
        compress(self)
    }

    pub fn decode(payload: &[u8]) -> Result<FilmSnapshot> {
        let film: FilmSnapshot = decompress(payload)?;
        if film.pixels.len() != film.width as usize * film.height as usize {
            return Err(FarmError::malformed(
                "luxGetFilm",
                format!(
                    "{} pixels in a {}x{} film",
                    film.pixels.len(),
                    film.width,
                    film.height
                ),
            ));
        }
        Ok(film)
    }

    /// Accumulate film from another worker
    pub fn merge(&mut self, other: &FilmSnapshot) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(FarmError::FilmMismatch(
                other.width,
                other.height,
                self.width,
                self.height,
            ));
        }
        for (acc, add) in self.pixels.iter_mut().zip(&other.pixels) {
            for i in 0..3 {
                acc.rgb[i] += add.rgb[i];
            }
            acc.weight += add.weight;
        }
        self.total_samples += other.total_samples;
        Ok(())
    }

    /// Average samples per pixel
    pub fn samples_per_pixel(&self) -> f64 {
        let count = self.pixels.len();
        if count == 0 {
            return 0.0;
        }
        self.total_samples as f64 / count as f64
    }

    /// Resolved image, 8 bit RGB, clamped
    pub fn to_rgb8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.resolve())
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row(width: usize, rgb: [f32; 3]) -> Vec<Pixel> {
        let mut pixel = Pixel::default();
        pixel.add(rgb, 1.0);
        vec![pixel; width]
    }

    #[test]
    fn splat_and_resolve() {
        let mut film = FilmBuffer::new(4, 2);
        film.splat_row(1, &row(4, [1.0, 0.5, 0.0]), 4);
        film.splat_row(1, &row(4, [0.0, 0.5, 1.0]), 4);

        assert_eq!(film.total_samples(), 8);
        assert_eq!(film.pixel(2, 1).unwrap().resolve(), [0.5, 0.5, 0.5]);
        assert_eq!(film.pixel(2, 0).unwrap().resolve(), [0.0, 0.0, 0.0]);
        assert!(film.pixel(4, 0).is_none());
    }

    #[test]
    fn wrong_row_ignored() {
        let mut film = FilmBuffer::new(4, 2);
        film.splat_row(2, &row(4, [1.0; 3]), 4);
        film.splat_row(0, &row(3, [1.0; 3]), 3);
        assert_eq!(film.total_samples(), 0);
    }

    #[test]
    fn snapshot_block() {
        let mut film = FilmBuffer::new(3, 3);
        film.splat_row(0, &row(3, [0.25, 0.5, 1.0]), 3);
        let snapshot = film.snapshot();

        let decoded = FilmSnapshot::decode(&snapshot.encode().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.to_rgb8()[..3], [64, 128, 255]);
    }

    #[test]
    fn inconsistent_snapshot_rejected() {
        let mut snapshot = FilmSnapshot::empty(2, 2);
        snapshot.pixels.pop();
        let payload = compress(&snapshot).unwrap();
        assert!(FilmSnapshot::decode(&payload).is_err());
    }

    #[test]
    fn merge_films() {
        let mut a = FilmBuffer::new(2, 1);
        a.splat_row(0, &row(2, [1.0, 0.0, 0.0]), 2);
        let mut b = FilmBuffer::new(2, 1);
        b.splat_row(0, &row(2, [0.0, 0.0, 1.0]), 2);

        let mut merged = a.snapshot();
        merged.merge(&b.snapshot()).unwrap();
        assert_eq!(merged.total_samples, 4);
        assert_eq!(merged.pixels[0].resolve(), [0.5, 0.0, 0.5]);
        assert_eq!(merged.samples_per_pixel(), 2.0);

        let other = FilmSnapshot::empty(3, 1);
        assert!(matches!(
            merged.merge(&other),
            Err(FarmError::FilmMismatch(3, 1, 2, 1))
        ));
    }
}
