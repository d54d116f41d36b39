//! Fixtures shared by the benchmarks

use renderfarm::{
    film::{FilmBuffer, FilmSnapshot, Pixel},
    wire::{ParamSet, ParamValue},
};

/// Parameter set of a triangle mesh with `triangles` faces
pub fn mesh_params(triangles: usize) -> ParamSet {
    let points: Vec<[f32; 3]> = (0..triangles * 3)
        .map(|i| [i as f32, (i * 7 % 13) as f32, (i * 3 % 5) as f32])
        .collect();
    let indices: Vec<i32> = (0..triangles as i32 * 3).collect();

    ParamSet::new()
        .with("P", ParamValue::Point(points))
        .with("indices", ParamValue::Int(indices))
        .with("name", ParamValue::String(vec!["mesh".into()]))
}

/// Film with some samples in every row
pub fn film(width: u32, height: u32) -> FilmSnapshot {
    let mut buffer = FilmBuffer::new(width, height);
    let mut pixel = Pixel::default();
    pixel.add([0.3, 0.6, 0.9], 1.0);
    let row = vec![pixel; width as usize];
    for y in 0..height {
        buffer.splat_row(y, &row, width as u64);
    }
    buffer.snapshot()
}
