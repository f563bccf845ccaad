//! Synthetic archive shared by the unit tests

use agriplast_algorithms::vector::BoundingBox;
use agriplast_archive::{MemoryArchive, SceneItem};
use agriplast_core::{GeoTransform, MultiBandImage, Raster};
use chrono::NaiveDate;

use crate::config::PipelineConfig;

pub const ORIGIN_X: f64 = -118.40;
pub const ORIGIN_Y: f64 = 34.10;
pub const PIXEL: f64 = 0.01;
pub const SIZE: usize = 10;

const BANDS: [&str; 7] = ["B2", "B3", "B4", "B6", "B8", "B11", "B12"];

/// Digital numbers per class, in `BANDS` order
const SPECTRA: [[f64; 7]; 3] = [
    [1200.0, 1300.0, 1400.0, 1800.0, 2200.0, 2600.0, 2000.0],
    [600.0, 700.0, 800.0, 900.0, 1000.0, 1500.0, 1300.0],
    [300.0, 600.0, 350.0, 2500.0, 3500.0, 1800.0, 900.0],
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Ground-truth class painted in column `col`
pub fn class_at(col: usize) -> u32 {
    match col {
        0..=3 => 0,
        4..=6 => 1,
        _ => 2,
    }
}

/// Longitude/latitude of a pixel center
pub fn pixel_center(row: usize, col: usize) -> (f64, f64) {
    (
        ORIGIN_X + PIXEL * (col as f64 + 0.5),
        ORIGIN_Y - PIXEL * (row as f64 + 0.5),
    )
}

/// Upper-left 5x5 pixels of the scene grid
pub fn field_bounds() -> BoundingBox {
    BoundingBox::new(ORIGIN_X, ORIGIN_Y - 5.0 * PIXEL + 0.005, ORIGIN_X + 4.5 * PIXEL, ORIGIN_Y)
}

/// One scene whose columns carry the three class spectra.
pub fn scene(offset: f64, qa: f64) -> MultiBandImage {
    let gt = GeoTransform::new(ORIGIN_X, ORIGIN_Y, PIXEL, -PIXEL);
    let mut layers = Vec::new();
    for (b, name) in BANDS.iter().enumerate() {
        let mut raster = Raster::new(SIZE, SIZE);
        for row in 0..SIZE {
            for col in 0..SIZE {
                let v = SPECTRA[class_at(col) as usize][b] + offset + row as f64;
                raster.set(row, col, v).unwrap();
            }
        }
        raster.set_transform(gt);
        layers.push((name.to_string(), raster));
    }
    let mut qa_band = Raster::filled(SIZE, SIZE, qa);
    qa_band.set_transform(gt);
    layers.push(("QA60".to_string(), qa_band));
    MultiBandImage::from_bands(layers).unwrap()
}

/// Clear scenes in March and June 2019 plus one cloudy June scene, in both
/// the training and the inference collection.
pub fn archive_with_scenes() -> MemoryArchive {
    let config = PipelineConfig::default();
    let cloud = (1u32 << 10) as f64;
    let mut archive = MemoryArchive::new();
    for (prefix, collection) in [("h", &config.collection), ("sr", &config.inference_collection)] {
        let scenes = [
            ("0301", date(2019, 3, 1), 3.0, 0.0, 0.0),
            ("0310", date(2019, 3, 10), 8.0, 10.0, 0.0),
            ("0601", date(2019, 6, 1), 5.0, 20.0, 0.0),
            ("cloudy-0603", date(2019, 6, 3), 60.0, 5000.0, cloud),
        ];
        for (id, d, cc, offset, qa) in scenes {
            let item = SceneItem::new(&format!("{prefix}-{id}"), collection, d).with_cloud_cover(cc);
            archive.insert(item, scene(offset, qa));
        }
    }
    archive
}
