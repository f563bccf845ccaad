//! Synthetic scene archive and boundaries for the integration tests.
#![allow(dead_code)]

use agriplast_archive::{MemoryArchive, SceneItem};
use agriplast_core::vector::FeatureCollection;
use agriplast_core::{GeoTransform, MultiBandImage, Raster};
use agriplast_pipeline::{BoundaryCatalog, PipelineConfig};
use chrono::NaiveDate;

pub const ORIGIN_X: f64 = -118.40;
pub const ORIGIN_Y: f64 = 34.10;
pub const PIXEL: f64 = 0.01;
pub const SIZE: usize = 10;

const BANDS: [&str; 7] = ["B2", "B3", "B4", "B6", "B8", "B11", "B12"];

const SPECTRA: [[f64; 7]; 3] = [
    [1200.0, 1300.0, 1400.0, 1800.0, 2200.0, 2600.0, 2000.0],
    [600.0, 700.0, 800.0, 900.0, 1000.0, 1500.0, 1300.0],
    [300.0, 600.0, 350.0, 2500.0, 3500.0, 1800.0, 900.0],
];

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// hoop in columns 0..=3, mulch in 4..=6, other in 7..=9
pub fn class_at(col: usize) -> u32 {
    match col {
        0..=3 => 0,
        4..=6 => 1,
        _ => 2,
    }
}

pub fn pixel_center(row: usize, col: usize) -> (f64, f64) {
    (
        ORIGIN_X + PIXEL * (col as f64 + 0.5),
        ORIGIN_Y - PIXEL * (row as f64 + 0.5),
    )
}

fn scene(offset: f64, qa: f64) -> MultiBandImage {
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

/// Clear scenes on 2019-03-01, 2019-03-10 and 2019-06-01 and a cloudy one
/// on 2019-06-03, in both the training and the inference collection.
pub fn archive() -> MemoryArchive {
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

/// Rectangle polygon as a GeoJSON geometry object.
pub fn rect_geometry(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> String {
    format!(
        r#"{{"type": "Polygon", "coordinates": [[[{min_x},{min_y}],[{max_x},{min_y}],[{max_x},{max_y}],[{min_x},{max_y}],[{min_x},{min_y}]]]}}"#
    )
}

/// "Los Angeles" covers the whole scene grid, "Ventura" lies elsewhere.
pub fn counties() -> BoundaryCatalog {
    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [
            {{"type": "Feature", "properties": {{"NAME": "Los Angeles", "STATEFP": "06"}}, "geometry": {}}},
            {{"type": "Feature", "properties": {{"NAME": "Ventura", "STATEFP": "06"}}, "geometry": {}}}
        ]}}"#,
        rect_geometry(ORIGIN_X, ORIGIN_Y - 0.1, ORIGIN_X + 0.1, ORIGIN_Y),
        rect_geometry(-119.5, 34.1, -118.6, 34.6),
    );
    let fc = FeatureCollection::from_geojson_str(&text).unwrap();
    BoundaryCatalog::from_features(&fc, Some("06"))
}

/// CSV text for `(row, col, label, date)` observations.
pub fn points_csv(points: &[(usize, usize, &str, &str)]) -> String {
    let mut text = String::from("Type,Date,Longitude,Latitude\n");
    for (row, col, label, d) in points {
        let (lon, lat) = pixel_center(*row, *col);
        text.push_str(&format!("{label},{d},{lon},{lat}\n"));
    }
    text
}
