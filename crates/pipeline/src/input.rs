//! Ground-truth file readers
//!
//! Point observations come as CSV with `Type`, `Date`, `Longitude` and
//! `Latitude` columns. Polygon labels come as GeoJSON feature collections
//! whose features carry a numeric `class` or a `Type` name.

use std::io;
use std::path::{Path, PathBuf};

use agriplast_core::vector::{AttributeValue, FeatureCollection};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use geo::{Geometry, MultiPolygon, Polygon};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::PolygonGroupSpec;
use crate::error::{PipelineError, Result};
use crate::ground_truth::{LabeledPoint, LabeledRegion, PointSource, PolygonSource};
use crate::labels::ClassLabelMap;
use crate::roi::RegionOfInterest;
use crate::window::DateWindow;

pub const CSV_EXTENSION: &str = "csv";
pub const GEOJSON_EXTENSION: &str = "geojson";

// ---------------------------------------------------------------------------
// Point CSV
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PointRecord {
    #[serde(rename = "Type")]
    label: String,
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Latitude")]
    latitude: f64,
}

/// Parse a calendar date written as `YYYY-MM-DD`, `MM/DD/YYYY`,
/// `YYYY/MM/DD`, or a date-time.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Read point observations from CSV. Extra columns are ignored.
///
/// # Errors
/// `InputData` naming `name` for a missing column, an unparseable number
/// or date, or a non-finite coordinate.
pub fn read_point_csv<R: io::Read>(reader: R, name: &str) -> Result<PointSource> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut points = Vec::new();
    for (i, record) in csv.deserialize::<PointRecord>().enumerate() {
        let line = i + 2;
        let record = record.map_err(|e| PipelineError::input(name, e.to_string()))?;
        let date = parse_date(&record.date).ok_or_else(|| {
            PipelineError::input(name, format!("line {line}: unparseable date '{}'", record.date))
        })?;
        if !record.longitude.is_finite() || !record.latitude.is_finite() {
            return Err(PipelineError::input(name, format!("line {line}: coordinate is not finite")));
        }
        points.push(LabeledPoint {
            longitude: record.longitude,
            latitude: record.latitude,
            label: record.label,
            date,
        });
    }
    debug!(source = name, points = points.len(), "point CSV read");
    Ok(PointSource {
        name: name.to_string(),
        points,
    })
}

/// Read a point CSV from disk; the source is named after the file.
pub fn read_point_csv_file(path: impl AsRef<Path>) -> Result<PointSource> {
    let path = path.as_ref();
    let name = file_name(path);
    let file = std::fs::File::open(path)
        .map_err(|e| PipelineError::input(&name, format!("cannot open {}: {e}", path.display())))?;
    read_point_csv(io::BufReader::new(file), &name)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Polygon GeoJSON
// ---------------------------------------------------------------------------

fn polygons_of(geometry: &Geometry<f64>) -> Vec<Polygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(polygons_of).collect(),
        _ => Vec::new(),
    }
}

/// Labeled regions from a feature collection, all over `window`.
///
/// Features without polygons are skipped. A `class` property is read as a
/// class code, otherwise `Type` as a class name.
///
/// # Errors
/// `InputData` if a polygon feature has neither property, `LabelMapping`
/// if its class is not in `labels`.
pub fn read_regions(
    features: &FeatureCollection,
    name: &str,
    labels: &ClassLabelMap,
    window: DateWindow,
) -> Result<Vec<LabeledRegion>> {
    let mut regions = Vec::new();
    for (i, feature) in features.iter().enumerate() {
        let Some(geometry) = &feature.geometry else {
            continue;
        };
        if polygons_of(geometry).is_empty() {
            continue;
        }
        let code = feature.get_property("class").and_then(AttributeValue::as_i64);
        let label = match (code, feature.get_property("Type")) {
            (Some(code), _) => u32::try_from(code)
                .ok()
                .and_then(|c| labels.label(c))
                .map(str::to_string)
                .ok_or_else(|| PipelineError::LabelMapping {
                    source_name: name.to_string(),
                    label: code.to_string(),
                })?,
            (None, Some(AttributeValue::String(label))) => {
                labels.resolve(label, name)?;
                label.trim().to_string()
            }
            _ => {
                return Err(PipelineError::input(
                    name,
                    format!("feature {i} has no 'class' or 'Type' property"),
                ));
            }
        };
        regions.push(LabeledRegion {
            geometry: geometry.clone(),
            label,
            window,
        });
    }
    Ok(regions)
}

/// Read labeled regions from GeoJSON text.
pub fn read_region_geojson(
    text: &str,
    name: &str,
    labels: &ClassLabelMap,
    window: DateWindow,
) -> Result<Vec<LabeledRegion>> {
    let features = FeatureCollection::from_geojson_str(text)
        .map_err(|e| PipelineError::input(name, e.to_string()))?;
    read_regions(&features, name, labels, window)
}

/// Read labeled regions from a GeoJSON file.
pub fn read_region_geojson_file(
    path: impl AsRef<Path>,
    labels: &ClassLabelMap,
    window: DateWindow,
) -> Result<Vec<LabeledRegion>> {
    let path = path.as_ref();
    let name = file_name(path);
    let features = FeatureCollection::from_geojson_file(path)
        .map_err(|e| PipelineError::input(&name, e.to_string()))?;
    read_regions(&features, &name, labels, window)
}

/// Union of every polygon in a GeoJSON file, as a named region of interest.
pub fn read_boundary_file(path: impl AsRef<Path>) -> Result<RegionOfInterest> {
    let path = path.as_ref();
    let name = file_stem(path);
    let features = FeatureCollection::from_geojson_file(path)
        .map_err(|e| PipelineError::input(&name, e.to_string()))?;
    let polygons: Vec<Polygon<f64>> = features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .flat_map(polygons_of)
        .collect();
    if polygons.is_empty() {
        return Err(PipelineError::input(name, "boundary file holds no polygons"));
    }
    Ok(RegionOfInterest::boundary(name, Geometry::MultiPolygon(MultiPolygon(polygons))))
}

/// Load one polygon group from `dir`: the first file bounds the composite,
/// the remaining files are merged into one labeled region set.
pub fn load_polygon_group(
    dir: impl AsRef<Path>,
    spec: &PolygonGroupSpec,
    labels: &ClassLabelMap,
) -> Result<PolygonSource> {
    let dir = dir.as_ref();
    let (boundary, label_files) = spec
        .files
        .split_first()
        .ok_or_else(|| PipelineError::input("polygon group", "group lists no files"))?;
    if label_files.is_empty() {
        return Err(PipelineError::input(boundary, "group has no label files"));
    }
    let window = DateWindow::new(spec.start, spec.end)?;
    let roi = read_boundary_file(polygon_path(dir, boundary))?;

    let mut regions = Vec::new();
    for file in label_files {
        regions.extend(read_region_geojson_file(polygon_path(dir, file), labels, window)?);
    }
    debug!(group = %boundary, regions = regions.len(), %window, "polygon group loaded");
    Ok(PolygonSource {
        name: boundary.clone(),
        roi,
        regions,
    })
}

pub fn csv_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{CSV_EXTENSION}"))
}

pub fn polygon_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{GEOJSON_EXTENSION}"))
}

// ---------------------------------------------------------------------------
// Existence check
// ---------------------------------------------------------------------------

/// Outcome of [`check_sources`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceCheck {
    /// Polygon files that were not found
    pub missing: Vec<PathBuf>,
    /// Indices of polygon groups with at least one missing file
    pub incomplete_groups: Vec<usize>,
}

impl SourceCheck {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn group_usable(&self, index: usize) -> bool {
        !self.incomplete_groups.contains(&index)
    }
}

/// Check that every ground-truth file exists before anything is loaded.
///
/// # Errors
/// `InputData` when `data_dir` or any CSV file is missing. Missing polygon
/// files are only logged and returned.
pub fn check_sources(
    data_dir: impl AsRef<Path>,
    csv_files: &[String],
    polygon_groups: &[PolygonGroupSpec],
) -> Result<SourceCheck> {
    let dir = data_dir.as_ref();
    if !dir.is_dir() {
        return Err(PipelineError::input(
            dir.display().to_string(),
            "data directory does not exist",
        ));
    }
    for name in csv_files {
        let path = csv_path(dir, name);
        if !path.is_file() {
            return Err(PipelineError::input(
                name,
                format!("CSV file does not exist: {}", path.display()),
            ));
        }
    }

    let mut check = SourceCheck::default();
    for (i, group) in polygon_groups.iter().enumerate() {
        for name in &group.files {
            let path = polygon_path(dir, name);
            if !path.is_file() {
                warn!(path = %path.display(), "polygon file does not exist");
                check.missing.push(path);
                if !check.incomplete_groups.contains(&i) {
                    check.incomplete_groups.push(i);
                }
            }
        }
    }
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2019-03-10"), Some(d(2019, 3, 10)));
        assert_eq!(parse_date("3/10/2019"), Some(d(2019, 3, 10)));
        assert_eq!(parse_date("2019/03/10"), Some(d(2019, 3, 10)));
        assert_eq!(parse_date("2019-03-10T18:30:00Z"), Some(d(2019, 3, 10)));
        assert_eq!(parse_date("2019-03-10 08:00:00"), Some(d(2019, 3, 10)));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_read_point_csv() {
        let text = "Type,Date,Longitude,Latitude,Notes\n\
                    hoop,2019-03-10,-118.35,34.05,north field\n\
                    mulch, 3/10/2019 ,-118.34,34.06,\n";
        let source = read_point_csv(text.as_bytes(), "farm.csv").unwrap();
        assert_eq!(source.name, "farm.csv");
        assert_eq!(source.points.len(), 2);
        assert_eq!(source.points[1].label, "mulch");
        assert_eq!(source.points[1].date, d(2019, 3, 10));
    }

    #[test]
    fn test_missing_column_is_input_error() {
        let text = "Type,Date,Longitude\nhoop,2019-03-10,-118.35\n";
        let err = read_point_csv(text.as_bytes(), "bad.csv").unwrap_err();
        assert!(matches!(err, PipelineError::InputData { ref source_name, .. } if source_name == "bad.csv"));
    }

    #[test]
    fn test_bad_date_is_input_error() {
        let text = "Type,Date,Longitude,Latitude\nhoop,someday,-118.35,34.05\n";
        let err = read_point_csv(text.as_bytes(), "bad.csv").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    const REGIONS: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        {"type": "Feature", "properties": {"class": 1},
         "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
        {"type": "Feature", "properties": {"Type": "other"},
         "geometry": {"type": "Polygon", "coordinates": [[[2,0],[3,0],[3,1],[2,1],[2,0]]]}},
        {"type": "Feature", "properties": {"class": 0},
         "geometry": {"type": "Point", "coordinates": [5, 5]}}
      ]
    }"#;

    #[test]
    fn test_read_region_geojson() {
        let window = DateWindow::new(d(2019, 2, 1), d(2019, 6, 1)).unwrap();
        let regions =
            read_region_geojson(REGIONS, "labels", &ClassLabelMap::default(), window).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].label, "mulch");
        assert_eq!(regions[1].label, "other");
        assert_eq!(regions[1].window, window);
    }

    #[test]
    fn test_unknown_class_code() {
        let text = REGIONS.replace("\"class\": 1", "\"class\": 9");
        let window = DateWindow::new(d(2019, 2, 1), d(2019, 6, 1)).unwrap();
        let err =
            read_region_geojson(&text, "labels", &ClassLabelMap::default(), window).unwrap_err();
        assert!(matches!(err, PipelineError::LabelMapping { ref label, .. } if label == "9"));
    }
}
