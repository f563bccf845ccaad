//! Scene catalog data types.
//!
//! A catalog is a GeoJSON FeatureCollection of STAC-style items. Each item is
//! one acquisition: a date, a cloud-cover percentage, a footprint bbox and
//! one asset per band pointing at a single-band GeoTIFF.

use agriplast_algorithms::vector::BoundingBox;
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Property name the Sentinel-2 archive uses for scene cloudiness
pub const CLOUDY_PIXEL_PERCENTAGE: &str = "CLOUDY_PIXEL_PERCENTAGE";

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// Scene search parameters: collection, footprint and `[start, end)` dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneQuery {
    pub collection: String,
    pub bbox: BoundingBox,
    pub start: NaiveDate,
    /// Exclusive
    pub end: NaiveDate,
    /// Scenes with cloud cover at or above this percentage are skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cloud_cover: Option<f64>,
}

impl SceneQuery {
    pub fn new(collection: &str, bbox: BoundingBox, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            collection: collection.to_string(),
            bbox,
            start,
            end,
            max_cloud_cover: None,
        }
    }

    /// Set the cloud-cover ceiling in percent.
    pub fn max_cloud_cover(mut self, pct: f64) -> Self {
        self.max_cloud_cover = Some(pct);
        self
    }

    /// Datetime range as `"start/end"`.
    pub fn datetime(&self) -> String {
        format!("{}/{}", self.start, self.end)
    }

    /// Whether `item` satisfies every constraint of this query.
    pub fn matches(&self, item: &SceneItem) -> bool {
        if item.collection.as_deref() != Some(self.collection.as_str()) {
            return false;
        }
        let Some(date) = item.date() else {
            return false;
        };
        if date < self.start || date >= self.end {
            return false;
        }
        if let Some(max) = self.max_cloud_cover {
            // unknown cloudiness never passes a cloud filter
            match item.cloud_cover() {
                Some(cc) if cc < max => {}
                _ => return false,
            }
        }
        item.footprint().is_none_or(|fp| fp.intersects(&self.bbox))
    }
}

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// A scene catalog (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneCatalog {
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<SceneItem>,
}

impl SceneCatalog {
    pub fn new() -> Self {
        Self {
            type_: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Collection identifiers present, sorted and deduplicated.
    pub fn collections(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .features
            .iter()
            .filter_map(|f| f.collection.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl Default for SceneCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// A single scene (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneItem {
    #[serde(rename = "type", default = "feature_type")]
    pub type_: String,

    /// Unique scene identifier.
    pub id: String,

    /// Bounding box `[west, south, east, north]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: SceneProperties,

    /// Band name to file.
    pub assets: HashMap<String, SceneAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl SceneItem {
    /// A bare item with no assets.
    pub fn new(id: &str, collection: &str, date: NaiveDate) -> Self {
        Self {
            type_: feature_type(),
            id: id.to_string(),
            bbox: None,
            properties: SceneProperties {
                datetime: Some(date.to_string()),
                eo_cloud_cover: None,
                platform: None,
                extra: HashMap::new(),
            },
            assets: HashMap::new(),
            collection: Some(collection.to_string()),
        }
    }

    pub fn with_cloud_cover(mut self, pct: f64) -> Self {
        self.properties.eo_cloud_cover = Some(pct);
        self
    }

    pub fn with_footprint(mut self, bb: BoundingBox) -> Self {
        self.bbox = Some(vec![bb.min_x, bb.min_y, bb.max_x, bb.max_y]);
        self
    }

    /// Get an asset by band name.
    pub fn asset(&self, key: &str) -> Option<&SceneAsset> {
        self.assets.get(key)
    }

    /// Acquisition date from `datetime`, accepting RFC 3339 or `YYYY-MM-DD`.
    pub fn date(&self) -> Option<NaiveDate> {
        let raw = self.properties.datetime.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive())
            .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
            .ok()
    }

    /// Cloud cover in percent, from `eo:cloud_cover` or `CLOUDY_PIXEL_PERCENTAGE`.
    pub fn cloud_cover(&self) -> Option<f64> {
        self.properties.eo_cloud_cover.or_else(|| {
            self.properties
                .extra
                .get(CLOUDY_PIXEL_PERCENTAGE)
                .and_then(|v| v.as_f64())
        })
    }

    /// EPSG code from the `proj:epsg` property.
    pub fn epsg(&self) -> Option<u32> {
        self.properties
            .extra
            .get("proj:epsg")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }

    /// Footprint from `bbox`, when present and well formed.
    pub fn footprint(&self) -> Option<BoundingBox> {
        match self.bbox.as_deref() {
            Some(&[w, s, e, n]) => Some(BoundingBox::new(w, s, e, n)),
            _ => None,
        }
    }
}

/// Scene properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneProperties {
    /// ISO 8601 date or datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    /// Platform name (e.g., "sentinel-2a").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// All other properties.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A single band file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneAsset {
    /// Path to the GeoTIFF, relative to the archive root unless absolute.
    pub href: String,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl SceneAsset {
    pub fn geotiff(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            type_: Some("image/tiff; application=geotiff".to_string()),
            title: None,
            roles: Some(vec!["data".to_string()]),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
