//! Vector features and GeoJSON decoding
//!
//! Ground-truth polygons and administrative boundaries arrive as GeoJSON
//! FeatureCollections. Only the geometry kinds the pipeline samples on are
//! decoded: points, polygons and multipolygons.

use crate::error::{Error, Result};
use geo_types::{Coord, Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Attribute value types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer view; floats with no fractional part are accepted
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int(v) => Some(v),
            Self::Float(v) if v.fract() == 0.0 => Some(v as i64),
            _ => None,
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s.clone()),
            other => Self::String(other.to_string()),
        }
    }
}

/// A geographic feature with geometry and attributes
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry
    pub geometry: Option<Geometry<f64>>,
    /// Feature attributes
    pub properties: HashMap<String, AttributeValue>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    /// Create a new feature with geometry
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            geometry: Some(geometry),
            properties: HashMap::new(),
            id: None,
        }
    }

    /// Set an attribute
    pub fn set_property(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get_property(&self, key: &str) -> Option<&AttributeValue> {
        self.properties.get(key)
    }
}

/// Collection of features
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self { features: Vec::new() }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// Concatenate another collection onto this one
    pub fn merge(&mut self, other: FeatureCollection) {
        self.features.extend(other.features);
    }

    /// Parse a GeoJSON `FeatureCollection` (or a single `Feature`)
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        match root.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                let features = root
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::GeoJson("missing 'features' array".into()))?;
                let features = features.iter().map(parse_feature).collect::<Result<Vec<_>>>()?;
                Ok(Self { features })
            }
            Some("Feature") => Ok(Self {
                features: vec![parse_feature(&root)?],
            }),
            other => Err(Error::GeoJson(format!("unsupported root type {other:?}"))),
        }
    }

    /// Read and parse a GeoJSON file
    pub fn from_geojson_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }
}

impl IntoIterator for FeatureCollection {
    type Item = Feature;
    type IntoIter = std::vec::IntoIter<Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.into_iter()
    }
}

fn parse_feature(value: &Value) -> Result<Feature> {
    let geometry = match value.get("geometry") {
        None | Some(Value::Null) => None,
        Some(g) => Some(parse_geometry(g)?),
    };
    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| (k.clone(), AttributeValue::from_json(v)))
                .collect()
        })
        .unwrap_or_default();
    let id = value.get("id").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    Ok(Feature {
        geometry,
        properties,
        id,
    })
}

fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::GeoJson("geometry without 'type'".into()))?;
    let coords = value
        .get("coordinates")
        .ok_or_else(|| Error::GeoJson(format!("{kind} without 'coordinates'")))?;

    match kind {
        "Point" => Ok(Geometry::Point(Point(parse_position(coords)?))),
        "Polygon" => Ok(Geometry::Polygon(parse_polygon(coords)?)),
        "MultiPolygon" => {
            let polys = as_array(coords)?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::MultiPolygon(MultiPolygon(polys)))
        }
        other => Err(Error::GeoJson(format!("unsupported geometry type '{other}'"))),
    }
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::GeoJson("expected coordinate array".into()))
}

fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let pos = as_array(value)?;
    match (pos.first().and_then(Value::as_f64), pos.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(Error::GeoJson(format!("invalid position {value}"))),
    }
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let coords = as_array(value)?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>>>()?;
    if coords.len() < 4 {
        return Err(Error::GeoJson("linear ring needs at least 4 positions".into()));
    }
    Ok(LineString(coords))
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = as_array(value)?.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::GeoJson("polygon without rings".into()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}
