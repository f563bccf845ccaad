//! Labeled ground-truth observations

use chrono::NaiveDate;
use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::roi::RegionOfInterest;
use crate::window::DateWindow;

/// One labeled point observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPoint {
    pub longitude: f64,
    pub latitude: f64,
    pub label: String,
    pub date: NaiveDate,
}

/// A labeled polygon, assumed stable over its window
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRegion {
    pub geometry: Geometry<f64>,
    pub label: String,
    pub window: DateWindow,
}

/// Point observations from one file
#[derive(Debug, Clone, PartialEq)]
pub struct PointSource {
    pub name: String,
    pub points: Vec<LabeledPoint>,
}

/// Labeled polygons sharing one explicit region of interest
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonSource {
    pub name: String,
    pub roi: RegionOfInterest,
    pub regions: Vec<LabeledRegion>,
}

/// Any labeled source the training-set builder accepts
#[derive(Debug, Clone, PartialEq)]
pub enum LabeledSource {
    Points(PointSource),
    Polygons(PolygonSource),
}

impl LabeledSource {
    pub fn name(&self) -> &str {
        match self {
            Self::Points(s) => &s.name,
            Self::Polygons(s) => &s.name,
        }
    }
}

impl From<PointSource> for LabeledSource {
    fn from(s: PointSource) -> Self {
        Self::Points(s)
    }
}

impl From<PolygonSource> for LabeledSource {
    fn from(s: PolygonSource) -> Self {
        Self::Polygons(s)
    }
}
