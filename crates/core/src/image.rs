//! Multi-band images and band sets
//!
//! A [`MultiBandImage`] is an ordered stack of named `f64` bands that share a
//! single grid. Reflectance bands, quality bands and derived indices all live
//! side by side, so a classifier can select the exact [`BandSet`] it was
//! trained on.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered, duplicate-free list of band names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct BandSet {
    names: Vec<String>,
}

impl BandSet {
    /// Build a band set, rejecting empty lists and repeated names.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(Error::InvalidParameter {
                name: "band_set",
                value: "[]".into(),
                reason: "at least one band is required".into(),
            });
        }
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(Error::DuplicateBand(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Position of a band within the set
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl TryFrom<Vec<String>> for BandSet {
    type Error = Error;

    fn try_from(names: Vec<String>) -> Result<Self> {
        Self::new(names)
    }
}

impl From<BandSet> for Vec<String> {
    fn from(set: BandSet) -> Self {
        set.names
    }
}

impl fmt::Display for BandSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names.join(", "))
    }
}

/// Stack of named `f64` bands on a common grid.
#[derive(Debug, Clone)]
pub struct MultiBandImage {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    names: Vec<String>,
    bands: Vec<Raster<f64>>,
}

impl MultiBandImage {
    /// Create an empty image on the given grid
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs: None,
            names: Vec::new(),
            bands: Vec::new(),
        }
    }

    /// Create an image from `(name, raster)` pairs; the first band fixes the grid.
    pub fn from_bands<I, S>(bands: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Raster<f64>)>,
        S: Into<String>,
    {
        let mut iter = bands.into_iter();
        let (first_name, first) = iter
            .next()
            .ok_or_else(|| Error::Other("image requires at least one band".into()))?;
        let (rows, cols) = first.shape();
        let mut image = Self::new(rows, cols, *first.transform());
        image.crs = first.crs();
        image.add_band(first_name, first)?;
        for (name, raster) in iter {
            image.add_band(name, raster)?;
        }
        Ok(image)
    }

    /// Append a band. Its shape must match the image grid.
    pub fn add_band(&mut self, name: impl Into<String>, mut raster: Raster<f64>) -> Result<()> {
        let name = name.into();
        if raster.shape() != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: raster.rows(),
                ac: raster.cols(),
            });
        }
        if self.names.contains(&name) {
            return Err(Error::DuplicateBand(name));
        }
        raster.set_transform(self.transform);
        raster.set_crs(self.crs);
        self.names.push(name);
        self.bands.push(raster);
        Ok(())
    }

    /// Replace an existing band or append a new one
    pub fn put_band(&mut self, name: &str, raster: Raster<f64>) -> Result<()> {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => {
                if raster.shape() != (self.rows, self.cols) {
                    return Err(Error::SizeMismatch {
                        er: self.rows,
                        ec: self.cols,
                        ar: raster.rows(),
                        ac: raster.cols(),
                    });
                }
                let mut raster = raster;
                raster.set_transform(self.transform);
                raster.set_crs(self.crs);
                self.bands[idx] = raster;
                Ok(())
            }
            None => self.add_band(name, raster),
        }
    }

    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.bands[i])
            .ok_or_else(|| Error::MissingBand(name.to_string()))
    }

    pub fn band_mut(&mut self, name: &str) -> Result<&mut Raster<f64>> {
        match self.names.iter().position(|n| n == name) {
            Some(i) => Ok(&mut self.bands[i]),
            None => Err(Error::MissingBand(name.to_string())),
        }
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn band_names(&self) -> &[String] {
        &self.names
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Iterate `(name, raster)` pairs in band order
    pub fn bands(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.names.iter().map(String::as_str).zip(self.bands.iter())
    }

    /// New image restricted to `set`, in the set's order
    pub fn select(&self, set: &BandSet) -> Result<Self> {
        let mut out = Self::new(self.rows, self.cols, self.transform);
        out.crs = self.crs;
        for name in set.iter() {
            out.add_band(name, self.band(name)?.clone())?;
        }
        Ok(out)
    }

    /// Feature vector at (row, col) over `set`, or `None` if any band is no-data.
    pub fn pixel(&self, row: usize, col: usize, set: &BandSet) -> Result<Option<Vec<f64>>> {
        let mut values = Vec::with_capacity(set.len());
        for name in set.iter() {
            let band = self.band(name)?;
            let v = band.get(row, col)?;
            if band.is_nodata(v) {
                return Ok(None);
            }
            values.push(v);
        }
        Ok(Some(values))
    }

    /// Set every band to NaN wherever `keep` is false
    pub fn mask(&mut self, keep: &Array2<bool>) -> Result<()> {
        for band in &mut self.bands {
            band.retain_where(keep, f64::NAN)?;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn crs(&self) -> Option<CRS> {
        self.crs
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
        for band in &mut self.bands {
            band.set_crs(crs);
        }
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(v: f64) -> Raster<f64> {
        let mut r = Raster::filled(3, 3, v);
        r.set_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_band_set_rejects_duplicates() {
        assert!(BandSet::new(["B4", "B8", "B4"]).is_err());
        assert!(BandSet::new(Vec::<String>::new()).is_err());
        let set = BandSet::new(["B4", "B8", "NDVI"]).unwrap();
        assert_eq!(set.index_of("NDVI"), Some(2));
        assert_eq!(set.to_string(), "[B4, B8, NDVI]");
    }

    #[test]
    fn test_band_set_serde() {
        let set = BandSet::new(["B4", "NDVI"]).unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["B4","NDVI"]"#);
        assert!(serde_json::from_str::<BandSet>(r#"["B4","B4"]"#).is_err());
    }

    #[test]
    fn test_select_and_pixel() {
        let image =
            MultiBandImage::from_bands([("B4", band(0.1)), ("B8", band(0.5)), ("B2", band(0.05))])
                .unwrap();
        let set = BandSet::new(["B8", "B4"]).unwrap();

        let selected = image.select(&set).unwrap();
        assert_eq!(selected.band_names(), &["B8".to_string(), "B4".to_string()]);
        assert_eq!(image.pixel(1, 1, &set).unwrap(), Some(vec![0.5, 0.1]));

        let missing = BandSet::new(["B11"]).unwrap();
        assert!(image.select(&missing).is_err());
    }

    #[test]
    fn test_pixel_nodata_is_none() {
        let mut image = MultiBandImage::from_bands([("B4", band(0.1)), ("B8", band(0.5))]).unwrap();
        image.band_mut("B8").unwrap().set(0, 0, f64::NAN).unwrap();
        let set = BandSet::new(["B4", "B8"]).unwrap();
        assert_eq!(image.pixel(0, 0, &set).unwrap(), None);
    }

    #[test]
    fn test_add_band_shape_mismatch() {
        let mut image = MultiBandImage::from_bands([("B4", band(0.1))]).unwrap();
        assert!(image.add_band("B8", Raster::filled(2, 2, 0.3)).is_err());
        assert!(image.add_band("B4", band(0.3)).is_err());
    }
}
