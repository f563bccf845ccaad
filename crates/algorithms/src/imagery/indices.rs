//! Spectral and plastic-cover indices
//!
//! All indices operate on cloud-masked reflectance in [0, 1]. Any pixel
//! where an input is no-data, a denominator vanishes, or the result is not
//! finite comes out as NaN (no-data) so the samplers drop it.

use ndarray::Array2;
use crate::maybe_rayon::*;
use agriplast_core::raster::Raster;
use agriplast_core::{Error, MultiBandImage, Result};

use super::sentinel2;

const EPS: f64 = 1e-10;

/// Index bands that can be appended to a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexBand {
    /// Normalized Difference Vegetation Index
    Ndvi,
    /// Normalized Difference Tillage Index
    Ndti,
    /// Plastic Greenhouse Index
    Pgi,
    /// Plastic-Mulched Landcover Index
    Pmli,
    /// Retrogressive Plastic Greenhouse Index
    Rpgi,
}

impl IndexBand {
    /// The indices every composite carries
    pub const ALL: [IndexBand; 5] = [Self::Ndvi, Self::Ndti, Self::Pgi, Self::Pmli, Self::Rpgi];

    /// Band name the index is stored under
    pub fn name(self) -> &'static str {
        match self {
            Self::Ndvi => "NDVI",
            Self::Ndti => "NDTI",
            Self::Pgi => "PGI",
            Self::Pmli => "PMLI",
            Self::Rpgi => "RPGI",
        }
    }

    /// Compute this index from the reflectance bands of `image`
    pub fn compute(self, image: &MultiBandImage) -> Result<Raster<f64>> {
        let band = |name: &str| image.band(name);
        match self {
            Self::Ndvi => ndvi(band(sentinel2::NIR)?, band(sentinel2::RED)?),
            Self::Ndti => ndti(band(sentinel2::SWIR1)?, band(sentinel2::SWIR2)?),
            Self::Pgi => pgi(
                band(sentinel2::NIR)?,
                band(sentinel2::RED)?,
                band(sentinel2::GREEN)?,
                band(sentinel2::BLUE)?,
            ),
            Self::Pmli => pmli(band(sentinel2::SWIR1)?, band(sentinel2::RED)?),
            Self::Rpgi => rpgi(
                band(sentinel2::NIR)?,
                band(sentinel2::GREEN)?,
                band(sentinel2::BLUE)?,
            ),
        }
    }
}

/// Append each requested index to `image` as a new band.
///
/// An index already present is recomputed and replaced.
pub fn add_plastic_indices(image: &mut MultiBandImage, indices: &[IndexBand]) -> Result<()> {
    for &index in indices {
        let raster = index.compute(image)?;
        image.put_band(index.name(), raster)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Generic normalized difference
// ---------------------------------------------------------------------------

/// Compute the normalized difference between two bands:
///
/// `(band_a - band_b) / (band_a + band_b)`
///
/// Result is in [-1, 1] for non-negative reflectance. Pixels where the sum
/// vanishes or either input is nodata are NaN.
pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise(&[band_a, band_b], |v| {
        let sum = v[0] + v[1];
        if sum.abs() < EPS {
            return f64::NAN;
        }
        (v[0] - v[1]) / sum
    })
}

/// Normalized Difference Vegetation Index
///
/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

/// Normalized Difference Tillage Index
///
/// `NDTI = (SWIR1 - SWIR2) / (SWIR1 + SWIR2)`
///
/// Separates crop residue and tilled soil, whose SWIR response differs
/// from the flat spectrum of plastic film.
pub fn ndti(swir1: &Raster<f64>, swir2: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, swir2)
}

/// Plastic-Mulched Landcover Index
///
/// `PMLI = (SWIR1 - Red) / (SWIR1 + Red)`
pub fn pmli(swir1: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(swir1, red)
}

/// Plastic Greenhouse Index
///
/// `PGI = 100 * (NIR - Red) * Red / ((NIR + Blue + Green) / 3 - 1)`
///
/// Unbounded. The denominator vanishes only when the three visible/NIR
/// bands are all saturated; such pixels become no-data.
pub fn pgi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    green: &Raster<f64>,
    blue: &Raster<f64>,
) -> Result<Raster<f64>> {
    pixelwise(&[nir, red, green, blue], |v| {
        let (n, r, g, b) = (v[0], v[1], v[2], v[3]);
        let denom = (n + b + g) / 3.0 - 1.0;
        if denom.abs() < EPS {
            return f64::NAN;
        }
        100.0 * (n - r) * r / denom
    })
}

/// Retrogressive Plastic Greenhouse Index
///
/// `RPGI = 100 * Blue / ((NIR + Blue + Green) / 3 - 1)`
pub fn rpgi(nir: &Raster<f64>, green: &Raster<f64>, blue: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise(&[nir, green, blue], |v| {
        let (n, g, b) = (v[0], v[1], v[2]);
        let denom = (n + b + g) / 3.0 - 1.0;
        if denom.abs() < EPS {
            return f64::NAN;
        }
        100.0 * b / denom
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Evaluate `f` on the values of `bands` at every pixel.
///
/// `f` is skipped where any input is nodata; non-finite results are stored
/// as NaN.
fn pixelwise<F>(bands: &[&Raster<f64>], f: F) -> Result<Raster<f64>>
where
    F: Fn(&[f64]) -> f64 + Sync + Send,
{
    let first = bands
        .first()
        .ok_or_else(|| Error::Algorithm("index requires at least one band".into()))?;
    for other in &bands[1..] {
        check_dimensions(first, other)?;
    }

    let (rows, cols) = first.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values = vec![0.0; bands.len()];
            'cells: for (col, cell) in row_data.iter_mut().enumerate() {
                for (slot, band) in values.iter_mut().zip(bands) {
                    let v = unsafe { band.get_unchecked(row, col) };
                    if band.is_nodata(v) {
                        continue 'cells;
                    }
                    *slot = v;
                }
                let result = f(&values);
                if result.is_finite() {
                    *cell = result;
                }
            }
            row_data
        })
        .collect();

    build_output(first, rows, cols, data)
}

fn check_dimensions(a: &Raster<f64>, b: &Raster<f64>) -> Result<()> {
    if a.shape() != b.shape() {
        return Err(Error::SizeMismatch {
            er: a.rows(),
            ec: a.cols(),
            ar: b.rows(),
            ac: b.cols(),
        });
    }
    Ok(())
}

fn build_output(
    template: &Raster<f64>,
    rows: usize,
    cols: usize,
    data: Vec<f64>,
) -> Result<Raster<f64>> {
    let mut output = template.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
