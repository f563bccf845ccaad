//! Sentinel-2 QA60 cloud masking
//!
//! Bit 10 of QA60 flags opaque cloud, bit 11 flags cirrus. Any pixel with
//! either bit set becomes no-data in every band; surviving reflectance
//! values are scaled from digital numbers to [0, 1].

use ndarray::Array2;
use crate::maybe_rayon::*;
use agriplast_core::raster::Raster;
use agriplast_core::{Error, MultiBandImage, Result};

use super::sentinel2;

/// Parameters for [`cloud_mask`]
#[derive(Debug, Clone)]
pub struct CloudMaskParams {
    /// Name of the quality bitmask band (default: `QA60`)
    pub qa_band: String,
    /// Opaque-cloud bit (default: 10)
    pub cloud_bit: u32,
    /// Cirrus bit (default: 11)
    pub cirrus_bit: u32,
    /// Divisor converting digital numbers to reflectance (default: 10000)
    pub scale: f64,
}

impl Default for CloudMaskParams {
    fn default() -> Self {
        Self {
            qa_band: sentinel2::QA.to_string(),
            cloud_bit: 10,
            cirrus_bit: 11,
            scale: 10_000.0,
        }
    }
}

/// Build the keep-mask from the QA band: `true` where the pixel is clear.
fn clear_sky(qa: &Raster<f64>, params: &CloudMaskParams) -> Array2<bool> {
    let flags = (1u32 << params.cloud_bit) | (1u32 << params.cirrus_bit);
    qa.data().mapv(|v| {
        if !v.is_finite() || v < 0.0 {
            return false;
        }
        (v as u32) & flags == 0
    })
}

/// Mask clouds and cirrus, scaling reflectance bands to [0, 1].
///
/// The QA band itself is kept (masked, unscaled). Every other band is
/// divided by `params.scale` and clamped to [0, 1]. Masked pixels are NaN.
///
/// # Errors
/// Fails if the image has no QA band or `params.scale` is not positive.
pub fn cloud_mask(image: &MultiBandImage, params: &CloudMaskParams) -> Result<MultiBandImage> {
    if !(params.scale > 0.0) {
        return Err(Error::InvalidParameter {
            name: "scale",
            value: params.scale.to_string(),
            reason: "must be positive".into(),
        });
    }

    let qa = image.band(&params.qa_band)?;
    let keep = clear_sky(qa, params);
    let (rows, cols) = image.shape();
    let inv = 1.0 / params.scale;

    let mut out = MultiBandImage::new(rows, cols, *image.transform());
    out.set_crs(image.crs());

    for (name, band) in image.bands() {
        let is_qa = name == params.qa_band;
        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                for (col, cell) in row_data.iter_mut().enumerate() {
                    if !keep[(row, col)] {
                        continue;
                    }
                    let v = unsafe { band.get_unchecked(row, col) };
                    if band.is_nodata(v) {
                        continue;
                    }
                    *cell = if is_qa { v } else { (v * inv).clamp(0.0, 1.0) };
                }
                row_data
            })
            .collect();

        let mut raster = Raster::from_vec(data, rows, cols)?;
        raster.set_nodata(Some(f64::NAN));
        out.add_band(name, raster)?;
    }

    Ok(out)
}
