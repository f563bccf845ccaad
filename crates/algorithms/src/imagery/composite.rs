//! Per-pixel median compositing over a stack of co-registered scenes

use ndarray::Array2;
use crate::maybe_rayon::*;
use agriplast_core::raster::Raster;
use agriplast_core::{Error, MultiBandImage, Result};

/// Reduce a stack of scenes to their per-band, per-pixel median.
///
/// Only bands present in every scene are carried into the composite, in the
/// order of the first scene. No-data observations are ignored; a pixel with
/// no valid observation stays NaN. For an even number of observations the
/// median is the mean of the two middle values.
///
/// # Errors
/// Fails on an empty stack or when scenes do not share a grid.
pub fn median_composite(scenes: &[MultiBandImage]) -> Result<MultiBandImage> {
    let first = scenes
        .first()
        .ok_or_else(|| Error::Algorithm("cannot composite an empty scene stack".into()))?;
    let (rows, cols) = first.shape();

    for scene in &scenes[1..] {
        if scene.shape() != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: scene.rows(),
                ac: scene.cols(),
            });
        }
    }

    let mut out = MultiBandImage::new(rows, cols, *first.transform());
    out.set_crs(first.crs());

    for name in first.band_names() {
        if !scenes.iter().all(|s| s.has_band(name)) {
            continue;
        }
        let stack: Vec<&Raster<f64>> = scenes
            .iter()
            .map(|s| s.band(name))
            .collect::<Result<_>>()?;

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut obs = Vec::with_capacity(stack.len());
                for (col, cell) in row_data.iter_mut().enumerate() {
                    obs.clear();
                    for band in &stack {
                        let v = unsafe { band.get_unchecked(row, col) };
                        if !band.is_nodata(v) {
                            obs.push(v);
                        }
                    }
                    if let Some(m) = median(&mut obs) {
                        *cell = m;
                    }
                }
                row_data
            })
            .collect();

        let mut band = stack[0].with_same_meta::<f64>(rows, cols);
        band.set_nodata(Some(f64::NAN));
        *band.data_mut() =
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
        out.add_band(name.clone(), band)?;
    }

    Ok(out)
}

fn median(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = n / 2;
    Some(if n % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
