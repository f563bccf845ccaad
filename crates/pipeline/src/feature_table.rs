//! Labeled feature tables

use std::collections::BTreeMap;
use std::fmt;
use std::io;

use agriplast_algorithms::sampling::SampledPixel;
use agriplast_core::BandSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// One training row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Values in band-set order, all finite
    pub features: Vec<f64>,
    pub class: u32,
    pub x: f64,
    pub y: f64,
    /// Uniform `[0, 1)` split column
    pub random: f64,
}

/// Content fingerprint of a [`FeatureTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId([u8; 32]);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Rows sampled over one [`BandSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    bands: BandSet,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(bands: BandSet) -> Self {
        Self {
            bands,
            rows: Vec::new(),
        }
    }

    pub fn bands(&self) -> &BandSet {
        &self.bands
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append sampled pixels. Rows of the wrong width or with non-finite
    /// values are skipped; the number appended is returned.
    pub fn extend_samples(&mut self, samples: Vec<SampledPixel>) -> usize {
        let width = self.bands.len();
        let before = self.rows.len();
        self.rows.extend(
            samples
                .into_iter()
                .filter(|s| s.features.len() == width && s.features.iter().all(|v| v.is_finite()))
                .map(|s| FeatureRow {
                    features: s.features,
                    class: s.class,
                    x: s.x,
                    y: s.y,
                    random: 0.0,
                }),
        );
        self.rows.len() - before
    }

    /// Append every row of `other`, which must share the band set.
    pub fn append(&mut self, other: FeatureTable) -> Result<()> {
        if other.bands != self.bands {
            return Err(PipelineError::InvalidParameter {
                name: "bands",
                value: other.bands.to_string(),
                reason: format!("table is sampled on {}", self.bands),
            });
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Fill the split column with seeded uniform draws.
    pub fn assign_split(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for row in &mut self.rows {
            row.random = rng.random::<f64>();
        }
    }

    /// Partition rows by `random < fraction` into `(train, holdout)`.
    pub fn split(&self, fraction: f64) -> (FeatureTable, FeatureTable) {
        let (train, holdout): (Vec<_>, Vec<_>) =
            self.rows.iter().cloned().partition(|r| r.random < fraction);
        (
            Self {
                bands: self.bands.clone(),
                rows: train,
            },
            Self {
                bands: self.bands.clone(),
                rows: holdout,
            },
        )
    }

    pub fn features(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.features.clone()).collect()
    }

    pub fn labels(&self) -> Vec<u32> {
        self.rows.iter().map(|r| r.class).collect()
    }

    /// Row count per class code
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.class).or_insert(0) += 1;
        }
        counts
    }

    /// Fingerprint over band names and every row, split column included.
    pub fn fingerprint(&self) -> TableId {
        let mut hasher = blake3::Hasher::new();
        for name in self.bands.iter() {
            hasher.update(name.as_bytes());
            hasher.update(&[0]);
        }
        for row in &self.rows {
            for v in &row.features {
                hasher.update(&v.to_le_bytes());
            }
            hasher.update(&row.class.to_le_bytes());
            hasher.update(&row.x.to_le_bytes());
            hasher.update(&row.y.to_le_bytes());
            hasher.update(&row.random.to_le_bytes());
        }
        TableId(*hasher.finalize().as_bytes())
    }

    /// Write as CSV: band columns, then `class`, `x`, `y`, `random`.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        let mut header: Vec<String> = self.bands.iter().map(String::from).collect();
        header.extend(["class", "x", "y", "random"].map(String::from));
        out.write_record(&header).map_err(csv_error)?;
        for row in &self.rows {
            let mut record: Vec<String> = row.features.iter().map(f64::to_string).collect();
            record.push(row.class.to_string());
            record.push(row.x.to_string());
            record.push(row.y.to_string());
            record.push(row.random.to_string());
            out.write_record(&record).map_err(csv_error)?;
        }
        out.flush()?;
        Ok(())
    }
}

fn csv_error(e: csv::Error) -> PipelineError {
    PipelineError::input("feature table", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(class: u32, v: f64) -> SampledPixel {
        SampledPixel {
            features: vec![v, v * 2.0],
            class,
            x: v,
            y: -v,
        }
    }

    fn table() -> FeatureTable {
        let mut t = FeatureTable::new(BandSet::new(["B4", "NDVI"]).unwrap());
        t.extend_samples(vec![sample(0, 0.1), sample(1, 0.2), sample(1, 0.3)]);
        t
    }

    #[test]
    fn test_non_finite_rows_skipped() {
        let mut t = table();
        let mut bad = sample(2, 0.4);
        bad.features[1] = f64::NAN;
        let short = SampledPixel {
            features: vec![0.5],
            class: 2,
            x: 0.0,
            y: 0.0,
        };
        assert_eq!(t.extend_samples(vec![bad, short, sample(2, 0.6)]), 1);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_class_counts() {
        let counts = table().class_counts();
        assert_eq!(counts.get(&0), Some(&1));
        assert_eq!(counts.get(&1), Some(&2));
    }

    #[test]
    fn test_split_column_is_seeded() {
        let mut a = table();
        let mut b = table();
        a.assign_split(0);
        b.assign_split(0);
        assert_eq!(a, b);
        assert!(a.rows().iter().all(|r| (0.0..1.0).contains(&r.random)));

        let (train, holdout) = a.split(0.5);
        assert_eq!(train.len() + holdout.len(), a.len());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = table();
        let mut b = table();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.extend_samples(vec![sample(2, 0.9)]);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_append_requires_same_bands() {
        let mut a = table();
        let other = FeatureTable::new(BandSet::new(["B4"]).unwrap());
        assert!(a.append(other).is_err());
        a.append(table()).unwrap();
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn test_write_csv() {
        let mut buf = Vec::new();
        table().write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("B4,NDVI,class,x,y,random"));
        assert_eq!(lines.count(), 3);
    }
}
