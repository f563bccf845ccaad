//! Confusion matrix for classification accuracy assessment

use serde::{Deserialize, Serialize};
use std::fmt;

use agriplast_core::{Error, Result};

/// Square matrix of counts: rows are actual classes, columns predicted.
///
/// Sized to one more than the largest class code seen in either input, so
/// codes `{0, 1, 2}` give a 3x3 matrix even if one class is never predicted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    /// Tabulate paired actual/predicted codes
    pub fn from_predictions(actual: &[u32], predicted: &[u32]) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(Error::Algorithm(format!(
                "{} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }
        let size = actual
            .iter()
            .chain(predicted)
            .copied()
            .max()
            .map_or(0, |m| m as usize + 1);

        let mut counts = vec![vec![0u64; size]; size];
        for (&a, &p) in actual.iter().zip(predicted) {
            counts[a as usize][p as usize] += 1;
        }
        Ok(Self { counts })
    }

    /// Number of classes (matrix is `size x size`)
    pub fn size(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, actual: usize, predicted: usize) -> u64 {
        self.counts
            .get(actual)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Sum of the diagonal
    pub fn correct(&self) -> u64 {
        (0..self.size()).map(|i| self.counts[i][i]).sum()
    }

    /// Overall accuracy, or 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.correct() as f64 / total as f64
    }

    /// Cohen's kappa
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        let po = self.correct() as f64 / total;
        let pe: f64 = (0..self.size())
            .map(|i| {
                let row: u64 = self.counts[i].iter().sum();
                let col: u64 = self.counts.iter().map(|r| r[i]).sum();
                (row as f64 / total) * (col as f64 / total)
            })
            .sum();
        if (1.0 - pe).abs() < 1e-12 {
            return 1.0;
        }
        (po - pe) / (1.0 - pe)
    }

    /// Fraction of actual `class` samples predicted correctly (recall)
    pub fn producers_accuracy(&self, class: usize) -> Option<f64> {
        let row = self.counts.get(class)?;
        let n: u64 = row.iter().sum();
        (n > 0).then(|| row[class] as f64 / n as f64)
    }

    /// Fraction of `class` predictions that were correct (precision)
    pub fn consumers_accuracy(&self, class: usize) -> Option<f64> {
        if class >= self.size() {
            return None;
        }
        let n: u64 = self.counts.iter().map(|r| r[class]).sum();
        (n > 0).then(|| self.counts[class][class] as f64 / n as f64)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, row) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{row:?}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_accuracy() {
        let actual = [0, 0, 1, 1, 2, 2];
        let predicted = [0, 1, 1, 1, 2, 0];
        let cm = ConfusionMatrix::from_predictions(&actual, &predicted).unwrap();

        assert_eq!(cm.size(), 3);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(2, 0), 1);
        assert_eq!(cm.correct(), 4);
        assert!((cm.accuracy() - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_size_follows_largest_code() {
        let cm = ConfusionMatrix::from_predictions(&[0, 3], &[0, 3]).unwrap();
        assert_eq!(cm.size(), 4);
        assert_eq!(cm.producers_accuracy(1), None);
        assert_eq!(cm.producers_accuracy(3), Some(1.0));
    }

    #[test]
    fn test_perfect_kappa() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 2, 1], &[0, 1, 2, 1]).unwrap();
        assert!((cm.kappa() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_consumers_accuracy() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 1], &[1, 1, 1]).unwrap();
        assert!((cm.consumers_accuracy(1).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(cm.consumers_accuracy(0), None);
    }

    #[test]
    fn test_display() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1], &[0, 0]).unwrap();
        assert_eq!(cm.to_string(), "[[1, 0], [1, 0]]");
    }

    #[test]
    fn test_length_mismatch() {
        assert!(ConfusionMatrix::from_predictions(&[0, 1], &[0]).is_err());
    }

    #[test]
    fn test_empty() {
        let cm = ConfusionMatrix::from_predictions(&[], &[]).unwrap();
        assert_eq!(cm.size(), 0);
        assert_eq!(cm.accuracy(), 0.0);
    }
}
