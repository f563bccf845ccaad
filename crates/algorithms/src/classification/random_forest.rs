//! Random forest classifier
//!
//! Each tree is grown on a bootstrap sample of the training rows, trying a
//! random subset of features at every split and choosing the threshold that
//! minimizes weighted Gini impurity. Prediction is a majority vote; ties go
//! to the smaller class code.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::maybe_rayon::*;
use agriplast_core::raster::Raster;
use agriplast_core::{BandSet, Error, MultiBandImage, Result};

/// Parameters for [`RandomForest::fit`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestParams {
    /// Number of trees (default: 50)
    pub n_trees: usize,
    /// Maximum tree depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Nodes with fewer rows become leaves (default: 2)
    pub min_samples_split: usize,
    /// Features tried per split; `None` uses `ceil(sqrt(n_features))`
    pub max_features: Option<usize>,
    /// Seed for bootstrap and feature sampling (default: 0)
    pub seed: u64,
}

impl Default for RandomForestParams {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: None,
            min_samples_split: 2,
            max_features: None,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: u32,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict(&self, x: &[f64]) -> u32 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if x[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// A trained random forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    params: RandomForestParams,
}

impl RandomForest {
    /// Train on `features` (one row per sample) with class codes `labels`.
    ///
    /// # Errors
    /// Fails on an empty table, mismatched lengths, ragged or non-finite
    /// rows, or `n_trees == 0`.
    pub fn fit(
        features: &[Vec<f64>],
        labels: &[u32],
        params: &RandomForestParams,
    ) -> Result<Self> {
        if params.n_trees == 0 {
            return Err(Error::InvalidParameter {
                name: "n_trees",
                value: "0".into(),
                reason: "forest needs at least one tree".into(),
            });
        }
        if features.is_empty() {
            return Err(Error::Algorithm("cannot train on an empty table".into()));
        }
        if features.len() != labels.len() {
            return Err(Error::Algorithm(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        let n_features = features[0].len();
        if n_features == 0 {
            return Err(Error::Algorithm("feature rows are empty".into()));
        }
        for (i, row) in features.iter().enumerate() {
            if row.len() != n_features {
                return Err(Error::Algorithm(format!(
                    "row {i} has {} features, expected {n_features}",
                    row.len()
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::Algorithm(format!("row {i} has a non-finite feature")));
            }
        }

        let n_classes = labels.iter().copied().max().map_or(0, |m| m as usize + 1);
        let max_features = params
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features);

        let grower = TreeGrower {
            features,
            labels,
            n_classes,
            max_features,
            max_depth: params.max_depth.unwrap_or(usize::MAX),
            min_samples_split: params.min_samples_split.max(2),
        };

        let trees: Vec<DecisionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let n = features.len();
                let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
                grower.grow(sample, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            rows = features.len(),
            n_features,
            n_classes,
            "random forest trained"
        );

        Ok(Self {
            trees,
            n_features,
            n_classes,
            params: params.clone(),
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// One more than the largest class code seen in training
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn params(&self) -> &RandomForestParams {
        &self.params
    }

    /// Majority-vote class for one feature vector
    pub fn predict(&self, x: &[f64]) -> Result<u32> {
        if x.len() != self.n_features {
            return Err(Error::Algorithm(format!(
                "expected {} features, got {}",
                self.n_features,
                x.len()
            )));
        }
        Ok(self.vote(x))
    }

    /// Predict every row of `features`
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<u32>> {
        features.iter().map(|x| self.predict(x)).collect()
    }

    /// Classify every pixel of `image` over `bands`.
    ///
    /// Output holds class codes as `f64`; pixels with no-data in any band
    /// stay NaN.
    pub fn classify(&self, image: &MultiBandImage, bands: &BandSet) -> Result<Raster<f64>> {
        if bands.len() != self.n_features {
            return Err(Error::Algorithm(format!(
                "model trained on {} features, band set has {}",
                self.n_features,
                bands.len()
            )));
        }
        let layers = bands
            .iter()
            .map(|name| image.band(name))
            .collect::<Result<Vec<_>>>()?;
        let (rows, cols) = image.shape();

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f64::NAN; cols];
                let mut x = vec![0.0; layers.len()];
                'cells: for (col, cell) in row_data.iter_mut().enumerate() {
                    for (slot, layer) in x.iter_mut().zip(&layers) {
                        let v = unsafe { layer.get_unchecked(row, col) };
                        if layer.is_nodata(v) {
                            continue 'cells;
                        }
                        *slot = v;
                    }
                    *cell = self.vote(&x) as f64;
                }
                row_data
            })
            .collect();

        let mut output = layers[0].with_same_meta::<f64>(rows, cols);
        output.set_nodata(Some(f64::NAN));
        *output.data_mut() = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(output)
    }

    fn vote(&self, x: &[f64]) -> u32 {
        let mut counts = vec![0usize; self.n_classes.max(1)];
        for tree in &self.trees {
            let c = tree.predict(x) as usize;
            if c < counts.len() {
                counts[c] += 1;
            }
        }
        majority(&counts)
    }
}

/// Index of the largest count; ties go to the smaller index
fn majority(counts: &[usize]) -> u32 {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best as u32
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

struct TreeGrower<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [u32],
    n_classes: usize,
    max_features: usize,
    max_depth: usize,
    min_samples_split: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl TreeGrower<'_> {
    fn grow(&self, sample: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let mut tree = DecisionTree { nodes: Vec::new() };
        self.grow_node(&mut tree, sample, 0, rng);
        tree
    }

    /// Append the subtree for `rows` and return its root index
    fn grow_node(
        &self,
        tree: &mut DecisionTree,
        rows: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let counts = self.class_counts(&rows);
        let leaf_class = majority(&counts);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;

        let idx = tree.nodes.len();
        tree.nodes.push(Node::Leaf { class: leaf_class });

        if pure || depth >= self.max_depth || rows.len() < self.min_samples_split {
            return idx;
        }

        let Some(split) = self.best_split(&rows, &counts, rng) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.features[r][split.feature] <= split.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return idx;
        }

        let left = self.grow_node(tree, left_rows, depth + 1, rng);
        let right = self.grow_node(tree, right_rows, depth + 1, rng);
        tree.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &r in rows {
            counts[self.labels[r] as usize] += 1;
        }
        counts
    }

    fn best_split(&self, rows: &[usize], counts: &[usize], rng: &mut StdRng) -> Option<BestSplit> {
        let n_features = self.features[0].len();
        let candidates = index::sample(rng, n_features, self.max_features);
        let parent = gini(counts, rows.len());

        let mut best: Option<BestSplit> = None;
        let mut sorted: Vec<(f64, u32)> = Vec::with_capacity(rows.len());

        for feature in candidates.iter() {
            sorted.clear();
            sorted.extend(rows.iter().map(|&r| (self.features[r][feature], self.labels[r])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0usize; self.n_classes];
            let mut right = counts.to_vec();
            let total = sorted.len();

            for i in 0..total - 1 {
                let class = sorted[i].1 as usize;
                left[class] += 1;
                right[class] -= 1;

                let (v, next) = (sorted[i].0, sorted[i + 1].0);
                if v == next {
                    continue;
                }
                let nl = i + 1;
                let nr = total - nl;
                let score = (nl as f64 * gini(&left, nl) + nr as f64 * gini(&right, nr))
                    / total as f64;
                if score < parent - 1e-12 && best.as_ref().is_none_or(|b| score < b.score) {
                    best = Some(BestSplit {
                        feature,
                        threshold: v + (next - v) / 2.0,
                        score,
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agriplast_core::GeoTransform;

    /// Three well-separated clusters in two features
    fn clusters() -> (Vec<Vec<f64>>, Vec<u32>) {
        let centers = [(0.1, 0.1), (0.5, 0.9), (0.9, 0.2)];
        let mut x = Vec::new();
        let mut y = Vec::new();
        for (class, &(cx, cy)) in centers.iter().enumerate() {
            for i in 0..20 {
                let dx = (i % 5) as f64 * 0.01;
                let dy = (i / 5) as f64 * 0.01;
                x.push(vec![cx + dx, cy + dy]);
                y.push(class as u32);
            }
        }
        (x, y)
    }

    #[test]
    fn test_fit_separable_clusters() {
        let (x, y) = clusters();
        let forest = RandomForest::fit(&x, &y, &RandomForestParams::default()).unwrap();

        assert_eq!(forest.n_trees(), 50);
        assert_eq!(forest.n_classes(), 3);
        let predicted = forest.predict_batch(&x).unwrap();
        assert_eq!(predicted, y);
        assert_eq!(forest.predict(&[0.12, 0.11]).unwrap(), 0);
        assert_eq!(forest.predict(&[0.52, 0.92]).unwrap(), 1);
        assert_eq!(forest.predict(&[0.91, 0.21]).unwrap(), 2);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = clusters();
        let params = RandomForestParams { n_trees: 5, ..Default::default() };
        let a = RandomForest::fit(&x, &y, &params).unwrap();
        let b = RandomForest::fit(&x, &y, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let x = vec![vec![0.1], vec![0.2], vec![0.3]];
        let y = vec![2, 2, 2];
        let forest = RandomForest::fit(&x, &y, &RandomForestParams::default()).unwrap();
        assert_eq!(forest.predict(&[0.9]).unwrap(), 2);
    }

    #[test]
    fn test_invalid_training_input() {
        let p = RandomForestParams::default();
        assert!(RandomForest::fit(&[], &[], &p).is_err());
        assert!(RandomForest::fit(&[vec![1.0]], &[0, 1], &p).is_err());
        assert!(RandomForest::fit(&[vec![1.0], vec![1.0, 2.0]], &[0, 1], &p).is_err());
        assert!(RandomForest::fit(&[vec![f64::NAN]], &[0], &p).is_err());
        let zero = RandomForestParams { n_trees: 0, ..Default::default() };
        assert!(RandomForest::fit(&[vec![1.0]], &[0], &zero).is_err());
    }

    #[test]
    fn test_predict_wrong_width() {
        let (x, y) = clusters();
        let forest = RandomForest::fit(&x, &y, &RandomForestParams { n_trees: 3, ..Default::default() }).unwrap();
        assert!(forest.predict(&[0.1]).is_err());
    }

    #[test]
    fn test_classify_image_keeps_nodata() {
        let (x, y) = clusters();
        let forest = RandomForest::fit(&x, &y, &RandomForestParams { n_trees: 10, ..Default::default() }).unwrap();

        let gt = GeoTransform::new(0.0, 2.0, 1.0, -1.0);
        let mut a = Raster::filled(2, 2, 0.1);
        let mut b = Raster::filled(2, 2, 0.1);
        a.set_transform(gt);
        b.set_transform(gt);
        a.set(0, 1, 0.9).unwrap();
        b.set(0, 1, 0.2).unwrap();
        b.set(1, 1, f64::NAN).unwrap();
        let image = MultiBandImage::from_bands([("A", a), ("B", b)]).unwrap();
        let bands = BandSet::new(["A", "B"]).unwrap();

        let classified = forest.classify(&image, &bands).unwrap();
        assert!((classified.get(0, 0).unwrap() - 0.0).abs() < 1e-10);
        assert!((classified.get(0, 1).unwrap() - 2.0).abs() < 1e-10);
        assert!(classified.get(1, 1).unwrap().is_nan());
    }

    #[test]
    fn test_serde_round_trip_predicts_identically() {
        let (x, y) = clusters();
        let forest = RandomForest::fit(&x, &y, &RandomForestParams { n_trees: 4, ..Default::default() }).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        let back: RandomForest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict_batch(&x).unwrap(), forest.predict_batch(&x).unwrap());
    }

    #[test]
    fn test_majority_tie_goes_to_smaller_code() {
        assert_eq!(majority(&[2, 3, 3]), 1);
        assert_eq!(majority(&[0, 0, 0]), 0);
    }
}
