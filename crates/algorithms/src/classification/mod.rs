//! Supervised classification for multispectral composites
//!
//! - **Random forest**: bagged CART trees with Gini splits, majority vote
//! - **Confusion matrix**: accuracy assessment of predicted vs. known labels

mod confusion;
mod random_forest;

pub use confusion::ConfusionMatrix;
pub use random_forest::{RandomForest, RandomForestParams};
