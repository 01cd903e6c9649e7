pub mod experiment_flow;
pub mod folds;
pub mod point_ctx;
pub mod purity;

pub use experiment_flow::{Corpora, ExperimentFlow};
pub use folds::fold_ranges;
pub use point_ctx::PointCtx;
pub use purity::{retain_pure_clusters, PurityStats, RetainedClusters};
