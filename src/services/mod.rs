pub mod agreement;
pub mod backends;
pub mod classification;
pub mod clustering;
pub mod features;
pub mod grade_writer;
pub mod preprocessing;

pub use agreement::{cohen_kappa, AgreementEvaluator};
pub use backends::Backends;
pub use classification::{ClassificationBackend, Predictor};
pub use clustering::{ClusterModel, ClusteringBackend};
pub use features::{FeaturePipeline, FeatureVector};
pub use grade_writer::{GradeLists, GradeWriter};
pub use preprocessing::{LinguisticPreprocessor, ProcessedDocument};
