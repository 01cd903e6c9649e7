pub mod experiment;
pub mod grade;
pub mod loaders;
pub mod response;
pub mod results;

pub use experiment::{
    ClassificationSpec, ClusteringSpec, EvaluationMode, ExperimentConfig, ExtractorSpec,
    FeatureSet, PreprocessingConfig, ReaderPairing, StopwordSource, SweepAxes,
};
pub use grade::Grade;
pub use loaders::load_sweep_axes;
pub use response::{Document, GradedResponse};
pub use results::{
    AgreementResult, CachedPoint, DocumentPrediction, PointOutcome, PointStatus, Prediction,
};
