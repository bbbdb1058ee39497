pub mod alignment;
pub mod config;
pub mod continuum;
pub mod dissimilarity;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod report;
pub mod sampling;
pub mod types;

pub use alignment::{best_alignment, Alignment, UnitaryAlignment};
pub use config::GammaConfig;
pub use continuum::Continuum;
pub use dissimilarity::{
    CategoricalDissimilarity, CombinedDissimilarity, PairDissimilarity, PositionalDissimilarity,
};
pub use error::GammaError;
pub use io::{read_delimited, write_delimited};
pub use pipeline::builder::GammaEstimatorBuilder;
pub use pipeline::runtime::{required_samples, GammaEstimator};
pub use pipeline::traits::{BinarySolver, ContinuumSampler, DissimilarityProvider, ProviderState};
pub use report::{GammaReport, GammaResult, Meta, Report};
pub use types::{PivotType, SamplerKind, Segment, Unit};
