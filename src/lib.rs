pub mod analyzer;
pub mod cancel;
pub mod error;
pub mod model;
pub mod price_source;
pub mod resolver;
pub mod runner;

/// 설정 로더
pub mod config_loader;

pub use analyzer::{AnalysisOutput, RangeAnalyzer};
pub use cancel::CancelToken;
pub use error::{AnalysisError, AnalysisResult};
pub use runner::AnalysisRunner;
