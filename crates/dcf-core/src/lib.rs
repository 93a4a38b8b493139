pub mod error;
pub mod time_value;
pub mod types;
pub mod valuation;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(feature = "monte_carlo")]
pub mod analysis;

pub use error::DcfError;
pub use types::*;

pub use valuation::{compute_valuation, ParameterSet, ValuationResult};

#[cfg(feature = "monte_carlo")]
pub use monte_carlo::{run_monte_carlo, MonteCarloResult, SimulationConfig};

#[cfg(feature = "monte_carlo")]
pub use analysis::{run_analysis, AnalysisReport, AnalysisRequest};

/// Standard result type for all dcf-core operations
pub type DcfResult<T> = Result<T, DcfError>;
