pub mod config;
pub mod perturbation;
pub mod random;
pub mod simulation;
pub mod statistics;

pub use config::{CiMethod, InvalidDrawPolicy, PerturbationBands, PerturbationDistribution, SimulationConfig};
pub use random::{RandomSource, SeededStreams};
pub use simulation::{run_monte_carlo, CancellationToken, MonteCarloResult, MonteCarloSimulator};
