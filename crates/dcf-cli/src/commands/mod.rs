pub mod analysis;
pub mod monte_carlo;
pub mod valuation;
