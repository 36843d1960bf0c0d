// Volatility estimation
pub mod atr;

pub use atr::calculate_atr;
