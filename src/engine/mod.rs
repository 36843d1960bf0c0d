// Signal execution and position monitoring
pub mod envelope;
pub mod monitor;

pub use envelope::{EnvelopeCalculator, EnvelopeParams};
pub use monitor::PositionMonitor;
