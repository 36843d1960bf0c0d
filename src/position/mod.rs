// Open position tracking
pub mod registry;

pub use registry::PositionRegistry;
