pub mod background;
pub mod context;
pub mod time;
pub mod timeseries;

pub use context::{AppContext, HealthReport};
