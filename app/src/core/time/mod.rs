pub mod builder;
mod datetime;
mod duration;
mod window;

pub use datetime::DateTime;
pub use duration::Duration;
pub use window::TimeWindow;

#[cfg(test)]
pub use datetime::FIXED_NOW;
