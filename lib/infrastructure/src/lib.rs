mod bus;
mod db;
mod http;
mod monitoring;

pub use bus::{EventBus, EventEmitter, EventListener};
pub use db::DatabaseConfig;
pub use http::client::HttpClientConfig;
pub use monitoring::{EnvFilterConfig, MonitoringConfig};
