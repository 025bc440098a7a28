pub mod config;
pub mod error;
pub mod gateway;
pub mod models;

pub use config::Config;
pub use error::GatewayError;
pub use gateway::events::GatewayEvent;
pub use gateway::GatewayClient;
