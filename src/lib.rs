pub mod config;
pub mod crypto;
pub mod soap;
pub mod telemetry;
