//! Port traits the domain depends on; adapters implement them.

pub mod audit_port;
pub mod config_port;
pub mod data_port;
pub mod entitlement_port;
pub mod order_port;
pub mod prediction_port;
