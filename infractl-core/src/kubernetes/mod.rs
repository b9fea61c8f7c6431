pub mod client;
pub mod gateway;
pub mod kubectl;
pub mod labels;
pub mod readiness;

pub use self::gateway::{ClusterGateway, GatewayError};
