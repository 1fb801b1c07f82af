pub mod amount;
pub mod backoff;
pub mod models;
pub mod network;

pub use amount::*;
pub use backoff::ExponentialBackoff;
pub use models::*;
pub use network::*;
