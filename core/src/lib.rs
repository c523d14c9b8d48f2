pub mod bridge;
pub mod chain;
pub mod connector;
pub mod contract;
pub mod credential;
pub mod error;
pub mod info;
pub mod keychain;
pub mod telemetry;
pub mod transactions;
pub mod types;
pub mod utils;

pub use connector::Connector;
pub use error::{DispatchFailure, Error};
