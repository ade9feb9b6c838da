pub mod backup_link;
pub mod config;
pub mod constants;
pub mod error;
pub mod orchestrator;
pub mod startup;
pub mod storage;
pub mod store;

pub use error::{CtcError, Result};
