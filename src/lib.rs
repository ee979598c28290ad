pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{BoardClient, CrmClient};
pub use app::scheduler::{SyncRunner, Trigger};
pub use config::SyncConfig;
pub use crate::core::synchronizer::Synchronizer;
pub use domain::model::{Deal, ProjectBoard, SyncOutcome, SyncResult};
pub use utils::error::{Result, SyncError};
