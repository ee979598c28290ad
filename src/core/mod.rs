pub mod synchronizer;

pub use crate::domain::model::{Deal, EligibilityCriteria, ProjectBoard, SyncResult};
pub use crate::domain::ports::{BoardProvisioner, RecordSource};
pub use crate::utils::error::Result;
pub use synchronizer::Synchronizer;
