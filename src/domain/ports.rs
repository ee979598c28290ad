use crate::domain::model::{EligibleSet, ProjectBoard};
use crate::utils::error::Result;
use async_trait::async_trait;

/// The CRM side: where eligible deals come from and where board ids go back.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Deals in the kickoff stage with the implementation-project type and no
    /// board reference yet, in the order the CRM returns them. Malformed rows
    /// are dropped rather than failing the whole fetch.
    async fn fetch_eligible(&self) -> Result<EligibleSet>;

    /// Sets only the board-reference field on `record_id`. A reply that does
    /// not explicitly report success is an error.
    async fn write_board_reference(&self, record_id: &str, board_id: &str) -> Result<()>;

    async fn check_connection(&self) -> Result<()>;
}

/// The task-board side.
#[async_trait]
pub trait BoardProvisioner: Send + Sync {
    /// Creates the board, its three lists and three starter cards. Stops at the
    /// first failing call without removing what was already created.
    async fn create_project_board(&self, name: &str, record_id: &str) -> Result<ProjectBoard>;

    async fn check_connection(&self) -> Result<()>;
}
