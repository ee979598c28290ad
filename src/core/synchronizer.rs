use crate::domain::model::{
    Board, Deal, EligibilityCriteria, EligibleSet, ProjectBoard, SyncOutcome, SyncResult,
};
use crate::domain::ports::{BoardProvisioner, RecordSource};
use crate::utils::error::{Result, SyncError};
use std::fmt;
use std::sync::Arc;

/// Where a single deal's processing stopped.
#[derive(Debug)]
enum RecordFailure {
    Validation(SyncError),
    Provisioning(SyncError),
    /// The board exists remotely but the deal does not point at it.
    WriteBack { board: Board, error: SyncError },
}

impl fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFailure::Validation(error) => write!(f, "{}", error),
            RecordFailure::Provisioning(error) => write!(f, "Board creation failed: {}", error),
            RecordFailure::WriteBack { board, error } => write!(
                f,
                "Board {} was created but could not be linked to the deal: {}",
                board.id, error
            ),
        }
    }
}

/// Creates a project board for every eligible deal and links it back.
///
/// Holds no state between runs; eligibility is recomputed from the CRM each
/// time, and deals are handled one after another in fetch order.
pub struct Synchronizer {
    source: Arc<dyn RecordSource>,
    boards: Arc<dyn BoardProvisioner>,
    criteria: EligibilityCriteria,
}

impl Synchronizer {
    pub fn new(
        source: Arc<dyn RecordSource>,
        boards: Arc<dyn BoardProvisioner>,
        criteria: EligibilityCriteria,
    ) -> Self {
        Self {
            source,
            boards,
            criteria,
        }
    }

    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }

    pub fn boards(&self) -> &Arc<dyn BoardProvisioner> {
        &self.boards
    }

    /// Fails only when the eligible set cannot be fetched; per-deal failures
    /// end up in the result's details.
    pub async fn run_sync(&self) -> Result<SyncResult> {
        let EligibleSet { deals, truncated } = self.source.fetch_eligible().await?;
        if truncated {
            tracing::warn!("Eligible set was truncated; the rest is picked up next run");
        }
        if deals.is_empty() {
            tracing::info!("No eligible deals found");
            return Ok(SyncResult {
                truncated,
                ..SyncResult::default()
            });
        }

        tracing::info!("Processing {} eligible deals", deals.len());
        let mut result = SyncResult {
            processed: deals.len(),
            truncated,
            ..SyncResult::default()
        };

        for deal in &deals {
            if deal.has_board_reference() {
                tracing::debug!("Deal {} already has a board, skipping", deal.id);
                result.skipped += 1;
                continue;
            }

            match self.process(deal).await {
                Ok(project) => {
                    tracing::info!(
                        "✅ Created board {} for deal {} ({})",
                        project.board.id,
                        deal.id,
                        deal.name
                    );
                    result.record(SyncOutcome::success(deal, &project.board));
                }
                Err(failure) => {
                    match &failure {
                        // Already reported by `screen`.
                        RecordFailure::Validation(_) => {}
                        RecordFailure::WriteBack { board, .. } => {
                            tracing::warn!(
                                "Orphan board {} ({}) left for deal {}; link it manually",
                                board.id,
                                board.url,
                                deal.id
                            );
                            tracing::error!("❌ Deal {} ({}): {}", deal.id, deal.name, failure);
                        }
                        RecordFailure::Provisioning(_) => {
                            tracing::error!("❌ Deal {} ({}): {}", deal.id, deal.name, failure);
                        }
                    }
                    result.record(SyncOutcome::error(deal, failure.to_string()));
                }
            }
        }

        tracing::info!(
            "Sync finished: processed={}, created={}, errors={}, skipped={}",
            result.processed,
            result.created,
            result.errors,
            result.skipped
        );
        Ok(result)
    }

    async fn process(&self, deal: &Deal) -> std::result::Result<ProjectBoard, RecordFailure> {
        self.screen(deal).map_err(RecordFailure::Validation)?;

        let project = self
            .boards
            .create_project_board(deal.name.trim(), &deal.id)
            .await
            .map_err(RecordFailure::Provisioning)?;

        if let Err(error) = self
            .source
            .write_board_reference(&deal.id, &project.board.id)
            .await
        {
            return Err(RecordFailure::WriteBack {
                board: project.board,
                error,
            });
        }

        Ok(project)
    }

    /// Stage, then type, then name; the first failing check is logged. This
    /// is the same gate `run_sync` applies before provisioning.
    pub fn validate(&self, deal: &Deal) -> bool {
        self.screen(deal).is_ok()
    }

    fn screen(&self, deal: &Deal) -> Result<()> {
        self.check_eligibility(deal).inspect_err(|e| {
            tracing::warn!("Deal {} is not eligible: {}", deal.id, e);
        })
    }

    pub fn check_eligibility(&self, deal: &Deal) -> Result<()> {
        if deal.stage != self.criteria.kickoff_stage {
            return Err(SyncError::validation(format!(
                "stage is '{}', expected '{}'",
                deal.stage, self.criteria.kickoff_stage
            )));
        }
        if deal.deal_type != self.criteria.project_type {
            return Err(SyncError::validation(format!(
                "type is '{}', expected '{}'",
                deal.deal_type, self.criteria.project_type
            )));
        }
        if deal.name.trim().is_empty() {
            return Err(SyncError::validation("deal name is empty"));
        }
        Ok(())
    }
}
