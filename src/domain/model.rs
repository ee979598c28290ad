use serde::{Deserialize, Serialize};

/// A CRM deal as seen by the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deal {
    pub id: String,
    pub name: String,
    pub stage: String,
    pub deal_type: String,
    pub board_reference: Option<String>,
}

impl Deal {
    /// A blank or whitespace-only reference counts as unset.
    pub fn has_board_reference(&self) -> bool {
        self.board_reference
            .as_deref()
            .is_some_and(|reference| !reference.trim().is_empty())
    }
}

/// What one eligible-set fetch produced. `truncated` is set when the source
/// stopped paging before the remote side ran out of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EligibleSet {
    pub deals: Vec<Deal>,
    pub truncated: bool,
}

impl From<Vec<Deal>> for EligibleSet {
    fn from(deals: Vec<Deal>) -> Self {
        Self {
            deals,
            truncated: false,
        }
    }
}

/// The stage and type a deal must carry to get a board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    pub kickoff_stage: String,
    pub project_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardList {
    pub id: String,
    pub name: String,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub list_id: String,
    pub url: Option<String>,
}

/// Board plus its To Do / In Progress / Done lists and the starter cards,
/// all in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectBoard {
    pub board: Board,
    pub lists: Vec<BoardList>,
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub record_id: String,
    pub name: String,
    pub status: OutcomeStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_url: Option<String>,
}

impl SyncOutcome {
    pub fn success(deal: &Deal, board: &Board) -> Self {
        Self {
            record_id: deal.id.clone(),
            name: deal.name.clone(),
            status: OutcomeStatus::Success,
            message: format!("Created board {}", board.id),
            board_id: Some(board.id.clone()),
            board_url: Some(board.url.clone()),
        }
    }

    pub fn error(deal: &Deal, message: impl Into<String>) -> Self {
        Self {
            record_id: deal.id.clone(),
            name: deal.name.clone(),
            status: OutcomeStatus::Error,
            message: message.into(),
            board_id: None,
            board_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Every record returned by the eligible-set fetch.
    pub processed: usize,
    pub created: usize,
    pub errors: usize,
    /// Records that already carried a board reference; they have no detail entry.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub skipped: usize,
    /// The fetch hit its page cap, so eligible deals may remain for the next run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    pub details: Vec<SyncOutcome>,
}

fn is_zero(count: &usize) -> bool {
    *count == 0
}

impl SyncResult {
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome.status {
            OutcomeStatus::Success => self.created += 1,
            OutcomeStatus::Error => self.errors += 1,
        }
        self.details.push(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deal(reference: Option<&str>) -> Deal {
        Deal {
            id: "1".to_string(),
            name: "Acme".to_string(),
            stage: "Project Kickoff".to_string(),
            deal_type: "New Implementation Project".to_string(),
            board_reference: reference.map(str::to_string),
        }
    }

    #[test]
    fn test_board_reference_detection() {
        assert!(!deal(None).has_board_reference());
        assert!(!deal(Some("")).has_board_reference());
        assert!(!deal(Some("   ")).has_board_reference());
        assert!(deal(Some("5f1c")).has_board_reference());
    }

    #[test]
    fn test_empty_result_serializes_with_zero_counts() {
        let json = serde_json::to_value(SyncResult::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "processed": 0,
                "created": 0,
                "errors": 0,
                "details": []
            })
        );
    }

    #[test]
    fn test_skipped_and_truncated_appear_only_when_set() {
        let result = SyncResult {
            processed: 2,
            skipped: 1,
            truncated: true,
            ..SyncResult::default()
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["truncated"], true);

        let parsed: SyncResult = serde_json::from_str(
            r#"{"processed":0,"created":0,"errors":0,"details":[]}"#,
        )
        .unwrap();
        assert_eq!(parsed, SyncResult::default());
    }

    #[test]
    fn test_record_updates_counters() {
        let deal = deal(None);
        let board = Board {
            id: "b1".to_string(),
            name: "Project: Acme".to_string(),
            url: "https://boards.example/b/b1".to_string(),
        };
        let mut result = SyncResult::default();
        result.record(SyncOutcome::success(&deal, &board));
        result.record(SyncOutcome::error(&deal, "boom"));

        assert_eq!(result.created, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.details[0].status, OutcomeStatus::Success);
        assert_eq!(result.details[0].board_id.as_deref(), Some("b1"));
        assert_eq!(result.details[1].message, "boom");
    }
}
