use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;

// ============================================================================
// Engine Types
// ============================================================================

/// Validated request handed to the recommendation engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationRequest {
    pub user_id: String,
    pub exclusions: Vec<String>,
    /// `None` means every product passes the category stage
    pub category_filter: Option<HashSet<String>>,
    pub count: usize,
}

impl RecommendationRequest {
    pub fn new(count: usize) -> Self {
        Self {
            user_id: String::new(),
            exclusions: Vec::new(),
            category_filter: None,
            count,
        }
    }

    pub fn excluding<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusions = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_filter = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

/// Ranked engine output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationResponse {
    pub product_ids: Vec<String>,
    pub snapshot_version: u64,
    /// Candidates that survived filtering, before truncation
    pub candidates_considered: usize,
}

// ============================================================================
// Inbound Contract
// ============================================================================

/// Inbound `GetRecommendations` call as decoded by the transport layer
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GetRecommendations {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub exclusion_ids: Vec<String>,
    #[serde(default)]
    pub category_filter: Option<Vec<String>>,
    pub count: i64,
    /// Caller-supplied deadline; the configured default applies when absent
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Outcome status of a `GetRecommendations` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    OkDegraded,
    BadRequest,
    DeadlineExceeded,
    Internal,
}

impl ResponseStatus {
    pub const ALL: [ResponseStatus; 5] = [
        ResponseStatus::Ok,
        ResponseStatus::OkDegraded,
        ResponseStatus::BadRequest,
        ResponseStatus::DeadlineExceeded,
        ResponseStatus::Internal,
    ];

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Ok | ResponseStatus::OkDegraded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Ok => "OK",
            ResponseStatus::OkDegraded => "OK_DEGRADED",
            ResponseStatus::BadRequest => "BAD_REQUEST",
            ResponseStatus::DeadlineExceeded => "DEADLINE_EXCEEDED",
            ResponseStatus::Internal => "INTERNAL",
        }
    }
}

impl Display for ResponseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reply to a `GetRecommendations` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationReply {
    pub product_ids: Vec<String>,
    pub status: ResponseStatus,
    pub snapshot_version: Option<u64>,
    pub candidates_considered: usize,
    /// Caller-safe explanation for non-success statuses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationReply {
    pub fn served(response: RecommendationResponse, degraded: bool) -> Self {
        Self {
            product_ids: response.product_ids,
            status: if degraded {
                ResponseStatus::OkDegraded
            } else {
                ResponseStatus::Ok
            },
            snapshot_version: Some(response.snapshot_version),
            candidates_considered: response.candidates_considered,
            message: None,
        }
    }

    pub fn failed(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            product_ids: Vec::new(),
            status,
            snapshot_version: None,
            candidates_considered: 0,
            message: Some(message.into()),
        }
    }
}
