//! Travel request models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TravelStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl TravelStatus {
    pub const ALL: [TravelStatus; 4] = [
        TravelStatus::Pending,
        TravelStatus::Approved,
        TravelStatus::Rejected,
        TravelStatus::Cancelled,
    ];

    /// Only pending requests move, and only to a terminal status
    pub fn can_transition_to(&self, next: TravelStatus) -> bool {
        matches!(self, TravelStatus::Pending) && !matches!(next, TravelStatus::Pending)
    }
}

impl std::fmt::Display for TravelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Approved => write!(f, "Approved"),
            Self::Rejected => write!(f, "Rejected"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::str::FromStr for TravelStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            _ => Err(format!("Unknown travel status: {}", s)),
        }
    }
}

impl From<String> for TravelStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Travel {
    pub id: i64,
    pub user_id: i64,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub purpose: String,
    pub estimated_cost: f64,
    pub status: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub approved_by: Option<i64>,
    pub approved_at: Option<String>,
    pub rejected_by: Option<i64>,
    pub rejected_at: Option<String>,
    pub comments: Option<String>,
}

impl Travel {
    pub fn status_enum(&self) -> TravelStatus {
        TravelStatus::from(self.status.clone())
    }

    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Insert payload; status and audit columns are set by the store
#[derive(Debug, Clone)]
pub struct NewTravel {
    pub user_id: i64,
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub purpose: String,
    pub estimated_cost: f64,
    pub comments: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTravelRequest {
    pub destination: String,
    pub start_date: String,
    pub end_date: String,
    pub purpose: String,
    pub estimated_cost: f64,
    /// Accepted for compatibility and ignored: new requests are always Pending
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTravelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TravelStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl UpdateTravelRequest {
    /// True when any owner-editable field is present
    pub fn edits_fields(&self) -> bool {
        self.destination.is_some()
            || self.start_date.is_some()
            || self.end_date.is_some()
            || self.purpose.is_some()
            || self.estimated_cost.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTravelStatusRequest {
    pub status: TravelStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}
