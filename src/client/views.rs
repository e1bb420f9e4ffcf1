//! Pure view helpers over fetched travel requests: filtering, sorting,
//! dashboard statistics and form checks.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::api::validation::{parse_travel_date, MAX_DESTINATION_LEN, MAX_PURPOSE_LEN};
use crate::db::{CreateTravelRequest, Travel, TravelStatus};

/// Number of requests shown on the dashboard
pub const DASHBOARD_RECENT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(TravelStatus),
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Destination,
    StartDate,
    EndDate,
    Status,
    EstimatedCost,
    #[default]
    CreatedAt,
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "destination" => Ok(Self::Destination),
            "startdate" | "start" => Ok(Self::StartDate),
            "enddate" | "end" => Ok(Self::EndDate),
            "status" => Ok(Self::Status),
            "estimatedcost" | "cost" => Ok(Self::EstimatedCost),
            "createdat" | "created" => Ok(Self::CreatedAt),
            _ => Err(format!("Unknown sort key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TravelQuery {
    pub status: StatusFilter,
    pub sort: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelStatistics {
    pub total_requests: usize,
    pub pending_requests: usize,
    pub approved_requests: usize,
    pub rejected_requests: usize,
}

fn timestamp(value: &str) -> i64 {
    parse_travel_date(value)
        .map(|d| d.timestamp())
        .unwrap_or(i64::MIN)
}

fn compare(a: &Travel, b: &Travel, key: SortKey) -> Ordering {
    match key {
        SortKey::Destination => a.destination.to_lowercase().cmp(&b.destination.to_lowercase()),
        SortKey::StartDate => timestamp(&a.start_date).cmp(&timestamp(&b.start_date)),
        SortKey::EndDate => timestamp(&a.end_date).cmp(&timestamp(&b.end_date)),
        SortKey::Status => a.status.cmp(&b.status),
        SortKey::EstimatedCost => a.estimated_cost.total_cmp(&b.estimated_cost),
        SortKey::CreatedAt => timestamp(&a.created_at).cmp(&timestamp(&b.created_at)),
    }
}

/// Filter then sort. Ties keep their fetched order.
pub fn apply(travels: &[Travel], query: &TravelQuery) -> Vec<Travel> {
    let mut result: Vec<Travel> = travels
        .iter()
        .filter(|t| match query.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => t.status_enum() == status,
        })
        .cloned()
        .collect();

    result.sort_by(|a, b| {
        let ord = compare(a, b, query.sort);
        match query.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        }
    });
    result
}

/// Newest first, filtered, at most `limit` entries
pub fn recent(travels: &[Travel], status: StatusFilter, limit: usize) -> Vec<Travel> {
    let query = TravelQuery {
        status,
        sort: SortKey::CreatedAt,
        direction: SortDirection::Descending,
    };
    let mut result = apply(travels, &query);
    result.truncate(limit);
    result
}

pub fn statistics(travels: &[Travel]) -> TravelStatistics {
    let count = |status: TravelStatus| travels.iter().filter(|t| t.status_enum() == status).count();
    TravelStatistics {
        total_requests: travels.len(),
        pending_requests: count(TravelStatus::Pending),
        approved_requests: count(TravelStatus::Approved),
        rejected_requests: count(TravelStatus::Rejected),
    }
}

/// Field checks run before a travel form is submitted. Keys are the
/// camelCase field names; an empty map means the form is valid.
pub fn validate_form(form: &CreateTravelRequest) -> BTreeMap<&'static str, String> {
    let mut errors = BTreeMap::new();

    let destination = form.destination.trim();
    if destination.is_empty() {
        errors.insert("destination", "Destination is required".to_string());
    } else if destination.chars().count() < 2 {
        errors.insert("destination", "Destination must be at least 2 characters".to_string());
    } else if destination.chars().count() > MAX_DESTINATION_LEN {
        errors.insert("destination", "Destination is too long".to_string());
    }

    let purpose = form.purpose.trim();
    if purpose.is_empty() {
        errors.insert("purpose", "Purpose is required".to_string());
    } else if purpose.chars().count() < 5 {
        errors.insert("purpose", "Purpose must be at least 5 characters".to_string());
    } else if purpose.chars().count() > MAX_PURPOSE_LEN {
        errors.insert("purpose", "Purpose is too long".to_string());
    }

    if !form.estimated_cost.is_finite() || form.estimated_cost < 0.0 {
        errors.insert("estimatedCost", "Estimated cost must be zero or more".to_string());
    }

    let start = match parse_travel_date(&form.start_date) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert("startDate", "A valid start date is required".to_string());
            None
        }
    };
    let end = match parse_travel_date(&form.end_date) {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert("endDate", "A valid end date is required".to_string());
            None
        }
    };
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            errors.insert("endDate", "End date must not be before the start date".to_string());
        }
    }

    errors
}
