//! Input validation for API requests.
//!
//! Field names in error details use the camelCase wire names so clients
//! can attach messages to the right form control.

use chrono::{DateTime, NaiveDate, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{CreateTravelRequest, RegisterRequest, Travel, UpdateTravelRequest};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_DESTINATION_LEN: usize = 200;
pub const MAX_PURPOSE_LEN: usize = 1000;
pub const MIN_PASSWORD_LEN: usize = 8;

lazy_static! {
    /// Loose email shape check: something@something.tld
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    ).unwrap();

    /// Plain calendar date (YYYY-MM-DD)
    static ref DATE_ONLY_REGEX: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate a required person name (first or last)
pub fn validate_name(name: &str, label: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{} is required", label));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!(
            "{} is too long (max {} characters)",
            label, MAX_NAME_LEN
        ));
    }

    Ok(())
}

/// Validate password strength: minimum length plus at least one letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

pub fn validate_destination(destination: &str) -> Result<(), String> {
    if destination.trim().is_empty() {
        return Err("Destination is required".to_string());
    }
    if destination.chars().count() > MAX_DESTINATION_LEN {
        return Err(format!(
            "Destination is too long (max {} characters)",
            MAX_DESTINATION_LEN
        ));
    }
    Ok(())
}

pub fn validate_purpose(purpose: &str) -> Result<(), String> {
    if purpose.trim().is_empty() {
        return Err("Purpose is required".to_string());
    }
    if purpose.chars().count() > MAX_PURPOSE_LEN {
        return Err(format!(
            "Purpose is too long (max {} characters)",
            MAX_PURPOSE_LEN
        ));
    }
    Ok(())
}

pub fn validate_estimated_cost(cost: f64) -> Result<(), String> {
    if !cost.is_finite() {
        return Err("Estimated cost must be a number".to_string());
    }
    if cost < 0.0 {
        return Err("Estimated cost cannot be negative".to_string());
    }
    Ok(())
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date (midnight UTC)
pub fn parse_travel_date(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("Date is required".to_string());
    }

    if DATE_ONLY_REGEX.is_match(value) {
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date: {}", value))?;
        return date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| format!("Invalid date: {}", value));
    }

    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| format!("Invalid date: {} (expected YYYY-MM-DD or RFC 3339)", value))
}

/// Check both dates parse and that the trip does not end before it starts.
/// Returns the normalized RFC 3339 forms.
fn check_date_range(
    builder: &mut ValidationErrorBuilder,
    start: &str,
    end: &str,
) -> Option<(String, String)> {
    let start = match parse_travel_date(start) {
        Ok(d) => Some(d),
        Err(e) => {
            builder.add("startDate", e.replace("Date", "Start date"));
            None
        }
    };
    let end = match parse_travel_date(end) {
        Ok(d) => Some(d),
        Err(e) => {
            builder.add("endDate", e.replace("Date", "End date"));
            None
        }
    };

    let (start, end) = (start?, end?);
    if start > end {
        builder.add("endDate", "End date must not be before the start date");
        return None;
    }

    Some((start.to_rfc3339(), end.to_rfc3339()))
}

/// Validate a sign-up payload
pub fn validate_registration(request: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    if let Err(e) = validate_name(&request.first_name, "First name") {
        errors.add("firstName", e);
    }
    if let Err(e) = validate_name(&request.last_name, "Last name") {
        errors.add("lastName", e);
    }

    errors.finish()
}

/// Validate a new travel request.
///
/// On success returns the normalized (start, end) dates to persist.
pub fn validate_new_travel(request: &CreateTravelRequest) -> Result<(String, String), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_destination(&request.destination) {
        errors.add("destination", e);
    }
    if let Err(e) = validate_purpose(&request.purpose) {
        errors.add("purpose", e);
    }
    if let Err(e) = validate_estimated_cost(request.estimated_cost) {
        errors.add("estimatedCost", e);
    }
    let dates = check_date_range(&mut errors, &request.start_date, &request.end_date);

    errors.finish()?;
    dates.ok_or_else(|| ApiError::validation_field("endDate", "Invalid date range"))
}

/// Apply an owner's field edits to `travel`, validating the merged result
pub fn apply_travel_edits(travel: &mut Travel, request: &UpdateTravelRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if let Some(destination) = &request.destination {
        match validate_destination(destination) {
            Ok(()) => travel.destination = destination.trim().to_string(),
            Err(e) => {
                errors.add("destination", e);
            }
        }
    }
    if let Some(purpose) = &request.purpose {
        match validate_purpose(purpose) {
            Ok(()) => travel.purpose = purpose.trim().to_string(),
            Err(e) => {
                errors.add("purpose", e);
            }
        }
    }
    if let Some(cost) = request.estimated_cost {
        match validate_estimated_cost(cost) {
            Ok(()) => travel.estimated_cost = cost,
            Err(e) => {
                errors.add("estimatedCost", e);
            }
        }
    }

    let start = request.start_date.as_deref().unwrap_or(&travel.start_date).to_string();
    let end = request.end_date.as_deref().unwrap_or(&travel.end_date).to_string();
    if let Some((start, end)) = check_date_range(&mut errors, &start, &end) {
        travel.start_date = start;
        travel.end_date = end;
    }

    errors.finish()
}
