//! Boundary validation: raw request DTOs turn into typed storage inputs
//! here, with every violated field reported, not just the first.

use chrono::{NaiveDate, NaiveTime};

use gather_db::DomainError;
use gather_db::models::{EventPatch, NewEvent};
use gather_types::api::{CreateEventRequest, SignupRequest, UpdateEventRequest};
use gather_types::models::EventStatus;

pub fn validate_signup(req: &SignupRequest) -> Result<(), DomainError> {
    let mut errors = Vec::new();

    let username = req.username.trim();
    if username.len() < 3 || username.len() > 50 {
        errors.push("username must be 3-50 characters".to_string());
    }
    if req.password.len() < 6 {
        errors.push("password must be at least 6 characters".to_string());
    }
    if let Some(confirm) = &req.confirm_password
        && confirm != &req.password
    {
        errors.push("password and confirmation do not match".to_string());
    }
    if req.fullname.trim().is_empty() {
        errors.push("fullname must not be empty".to_string());
    }
    if !is_valid_email(req.email.trim()) {
        errors.push("email must be a valid address".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DomainError::Validation(errors))
    }
}

pub fn validate_new_event(req: &CreateEventRequest) -> Result<NewEvent, DomainError> {
    let mut errors = Vec::new();

    let title = req.title.trim();
    if title.is_empty() {
        errors.push("title must not be empty".to_string());
    }
    let description = req.description.trim();
    if description.is_empty() {
        errors.push("description must not be empty".to_string());
    }
    let location = req.location.trim();
    if location.is_empty() {
        errors.push("location must not be empty".to_string());
    }

    let event_date = parse_event_date(&req.event_date);
    if event_date.is_none() {
        errors.push("event_date must be a valid date (YYYY-MM-DD)".to_string());
    }
    let event_time = parse_event_time(&req.event_time);
    if event_time.is_none() {
        errors.push("event_time must be a valid 24h time (HH:MM or HH:MM:SS)".to_string());
    }

    if req.quota < 1 {
        errors.push("quota must be a positive number".to_string());
    }
    if !(req.fee >= 0.0) {
        errors.push("fee must be a non-negative number".to_string());
    }

    let status = match req.status.as_deref() {
        None => Some(EventStatus::Open),
        Some(raw) => {
            let parsed = EventStatus::parse(raw);
            if parsed.is_none() {
                errors.push("status must be one of open, closed, cancelled".to_string());
            }
            parsed
        }
    };

    if !errors.is_empty() {
        return Err(DomainError::Validation(errors));
    }

    Ok(NewEvent {
        title: title.to_string(),
        description: description.to_string(),
        event_date: event_date.unwrap(),
        event_time: event_time.unwrap(),
        location: location.to_string(),
        quota: req.quota,
        fee: req.fee,
        status: status.unwrap(),
    })
}

/// Re-validates every supplied field with the create rules; absent fields
/// stay untouched. Unknown JSON fields were already dropped by serde.
pub fn validate_event_patch(req: &UpdateEventRequest) -> Result<EventPatch, DomainError> {
    let mut errors = Vec::new();
    let mut patch = EventPatch::default();

    if let Some(title) = &req.title {
        let title = title.trim();
        if title.is_empty() {
            errors.push("title must not be empty".to_string());
        } else {
            patch.title = Some(title.to_string());
        }
    }
    if let Some(description) = &req.description {
        let description = description.trim();
        if description.is_empty() {
            errors.push("description must not be empty".to_string());
        } else {
            patch.description = Some(description.to_string());
        }
    }
    if let Some(location) = &req.location {
        let location = location.trim();
        if location.is_empty() {
            errors.push("location must not be empty".to_string());
        } else {
            patch.location = Some(location.to_string());
        }
    }
    if let Some(raw) = &req.event_date {
        match parse_event_date(raw) {
            Some(date) => patch.event_date = Some(date),
            None => errors.push("event_date must be a valid date (YYYY-MM-DD)".to_string()),
        }
    }
    if let Some(raw) = &req.event_time {
        match parse_event_time(raw) {
            Some(time) => patch.event_time = Some(time),
            None => {
                errors.push("event_time must be a valid 24h time (HH:MM or HH:MM:SS)".to_string())
            }
        }
    }
    if let Some(quota) = req.quota {
        if quota < 1 {
            errors.push("quota must be a positive number".to_string());
        } else {
            patch.quota = Some(quota);
        }
    }
    if let Some(fee) = req.fee {
        if !(fee >= 0.0) {
            errors.push("fee must be a non-negative number".to_string());
        } else {
            patch.fee = Some(fee);
        }
    }
    if let Some(raw) = &req.status {
        match EventStatus::parse(raw) {
            Some(status) => patch.status = Some(status),
            None => errors.push("status must be one of open, closed, cancelled".to_string()),
        }
    }

    if !errors.is_empty() {
        return Err(DomainError::Validation(errors));
    }
    if patch.is_empty() {
        return Err(DomainError::validation(["no fields to update".to_string()]));
    }

    Ok(patch)
}

fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Accepts HH:MM or HH:MM:SS, 24h clock; returns the trimmed text for
/// storage.
fn parse_event_time(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let valid = NaiveTime::parse_from_str(raw, "%H:%M:%S").is_ok()
        || NaiveTime::parse_from_str(raw, "%H:%M").is_ok();
    valid.then(|| raw.to_string())
}

pub fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
