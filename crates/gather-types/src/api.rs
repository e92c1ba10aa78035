use serde::{Deserialize, Serialize};

use crate::models::{Event, Registration, User};

/// Uniform response envelope returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            errors: None,
        }
    }

    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn error(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
        }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    pub confirm_password: Option<String>,
    pub fullname: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

// -- Events --

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub quota: i64,
    pub fee: f64,
    pub status: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub quota: Option<i64>,
    pub fee: Option<f64>,
    pub status: Option<String>,
}

/// Single-event view: the event plus its registrations, as the detail
/// page consumes it.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub registrations: Vec<Registration>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PopularEvent {
    #[serde(flatten)]
    pub event: Event,
    pub occupancy_percentage: f64,
}

// -- Registrations --

#[derive(Debug, Deserialize)]
pub struct CreateRegistrationRequest {
    pub event_id: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationRequest {
    /// Raw status text; parsed (and rejected with a field error) at the
    /// handler so bad values still get the envelope shape.
    pub status: String,
}

// -- Dashboard --

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_events: i64,
    pub active_events: i64,
    pub total_registrations: i64,
    pub upcoming_events: i64,
    pub total_revenue: f64,
    pub my_registrations: i64,
    pub pending_registrations: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn envelope_shapes() {
        let ok: Value =
            serde_json::to_value(ApiResponse::ok(json!({"id": 1}), "Created")).unwrap();
        assert_eq!(ok["success"], json!(true));
        assert_eq!(ok["message"], json!("Created"));
        assert_eq!(ok["data"]["id"], json!(1));
        // errors is omitted entirely on success
        assert!(ok.get("errors").is_none());

        let err: Value = serde_json::to_value(ApiResponse::<()>::error(
            "Validation failed",
            Some(vec!["quota must be a positive number".to_string()]),
        ))
        .unwrap();
        assert_eq!(err["success"], json!(false));
        assert_eq!(err["data"], Value::Null);
        assert_eq!(err["errors"][0], json!("quota must be a positive number"));
    }
}
