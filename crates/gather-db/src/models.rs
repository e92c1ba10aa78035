//! Database row types and query inputs. Rows map directly to SQLite rows
//! (timestamps as text) and convert into the `gather-types` API models here,
//! so handlers never touch raw column values.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use gather_types::models::{
    AvailabilityStatus, Event, EventStatus, Registration, RegistrationStatus, Role, User,
};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub fullname: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub fn role(&self) -> Role {
        Role::parse(&self.role).unwrap_or_else(|| {
            warn!("Corrupt role '{}' on user {}", self.role, self.id);
            Role::User
        })
    }

    pub fn into_user(self) -> User {
        let role = self.role();
        User {
            id: self.id,
            username: self.username,
            fullname: self.fullname,
            email: self.email,
            role,
        }
    }
}

pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub fullname: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug)]
pub struct EventRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub event_date: String,
    pub event_time: String,
    pub location: String,
    pub quota: i64,
    pub fee: f64,
    pub status: String,
    pub registered_count: i64,
    pub created_by: i64,
    pub creator_name: Option<String>,
    pub created_at: String,
}

impl EventRow {
    pub fn into_event(self) -> Event {
        let status = EventStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on event {}", self.status, self.id);
            EventStatus::Closed
        });
        let event_date = parse_date(&self.event_date, self.id);
        let available_slots = self.quota - self.registered_count;
        let availability_status =
            AvailabilityStatus::from_counts(self.registered_count, self.quota);

        Event {
            id: self.id,
            title: self.title,
            description: self.description,
            event_date,
            event_time: self.event_time,
            location: self.location,
            quota: self.quota,
            fee: self.fee,
            status,
            registered_count: self.registered_count,
            created_by: self.created_by,
            creator_name: self.creator_name,
            created_at: parse_timestamp(&self.created_at),
            available_slots,
            availability_status,
        }
    }
}

/// Validated input for event creation. Built by the API layer's validator;
/// by the time this exists all field rules have passed.
#[derive(Debug)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub event_date: NaiveDate,
    pub event_time: String,
    pub location: String,
    pub quota: i64,
    pub fee: f64,
    pub status: EventStatus,
}

/// Partial event update. `None` fields are left untouched.
#[derive(Debug, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<NaiveDate>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub quota: Option<i64>,
    pub fee: Option<f64>,
    pub status: Option<EventStatus>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.event_date.is_none()
            && self.event_time.is_none()
            && self.location.is_none()
            && self.quota.is_none()
            && self.fee.is_none()
            && self.status.is_none()
    }
}

/// Allow-listed sort fields for event listings. Anything outside the enum
/// falls back to the event date, never into the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSortField {
    #[default]
    EventDate,
    Title,
    Quota,
    RegisteredCount,
    Fee,
    CreatedAt,
}

impl EventSortField {
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("event_date") => EventSortField::EventDate,
            Some("title") => EventSortField::Title,
            Some("quota") => EventSortField::Quota,
            Some("registered_count") => EventSortField::RegisteredCount,
            Some("fee") => EventSortField::Fee,
            Some("created_at") => EventSortField::CreatedAt,
            _ => EventSortField::default(),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            EventSortField::EventDate => "e.event_date",
            EventSortField::Title => "e.title",
            EventSortField::Quota => "e.quota",
            EventSortField::RegisteredCount => "e.registered_count",
            EventSortField::Fee => "e.fee",
            EventSortField::CreatedAt => "e.created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::to_ascii_lowercase).as_deref() {
            Some("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub search: Option<String>,
    pub sort: EventSortField,
    pub order: SortDirection,
}

#[derive(Debug)]
pub struct RegistrationRow {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    pub status: String,
    pub notes: String,
    pub registration_date: String,
    pub fullname: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub event_title: Option<String>,
    pub event_date: Option<String>,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub fee: Option<f64>,
    pub event_status: Option<String>,
}

impl RegistrationRow {
    pub fn status(&self) -> RegistrationStatus {
        RegistrationStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on registration {}", self.status, self.id);
            RegistrationStatus::Cancelled
        })
    }

    pub fn into_registration(self) -> Registration {
        let status = self.status();
        Registration {
            id: self.id,
            event_id: self.event_id,
            user_id: self.user_id,
            status,
            notes: self.notes,
            registration_date: parse_timestamp(&self.registration_date),
            fullname: self.fullname,
            username: self.username,
            email: self.email,
            event_title: self.event_title,
            event_date: self.event_date.as_deref().map(|d| parse_date(d, self.id)),
            event_time: self.event_time,
            location: self.location,
            fee: self.fee,
            event_status: self.event_status.as_deref().and_then(EventStatus::parse),
        }
    }
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
/// Parse as naive UTC and convert, falling back through RFC 3339.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

pub(crate) fn parse_date(raw: &str, row_id: i64) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap_or_else(|e| {
        warn!("Corrupt date '{}' on row {}: {}", raw, row_id, e);
        NaiveDate::default()
    })
}
