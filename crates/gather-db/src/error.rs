use gather_types::models::RegistrationStatus;
use thiserror::Error;

/// Domain error taxonomy. Everything a handler can surface funnels through
/// here; the API layer maps each variant to a status code and envelope.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("username or password incorrect")]
    InvalidCredentials,

    #[error("insufficient permissions")]
    Forbidden,

    #[error("event is not open for registration")]
    EventNotOpen,

    #[error("event is fully booked")]
    EventFull,

    #[error("already registered for this event")]
    DuplicateRegistration,

    #[error("cannot change registration from {} to {}", from.as_str(), to.as_str())]
    InvalidTransition {
        from: RegistrationStatus,
        to: RegistrationStatus,
    },

    #[error("storage failure")]
    Storage(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(field_errors: impl IntoIterator<Item = String>) -> Self {
        DomainError::Validation(field_errors.into_iter().collect())
    }
}
