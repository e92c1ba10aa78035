use rusqlite::{Connection, OptionalExtension, Row, params};

use gather_types::api::DashboardStats;
use gather_types::models::{EventStatus, RegistrationStatus};

use crate::Database;
use crate::error::DomainError;
use crate::models::{EventFilter, EventPatch, EventRow, NewEvent, NewUser, RegistrationRow, UserRow};

const EVENT_COLS: &str = "e.id, e.title, e.description, e.event_date, e.event_time, e.location, \
     e.quota, e.fee, e.status, e.registered_count, e.created_by, u.fullname, e.created_at";

const EVENT_FROM: &str = "FROM events e LEFT JOIN users u ON e.created_by = u.id";

const REGISTRATION_COLS: &str = "r.id, r.event_id, r.user_id, r.status, r.notes, \
     r.registration_date, u.fullname, u.username, u.email, \
     e.title, e.event_date, e.event_time, e.location, e.fee, e.status";

const REGISTRATION_FROM: &str = "FROM registrations r \
     LEFT JOIN users u ON r.user_id = u.id \
     LEFT JOIN events e ON r.event_id = e.id";

impl Database {
    // -- Users --

    pub fn create_user(&self, new: &NewUser) -> Result<UserRow, DomainError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, fullname, email, role)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.username,
                    new.password_hash,
                    new.fullname,
                    new.email,
                    new.role.as_str()
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_user_by_id(conn, id)?.ok_or(DomainError::NotFound("user"))
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, DomainError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, username, password, fullname, email, role, created_at
                 FROM users WHERE username = ?1",
            )?
            .query_row([username], map_user_row)
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DomainError> {
        self.with_conn(|conn| {
            conn.prepare(
                "SELECT id, username, password, fullname, email, role, created_at
                 FROM users WHERE email = ?1",
            )?
            .query_row([email], map_user_row)
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>, DomainError> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Startup bootstrap: create the admin account if the username is absent.
    /// Returns true if a row was inserted.
    pub fn ensure_admin(&self, username: &str, password_hash: &str) -> Result<bool, DomainError> {
        self.with_conn(|conn| {
            let existing: Option<i64> = conn
                .query_row("SELECT id FROM users WHERE username = ?1", [username], |r| {
                    r.get(0)
                })
                .optional()?;
            if existing.is_some() {
                return Ok(false);
            }
            conn.execute(
                "INSERT INTO users (username, password, fullname, email, role)
                 VALUES (?1, ?2, 'Administrator', ?3, 'admin')",
                params![username, password_hash, format!("{username}@localhost")],
            )?;
            Ok(true)
        })
    }

    // -- Events --

    pub fn create_event(&self, new: &NewEvent, created_by: i64) -> Result<EventRow, DomainError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events
                     (title, description, event_date, event_time, location, quota, fee, status, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.title,
                    new.description,
                    new.event_date.to_string(),
                    new.event_time,
                    new.location,
                    new.quota,
                    new.fee,
                    new.status.as_str(),
                    created_by
                ],
            )?;
            let id = conn.last_insert_rowid();
            query_event(conn, id)?.ok_or(DomainError::NotFound("event"))
        })
    }

    pub fn get_event(&self, id: i64) -> Result<EventRow, DomainError> {
        self.with_conn(|conn| query_event(conn, id)?.ok_or(DomainError::NotFound("event")))
    }

    pub fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventRow>, DomainError> {
        self.with_conn(|conn| {
            let mut clauses: Vec<&str> = Vec::new();
            let mut bind: Vec<String> = Vec::new();

            if let Some(status) = filter.status {
                clauses.push("e.status = ?");
                bind.push(status.as_str().to_string());
            }
            if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
                clauses.push("(e.title LIKE ? OR e.description LIKE ? OR e.location LIKE ?)");
                let pattern = format!("%{}%", search.trim());
                bind.push(pattern.clone());
                bind.push(pattern.clone());
                bind.push(pattern);
            }

            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };

            // Sort column and direction come from closed enums, never from
            // the request text.
            let sql = format!(
                "SELECT {EVENT_COLS} {EVENT_FROM} {where_clause} ORDER BY {} {}",
                filter.sort.column(),
                filter.order.sql()
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(bind.iter()), map_event_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn update_event(&self, id: i64, patch: &EventPatch) -> Result<EventRow, DomainError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let registered_count: i64 = tx
                .query_row("SELECT registered_count FROM events WHERE id = ?1", [id], |r| {
                    r.get(0)
                })
                .optional()?
                .ok_or(DomainError::NotFound("event"))?;

            if let Some(quota) = patch.quota
                && quota < registered_count
            {
                return Err(DomainError::validation([format!(
                    "quota cannot be below the current registered count ({registered_count})"
                )]));
            }

            tx.execute(
                "UPDATE events SET
                     title       = COALESCE(?1, title),
                     description = COALESCE(?2, description),
                     event_date  = COALESCE(?3, event_date),
                     event_time  = COALESCE(?4, event_time),
                     location    = COALESCE(?5, location),
                     quota       = COALESCE(?6, quota),
                     fee         = COALESCE(?7, fee),
                     status      = COALESCE(?8, status)
                 WHERE id = ?9",
                params![
                    patch.title,
                    patch.description,
                    patch.event_date.map(|d| d.to_string()),
                    patch.event_time,
                    patch.location,
                    patch.quota,
                    patch.fee,
                    patch.status.map(|s| s.as_str()),
                    id
                ],
            )?;

            let row = query_event(&tx, id)?.ok_or(DomainError::NotFound("event"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Deletes the event; the FK cascade removes its registrations in the
    /// same statement.
    pub fn delete_event(&self, id: i64) -> Result<(), DomainError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(DomainError::NotFound("event"));
            }
            Ok(())
        })
    }

    // -- Registrations --

    /// Capacity-checked registration. The whole read-check-write sequence
    /// runs in one transaction, and the increment re-checks capacity in its
    /// WHERE clause, so concurrent callers can never overbook an event.
    pub fn register_for_event(
        &self,
        event_id: i64,
        user_id: i64,
        notes: &str,
    ) -> Result<RegistrationRow, DomainError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let (quota, registered_count, status): (i64, i64, String) = tx
                .query_row(
                    "SELECT quota, registered_count, status FROM events WHERE id = ?1",
                    [event_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?
                .ok_or(DomainError::NotFound("event"))?;

            if status != EventStatus::Open.as_str() {
                return Err(DomainError::EventNotOpen);
            }
            if registered_count >= quota {
                return Err(DomainError::EventFull);
            }

            let duplicate: Option<i64> = tx
                .query_row(
                    "SELECT id FROM registrations
                     WHERE event_id = ?1 AND user_id = ?2 AND status != 'cancelled'",
                    params![event_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            if duplicate.is_some() {
                return Err(DomainError::DuplicateRegistration);
            }

            tx.execute(
                "INSERT INTO registrations (event_id, user_id, status, notes)
                 VALUES (?1, ?2, 'pending', ?3)",
                params![event_id, user_id, notes],
            )?;
            let registration_id = tx.last_insert_rowid();

            let updated = tx.execute(
                "UPDATE events SET registered_count = registered_count + 1
                 WHERE id = ?1 AND registered_count < quota AND status = 'open'",
                [event_id],
            )?;
            if updated == 0 {
                // the guarded increment refused: capacity went stale under us
                return Err(DomainError::EventFull);
            }

            let row = query_registration(&tx, registration_id)?
                .ok_or(DomainError::NotFound("registration"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Status transition with role checks. Approval is admin-only;
    /// cancellation is allowed for the owner or an admin. A transition into
    /// `cancelled` frees the slot in the same transaction.
    pub fn set_registration_status(
        &self,
        id: i64,
        new_status: RegistrationStatus,
        acting_user_id: i64,
        acting_is_admin: bool,
    ) -> Result<RegistrationRow, DomainError> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let (owner_id, current_raw): (i64, String) = tx
                .query_row(
                    "SELECT user_id, status FROM registrations WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
                .ok_or(DomainError::NotFound("registration"))?;
            let current =
                RegistrationStatus::parse(&current_raw).unwrap_or(RegistrationStatus::Cancelled);

            let allowed = match new_status {
                RegistrationStatus::Cancelled => acting_is_admin || owner_id == acting_user_id,
                RegistrationStatus::Approved | RegistrationStatus::Pending => acting_is_admin,
            };
            if !allowed {
                return Err(DomainError::Forbidden);
            }

            if !current.can_transition_to(new_status) {
                return Err(DomainError::InvalidTransition {
                    from: current,
                    to: new_status,
                });
            }

            tx.execute(
                "UPDATE registrations SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;

            if new_status == RegistrationStatus::Cancelled {
                tx.execute(
                    "UPDATE events SET registered_count = registered_count - 1
                     WHERE id = (SELECT event_id FROM registrations WHERE id = ?1)
                       AND registered_count > 0",
                    [id],
                )?;
            }

            let row =
                query_registration(&tx, id)?.ok_or(DomainError::NotFound("registration"))?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Owner-side cancel. Same transition as `set_registration_status` but
    /// never grants the admin shortcut, so only the owning user passes.
    pub fn cancel_registration(
        &self,
        id: i64,
        acting_user_id: i64,
    ) -> Result<RegistrationRow, DomainError> {
        self.set_registration_status(id, RegistrationStatus::Cancelled, acting_user_id, false)
    }

    pub fn list_registrations_for_event(
        &self,
        event_id: i64,
    ) -> Result<Vec<RegistrationRow>, DomainError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REGISTRATION_COLS} {REGISTRATION_FROM}
                 WHERE r.event_id = ?1 ORDER BY r.registration_date DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([event_id], map_registration_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_registrations_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RegistrationRow>, DomainError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {REGISTRATION_COLS} {REGISTRATION_FROM}
                 WHERE r.user_id = ?1 ORDER BY r.registration_date DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_registration_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn list_all_registrations(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<Vec<RegistrationRow>, DomainError> {
        self.with_conn(|conn| {
            let rows = match status {
                Some(status) => {
                    let sql = format!(
                        "SELECT {REGISTRATION_COLS} {REGISTRATION_FROM}
                         WHERE r.status = ?1 ORDER BY r.registration_date DESC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([status.as_str()], map_registration_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
                None => {
                    let sql = format!(
                        "SELECT {REGISTRATION_COLS} {REGISTRATION_FROM}
                         ORDER BY r.registration_date DESC"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    stmt.query_map([], map_registration_row)?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                }
            };
            Ok(rows)
        })
    }

    // -- Dashboard --

    /// Aggregate counters for the dashboard. `caller` is (user_id, is_admin)
    /// when a session is present; anonymous callers get zeroed personal
    /// counters.
    pub fn dashboard_stats(
        &self,
        caller: Option<(i64, bool)>,
    ) -> Result<DashboardStats, DomainError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<i64, rusqlite::Error> {
                conn.query_row(sql, [], |r| r.get(0))
            };

            let total_events = count("SELECT COUNT(*) FROM events")?;
            let active_events = count("SELECT COUNT(*) FROM events WHERE status = 'open'")?;
            let total_registrations =
                count("SELECT COUNT(*) FROM registrations WHERE status != 'cancelled'")?;
            let upcoming_events =
                count("SELECT COUNT(*) FROM events WHERE event_date >= date('now')")?;

            // Revenue counts fee per occupied slot, pending included; the
            // dashboard has always reported it this way.
            let total_revenue: f64 = conn.query_row(
                "SELECT COALESCE(SUM(fee * registered_count), 0) FROM events",
                [],
                |r| r.get(0),
            )?;

            let my_registrations = match caller {
                Some((user_id, _)) => conn.query_row(
                    "SELECT COUNT(*) FROM registrations
                     WHERE user_id = ?1 AND status != 'cancelled'",
                    [user_id],
                    |r| r.get(0),
                )?,
                None => 0,
            };

            let pending_registrations = match caller {
                Some((_, true)) => {
                    count("SELECT COUNT(*) FROM registrations WHERE status = 'pending'")?
                }
                _ => 0,
            };

            Ok(DashboardStats {
                total_events,
                active_events,
                total_registrations,
                upcoming_events,
                total_revenue,
                my_registrations,
                pending_registrations,
            })
        })
    }

    /// Open events by registration count, busiest first, earliest date
    /// breaking ties. Returns each row with its occupancy percentage.
    pub fn popular_events(&self, limit: u32) -> Result<Vec<(EventRow, f64)>, DomainError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLS}, ROUND(e.registered_count * 100.0 / e.quota, 2)
                 {EVENT_FROM}
                 WHERE e.status = 'open'
                 ORDER BY e.registered_count DESC, e.event_date ASC
                 LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], |row| Ok((map_event_row(row)?, row.get(13)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn recent_events(&self, limit: u32) -> Result<Vec<EventRow>, DomainError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {EVENT_COLS} {EVENT_FROM} ORDER BY e.created_at DESC, e.id DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], map_event_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>, DomainError> {
    conn.prepare(
        "SELECT id, username, password, fullname, email, role, created_at
         FROM users WHERE id = ?1",
    )?
    .query_row([id], map_user_row)
    .optional()
    .map_err(Into::into)
}

fn query_event(conn: &Connection, id: i64) -> Result<Option<EventRow>, DomainError> {
    let sql = format!("SELECT {EVENT_COLS} {EVENT_FROM} WHERE e.id = ?1");
    conn.prepare(&sql)?
        .query_row([id], map_event_row)
        .optional()
        .map_err(Into::into)
}

fn query_registration(conn: &Connection, id: i64) -> Result<Option<RegistrationRow>, DomainError> {
    let sql = format!("SELECT {REGISTRATION_COLS} {REGISTRATION_FROM} WHERE r.id = ?1");
    conn.prepare(&sql)?
        .query_row([id], map_registration_row)
        .optional()
        .map_err(Into::into)
}

fn map_user_row(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        fullname: row.get(3)?,
        email: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_event_row(row: &Row) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        event_date: row.get(3)?,
        event_time: row.get(4)?,
        location: row.get(5)?,
        quota: row.get(6)?,
        fee: row.get(7)?,
        status: row.get(8)?,
        registered_count: row.get(9)?,
        created_by: row.get(10)?,
        creator_name: row.get(11)?,
        created_at: row.get(12)?,
    })
}

fn map_registration_row(row: &Row) -> rusqlite::Result<RegistrationRow> {
    Ok(RegistrationRow {
        id: row.get(0)?,
        event_id: row.get(1)?,
        user_id: row.get(2)?,
        status: row.get(3)?,
        notes: row.get(4)?,
        registration_date: row.get(5)?,
        fullname: row.get(6)?,
        username: row.get(7)?,
        email: row.get(8)?,
        event_title: row.get(9)?,
        event_date: row.get(10)?,
        event_time: row.get(11)?,
        location: row.get(12)?,
        fee: row.get(13)?,
        event_status: row.get(14)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventSortField, SortDirection};
    use chrono::NaiveDate;
    use gather_types::models::{AvailabilityStatus, Role};
    use std::sync::Arc;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, username: &str, role: Role) -> i64 {
        db.create_user(&NewUser {
            username: username.to_string(),
            password_hash: "x".to_string(),
            fullname: format!("{username} Test"),
            email: format!("{username}@example.com"),
            role,
        })
        .unwrap()
        .id
    }

    fn new_event(quota: i64) -> NewEvent {
        NewEvent {
            title: "Rust Meetup".to_string(),
            description: "Monthly meetup".to_string(),
            event_date: NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
            event_time: "18:30".to_string(),
            location: "Main Hall".to_string(),
            quota,
            fee: 25.0,
            status: EventStatus::Open,
        }
    }

    fn seed_event(db: &Database, created_by: i64, quota: i64) -> i64 {
        db.create_event(&new_event(quota), created_by).unwrap().id
    }

    fn non_cancelled_count(db: &Database, event_id: i64) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM registrations
                 WHERE event_id = ?1 AND status != 'cancelled'",
                [event_id],
                |r| r.get(0),
            )
            .map_err(Into::into)
        })
        .unwrap()
    }

    #[test]
    fn register_consumes_quota() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let b = seed_user(&db, "bob", Role::User);
        let c = seed_user(&db, "carol", Role::User);
        let event_id = seed_event(&db, admin, 2);

        let reg = db.register_for_event(event_id, a, "").unwrap();
        assert_eq!(reg.status(), RegistrationStatus::Pending);
        assert_eq!(reg.event_title.as_deref(), Some("Rust Meetup"));

        db.register_for_event(event_id, b, "veggie meal please").unwrap();

        let err = db.register_for_event(event_id, c, "").unwrap_err();
        assert!(matches!(err, DomainError::EventFull));

        let event = db.get_event(event_id).unwrap();
        assert_eq!(event.registered_count, 2);
        assert_eq!(event.registered_count, non_cancelled_count(&db, event_id));
    }

    #[test]
    fn quota_one_scenario() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let b = seed_user(&db, "bob", Role::User);
        let event_id = seed_event(&db, admin, 1);

        db.register_for_event(event_id, a, "").unwrap();
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 1);

        let err = db.register_for_event(event_id, b, "").unwrap_err();
        assert!(matches!(err, DomainError::EventFull));
    }

    #[test]
    fn duplicate_registration_rejected_until_cancelled() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);

        let reg = db.register_for_event(event_id, a, "").unwrap();
        let err = db.register_for_event(event_id, a, "").unwrap_err();
        assert!(matches!(err, DomainError::DuplicateRegistration));

        // cancelling frees the pair for a fresh registration
        db.cancel_registration(reg.id, a).unwrap();
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 0);
        db.register_for_event(event_id, a, "second try").unwrap();
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 1);
    }

    #[test]
    fn register_against_closed_event() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);

        db.update_event(
            event_id,
            &EventPatch {
                status: Some(EventStatus::Closed),
                ..Default::default()
            },
        )
        .unwrap();

        let err = db.register_for_event(event_id, a, "").unwrap_err();
        assert!(matches!(err, DomainError::EventNotOpen));
    }

    #[test]
    fn register_against_missing_event() {
        let db = test_db();
        let a = seed_user(&db, "alice", Role::User);
        let err = db.register_for_event(9999, a, "").unwrap_err();
        assert!(matches!(err, DomainError::NotFound("event")));
    }

    #[test]
    fn cancel_decrements_once_and_is_terminal() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);

        let reg = db.register_for_event(event_id, a, "").unwrap();
        db.set_registration_status(reg.id, RegistrationStatus::Approved, admin, true)
            .unwrap();
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 1);

        let cancelled = db
            .set_registration_status(reg.id, RegistrationStatus::Cancelled, a, false)
            .unwrap();
        assert_eq!(cancelled.status(), RegistrationStatus::Cancelled);
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 0);

        let err = db
            .set_registration_status(reg.id, RegistrationStatus::Cancelled, a, false)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
        // the failed re-cancel must not touch the counter
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 0);
    }

    #[test]
    fn approve_requires_admin() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);

        let reg = db.register_for_event(event_id, a, "").unwrap();
        let err = db
            .set_registration_status(reg.id, RegistrationStatus::Approved, a, false)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        // state unchanged
        let rows = db.list_registrations_for_user(a).unwrap();
        assert_eq!(rows[0].status(), RegistrationStatus::Pending);
    }

    #[test]
    fn cancel_requires_owner_or_admin() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let b = seed_user(&db, "bob", Role::User);
        let event_id = seed_event(&db, admin, 5);

        let reg = db.register_for_event(event_id, a, "").unwrap();

        let err = db.cancel_registration(reg.id, b).unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));

        // admin may cancel on the user's behalf via set_status
        db.set_registration_status(reg.id, RegistrationStatus::Cancelled, admin, true)
            .unwrap();
    }

    #[test]
    fn approved_cannot_return_to_pending() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);

        let reg = db.register_for_event(event_id, a, "").unwrap();
        db.set_registration_status(reg.id, RegistrationStatus::Approved, admin, true)
            .unwrap();

        let err = db
            .set_registration_status(reg.id, RegistrationStatus::Pending, admin, true)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[test]
    fn concurrent_registrations_never_overbook() {
        let db = Arc::new(test_db());
        let admin = seed_user(&db, "admin", Role::Admin);
        let event_id = seed_event(&db, admin, 3);

        let users: Vec<i64> = (0..8)
            .map(|i| seed_user(&db, &format!("user{i}"), Role::User))
            .collect();

        let handles: Vec<_> = users
            .into_iter()
            .map(|user_id| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.register_for_event(event_id, user_id, ""))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let full = results
            .iter()
            .filter(|r| matches!(r, Err(DomainError::EventFull)))
            .count();

        assert_eq!(successes, 3);
        assert_eq!(full, 5);
        assert_eq!(db.get_event(event_id).unwrap().registered_count, 3);
        assert_eq!(non_cancelled_count(&db, event_id), 3);
    }

    #[test]
    fn create_then_get_round_trip() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let event_id = seed_event(&db, admin, 40);

        let event = db.get_event(event_id).unwrap().into_event();
        assert_eq!(event.title, "Rust Meetup");
        assert_eq!(event.description, "Monthly meetup");
        assert_eq!(event.event_date, NaiveDate::from_ymd_opt(2030, 6, 15).unwrap());
        assert_eq!(event.event_time, "18:30");
        assert_eq!(event.location, "Main Hall");
        assert_eq!(event.quota, 40);
        assert_eq!(event.fee, 25.0);
        assert_eq!(event.status, EventStatus::Open);
        assert_eq!(event.registered_count, 0);
        assert_eq!(event.available_slots, 40);
        assert_eq!(event.availability_status, AvailabilityStatus::Available);
        assert_eq!(event.creator_name.as_deref(), Some("admin Test"));
    }

    #[test]
    fn get_missing_event() {
        let db = test_db();
        let err = db.get_event(42).unwrap_err();
        assert!(matches!(err, DomainError::NotFound("event")));
    }

    #[test]
    fn update_touches_only_supplied_fields() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let event_id = seed_event(&db, admin, 10);

        let updated = db
            .update_event(
                event_id,
                &EventPatch {
                    title: Some("Rust Meetup (rescheduled)".to_string()),
                    fee: Some(0.0),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Rust Meetup (rescheduled)");
        assert_eq!(updated.fee, 0.0);
        // untouched fields survive
        assert_eq!(updated.location, "Main Hall");
        assert_eq!(updated.quota, 10);
    }

    #[test]
    fn update_rejects_quota_below_registered_count() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let b = seed_user(&db, "bob", Role::User);
        let event_id = seed_event(&db, admin, 10);
        db.register_for_event(event_id, a, "").unwrap();
        db.register_for_event(event_id, b, "").unwrap();

        let err = db
            .update_event(
                event_id,
                &EventPatch {
                    quota: Some(1),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        // shrinking to exactly the registered count is fine
        let updated = db
            .update_event(
                event_id,
                &EventPatch {
                    quota: Some(2),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.quota, 2);
        assert_eq!(
            AvailabilityStatus::from_counts(updated.registered_count, updated.quota),
            AvailabilityStatus::Full
        );
    }

    #[test]
    fn delete_event_cascades_registrations() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let event_id = seed_event(&db, admin, 5);
        db.register_for_event(event_id, a, "").unwrap();

        db.delete_event(event_id).unwrap();
        assert!(db.list_registrations_for_user(a).unwrap().is_empty());

        let err = db.delete_event(event_id).unwrap_err();
        assert!(matches!(err, DomainError::NotFound("event")));
    }

    #[test]
    fn sort_field_falls_back_to_event_date() {
        assert_eq!(
            EventSortField::from_param(Some("dropTable")),
            EventSortField::EventDate
        );
        assert_eq!(
            EventSortField::from_param(Some("registered_count")),
            EventSortField::RegisteredCount
        );
        assert_eq!(EventSortField::from_param(None), EventSortField::EventDate);
        assert_eq!(SortDirection::from_param(Some("DESC")), SortDirection::Desc);
        assert_eq!(SortDirection::from_param(Some("sideways")), SortDirection::Asc);

        // and an arbitrary sort param still lists fine
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        seed_event(&db, admin, 5);
        let filter = EventFilter {
            sort: EventSortField::from_param(Some("dropTable")),
            order: SortDirection::from_param(Some("sideways")),
            ..Default::default()
        };
        assert_eq!(db.list_events(&filter).unwrap().len(), 1);
    }

    #[test]
    fn list_filters_by_status_and_search() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);

        let open_id = db.create_event(&new_event(5), admin).unwrap().id;
        let mut closed = new_event(5);
        closed.title = "Winter Gala".to_string();
        closed.status = EventStatus::Closed;
        db.create_event(&closed, admin).unwrap();

        let open_only = db
            .list_events(&EventFilter {
                status: Some(EventStatus::Open),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(open_only.len(), 1);
        assert_eq!(open_only[0].id, open_id);

        // case-insensitive substring over title/description/location
        let hits = db
            .list_events(&EventFilter {
                search: Some("gala".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Winter Gala");

        let by_location = db
            .list_events(&EventFilter {
                search: Some("main hall".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_location.len(), 2);

        let none = db
            .list_events(&EventFilter {
                search: Some("nowhere".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn dashboard_stats_counts() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);
        let b = seed_user(&db, "bob", Role::User);
        let event_id = seed_event(&db, admin, 10);

        let mut closed = new_event(5);
        closed.status = EventStatus::Closed;
        closed.title = "Past Workshop".to_string();
        db.create_event(&closed, admin).unwrap();

        db.register_for_event(event_id, a, "").unwrap();
        let reg_b = db.register_for_event(event_id, b, "").unwrap();
        db.set_registration_status(reg_b.id, RegistrationStatus::Approved, admin, true)
            .unwrap();

        let stats = db.dashboard_stats(Some((a, false))).unwrap();
        assert_eq!(stats.total_events, 2);
        assert_eq!(stats.active_events, 1);
        assert_eq!(stats.total_registrations, 2);
        assert_eq!(stats.upcoming_events, 2);
        // fee 25.0 × 2 occupied slots, pending included
        assert_eq!(stats.total_revenue, 50.0);
        assert_eq!(stats.my_registrations, 1);
        // non-admin never sees the pending counter
        assert_eq!(stats.pending_registrations, 0);

        let admin_stats = db.dashboard_stats(Some((admin, true))).unwrap();
        assert_eq!(admin_stats.pending_registrations, 1);
        assert_eq!(admin_stats.my_registrations, 0);

        let anon = db.dashboard_stats(None).unwrap();
        assert_eq!(anon.my_registrations, 0);
        assert_eq!(anon.pending_registrations, 0);
        assert_eq!(anon.total_events, 2);
    }

    #[test]
    fn popular_orders_by_count_then_date() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let a = seed_user(&db, "alice", Role::User);

        let mut early = new_event(4);
        early.title = "Early".to_string();
        early.event_date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let early_id = db.create_event(&early, admin).unwrap().id;

        let mut late = new_event(4);
        late.title = "Late".to_string();
        late.event_date = NaiveDate::from_ymd_opt(2030, 12, 1).unwrap();
        let late_id = db.create_event(&late, admin).unwrap().id;

        let mut busy = new_event(4);
        busy.title = "Busy".to_string();
        let busy_id = db.create_event(&busy, admin).unwrap().id;
        db.register_for_event(busy_id, a, "").unwrap();

        let popular = db.popular_events(5).unwrap();
        let ids: Vec<i64> = popular.iter().map(|(e, _)| e.id).collect();
        assert_eq!(ids, vec![busy_id, early_id, late_id]);
        assert_eq!(popular[0].1, 25.0);
        assert_eq!(popular[1].1, 0.0);
    }

    #[test]
    fn recent_orders_by_creation() {
        let db = test_db();
        let admin = seed_user(&db, "admin", Role::Admin);
        let first = seed_event(&db, admin, 5);
        let second = seed_event(&db, admin, 5);

        let recent = db.recent_events(5).unwrap();
        assert_eq!(recent[0].id, second);
        assert_eq!(recent[1].id, first);

        assert_eq!(db.recent_events(1).unwrap().len(), 1);
    }

    #[test]
    fn ensure_admin_is_idempotent() {
        let db = test_db();
        assert!(db.ensure_admin("root", "hash").unwrap());
        assert!(!db.ensure_admin("root", "other-hash").unwrap());

        let user = db.get_user_by_username("root").unwrap().unwrap();
        assert_eq!(user.role(), Role::Admin);
        // second call must not overwrite the original credential
        assert_eq!(user.password, "hash");
    }
}
