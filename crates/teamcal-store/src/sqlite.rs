//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for teamcal. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};

use teamcal_core::{
    ActivityEntry, AttendeeStatus, CoreError, Event, EventAttendee, EventId, EventPermission,
    EventType, GroupAdmin, Grouping, GroupingId, Role, Team, TeamId, TeamMember, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ActivityQuery, EventQuery, EventUpdate, InsertResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row mapping
// ─────────────────────────────────────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, name, password_hash, role, encrypted_private_key, \
                            email_verified, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, user_id, title, description, start_time, end_time, is_private, \
                             is_out_of_office, event_type, encrypted_data, created_at, updated_at";

const GROUPING_COLUMNS: &str = "id, name, color, user_id, created_at";

const GROUP_ADMIN_COLUMNS: &str = "grouping_id, user_id, assigned_by, assigned_at";

const PERMISSION_COLUMNS: &str =
    "event_id, user_id, can_edit, can_delete, granted_by, granted_at";

const TEAM_COLUMNS: &str = "id, name, parent_team_id, is_private, created_by, created_at";

const MEMBER_COLUMNS: &str = "team_id, user_id, is_admin, joined_at";

const ATTENDEE_COLUMNS: &str = "event_id, user_id, status, invited_via_team_id, invited_at";

const ACTIVITY_COLUMNS: &str =
    "id, user_id, action, entity_type, entity_id, details, created_at";

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Read a TEXT column holding a UUID identifier.
fn get_id<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn get_opt_id<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = uuid::Error>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| t.parse().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

/// Read a TEXT column holding an enum's storage form.
fn get_enum<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> std::result::Result<T, CoreError>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).map_err(|e| conversion_error(idx, e))
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: get_id(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: get_enum(row, 4, Role::parse)?,
        encrypted_private_key: row.get(5)?,
        email_verified: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        is_private: row.get(6)?,
        is_out_of_office: row.get(7)?,
        event_type: get_enum(row, 8, EventType::parse)?,
        encrypted_data: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn row_to_grouping(row: &Row<'_>) -> rusqlite::Result<Grouping> {
    Ok(Grouping {
        id: get_id(row, 0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        user_id: get_opt_id(row, 3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_group_admin(row: &Row<'_>) -> rusqlite::Result<GroupAdmin> {
    Ok(GroupAdmin {
        grouping_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        assigned_by: get_id(row, 2)?,
        assigned_at: row.get(3)?,
    })
}

fn row_to_permission(row: &Row<'_>) -> rusqlite::Result<EventPermission> {
    Ok(EventPermission {
        event_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        can_edit: row.get(2)?,
        can_delete: row.get(3)?,
        granted_by: get_id(row, 4)?,
        granted_at: row.get(5)?,
    })
}

fn row_to_team(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: get_id(row, 0)?,
        name: row.get(1)?,
        parent_team_id: get_opt_id(row, 2)?,
        is_private: row.get(3)?,
        created_by: get_id(row, 4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_member(row: &Row<'_>) -> rusqlite::Result<TeamMember> {
    Ok(TeamMember {
        team_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        is_admin: row.get(2)?,
        joined_at: row.get(3)?,
    })
}

fn row_to_attendee(row: &Row<'_>) -> rusqlite::Result<EventAttendee> {
    Ok(EventAttendee {
        event_id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        status: get_enum(row, 2, AttendeeStatus::parse)?,
        invited_via_team_id: get_opt_id(row, 3)?,
        invited_at: row.get(4)?,
    })
}

fn row_to_activity(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    Ok(ActivityEntry {
        id: get_id(row, 0)?,
        user_id: get_id(row, 1)?,
        action: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        details: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Run a query and collect every mapped row.
fn query_all<T, P>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>>
where
    P: rusqlite::Params,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// `?, ?, ?` with `n` placeholders.
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn id_strings(ids: &[GroupingId]) -> Vec<String> {
    ids.iter().map(|g| g.to_string()).collect()
}

fn replace_event_groupings(tx: &Transaction<'_>, event_id: &str, grouping_ids: &[String]) -> Result<()> {
    tx.execute(
        "DELETE FROM event_groupings WHERE event_id = ?1",
        params![event_id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO event_groupings (event_id, grouping_id) VALUES (?1, ?2)",
    )?;
    for grouping_id in grouping_ids {
        stmt.execute(params![event_id, grouping_id])?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    // ─────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_user(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.call(move |conn| {
            let taken: Option<String> = conn
                .query_row(
                    "SELECT id FROM users WHERE email = ?1 OR id = ?2",
                    params![user.email, user.id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::Duplicate(format!("email {}", user.email)));
            }

            conn.execute(
                &format!("INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", USER_COLUMNS),
                params![
                    user.id.to_string(),
                    user.email,
                    user.name,
                    user.password_hash,
                    user.role.as_str(),
                    user.encrypted_private_key,
                    user.email_verified,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                    params![id],
                    row_to_user,
                )
                .optional()?)
        })
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                    params![email],
                    row_to_user,
                )
                .optional()?)
        })
        .await
    }

    async fn set_user_role(&self, id: &UserId, role: Role, now: i64) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
                params![role.as_str(), now, id],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.call(|conn| {
            query_all(
                conn,
                &format!("SELECT {} FROM users ORDER BY email", USER_COLUMNS),
                [],
                row_to_user,
            )
        })
        .await
    }

    async fn delete_user(&self, id: &UserId) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            // Events, private groupings, grants, memberships and attendee
            // rows follow through ON DELETE CASCADE.
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_event(&self, event: &Event, grouping_ids: &[GroupingId]) -> Result<()> {
        let event = event.clone();
        let grouping_ids = id_strings(grouping_ids);
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO events ({}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    EVENT_COLUMNS
                ),
                params![
                    event.id.to_string(),
                    event.user_id.to_string(),
                    event.title,
                    event.description,
                    event.start_time,
                    event.end_time,
                    event.is_private,
                    event.is_out_of_office,
                    event.event_type.as_str(),
                    event.encrypted_data,
                    event.created_at,
                    event.updated_at,
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!("event {}", event.id)));
            }
            replace_event_groupings(&tx, &event.id.to_string(), &grouping_ids)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_event(&self, id: &EventId) -> Result<Option<Event>> {
        let id = id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS),
                    params![id],
                    row_to_event,
                )
                .optional()?)
        })
        .await
    }

    async fn update_event(&self, event: &Event, update: &EventUpdate) -> Result<bool> {
        let event = event.clone();
        let grouping_ids = update.grouping_ids.as_deref().map(id_strings);
        let clear_sharing = update.clear_sharing;
        self.call(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE events SET user_id = ?2, title = ?3, description = ?4, start_time = ?5, \
                 end_time = ?6, is_private = ?7, is_out_of_office = ?8, event_type = ?9, \
                 encrypted_data = ?10, created_at = ?11, updated_at = ?12 WHERE id = ?1",
                params![
                    event.id.to_string(),
                    event.user_id.to_string(),
                    event.title,
                    event.description,
                    event.start_time,
                    event.end_time,
                    event.is_private,
                    event.is_out_of_office,
                    event.event_type.as_str(),
                    event.encrypted_data,
                    event.created_at,
                    event.updated_at,
                ],
            )?;
            if changed == 0 {
                return Ok(false);
            }

            let event_id = event.id.to_string();
            if clear_sharing {
                tx.execute("DELETE FROM event_permissions WHERE event_id = ?1", params![event_id])?;
                tx.execute("DELETE FROM event_attendees WHERE event_id = ?1", params![event_id])?;
            }
            if let Some(grouping_ids) = &grouping_ids {
                replace_event_groupings(&tx, &event_id, grouping_ids)?;
            }
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn delete_event(&self, id: &EventId) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM event_groupings WHERE event_id = ?1", params![id])?;
            tx.execute("DELETE FROM event_permissions WHERE event_id = ?1", params![id])?;
            tx.execute("DELETE FROM event_attendees WHERE event_id = ?1", params![id])?;
            let removed = tx.execute("DELETE FROM events WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_events(&self, query: &EventQuery) -> Result<Vec<Event>> {
        let query = query.clone();
        self.call(move |conn| {
            let mut sql = format!(
                "SELECT {} FROM events WHERE start_time >= ? AND end_time <= ?",
                EVENT_COLUMNS
            );
            let mut values = vec![
                Value::Integer(query.range.start),
                Value::Integer(query.range.end),
            ];

            if let Some(owner) = query.owner {
                sql.push_str(" AND user_id = ?");
                values.push(Value::Text(owner.to_string()));
            }
            if query.out_of_office_only {
                sql.push_str(" AND is_out_of_office = 1");
            }
            if !query.grouping_ids.is_empty() {
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM event_groupings eg \
                     WHERE eg.event_id = events.id AND eg.grouping_id IN ({}))",
                    placeholders(query.grouping_ids.len())
                ));
                values.extend(
                    query
                        .grouping_ids
                        .iter()
                        .map(|g| Value::Text(g.to_string())),
                );
            }
            sql.push_str(" ORDER BY start_time, id");

            query_all(conn, &sql, params_from_iter(values), row_to_event)
        })
        .await
    }

    async fn set_event_groupings(
        &self,
        event_id: &EventId,
        grouping_ids: &[GroupingId],
    ) -> Result<()> {
        let event_id = event_id.to_string();
        let grouping_ids = id_strings(grouping_ids);
        self.call(move |conn| {
            let tx = conn.transaction()?;
            replace_event_groupings(&tx, &event_id, &grouping_ids)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_event_groupings(&self, event_id: &EventId) -> Result<Vec<GroupingId>> {
        let event_id = event_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                "SELECT grouping_id FROM event_groupings WHERE event_id = ?1 ORDER BY grouping_id",
                params![event_id],
                |row| get_id(row, 0),
            )
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groupings and group admins
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()> {
        let grouping = grouping.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO groupings ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                    GROUPING_COLUMNS
                ),
                params![
                    grouping.id.to_string(),
                    grouping.name,
                    grouping.color,
                    grouping.user_id.map(|u| u.to_string()),
                    grouping.created_at,
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!("grouping {}", grouping.id)));
            }
            Ok(())
        })
        .await
    }

    async fn get_grouping(&self, id: &GroupingId) -> Result<Option<Grouping>> {
        let id = id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM groupings WHERE id = ?1", GROUPING_COLUMNS),
                    params![id],
                    row_to_grouping,
                )
                .optional()?)
        })
        .await
    }

    async fn delete_grouping(&self, id: &GroupingId) -> Result<bool> {
        let id = id.to_string();
        self.call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM event_groupings WHERE grouping_id = ?1", params![id])?;
            tx.execute("DELETE FROM group_admins WHERE grouping_id = ?1", params![id])?;
            let removed = tx.execute("DELETE FROM groupings WHERE id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_groupings(&self) -> Result<Vec<Grouping>> {
        self.call(|conn| {
            query_all(
                conn,
                &format!("SELECT {} FROM groupings ORDER BY name, id", GROUPING_COLUMNS),
                [],
                row_to_grouping,
            )
        })
        .await
    }

    async fn insert_group_admin(&self, admin: &GroupAdmin) -> Result<InsertResult> {
        let admin = admin.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO group_admins ({}) VALUES (?1, ?2, ?3, ?4)",
                    GROUP_ADMIN_COLUMNS
                ),
                params![
                    admin.grouping_id.to_string(),
                    admin.user_id.to_string(),
                    admin.assigned_by.to_string(),
                    admin.assigned_at,
                ],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn delete_group_admin(
        &self,
        grouping_id: &GroupingId,
        user_id: &UserId,
    ) -> Result<bool> {
        let grouping_id = grouping_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM group_admins WHERE grouping_id = ?1 AND user_id = ?2",
                params![grouping_id, user_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_group_admins(&self, grouping_id: &GroupingId) -> Result<Vec<GroupAdmin>> {
        let grouping_id = grouping_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM group_admins WHERE grouping_id = ?1 ORDER BY user_id",
                    GROUP_ADMIN_COLUMNS
                ),
                params![grouping_id],
                row_to_group_admin,
            )
        })
        .await
    }

    async fn list_managed_groupings(&self, user_id: &UserId) -> Result<Vec<GroupAdmin>> {
        let user_id = user_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM group_admins WHERE user_id = ?1 ORDER BY grouping_id",
                    GROUP_ADMIN_COLUMNS
                ),
                params![user_id],
                row_to_group_admin,
            )
        })
        .await
    }

    async fn find_administered_grouping(
        &self,
        user_id: &UserId,
        grouping_ids: &[GroupingId],
    ) -> Result<Option<GroupingId>> {
        if grouping_ids.is_empty() {
            return Ok(None);
        }
        let mut values = vec![Value::Text(user_id.to_string())];
        values.extend(grouping_ids.iter().map(|g| Value::Text(g.to_string())));
        let sql = format!(
            "SELECT grouping_id FROM group_admins WHERE user_id = ? AND grouping_id IN ({}) \
             ORDER BY grouping_id LIMIT 1",
            placeholders(grouping_ids.len())
        );
        self.call(move |conn| {
            Ok(conn
                .query_row(&sql, params_from_iter(values), |row| get_id(row, 0))
                .optional()?)
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Explicit event permissions
    // ─────────────────────────────────────────────────────────────────────────

    async fn upsert_event_permission(&self, permission: &EventPermission) -> Result<()> {
        let p = permission.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO event_permissions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                     ON CONFLICT(event_id, user_id) DO UPDATE SET \
                     can_edit = excluded.can_edit, can_delete = excluded.can_delete, \
                     granted_by = excluded.granted_by, granted_at = excluded.granted_at",
                    PERMISSION_COLUMNS
                ),
                params![
                    p.event_id.to_string(),
                    p.user_id.to_string(),
                    p.can_edit,
                    p.can_delete,
                    p.granted_by.to_string(),
                    p.granted_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_event_permission(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<EventPermission>> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM event_permissions WHERE event_id = ?1 AND user_id = ?2",
                        PERMISSION_COLUMNS
                    ),
                    params![event_id, user_id],
                    row_to_permission,
                )
                .optional()?)
        })
        .await
    }

    async fn delete_event_permission(&self, event_id: &EventId, user_id: &UserId) -> Result<bool> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM event_permissions WHERE event_id = ?1 AND user_id = ?2",
                params![event_id, user_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_event_permissions(&self, event_id: &EventId) -> Result<Vec<EventPermission>> {
        let event_id = event_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM event_permissions WHERE event_id = ?1 ORDER BY user_id",
                    PERMISSION_COLUMNS
                ),
                params![event_id],
                row_to_permission,
            )
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Teams
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_team(&self, team: &Team) -> Result<()> {
        let team = team.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO teams ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    TEAM_COLUMNS
                ),
                params![
                    team.id.to_string(),
                    team.name,
                    team.parent_team_id.map(|t| t.to_string()),
                    team.is_private,
                    team.created_by.to_string(),
                    team.created_at,
                ],
            )?;
            if inserted == 0 {
                return Err(StoreError::Duplicate(format!("team {}", team.id)));
            }
            Ok(())
        })
        .await
    }

    async fn get_team(&self, id: &TeamId) -> Result<Option<Team>> {
        let id = id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM teams WHERE id = ?1", TEAM_COLUMNS),
                    params![id],
                    row_to_team,
                )
                .optional()?)
        })
        .await
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        self.call(|conn| {
            query_all(
                conn,
                &format!("SELECT {} FROM teams ORDER BY name, id", TEAM_COLUMNS),
                [],
                row_to_team,
            )
        })
        .await
    }

    async fn list_child_teams(&self, parent: &TeamId) -> Result<Vec<Team>> {
        let parent = parent.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM teams WHERE parent_team_id = ?1 ORDER BY id",
                    TEAM_COLUMNS
                ),
                params![parent],
                row_to_team,
            )
        })
        .await
    }

    async fn insert_team_member(&self, member: &TeamMember) -> Result<InsertResult> {
        let member = member.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO team_members ({}) VALUES (?1, ?2, ?3, ?4)",
                    MEMBER_COLUMNS
                ),
                params![
                    member.team_id.to_string(),
                    member.user_id.to_string(),
                    member.is_admin,
                    member.joined_at,
                ],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_team_member(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Option<TeamMember>> {
        let team_id = team_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM team_members WHERE team_id = ?1 AND user_id = ?2",
                        MEMBER_COLUMNS
                    ),
                    params![team_id, user_id],
                    row_to_member,
                )
                .optional()?)
        })
        .await
    }

    async fn delete_team_member(&self, team_id: &TeamId, user_id: &UserId) -> Result<bool> {
        let team_id = team_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2",
                params![team_id, user_id],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn set_team_member_admin(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
        is_admin: bool,
    ) -> Result<bool> {
        let team_id = team_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE team_members SET is_admin = ?3 WHERE team_id = ?1 AND user_id = ?2",
                params![team_id, user_id, is_admin],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_team_members(&self, team_id: &TeamId) -> Result<Vec<TeamMember>> {
        let team_id = team_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM team_members WHERE team_id = ?1 ORDER BY user_id",
                    MEMBER_COLUMNS
                ),
                params![team_id],
                row_to_member,
            )
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attendees
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_attendee(&self, attendee: &EventAttendee) -> Result<InsertResult> {
        let attendee = attendee.clone();
        self.call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO event_attendees ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                    ATTENDEE_COLUMNS
                ),
                params![
                    attendee.event_id.to_string(),
                    attendee.user_id.to_string(),
                    attendee.status.as_str(),
                    attendee.invited_via_team_id.map(|t| t.to_string()),
                    attendee.invited_at,
                ],
            )?;
            Ok(if inserted > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn get_attendee(
        &self,
        event_id: &EventId,
        user_id: &UserId,
    ) -> Result<Option<EventAttendee>> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM event_attendees WHERE event_id = ?1 AND user_id = ?2",
                        ATTENDEE_COLUMNS
                    ),
                    params![event_id, user_id],
                    row_to_attendee,
                )
                .optional()?)
        })
        .await
    }

    async fn set_attendee_status(
        &self,
        event_id: &EventId,
        user_id: &UserId,
        status: AttendeeStatus,
    ) -> Result<bool> {
        let event_id = event_id.to_string();
        let user_id = user_id.to_string();
        self.call(move |conn| {
            let changed = conn.execute(
                "UPDATE event_attendees SET status = ?3 WHERE event_id = ?1 AND user_id = ?2",
                params![event_id, user_id, status.as_str()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list_attendees(&self, event_id: &EventId) -> Result<Vec<EventAttendee>> {
        let event_id = event_id.to_string();
        self.call(move |conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {} FROM event_attendees WHERE event_id = ?1 \
                     ORDER BY invited_at, user_id",
                    ATTENDEE_COLUMNS
                ),
                params![event_id],
                row_to_attendee,
            )
        })
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Activity log
    // ─────────────────────────────────────────────────────────────────────────

    async fn insert_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let entry = entry.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO activity_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    ACTIVITY_COLUMNS
                ),
                params![
                    entry.id.to_string(),
                    entry.user_id.to_string(),
                    entry.action,
                    entry.entity_type,
                    entry.entity_id,
                    entry.details,
                    entry.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_activity(&self, query: &ActivityQuery) -> Result<Vec<ActivityEntry>> {
        let query = query.clone();
        self.call(move |conn| {
            let mut sql = format!("SELECT {} FROM activity_log WHERE 1 = 1", ACTIVITY_COLUMNS);
            let mut values = Vec::new();

            if let Some(user_id) = query.user_id {
                sql.push_str(" AND user_id = ?");
                values.push(Value::Text(user_id.to_string()));
            }
            if let Some(action) = query.action {
                sql.push_str(" AND action = ?");
                values.push(Value::Text(action));
            }
            if let Some(since) = query.since {
                sql.push_str(" AND created_at >= ?");
                values.push(Value::Integer(since));
            }
            if let Some(until) = query.until {
                sql.push_str(" AND created_at <= ?");
                values.push(Value::Integer(until));
            }
            sql.push_str(" ORDER BY created_at DESC, seq DESC LIMIT ?");
            values.push(Value::Integer(
                i64::try_from(query.limit).unwrap_or(i64::MAX),
            ));

            query_all(conn, &sql, params_from_iter(values), row_to_activity)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teamcal_core::{ActivityId, TimeRange};

    fn make_user(email: &str) -> User {
        User {
            id: UserId::new(),
            email: email.to_string(),
            name: "Test User".into(),
            password_hash: "$argon2id$stub".into(),
            role: Role::User,
            encrypted_private_key: Some("aa:bb:cc".into()),
            email_verified: true,
            created_at: 1_000,
            updated_at: 1_000,
        }
    }

    fn make_event(owner: UserId, start: i64, end: i64) -> Event {
        Event {
            id: EventId::new(),
            user_id: owner,
            title: "Standup".into(),
            description: "Daily sync".into(),
            start_time: start,
            end_time: end,
            is_private: false,
            is_out_of_office: false,
            event_type: EventType::WorkMeeting,
            encrypted_data: None,
            created_at: 1_000,
            updated_at: 1_000,
        }
    }

    fn make_grouping(name: &str) -> Grouping {
        Grouping {
            id: GroupingId::new(),
            name: name.into(),
            color: Some("#3b82f6".into()),
            user_id: None,
            created_at: 1_000,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_user() {
        let store = SqliteStore::open_memory().unwrap();
        let user = make_user("ada@example.com");
        store.insert_user(&user).await.unwrap();

        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store.get_user_by_email("ada@example.com").await.unwrap(),
            Some(user.clone())
        );

        let err = store
            .insert_user(&make_user("ada@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));

        assert!(store.set_user_role(&user.id, Role::Admin, 2_000).await.unwrap());
        let updated = store.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.updated_at, 2_000);
    }

    #[tokio::test]
    async fn test_event_roundtrip_and_update() {
        let store = SqliteStore::open_memory().unwrap();
        let user = make_user("owner@example.com");
        store.insert_user(&user).await.unwrap();

        let mut event = make_event(user.id, 100, 200);
        store.insert_event(&event, &[]).await.unwrap();
        assert_eq!(store.get_event(&event.id).await.unwrap(), Some(event.clone()));

        event.is_private = true;
        event.title = "Private Event".into();
        event.encrypted_data = Some("00:11:22".into());
        assert!(store.update_event(&event, &EventUpdate::default()).await.unwrap());
        assert_eq!(store.get_event(&event.id).await.unwrap(), Some(event.clone()));

        let missing = make_event(user.id, 100, 200);
        assert!(!store.update_event(&missing, &EventUpdate::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_events_filters() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = make_user("alice@example.com");
        let bob = make_user("bob@example.com");
        store.insert_user(&alice).await.unwrap();
        store.insert_user(&bob).await.unwrap();

        let early = make_event(alice.id, 10, 20);
        let mut away = make_event(bob.id, 30, 40);
        away.is_out_of_office = true;
        away.event_type = EventType::Vacation;
        let outside = make_event(alice.id, 90, 200);
        for e in [&early, &away, &outside] {
            store.insert_event(e, &[]).await.unwrap();
        }

        let window = TimeRange::new(0, 100);
        let all = store.list_events(&EventQuery::in_range(window)).await.unwrap();
        assert_eq!(all, vec![early.clone(), away.clone()]);

        let mine = store
            .list_events(&EventQuery::in_range(window).owned_by(alice.id))
            .await
            .unwrap();
        assert_eq!(mine, vec![early.clone()]);

        let ooo = store
            .list_events(&EventQuery::in_range(window).out_of_office())
            .await
            .unwrap();
        assert_eq!(ooo, vec![away.clone()]);

        let team = make_grouping("Team");
        let travel = make_grouping("Travel");
        store.insert_grouping(&team).await.unwrap();
        store.insert_grouping(&travel).await.unwrap();
        store.set_event_groupings(&early.id, &[team.id]).await.unwrap();
        store.set_event_groupings(&away.id, &[travel.id]).await.unwrap();

        let tagged = store
            .list_events(&EventQuery::in_range(window).tagged_any(vec![team.id, travel.id]))
            .await
            .unwrap();
        assert_eq!(tagged, vec![early, away]);
    }

    #[tokio::test]
    async fn test_permission_upsert_overwrites() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = make_user("owner@example.com");
        let friend = make_user("friend@example.com");
        store.insert_user(&owner).await.unwrap();
        store.insert_user(&friend).await.unwrap();
        let event = make_event(owner.id, 0, 10);
        store.insert_event(&event, &[]).await.unwrap();

        let mut grant = EventPermission {
            event_id: event.id,
            user_id: friend.id,
            can_edit: true,
            can_delete: false,
            granted_by: owner.id,
            granted_at: 1,
        };
        store.upsert_event_permission(&grant).await.unwrap();
        grant.can_edit = false;
        grant.can_delete = true;
        store.upsert_event_permission(&grant).await.unwrap();

        let stored = store.list_event_permissions(&event.id).await.unwrap();
        assert_eq!(stored, vec![grant]);
    }

    #[tokio::test]
    async fn test_update_applies_tags_and_sharing_together() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = make_user("owner@example.com");
        let guest = make_user("guest@example.com");
        store.insert_user(&owner).await.unwrap();
        store.insert_user(&guest).await.unwrap();
        let ops = make_grouping("Ops");
        let infra = make_grouping("Infra");
        store.insert_grouping(&ops).await.unwrap();
        store.insert_grouping(&infra).await.unwrap();

        let mut event = make_event(owner.id, 0, 10);
        store.insert_event(&event, &[ops.id]).await.unwrap();
        assert_eq!(store.get_event_groupings(&event.id).await.unwrap(), vec![ops.id]);
        store
            .upsert_event_permission(&EventPermission {
                event_id: event.id,
                user_id: guest.id,
                can_edit: true,
                can_delete: false,
                granted_by: owner.id,
                granted_at: 1,
            })
            .await
            .unwrap();
        store
            .insert_attendee(&EventAttendee {
                event_id: event.id,
                user_id: guest.id,
                status: AttendeeStatus::Pending,
                invited_via_team_id: None,
                invited_at: 1,
            })
            .await
            .unwrap();

        event.is_private = true;
        let update = EventUpdate {
            grouping_ids: Some(vec![infra.id]),
            clear_sharing: true,
        };
        assert!(store.update_event(&event, &update).await.unwrap());
        assert_eq!(store.get_event_groupings(&event.id).await.unwrap(), vec![infra.id]);
        assert!(store.list_event_permissions(&event.id).await.unwrap().is_empty());
        assert!(store.list_attendees(&event.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_with_unknown_grouping_writes_nothing() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = make_user("owner@example.com");
        store.insert_user(&owner).await.unwrap();

        let event = make_event(owner.id, 0, 10);
        assert!(store.insert_event(&event, &[GroupingId::new()]).await.is_err());
        assert_eq!(store.get_event(&event.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = SqliteStore::open_memory().unwrap();
        let gone = make_user("gone@example.com");
        let stays = make_user("stays@example.com");
        store.insert_user(&gone).await.unwrap();
        store.insert_user(&stays).await.unwrap();

        let shared = make_grouping("Shared");
        let mine = Grouping {
            user_id: Some(gone.id),
            ..make_grouping("Mine")
        };
        store.insert_grouping(&shared).await.unwrap();
        store.insert_grouping(&mine).await.unwrap();
        store
            .insert_group_admin(&GroupAdmin {
                grouping_id: shared.id,
                user_id: gone.id,
                assigned_by: stays.id,
                assigned_at: 1,
            })
            .await
            .unwrap();

        let owned = make_event(gone.id, 0, 10);
        store.insert_event(&owned, &[shared.id]).await.unwrap();
        let other = make_event(stays.id, 0, 10);
        store.insert_event(&other, &[mine.id, shared.id]).await.unwrap();
        store
            .upsert_event_permission(&EventPermission {
                event_id: other.id,
                user_id: gone.id,
                can_edit: true,
                can_delete: true,
                granted_by: stays.id,
                granted_at: 1,
            })
            .await
            .unwrap();
        store
            .insert_attendee(&EventAttendee {
                event_id: other.id,
                user_id: gone.id,
                status: AttendeeStatus::Accepted,
                invited_via_team_id: None,
                invited_at: 1,
            })
            .await
            .unwrap();

        let team = Team {
            id: TeamId::new(),
            name: "Ops".into(),
            parent_team_id: None,
            is_private: false,
            created_by: gone.id,
            created_at: 1,
        };
        store.insert_team(&team).await.unwrap();
        store
            .insert_team_member(&TeamMember {
                team_id: team.id,
                user_id: gone.id,
                is_admin: true,
                joined_at: 1,
            })
            .await
            .unwrap();

        assert!(store.delete_user(&gone.id).await.unwrap());
        assert_eq!(store.get_user(&gone.id).await.unwrap(), None);
        assert_eq!(store.get_event(&owned.id).await.unwrap(), None);
        assert_eq!(store.get_grouping(&mine.id).await.unwrap(), None);
        assert!(store.list_managed_groupings(&gone.id).await.unwrap().is_empty());
        assert!(store.list_event_permissions(&other.id).await.unwrap().is_empty());
        assert!(store.list_attendees(&other.id).await.unwrap().is_empty());
        assert!(store.list_team_members(&team.id).await.unwrap().is_empty());

        // Everything not owned by the user is kept.
        assert_eq!(store.get_event(&other.id).await.unwrap(), Some(other.clone()));
        assert_eq!(store.get_event_groupings(&other.id).await.unwrap(), vec![shared.id]);
        assert_eq!(store.get_team(&team.id).await.unwrap(), Some(team));
        assert!(!store.delete_user(&gone.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_event_cascades() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = make_user("owner@example.com");
        let guest = make_user("guest@example.com");
        store.insert_user(&owner).await.unwrap();
        store.insert_user(&guest).await.unwrap();
        let grouping = make_grouping("Ops");
        store.insert_grouping(&grouping).await.unwrap();
        let event = make_event(owner.id, 0, 10);
        store.insert_event(&event, &[grouping.id]).await.unwrap();
        store
            .insert_attendee(&EventAttendee {
                event_id: event.id,
                user_id: guest.id,
                status: AttendeeStatus::Pending,
                invited_via_team_id: None,
                invited_at: 5,
            })
            .await
            .unwrap();

        assert!(store.delete_event(&event.id).await.unwrap());
        assert!(store.get_event_groupings(&event.id).await.unwrap().is_empty());
        assert!(store.list_attendees(&event.id).await.unwrap().is_empty());
        assert!(!store.delete_event(&event.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_find_administered_grouping() {
        let store = SqliteStore::open_memory().unwrap();
        let admin = make_user("admin@example.com");
        store.insert_user(&admin).await.unwrap();
        let a = make_grouping("A");
        let b = make_grouping("B");
        store.insert_grouping(&a).await.unwrap();
        store.insert_grouping(&b).await.unwrap();

        let assignment = GroupAdmin {
            grouping_id: b.id,
            user_id: admin.id,
            assigned_by: admin.id,
            assigned_at: 1,
        };
        assert_eq!(
            store.insert_group_admin(&assignment).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.insert_group_admin(&assignment).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let found = store
            .find_administered_grouping(&admin.id, &[a.id, b.id])
            .await
            .unwrap();
        assert_eq!(found, Some(b.id));
        assert_eq!(
            store.find_administered_grouping(&admin.id, &[]).await.unwrap(),
            None
        );

        assert!(store.delete_grouping(&b.id).await.unwrap());
        assert!(store.list_managed_groupings(&admin.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_team_tree_and_members() {
        let store = SqliteStore::open_memory().unwrap();
        let user = make_user("lead@example.com");
        store.insert_user(&user).await.unwrap();

        let root = Team {
            id: TeamId::new(),
            name: "Engineering".into(),
            parent_team_id: None,
            is_private: false,
            created_by: user.id,
            created_at: 1,
        };
        let child = Team {
            id: TeamId::new(),
            name: "Platform".into(),
            parent_team_id: Some(root.id),
            ..root.clone()
        };
        store.insert_team(&root).await.unwrap();
        store.insert_team(&child).await.unwrap();

        assert_eq!(store.list_child_teams(&root.id).await.unwrap(), vec![child.clone()]);

        let member = TeamMember {
            team_id: child.id,
            user_id: user.id,
            is_admin: false,
            joined_at: 2,
        };
        assert!(store.insert_team_member(&member).await.unwrap().is_inserted());
        assert!(store.set_team_member_admin(&child.id, &user.id, true).await.unwrap());
        let stored = store.get_team_member(&child.id, &user.id).await.unwrap().unwrap();
        assert!(stored.is_admin);
        assert!(store.delete_team_member(&child.id, &user.id).await.unwrap());
        assert!(store.list_team_members(&child.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activity_query() {
        let store = SqliteStore::open_memory().unwrap();
        let user = UserId::new();
        for (at, action) in [(1, "create_event"), (2, "delete_event"), (3, "create_event")] {
            store
                .insert_activity(&ActivityEntry {
                    id: ActivityId::new(),
                    user_id: user,
                    action: action.into(),
                    entity_type: "event".into(),
                    entity_id: None,
                    details: Some("{}".into()),
                    created_at: at,
                })
                .await
                .unwrap();
        }

        let query = ActivityQuery {
            action: Some("create_event".into()),
            ..ActivityQuery::default()
        };
        let entries = store.list_activity(&query).await.unwrap();
        let times: Vec<i64> = entries.iter().map(|e| e.created_at).collect();
        assert_eq!(times, vec![3, 1]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calendar.db");
        let user = make_user("persist@example.com");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_user(&user).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_user(&user.id).await.unwrap(), Some(user));
    }
}
