//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;
use teamcal_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',     -- 'user' | 'admin'
            encrypted_private_key TEXT,            -- iv:tag:ct envelope of the data key
            email_verified INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE events (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,                   -- placeholder when private
            description TEXT NOT NULL DEFAULT '',
            start_time INTEGER NOT NULL,
            end_time INTEGER NOT NULL,
            is_private INTEGER NOT NULL DEFAULT 0,
            is_out_of_office INTEGER NOT NULL DEFAULT 0,
            event_type TEXT NOT NULL,
            encrypted_data TEXT,                   -- sealed {title, description} when private
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE groupings (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            color TEXT,
            user_id TEXT REFERENCES users(id) ON DELETE CASCADE,  -- NULL for public
            created_at INTEGER NOT NULL
        );

        CREATE TABLE event_groupings (
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            grouping_id TEXT NOT NULL REFERENCES groupings(id) ON DELETE CASCADE,
            PRIMARY KEY (event_id, grouping_id)
        );

        CREATE TABLE group_admins (
            grouping_id TEXT NOT NULL REFERENCES groupings(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            assigned_by TEXT NOT NULL,
            assigned_at INTEGER NOT NULL,
            PRIMARY KEY (grouping_id, user_id)
        );

        CREATE TABLE event_permissions (
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            can_edit INTEGER NOT NULL DEFAULT 0,
            can_delete INTEGER NOT NULL DEFAULT 0,
            granted_by TEXT NOT NULL,
            granted_at INTEGER NOT NULL,
            PRIMARY KEY (event_id, user_id)
        );

        CREATE TABLE teams (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            parent_team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            is_private INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE team_members (
            team_id TEXT NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            is_admin INTEGER NOT NULL DEFAULT 0,
            joined_at INTEGER NOT NULL,
            PRIMARY KEY (team_id, user_id)
        );

        CREATE TABLE event_attendees (
            event_id TEXT NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            status TEXT NOT NULL DEFAULT 'pending',
            invited_via_team_id TEXT REFERENCES teams(id) ON DELETE SET NULL,
            invited_at INTEGER NOT NULL,
            PRIMARY KEY (event_id, user_id)
        );

        CREATE TABLE activity_log (
            seq INTEGER PRIMARY KEY AUTOINCREMENT, -- insertion order for tie-breaks
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT,
            details TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_events_range ON events(start_time, end_time);
        CREATE INDEX idx_events_owner ON events(user_id);
        CREATE INDEX idx_event_groupings_grouping ON event_groupings(grouping_id);
        CREATE INDEX idx_group_admins_user ON group_admins(user_id);
        CREATE INDEX idx_teams_parent ON teams(parent_team_id);
        CREATE INDEX idx_team_members_user ON team_members(user_id);
        CREATE INDEX idx_activity_created ON activity_log(created_at);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "users",
            "events",
            "groupings",
            "event_groupings",
            "group_admins",
            "event_permissions",
            "teams",
            "team_members",
            "event_attendees",
            "activity_log",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }
}
