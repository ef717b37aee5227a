use anyhow::Context;
use rusqlite::Connection;

/// Schema migrations compiled into the binary, applied in order.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_directory.sql",
        include_str!("../../migrations/001_directory.sql"),
    ),
    (
        "002_conversations.sql",
        include_str!("../../migrations/002_conversations.sql"),
    ),
    (
        "003_appointments.sql",
        include_str!("../../migrations/003_appointments.sql"),
    ),
];

pub fn run_migrations(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .context("failed to create migrations table")?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .context("failed to check migration status")?;

        if already_applied {
            continue;
        }

        conn.execute_batch(sql)
            .with_context(|| format!("failed to apply migration: {name}"))?;

        conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])
            .with_context(|| format!("failed to record migration: {name}"))?;

        tracing::info!("applied migration: {name}");
    }

    Ok(())
}
