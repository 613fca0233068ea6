use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE tables (
                id          TEXT PRIMARY KEY,
                join_code   TEXT NOT NULL UNIQUE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                table_id    TEXT NOT NULL REFERENCES tables(id) ON DELETE CASCADE,
                first_name  TEXT NOT NULL,
                last_name   TEXT NOT NULL,
                joined_at   TEXT NOT NULL,
                last_active TEXT NOT NULL
            );

            CREATE INDEX idx_users_last_active ON users(last_active);

            -- Single row; id is pinned to 1.
            CREATE TABLE game_session (
                id          INTEGER PRIMARY KEY CHECK (id = 1),
                status      TEXT NOT NULL,
                started_at  TEXT,
                paused_at   TEXT,
                ended_at    TEXT
            );

            INSERT INTO game_session (id, status) VALUES (1, 'not_started');

            -- from_table is NULL for broadcasts. No foreign keys on table ids:
            -- scores and badges outlive deleted tables.
            CREATE TABLE messages (
                id            TEXT PRIMARY KEY,
                content       TEXT NOT NULL,
                from_table    TEXT,
                to_table      TEXT,
                sender_name   TEXT NOT NULL,
                public_name   TEXT,
                is_anonymous  INTEGER NOT NULL DEFAULT 0,
                is_broadcast  INTEGER NOT NULL DEFAULT 0,
                heart         INTEGER NOT NULL DEFAULT 0,
                thumbsup      INTEGER NOT NULL DEFAULT 0,
                fire          INTEGER NOT NULL DEFAULT 0,
                laugh         INTEGER NOT NULL DEFAULT 0,
                created_at    TEXT NOT NULL
            );

            CREATE INDEX idx_messages_created ON messages(created_at);
            CREATE INDEX idx_messages_to_table ON messages(to_table, created_at);

            -- One marker per (message, table): a table holds at most one reaction kind.
            CREATE TABLE reaction_markers (
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                table_id    TEXT NOT NULL,
                kind        TEXT NOT NULL,
                PRIMARY KEY (message_id, table_id)
            );

            CREATE TABLE challenges (
                id            TEXT PRIMARY KEY,
                title         TEXT NOT NULL,
                description   TEXT,
                scoring_type  TEXT NOT NULL,
                started_at    TEXT NOT NULL,
                ends_at       TEXT NOT NULL,
                active        INTEGER NOT NULL DEFAULT 1,
                badge_name    TEXT NOT NULL,
                badge_emoji   TEXT NOT NULL,
                winner        TEXT,
                results       TEXT,
                participants  TEXT,
                resolved_at   TEXT
            );

            CREATE INDEX idx_challenges_active ON challenges(active, ends_at);

            CREATE TABLE badges (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                table_id         TEXT NOT NULL,
                challenge_id     TEXT NOT NULL UNIQUE,
                badge_name       TEXT NOT NULL,
                badge_emoji      TEXT NOT NULL,
                challenge_title  TEXT NOT NULL,
                awarded_at       TEXT NOT NULL
            );

            CREATE INDEX idx_badges_table ON badges(table_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
