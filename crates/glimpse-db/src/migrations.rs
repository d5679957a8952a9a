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
            CREATE TABLE users (
                id                  TEXT PRIMARY KEY,
                username            TEXT NOT NULL UNIQUE,
                full_name           TEXT NOT NULL,
                email               TEXT NOT NULL UNIQUE,
                profile_image_url   TEXT,
                is_verified         INTEGER NOT NULL DEFAULT 0,
                created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE posts (
                id          TEXT PRIMARY KEY,
                content     TEXT,
                img_url     TEXT NOT NULL,
                author_id   TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_posts_created ON posts(created_at);

            -- One like per (user, post); the toggle relies on this key.
            CREATE TABLE likes (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (user_id, post_id)
            );

            CREATE INDEX idx_likes_post ON likes(post_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
