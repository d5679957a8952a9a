use crate::Database;
use crate::error::{StoreError, StoreResult};
use crate::models::{LikeRow, NewUser, PostRow, UserRow};
use rusqlite::{Connection, Row};

const USER_COLUMNS: &str =
    "id, username, full_name, email, profile_image_url, is_verified, created_at";
const POST_COLUMNS: &str = "id, content, img_url, author_id, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, user: &NewUser<'_>) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, full_name, email, profile_image_url, is_verified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    user.id,
                    user.username,
                    user.full_name,
                    user.email,
                    user.profile_image_url,
                    user.is_verified,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn get_user_by_email(&self, email: &str) -> StoreResult<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    // -- Posts --

    pub fn insert_post(
        &self,
        id: &str,
        author_id: &str,
        content: Option<&str>,
        img_url: &str,
    ) -> StoreResult<PostRow> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO posts (id, content, img_url, author_id) VALUES (?1, ?2, ?3, ?4)
                 RETURNING {}",
                POST_COLUMNS
            );
            let row = conn.query_row(
                &sql,
                rusqlite::params![id, content, img_url, author_id],
                post_from_row,
            )?;
            Ok(row)
        })
    }

    /// Newest posts first. Posts created in the same millisecond come back
    /// in reverse insertion order.
    pub fn get_recent_posts(&self, limit: u32) -> StoreResult<Vec<PostRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM posts ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                POST_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], post_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Likes --

    /// Remove the like for (user, post). Fails with `StoreError::NotFound`
    /// when there was nothing to remove.
    pub fn delete_like(&self, user_id: &str, post_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND post_id = ?2",
                (user_id, post_id),
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Insert a like. A second like for the same pair fails with
    /// `StoreError::UniqueViolation`; an unknown user or post with
    /// `StoreError::ForeignKeyViolation`.
    pub fn insert_like(&self, user_id: &str, post_id: &str) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)",
                (user_id, post_id),
            )?;
            Ok(())
        })
    }

    /// Batch-fetch the (user, post) pairs of every like on the given posts.
    pub fn get_likes_for_posts(&self, post_ids: &[String]) -> StoreResult<Vec<LikeRow>> {
        if post_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> =
                (1..=post_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT user_id, post_id FROM likes WHERE post_id IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(post_ids.iter()), |row| {
                    Ok(LikeRow {
                        user_id: row.get(0)?,
                        post_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> StoreResult<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt.query_row([value], user_from_row).optional()?;

    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        email: row.get(3)?,
        profile_image_url: row.get(4)?,
        is_verified: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        content: row.get(1)?,
        img_url: row.get(2)?,
        author_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    impl Database {
        fn like_exists(&self, user_id: &str, post_id: &str) -> StoreResult<bool> {
            self.with_conn(|conn| {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = ?1 AND post_id = ?2)",
                    (user_id, post_id),
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
        }
    }

    fn add_user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let email = format!("{}@example.com", name);
        db.create_user(&NewUser {
            id: &id,
            username: name,
            full_name: name,
            email: &email,
            profile_image_url: None,
            is_verified: true,
        })
        .unwrap();
        id
    }

    fn add_post(db: &Database, author_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.insert_post(&id, author_id, Some("hi"), "https://img.example/p.png")
            .unwrap();
        id
    }

    #[test]
    fn user_lookup_by_email_and_id() {
        let db = Database::open_in_memory().unwrap();
        let id = add_user(&db, "ada");

        let by_email = db.get_user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert!(by_email.is_verified);

        let by_id = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(by_id.username, "ada");
        assert!(by_id.into_user().is_ok());

        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        add_user(&db, "ada");

        let id = Uuid::new_v4().to_string();
        let err = db
            .create_user(&NewUser {
                id: &id,
                username: "ada2",
                full_name: "Ada",
                email: "ada@example.com",
                profile_image_url: None,
                is_verified: true,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[test]
    fn insert_post_returns_row() {
        let db = Database::open_in_memory().unwrap();
        let author = add_user(&db, "ada");
        let id = Uuid::new_v4().to_string();

        let row = db
            .insert_post(&id, &author, None, "https://img.example/x.png")
            .unwrap();
        assert_eq!(row.id, id);
        assert_eq!(row.author_id, author);
        assert!(row.content.is_none());

        let post = row.into_post().unwrap();
        assert_eq!(post.created_at, post.updated_at);
    }

    #[test]
    fn insert_post_for_unknown_author_fails() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .insert_post(
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                None,
                "https://img.example/x.png",
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation));
    }

    #[test]
    fn recent_posts_are_newest_first_and_limited() {
        let db = Database::open_in_memory().unwrap();
        let author = add_user(&db, "ada");
        let ids: Vec<String> = (0..7).map(|_| add_post(&db, &author)).collect();

        let rows = db.get_recent_posts(5).unwrap();
        assert_eq!(rows.len(), 5);
        let got: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let expected: Vec<&str> = ids.iter().rev().take(5).map(|s| s.as_str()).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn like_insert_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let user = add_user(&db, "ada");
        let post = add_post(&db, &user);

        assert!(matches!(
            db.delete_like(&user, &post),
            Err(StoreError::NotFound)
        ));

        db.insert_like(&user, &post).unwrap();
        assert!(db.like_exists(&user, &post).unwrap());
        assert!(matches!(
            db.insert_like(&user, &post),
            Err(StoreError::UniqueViolation)
        ));

        db.delete_like(&user, &post).unwrap();
        assert!(!db.like_exists(&user, &post).unwrap());
    }

    #[test]
    fn like_on_missing_post_is_foreign_key_violation() {
        let db = Database::open_in_memory().unwrap();
        let user = add_user(&db, "ada");
        let err = db
            .insert_like(&user, &Uuid::new_v4().to_string())
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation));
    }

    #[test]
    fn likes_for_posts_batch() {
        let db = Database::open_in_memory().unwrap();
        let ada = add_user(&db, "ada");
        let bob = add_user(&db, "bob");
        let p1 = add_post(&db, &ada);
        let p2 = add_post(&db, &ada);
        let p3 = add_post(&db, &bob);

        db.insert_like(&ada, &p1).unwrap();
        db.insert_like(&bob, &p1).unwrap();
        db.insert_like(&bob, &p2).unwrap();
        db.insert_like(&ada, &p3).unwrap();

        let rows = db.get_likes_for_posts(&[p1.clone(), p2.clone()]).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|r| r.post_id == p1).count(), 2);
        assert!(rows.iter().all(|r| r.post_id != p3));

        assert!(db.get_likes_for_posts(&[]).unwrap().is_empty());
    }

    #[test]
    fn file_backed_store_reads_through_reader_pool() {
        let dir = std::env::temp_dir().join(format!("glimpse_db_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let db = Database::open(&dir.join("glimpse.db")).unwrap();

        let user = add_user(&db, "ada");
        let post = add_post(&db, &user);
        db.insert_like(&user, &post).unwrap();

        for _ in 0..8 {
            assert!(db.like_exists(&user, &post).unwrap());
        }

        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
