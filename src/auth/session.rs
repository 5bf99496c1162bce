use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::config::AdminPolicy;
use crate::error::AppResult;
use crate::state::DbPool;

/// Create a new session for a user. The `is_admin` flag is computed here,
/// once, and snapshotted on the session row; request handling reads the
/// snapshot and never re-derives the role from client input.
pub fn create_session(
    pool: &DbPool,
    user_id: &str,
    policy: AdminPolicy,
    hours: u64,
) -> AppResult<String> {
    let conn = pool.get()?;

    let is_admin = match policy {
        AdminPolicy::FirstRegistered => {
            let first: Option<String> = conn
                .query_row(
                    "SELECT id FROM users ORDER BY created_at, id LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()?;
            first.as_deref() == Some(user_id)
        }
        AdminPolicy::Disabled => false,
    };

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, is_admin, expires_at) \
         VALUES (?1, ?2, ?3, ?4, datetime('now', ?5))",
        params![id, user_id, token, is_admin, format!("+{} hours", hours)],
    )?;

    Ok(token)
}

/// Delete a session by token. The server-side row goes away, so a replayed
/// cookie can never re-resolve to the user.
pub fn delete_session(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn seed_user(pool: &DbPool, id: &str, email: &str, seq: i64) {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, username, email, password_hash, created_at) \
             VALUES (?1, ?2, ?3, 'h', datetime('now', ?4))",
            params![id, id, email, format!("+{} seconds", seq)],
        )
        .unwrap();
    }

    #[test]
    fn generate_token_is_64_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generate_token_is_unique() {
        let t1 = generate_token();
        let t2 = generate_token();
        assert_ne!(t1, t2);
    }

    #[test]
    fn first_registered_user_becomes_admin() {
        let pool = db::test_pool();
        seed_user(&pool, "a", "a@x.com", 0);
        seed_user(&pool, "bb", "b@x.com", 10);

        create_session(&pool, "a", AdminPolicy::FirstRegistered, 1).unwrap();
        create_session(&pool, "bb", AdminPolicy::FirstRegistered, 1).unwrap();

        let conn = pool.get().unwrap();
        let admin: bool = conn
            .query_row(
                "SELECT is_admin FROM sessions WHERE user_id = 'a'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        let non_admin: bool = conn
            .query_row(
                "SELECT is_admin FROM sessions WHERE user_id = 'bb'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert!(admin);
        assert!(!non_admin);
    }

    #[test]
    fn disabled_policy_grants_no_admin() {
        let pool = db::test_pool();
        seed_user(&pool, "a", "a@x.com", 0);

        create_session(&pool, "a", AdminPolicy::Disabled, 1).unwrap();

        let conn = pool.get().unwrap();
        let is_admin: bool = conn
            .query_row("SELECT is_admin FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert!(!is_admin);
    }

    #[test]
    fn delete_session_removes_row() {
        let pool = db::test_pool();
        seed_user(&pool, "a", "a@x.com", 0);
        let token = create_session(&pool, "a", AdminPolicy::FirstRegistered, 1).unwrap();

        delete_session(&pool, &token).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
