use crate::sqlite_column;
use crate::sqlite_persistence::{
    migrate_if_needed, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use crate::user::*;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::SystemTime,
};

use super::auth::CredentialHasher;

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[("idx_auth_token_value", "value")],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            is_unique = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[],
    indices: &[],
};

/// V 1
const USER_TABLE_V_1: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "is_staff",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_user_handle", "handle")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_1,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
        ],
        migration: Some(|conn: &Connection| {
            conn.execute(
                "ALTER TABLE user ADD COLUMN is_staff INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
            Ok(())
        }),
    },
];

fn system_time_from_column_result(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(value as u64)
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        handle: row.get(1)?,
        is_staff: row.get(2)?,
        created: system_time_from_column_result(row.get(3)?),
    })
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

const USER_COLUMNS: &str = "id, handle, is_staff, created";
const AUTH_TOKEN_COLUMNS: &str = "user_id, value, created, last_used";

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database {:?}", db_path))?;
        migrate_if_needed(&mut conn, VERSIONED_SCHEMAS, "user")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, user_handle: &str, is_staff: bool) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user (handle, is_staff) VALUES (?1, ?2)",
            params![user_handle, is_staff],
        )
        .with_context(|| format!("Failed to create user {}", user_handle))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?1", USER_COLUMNS, USER_TABLE_V_1.name),
                params![user_id],
                user_from_row,
            )
            .optional()?)
    }

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT id FROM {} WHERE handle = ?1", USER_TABLE_V_1.name),
                params![user_handle],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} ORDER BY handle",
            USER_COLUMNS, USER_TABLE_V_1.name
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<Result<Vec<User>, _>>()?;
        Ok(users)
    }

    fn set_user_staff(&self, user_id: usize, is_staff: bool) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE user SET is_staff = ?2 WHERE id = ?1",
            params![user_id, is_staff],
        )?;
        Ok(updated > 0)
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM auth_token WHERE value = ?1", AUTH_TOKEN_COLUMNS),
                params![value.0],
                auth_token_from_row,
            )
            .optional()?)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(token) = self.get_user_auth_token(token)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_token WHERE value = ?1", params![token.value.0])?;
        Ok(Some(token))
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?2 WHERE value = ?1",
            params![token.0, now_secs()],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (value, user_id) VALUES (?1, ?2)",
            params![token.value.0, token.user_id],
        )?;
        Ok(())
    }

    fn get_all_user_auth_tokens(&self, user_handle: &str) -> Result<Vec<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM auth_token WHERE user_id = (SELECT id FROM user WHERE handle = ?1)",
            AUTH_TOKEN_COLUMNS
        ))?;
        let tokens = stmt
            .query_map(params![user_handle], auth_token_from_row)?
            .collect::<Result<Vec<AuthToken>, _>>()?;
        Ok(tokens)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_user_auth_credentials(&self, user_handle: &str) -> Result<Option<UserAuthCredentials>> {
        let Some(user_id) = self.get_user_id(user_handle)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, salt, hash, hasher, created, last_tried, last_used
                 FROM user_password_credentials WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<usize, usize>(0)?,
                        row.get::<usize, String>(1)?,
                        row.get::<usize, String>(2)?,
                        row.get::<usize, String>(3)?,
                        row.get::<usize, i64>(4)?,
                        row.get::<usize, Option<i64>>(5)?,
                        row.get::<usize, Option<i64>>(6)?,
                    ))
                },
            )
            .optional()?;

        let username_password = match row {
            Some((user_id, salt, hash, hasher, created, last_tried, last_used)) => {
                Some(UsernamePasswordCredentials {
                    user_id,
                    salt,
                    hash,
                    hasher: CredentialHasher::from_str(&hasher)?,
                    created: system_time_from_column_result(created),
                    last_tried: last_tried.map(system_time_from_column_result),
                    last_used: last_used.map(system_time_from_column_result),
                })
            }
            None => None,
        };

        Ok(Some(UserAuthCredentials {
            user_id,
            username_password,
        }))
    }

    fn update_user_auth_credentials(&self, credentials: UserAuthCredentials) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let user_id = credentials.user_id;
        match credentials.username_password.as_ref() {
            Some(password_credentials) => {
                let updated = conn.execute(
                    "UPDATE user_password_credentials SET salt = ?1, hash = ?2, hasher = ?3 WHERE user_id = ?4",
                    params![
                        password_credentials.salt,
                        password_credentials.hash,
                        password_credentials.hasher.to_string(),
                        user_id
                    ],
                )?;
                if updated == 0 {
                    conn.execute(
                        "INSERT INTO user_password_credentials (salt, hash, hasher, user_id) VALUES (?1, ?2, ?3, ?4)",
                        params![
                            password_credentials.salt,
                            password_credentials.hash,
                            password_credentials.hasher.to_string(),
                            user_id
                        ],
                    )?;
                }
            }
            None => {
                conn.execute(
                    "DELETE FROM user_password_credentials WHERE user_id = ?1",
                    params![user_id],
                )?;
            }
        };
        Ok(())
    }

    fn record_password_attempt(&self, user_id: usize, success: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let now = now_secs();
        if success {
            conn.execute(
                "UPDATE user_password_credentials SET last_tried = ?2, last_used = ?2 WHERE user_id = ?1",
                params![user_id, now],
            )?;
        } else {
            conn.execute(
                "UPDATE user_password_credentials SET last_tried = ?2 WHERE user_id = ?1",
                params![user_id, now],
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::sqlite_persistence::BASE_DB_VERSION;
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteUserStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join("user.db");
        let store = SqliteUserStore::new(&temp_file_path).unwrap();
        (store, temp_dir)
    }

    fn password(user_id: usize, hash: &str) -> UserAuthCredentials {
        UserAuthCredentials {
            user_id,
            username_password: Some(UsernamePasswordCredentials {
                user_id,
                salt: "salt".to_string(),
                hash: hash.to_string(),
                hasher: CredentialHasher::Argon2,
                created: SystemTime::now(),
                last_tried: None,
                last_used: None,
            }),
        }
    }

    #[test]
    fn test_create_user() {
        let (store, _temp_dir) = create_tmp_store();

        let user_id = store.create_user("test_user", false).unwrap();
        assert_eq!(user_id, 1);
        assert!(store.create_user("test_user", true).is_err());

        let user = store.get_user(user_id).unwrap().unwrap();
        assert_eq!(user.handle, "test_user");
        assert!(!user.is_staff);
        assert_eq!(store.get_user_id("nobody").unwrap(), None);
    }

    #[test]
    fn staff_flag_can_be_toggled() {
        let (store, _temp_dir) = create_tmp_store();
        let id = store.create_user("curator", false).unwrap();

        assert!(store.set_user_staff(id, true).unwrap());
        assert!(store.get_user(id).unwrap().unwrap().is_staff);
        assert!(!store.set_user_staff(999, true).unwrap());
    }

    #[test]
    fn updating_one_password_leaves_others_alone() {
        let (store, _temp_dir) = create_tmp_store();
        let a = store.create_user("a", false).unwrap();
        let b = store.create_user("b", false).unwrap();
        store.update_user_auth_credentials(password(a, "hash-a")).unwrap();
        store.update_user_auth_credentials(password(b, "hash-b")).unwrap();
        store.update_user_auth_credentials(password(a, "hash-a2")).unwrap();

        let hash_of = |handle: &str| {
            store
                .get_user_auth_credentials(handle)
                .unwrap()
                .unwrap()
                .username_password
                .unwrap()
                .hash
        };
        assert_eq!(hash_of("a"), "hash-a2");
        assert_eq!(hash_of("b"), "hash-b");
    }

    #[test]
    fn tokens_are_stored_and_deleted() {
        let (store, _temp_dir) = create_tmp_store();
        let id = store.create_user("a", false).unwrap();
        let value = AuthTokenValue::generate();
        store
            .add_user_auth_token(AuthToken {
                user_id: id,
                created: SystemTime::now(),
                last_used: None,
                value: value.clone(),
            })
            .unwrap();

        store.update_user_auth_token_last_used_timestamp(&value).unwrap();
        let token = store.get_user_auth_token(&value).unwrap().unwrap();
        assert_eq!(token.user_id, id);
        assert!(token.last_used.is_some());
        assert_eq!(store.get_all_user_auth_tokens("a").unwrap().len(), 1);

        assert!(store.delete_user_auth_token(&value).unwrap().is_some());
        assert!(store.get_user_auth_token(&value).unwrap().is_none());
        assert!(store.delete_user_auth_token(&value).unwrap().is_none());
    }

    #[test]
    fn test_migration_v0_to_v1() {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join("user.db");

        {
            let conn = Connection::open(&temp_file_path).unwrap();
            VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute("INSERT INTO user (handle) VALUES (?1)", params!["old_user"])
                .unwrap();
        }

        let store = SqliteUserStore::new(&temp_file_path).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            let db_version: i64 = conn
                .query_row("PRAGMA user_version;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(db_version, BASE_DB_VERSION as i64 + 1);
        }

        let id = store.get_user_id("old_user").unwrap().unwrap();
        assert!(!store.get_user(id).unwrap().unwrap().is_staff);
    }
}
