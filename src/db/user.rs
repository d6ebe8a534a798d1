/// SQLite user store
use crate::{
    auth::Role,
    store::{
        NewUser, ResetToken, StoreError, StoreResult, User, UserCondition, UserFilter, UserId,
        UserPatch, UserStore,
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite, SqlitePool};

const USER_COLUMNS: &str = "id, username, password_hash, user_level, email, first_name, last_name,
     password_reset, reset_token, reset_token_expires_at, created_at, updated_at";

/// Users table backed by SQLite
#[derive(Clone)]
pub struct SqliteUserStore {
    db: SqlitePool,
}

impl SqliteUserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Map a unique constraint failure to the column that caused it
fn duplicate_field(error: &sqlx::Error) -> Option<&'static str> {
    let sqlx::Error::Database(db_error) = error else {
        return None;
    };
    if !db_error.is_unique_violation() {
        return None;
    }

    let message = db_error.message();
    if message.contains("users.username") {
        Some("username")
    } else if message.contains("users.email") {
        Some("email")
    } else {
        None
    }
}

fn user_from_row(row: &SqliteRow) -> StoreResult<User> {
    let id: UserId = row.try_get("id")?;

    let level: i64 = row.try_get("user_level")?;
    let role = Role::from_level(level)
        .ok_or_else(|| StoreError::Corrupt(format!("user {} has unknown level {}", id, level)))?;

    let token: Option<String> = row.try_get("reset_token")?;
    let expires_at: Option<DateTime<Utc>> = row.try_get("reset_token_expires_at")?;
    let reset = match (token, expires_at) {
        (Some(token), Some(expires_at)) => Some(ResetToken { token, expires_at }),
        (None, None) => None,
        _ => {
            return Err(StoreError::Corrupt(format!(
                "user {} has a half-set reset token",
                id
            )))
        }
    };

    Ok(User {
        id,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        password_reset: row.try_get("password_reset")?,
        reset,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn find_user(&self, filter: &UserFilter) -> StoreResult<Option<User>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM users WHERE ", USER_COLUMNS));
        match filter {
            UserFilter::Id(id) => {
                query.push("id = ").push_bind(*id);
            }
            UserFilter::Username(username) => {
                query.push("username = ").push_bind(username.clone());
            }
            UserFilter::Email(email) => {
                query.push("email = ").push_bind(email.clone());
            }
            UserFilter::ResetToken(token) => {
                query.push("reset_token = ").push_bind(token.clone());
            }
        }
        query.push(" LIMIT 1");

        let row = query.build().fetch_optional(&self.db).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, user_level, email, first_name, last_name, password_reset, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.level())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(|e| match duplicate_field(&e) {
            Some(field) => StoreError::Duplicate { field },
            None => StoreError::Database(e),
        })?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            password_reset: false,
            reset: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_user_if(
        &self,
        id: UserId,
        expected: UserCondition,
        patch: UserPatch,
    ) -> StoreResult<u64> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE users SET updated_at = ");
        query.push_bind(Utc::now());

        if let Some(hash) = patch.password_hash {
            query.push(", password_hash = ").push_bind(hash);
        }
        if let Some(flag) = patch.password_reset {
            query.push(", password_reset = ").push_bind(flag);
        }
        match patch.reset {
            Some(Some(reset)) => {
                query.push(", reset_token = ").push_bind(reset.token);
                query
                    .push(", reset_token_expires_at = ")
                    .push_bind(reset.expires_at);
            }
            Some(None) => {
                query.push(", reset_token = NULL, reset_token_expires_at = NULL");
            }
            None => {}
        }

        query.push(" WHERE id = ").push_bind(id);
        match expected {
            UserCondition::Exists => {}
            UserCondition::HoldsResetToken { token, now } => {
                query.push(" AND reset_token = ").push_bind(token);
                query.push(" AND reset_token_expires_at > ").push_bind(now);
            }
        }

        let result = query.build().execute(&self.db).await?;
        Ok(result.rows_affected())
    }
}
