use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::config::Config;
use crate::error::AppError;
use crate::routes::recipe::RecipeMini;
use crate::utils::media_url;

const MAX_NAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub avatar: Option<String>,
}

/// Public profile representation shared by the user and recipe endpoints.
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub avatar: Option<String>,
}

/// Profile enriched with the author's recipes, returned by the subscription
/// endpoints.
#[derive(Debug, Serialize)]
pub struct FollowProfile {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recipes: Vec<RecipeMini>,
    pub recipes_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetAvatarRequest {
    pub avatar: String,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub recipes_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub recipes_limit: Option<i64>,
}

// Length caps mirror the VARCHAR columns, which count characters.
pub(crate) fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || username.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "username must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits and @/./+/-/_".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    validate_username(&req.username)?;
    if req.email.is_empty()
        || req.email.chars().count() > MAX_EMAIL_LEN
        || !req.email.contains('@')
    {
        return Err(AppError::Validation("invalid email address".to_string()));
    }
    if req.first_name.is_empty() || req.first_name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation("first_name is required".to_string()));
    }
    if req.last_name.is_empty() || req.last_name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation("last_name is required".to_string()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

impl User {
    const COLUMNS: &'static str =
        "id, email, username, first_name, last_name, password_hash, avatar";

    pub async fn create(pool: &PgPool, req: &RegisterRequest) -> Result<Self, AppError> {
        let exists: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM users WHERE email = $1 OR username = $2")
                .bind(&req.email)
                .bind(&req.username)
                .fetch_optional(pool)
                .await?;
        if exists.is_some() {
            return Err(AppError::UserExists);
        }

        let password_hash = crate::utils::hash_password(&req.password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            Self::COLUMNS
        ))
        .bind(&req.email)
        .bind(&req.username)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(password_hash)
        .fetch_one(pool)
        .await?;

        tracing::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Self, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            Self::COLUMNS
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("user"))
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            Self::COLUMNS
        ))
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<Self>), AppError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY id LIMIT $1 OFFSET $2",
            Self::COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((count, users))
    }

    pub fn verify_login(&self, password: &str) -> Result<bool, bcrypt::BcryptError> {
        crate::utils::verify_password(password, &self.password_hash)
    }

    /// Whether `follower` (when logged in) follows this user.
    pub async fn is_followed_by(
        &self,
        pool: &PgPool,
        follower: Option<i64>,
    ) -> Result<bool, AppError> {
        let Some(follower) = follower else {
            return Ok(false);
        };
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND author_id = $2)",
        )
        .bind(follower)
        .bind(self.id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn profile(
        &self,
        pool: &PgPool,
        config: &Config,
        viewer: Option<i64>,
    ) -> Result<UserProfile, AppError> {
        let is_subscribed = self.is_followed_by(pool, viewer).await?;
        Ok(self.to_profile(config, is_subscribed))
    }

    pub fn to_profile(&self, config: &Config, is_subscribed: bool) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            id: self.id,
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            is_subscribed,
            avatar: self.avatar.as_deref().map(|path| media_url(config, path)),
        }
    }

    /// Replaces the avatar path and returns the previous one so the caller
    /// can clean up the old file.
    pub async fn set_avatar(
        pool: &PgPool,
        user_id: i64,
        path: Option<String>,
    ) -> Result<Option<String>, AppError> {
        let (old,): (Option<String>,) =
            sqlx::query_as("SELECT avatar FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
            .bind(&path)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(old)
    }
}

/// Directed follow edges between users; uniqueness and the self-follow ban
/// are also enforced by table constraints.
pub struct Follow;

impl Follow {
    pub async fn subscribe(pool: &PgPool, follower: i64, author: i64) -> Result<(), AppError> {
        if follower == author {
            return Err(AppError::SelfFollow);
        }

        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND author_id = $2)",
        )
        .bind(follower)
        .bind(author)
        .fetch_one(pool)
        .await?;
        if exists {
            return Err(AppError::AlreadyExists(
                "you are already following this user".to_string(),
            ));
        }

        sqlx::query("INSERT INTO follows (follower_id, author_id) VALUES ($1, $2)")
            .bind(follower)
            .bind(author)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn unsubscribe(pool: &PgPool, follower: i64, author: i64) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND author_id = $2")
            .bind(follower)
            .bind(author)
            .execute(pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "you are not following this user".to_string(),
            ));
        }
        Ok(())
    }

    /// Followed authors, ordered by username for a stable page sequence.
    pub async fn subscriptions(
        pool: &PgPool,
        follower: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(i64, Vec<User>), AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
                .bind(follower)
                .fetch_one(pool)
                .await?;

        let authors = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.username, u.first_name, u.last_name,
                   u.password_hash, u.avatar
            FROM users u
            JOIN follows f ON f.author_id = u.id
            WHERE f.follower_id = $1
            ORDER BY u.username, u.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(follower)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok((count, authors))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn valid_request() -> RegisterRequest {
        RegisterRequest {
            email: "cook@example.com".to_string(),
            username: "cook_01".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_registration(&valid_request()).is_ok());
    }

    #[rstest]
    #[case("cook.01")]
    #[case("cook@home")]
    #[case("a+b-c_d")]
    fn allowed_username_charset(#[case] username: &str) {
        assert!(validate_username(username).is_ok());
    }

    #[test]
    fn username_limit_counts_characters_not_bytes() {
        // 150 Cyrillic characters are 300 bytes but still fit VARCHAR(150).
        assert!(validate_username(&"ё".repeat(150)).is_ok());
        assert!(validate_username(&"ё".repeat(151)).is_err());
    }

    #[rstest]
    #[case("")]
    #[case("has space")]
    #[case("semi;colon")]
    #[case("slash/name")]
    fn rejected_usernames(#[case] username: &str) {
        assert!(validate_username(username).is_err());
    }

    #[test]
    fn short_password_is_rejected() {
        let mut req = valid_request();
        req.password = "short".to_string();
        assert!(validate_registration(&req).is_err());
    }

    #[test]
    fn email_without_at_is_rejected() {
        let mut req = valid_request();
        req.email = "not-an-email".to_string();
        assert!(validate_registration(&req).is_err());
    }
}
