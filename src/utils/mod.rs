use axum::Json;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::AppError;
use crate::result::ApiResult;

/// Length of the per-recipe short-link token.
pub const SHORT_CODE_LEN: usize = 22;

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64, // user id
    pub exp: i64, // expiry timestamp
    pub iat: i64, // issued-at timestamp
}

/// Identity extension for public routes; present when the caller sent a
/// valid bearer token, None otherwise.
#[derive(Debug, Clone)]
pub struct OptionalClaims(pub Option<Claims>);

impl OptionalClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(|c| c.sub)
    }
}

pub fn generate_token(
    user_id: i64,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::seconds(config.jwt_expiration().as_secs() as i64))
        .expect("valid timestamp")
        .timestamp();

    let claims = Claims {
        sub: user_id,
        exp: expiration,
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// Random alphanumeric token assigned to a recipe at creation for the
/// /s/{code} redirect.
pub fn generate_short_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORT_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Decodes a `data:image/...;base64,` payload into raw bytes plus a file
/// extension. Anything that is not a recognised image data-URL is a
/// validation error.
pub fn decode_data_url(data_url: &str) -> Result<(Vec<u8>, &'static str), AppError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| AppError::Validation("expected a base64 data URL".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AppError::Validation("expected a base64 data URL".to_string()))?;

    let ext = match mime {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        other => {
            return Err(AppError::Validation(format!(
                "unsupported image type: {}",
                other
            )));
        }
    };

    let bytes = BASE64
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("invalid base64 image payload".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("empty image payload".to_string()));
    }

    Ok((bytes, ext))
}

/// Stores a decoded data-URL image under `<media_root>/<subdir>/` and returns
/// the path relative to the media root.
pub async fn store_image(
    config: &Config,
    subdir: &str,
    data_url: &str,
) -> Result<String, AppError> {
    let (bytes, ext) = decode_data_url(data_url)?;
    let file_name = format!("{}.{}", uuid::Uuid::new_v4(), ext);
    let dir = std::path::Path::new(&config.media_root).join(subdir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&file_name), bytes).await?;
    Ok(format!("{}/{}", subdir, file_name))
}

/// Removes a previously stored media file. Best effort: a missing file is
/// logged, not surfaced.
pub async fn remove_image(config: &Config, relative_path: &str) {
    let path = std::path::Path::new(&config.media_root).join(relative_path);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Failed to remove media file {}: {}", relative_path, e);
    }
}

/// Public URL for a media path stored in the database.
pub fn media_url(config: &Config, relative_path: &str) -> String {
    format!(
        "{}/{}",
        config.media_url.trim_end_matches('/'),
        relative_path
    )
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResult<T>> {
    Json(ApiResult::success(data))
}

pub fn error_to_api_response<T: Serialize>(code: i32, msg: String) -> Json<ApiResult<T>> {
    Json(ApiResult::error(code, &msg))
}

pub mod error_codes {
    pub const SUCCESS: i32 = 0;
    pub const VALIDATION_ERROR: i32 = 1000;
    pub const USER_EXISTS: i32 = 1001;
    pub const AUTH_FAILED: i32 = 1002;
    pub const PERMISSION_DENIED: i32 = 1003;
    pub const NOT_FOUND: i32 = 1004;
    pub const RATE_LIMIT: i32 = 1005;
    pub const ALREADY_EXISTS: i32 = 1006;
    pub const SELF_FOLLOW: i32 = 1007;
    pub const INTERNAL_ERROR: i32 = 5000;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            redis_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            jwt_expiration_secs: 3600,
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            server_host: "127.0.0.1".to_string(),
            server_port: 3000,
            media_root: "media".to_string(),
            media_url: "/media".to_string(),
        }
    }

    #[test]
    fn token_roundtrip_preserves_user_id() {
        let config = test_config();
        let token = generate_token(42, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let config = test_config();
        let token = generate_token(42, &config).unwrap();

        let mut other = test_config();
        other.jwt_secret = "different-secret".to_string();
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn short_code_is_fixed_length_alphanumeric() {
        let code = generate_short_code();
        assert_eq!(code.len(), SHORT_CODE_LEN);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn short_codes_do_not_trivially_collide() {
        assert_ne!(generate_short_code(), generate_short_code());
    }

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("hunter2").unwrap();
        assert!(verify_password("hunter2", &hash).unwrap());
        assert!(!verify_password("hunter3", &hash).unwrap());
    }

    #[rstest]
    #[case("data:image/png;base64,aGVsbG8=", "png")]
    #[case("data:image/jpeg;base64,aGVsbG8=", "jpg")]
    #[case("data:image/webp;base64,aGVsbG8=", "webp")]
    fn decode_data_url_accepts_images(#[case] input: &str, #[case] expected_ext: &str) {
        let (bytes, ext) = decode_data_url(input).unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, expected_ext);
    }

    #[rstest]
    #[case("not a data url")]
    #[case("data:text/plain;base64,aGVsbG8=")]
    #[case("data:image/png;base64,%%%")]
    #[case("data:image/png;base64,")]
    fn decode_data_url_rejects_garbage(#[case] input: &str) {
        assert!(decode_data_url(input).is_err());
    }

    #[test]
    fn media_url_joins_without_double_slash() {
        let mut config = test_config();
        config.media_url = "/media/".to_string();
        assert_eq!(
            media_url(&config, "users/avatars/a.png"),
            "/media/users/avatars/a.png"
        );
    }
}
