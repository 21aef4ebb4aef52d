use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    error::AppError,
    result::Paginated,
    routes::Pagination,
    routes::recipe::Recipe,
    utils::{Claims, OptionalClaims, generate_token, store_image, success_to_api_response},
};

use super::model::{
    AvatarResponse, Follow, FollowProfile, LoginRequest, LoginResponse, RegisterRequest,
    SetAvatarRequest, SubscribeQuery, SubscriptionsQuery, User, validate_registration,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_registration(&req)?;
    let user = User::create(&state.pool, &req).await?;
    Ok((
        StatusCode::CREATED,
        success_to_api_response(user.to_profile(&state.config, false)),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invalid =
        || AppError::Validation("unable to log in with the provided credentials".to_string());

    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(invalid)?;
    if !user.verify_login(&req.password)? {
        return Err(invalid());
    }

    let token = generate_token(user.id, &state.config)
        .map_err(|e| AppError::Internal(format!("failed to issue token: {}", e)))?;
    Ok((
        StatusCode::OK,
        success_to_api_response(LoginResponse { auth_token: token }),
    ))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(identity): Extension<OptionalClaims>,
    Query(page): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let (count, users) = User::list(&state.pool, page.limit(), page.offset()).await?;

    let mut results = Vec::with_capacity(users.len());
    for user in &users {
        results.push(
            user.profile(&state.pool, &state.config, identity.user_id())
                .await?,
        );
    }

    Ok((
        StatusCode::OK,
        success_to_api_response(Paginated { count, results }),
    ))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    Extension(identity): Extension<OptionalClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.pool, id).await?;
    let profile = user
        .profile(&state.pool, &state.config, identity.user_id())
        .await?;
    Ok((StatusCode::OK, success_to_api_response(profile)))
}

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let user = User::find_by_id(&state.pool, claims.sub).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(user.to_profile(&state.config, false)),
    ))
}

#[axum::debug_handler]
pub async fn put_avatar(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<SetAvatarRequest>,
) -> Result<impl IntoResponse, AppError> {
    let path = store_image(&state.config, "users/avatars", &req.avatar).await?;
    let url = crate::utils::media_url(&state.config, &path);
    let old = User::set_avatar(&state.pool, claims.sub, Some(path)).await?;
    if let Some(old) = old {
        crate::utils::remove_image(&state.config, &old).await;
    }

    Ok((
        StatusCode::OK,
        success_to_api_response(AvatarResponse { avatar: Some(url) }),
    ))
}

#[axum::debug_handler]
pub async fn delete_avatar(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let old = User::set_avatar(&state.pool, claims.sub, None).await?;
    match old {
        Some(old) => {
            crate::utils::remove_image(&state.config, &old).await;
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::Validation("user has no avatar".to_string())),
    }
}

/// Profile plus the author's recipes, as returned by the subscription
/// endpoints. `recipes_limit` caps the embedded recipe list only.
async fn follow_profile(
    state: &AppState,
    author: &User,
    recipes_limit: Option<i64>,
) -> Result<FollowProfile, AppError> {
    let recipes =
        Recipe::minis_by_author(&state.pool, &state.config, author.id, recipes_limit).await?;
    let recipes_count = Recipe::count_by_author(&state.pool, author.id).await?;
    Ok(FollowProfile {
        profile: author.to_profile(&state.config, true),
        recipes,
        recipes_count,
    })
}

#[axum::debug_handler]
pub async fn subscribe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Query(query): Query<SubscribeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let author = User::find_by_id(&state.pool, id).await?;
    Follow::subscribe(&state.pool, claims.sub, author.id).await?;
    tracing::info!("User {} subscribed to {}", claims.sub, author.id);

    let profile = follow_profile(&state, &author, query.recipes_limit).await?;
    Ok((StatusCode::CREATED, success_to_api_response(profile)))
}

#[axum::debug_handler]
pub async fn unsubscribe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let author = User::find_by_id(&state.pool, id).await?;
    Follow::unsubscribe(&state.pool, claims.sub, author.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn subscriptions(
    State(state): State<AppState>,
    claims: Claims,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = Pagination {
        limit: query.limit,
        offset: query.offset,
    };
    let (count, authors) =
        Follow::subscriptions(&state.pool, claims.sub, page.limit(), page.offset()).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in &authors {
        results.push(follow_profile(&state, author, query.recipes_limit).await?);
    }

    Ok((
        StatusCode::OK,
        success_to_api_response(Paginated { count, results }),
    ))
}
