use axum::{
    extract::{Extension, Json, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use axum_extra::extract::Query;
use serde_json::json;

use crate::{
    AppState,
    error::AppError,
    result::Paginated,
    routes::Pagination,
    utils::{Claims, OptionalClaims, success_to_api_response},
};

use super::model::{
    CreateRecipeRequest, Recipe, RecipeFilters, RecipeRelation, UpdateRecipeRequest,
    render_shopping_list,
};

#[axum::debug_handler]
pub async fn list_recipes(
    State(state): State<AppState>,
    Extension(identity): Extension<OptionalClaims>,
    Query(filters): Query<RecipeFilters>,
) -> Result<impl IntoResponse, AppError> {
    let page = Pagination {
        limit: filters.limit,
        offset: filters.offset,
    };
    let (count, results) = Recipe::list(
        &state.pool,
        &state.config,
        &filters,
        identity.user_id(),
        page.limit(),
        page.offset(),
    )
    .await?;

    Ok((
        StatusCode::OK,
        success_to_api_response(Paginated { count, results }),
    ))
}

#[axum::debug_handler]
pub async fn get_recipe(
    State(state): State<AppState>,
    Extension(identity): Extension<OptionalClaims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let recipe = Recipe::find_by_id(&state.pool, id).await?;
    let detail = recipe
        .detail(&state.pool, &state.config, identity.user_id())
        .await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn create_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let recipe = Recipe::create(&state.pool, &state.config, claims.sub, req).await?;
    let detail = recipe
        .detail(&state.pool, &state.config, Some(claims.sub))
        .await?;
    Ok((StatusCode::CREATED, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn update_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let recipe = Recipe::update(&state.pool, &state.config, id, claims.sub, req).await?;
    let detail = recipe
        .detail(&state.pool, &state.config, Some(claims.sub))
        .await?;
    Ok((StatusCode::OK, success_to_api_response(detail)))
}

#[axum::debug_handler]
pub async fn delete_recipe(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Recipe::delete(&state.pool, &state.config, id, claims.sub).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_relation(
    state: &AppState,
    relation: RecipeRelation,
    user_id: i64,
    recipe_id: i64,
) -> Result<(StatusCode, axum::Json<crate::result::ApiResult<super::model::RecipeMini>>), AppError>
{
    let mini =
        Recipe::add_relation(&state.pool, &state.config, relation, user_id, recipe_id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(mini)))
}

async fn remove_relation(
    state: &AppState,
    relation: RecipeRelation,
    user_id: i64,
    recipe_id: i64,
) -> Result<StatusCode, AppError> {
    Recipe::remove_relation(&state.pool, relation, user_id, recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn add_favorite(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    add_relation(&state, RecipeRelation::Favorite, claims.sub, id).await
}

#[axum::debug_handler]
pub async fn remove_favorite(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    remove_relation(&state, RecipeRelation::Favorite, claims.sub, id).await
}

#[axum::debug_handler]
pub async fn add_to_shopping_cart(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    add_relation(&state, RecipeRelation::ShoppingCart, claims.sub, id).await
}

#[axum::debug_handler]
pub async fn remove_from_shopping_cart(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    remove_relation(&state, RecipeRelation::ShoppingCart, claims.sub, id).await
}

#[axum::debug_handler]
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<impl IntoResponse, AppError> {
    let items = Recipe::shopping_list(&state.pool, claims.sub).await?;
    let report = render_shopping_list(&items);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        report,
    ))
}

#[axum::debug_handler]
pub async fn get_short_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Validation("missing Host header".to_string()))?;
    let recipe = Recipe::find_by_id(&state.pool, id).await?;
    let short_link = format!("https://{}/s/{}", host, recipe.short_code);
    Ok((
        StatusCode::OK,
        success_to_api_response(json!({ "short-link": short_link })),
    ))
}
