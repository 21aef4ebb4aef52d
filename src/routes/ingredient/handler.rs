use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::{Ingredient, IngredientSearchQuery};
use crate::{AppState, error::AppError, utils::success_to_api_response};

#[axum::debug_handler]
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let ingredients = Ingredient::search(&state.pool, query.name.as_deref()).await?;
    Ok((StatusCode::OK, success_to_api_response(ingredients)))
}

#[axum::debug_handler]
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let ingredient = Ingredient::find_by_id(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(ingredient)))
}
