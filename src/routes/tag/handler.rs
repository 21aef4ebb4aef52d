use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use super::model::Tag;
use crate::{AppState, error::AppError, utils::success_to_api_response};

#[axum::debug_handler]
pub async fn list_tags(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let tags = Tag::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(tags)))
}

#[axum::debug_handler]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let tag = Tag::find_by_id(&state.pool, id).await?;
    Ok((StatusCode::OK, success_to_api_response(tag)))
}
