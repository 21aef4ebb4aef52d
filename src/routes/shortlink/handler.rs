use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};

use crate::{AppState, error::AppError, routes::recipe::Recipe};

/// Resolves `/s/{short_code}` to the recipe detail page. The token is
/// assigned once at recipe creation and never rotated.
#[axum::debug_handler]
pub async fn resolve_short_link(
    State(state): State<AppState>,
    Path(short_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let recipe = Recipe::find_by_short_code(&state.pool, &short_code).await?;
    Ok(Redirect::temporary(&format!("/recipes/{}", recipe.id)))
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use tower::ServiceExt;

    use crate::utils::generate_short_code;

    // Issued links are "https://<host>/s/<code>" with no trailing slash; the
    // route shape has to accept exactly that path.
    #[tokio::test]
    async fn issued_link_path_matches_the_route() {
        let app = Router::new().route("/s/{short_code}", get(|| async { StatusCode::OK }));

        let code = generate_short_code();
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/s/{}", code))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
