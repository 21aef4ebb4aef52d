use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use backend::{
    AppState,
    config::Config,
    middleware::{RateLimiter, identity_middleware, log_errors, rate_limit},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'foodshare_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
    };

    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    let api_routes = Router::new()
        // auth and user routes
        .route("/auth/token/login/", post(routes::user::login))
        .route(
            "/users/",
            get(routes::user::list_users).post(routes::user::register),
        )
        .route("/users/me/", get(routes::user::get_me))
        .route(
            "/users/me/avatar/",
            put(routes::user::put_avatar).delete(routes::user::delete_avatar),
        )
        .route("/users/subscriptions/", get(routes::user::subscriptions))
        .route("/users/{id}/", get(routes::user::get_user))
        .route(
            "/users/{id}/subscribe/",
            post(routes::user::subscribe).delete(routes::user::unsubscribe),
        )
        // catalog routes
        .route("/ingredients/", get(routes::ingredient::list_ingredients))
        .route("/ingredients/{id}/", get(routes::ingredient::get_ingredient))
        .route("/tags/", get(routes::tag::list_tags))
        .route("/tags/{id}/", get(routes::tag::get_tag))
        // recipe routes
        .route(
            "/recipes/",
            get(routes::recipe::list_recipes).post(routes::recipe::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart/",
            get(routes::recipe::download_shopping_cart),
        )
        .route(
            "/recipes/{id}/",
            get(routes::recipe::get_recipe)
                .patch(routes::recipe::update_recipe)
                .delete(routes::recipe::delete_recipe),
        )
        .route("/recipes/{id}/get-link/", get(routes::recipe::get_short_link))
        .route(
            "/recipes/{id}/favorite/",
            post(routes::recipe::add_favorite).delete(routes::recipe::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(routes::recipe::add_to_shopping_cart)
                .delete(routes::recipe::remove_from_shopping_cart),
        )
        // bearer tokens are decoded once here; handlers decide whether a
        // login is mandatory
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let router = Router::new()
        .nest("/api", api_routes)
        .route(
            "/s/{short_code}",
            get(routes::shortlink::resolve_short_link),
        )
        .nest_service(
            config.media_url.trim_end_matches('/'),
            ServeDir::new(&config.media_root),
        );

    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        let cors = CorsLayer::permissive();
        router.layer(cors)
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
