//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        db::PgStore,
        local::JsonFileStore,
        review_llm::{
            CohereReviewAdapter, GeminiReviewAdapter, HuggingFaceReviewAdapter,
            OpenAiReviewAdapter, ReviewDispatcher, ReviewProvider,
        },
        scripture::BibleApiAdapter,
    },
    config::Config,
    error::ApiError,
    sync::RecordSyncService,
    web::{
        attach_user,
        auth::{login_handler, logout_handler, signup_handler},
        create_review_handler, delete_devotion_handler, list_check_ins_handler,
        list_devotions_handler, rest::ApiDoc, save_check_in_handler, scripture_handler,
        state::AppState, ws_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use devotion_core::ports::{CloudStore, ReviewService, ScriptureService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let cloud_store = Arc::new(PgStore::new(db_pool.clone()));
    info!("Running database migrations...");
    cloud_store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let local_store = Arc::new(JsonFileStore::new(config.local_store_dir.clone()));
    let sync = Arc::new(RecordSyncService::new(
        cloud_store.clone() as Arc<dyn CloudStore>,
        local_store,
    ));

    let http = reqwest::Client::new();

    let scripture: Option<Arc<dyn ScriptureService>> =
        config.scripture_api_key.as_ref().map(|key| {
            Arc::new(BibleApiAdapter::new(
                http.clone(),
                key.clone(),
                config.scripture_bible_id.clone(),
            )) as Arc<dyn ScriptureService>
        });
    if scripture.is_none() {
        info!("No SCRIPTURE_API_KEY set; scripture lookups will return setup instructions.");
    }

    // Review providers, in selection priority order.
    let mut providers: Vec<(ReviewProvider, Arc<dyn ReviewService>)> = Vec::new();
    if let Some(key) = &config.gemini_api_key {
        providers.push((
            ReviewProvider::Gemini,
            Arc::new(GeminiReviewAdapter::new(
                http.clone(),
                key.clone(),
                config.gemini_models.clone(),
            )),
        ));
    }
    if let Some(key) = &config.huggingface_api_key {
        providers.push((
            ReviewProvider::HuggingFace,
            Arc::new(HuggingFaceReviewAdapter::new(
                http.clone(),
                key.clone(),
                config.huggingface_model.clone(),
            )),
        ));
    }
    if let Some(key) = &config.openai_api_key {
        let openai_client = Client::with_config(OpenAIConfig::new().with_api_key(key));
        providers.push((
            ReviewProvider::OpenAi,
            Arc::new(OpenAiReviewAdapter::new(
                openai_client,
                config.openai_review_model.clone(),
            )),
        ));
    }
    if let Some(key) = &config.cohere_api_key {
        providers.push((
            ReviewProvider::Cohere,
            Arc::new(CohereReviewAdapter::new(
                http.clone(),
                key.clone(),
                config.cohere_model.clone(),
            )),
        ));
    }
    let review = Arc::new(ReviewDispatcher::new(providers));
    match review.active_provider() {
        Some(provider) => info!("AI reviews will use the {} provider.", provider.name()),
        None => info!("No AI API key set; review requests will return setup instructions."),
    }

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        sync,
        cloud: cloud_store,
        scripture,
        review,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Auth routes never need a resolved user.
    let auth_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Everything else works anonymously too; the middleware attaches
    // whichever user the session cookie identifies.
    let app_routes = Router::new()
        .route("/records/devotions", get(list_devotions_handler))
        .route("/records/devotions/{id}", delete(delete_devotion_handler))
        .route(
            "/checkins",
            get(list_check_ins_handler).put(save_check_in_handler),
        )
        .route("/scripture", get(scripture_handler))
        .route("/reviews", post(create_review_handler))
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            attach_user,
        ));

    let api_router = Router::new()
        .merge(auth_routes)
        .merge(app_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
