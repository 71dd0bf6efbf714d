// In crates/web-server/src/lib.rs

use app_config::types::ServerSettings;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use database::SharedStore;
use ledger::{Ledger, ProgressionTracker};
use market::{PriceFeed, VolatilityModel};
use std::sync::Arc;
use tokio::net::TcpListener;
use types::{
    EarnXpRequest, MarketDataResponse, PortfolioResponse, ProgressionResponse, TradeRequest,
    TradeResponse,
};

pub mod auth;
pub mod error;
pub mod extract;
pub mod types;

// Re-export our custom error type for convenience.
pub use auth::CurrentUser;
pub use error::{Error, Result};
pub use extract::ApiJson;

/// The shared application state that is available to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub feed: Arc<PriceFeed>,
    pub progression: Arc<ProgressionTracker>,
}

impl AppState {
    /// Wires every component to the same store.
    pub fn new(store: SharedStore, model: VolatilityModel) -> Self {
        let feed = PriceFeed::new(store.clone(), model);
        Self::with_feed(store, feed)
    }

    pub fn with_feed(store: SharedStore, feed: PriceFeed) -> Self {
        Self {
            ledger: Arc::new(Ledger::new(store.clone())),
            feed: Arc::new(feed),
            progression: Arc::new(ProgressionTracker::new(store)),
        }
    }
}

/// Creates the main application router with all routes and middleware.
///
/// # Arguments
///
/// * `app_state`: The shared `AppState` containing the ledger, feed and tracker.
///
/// # Returns
///
/// The configured `axum::Router`.
pub fn create_router(app_state: AppState) -> Router {
    // The presentation layer may be served from another origin during development.
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let api_router = Router::new()
        .route("/trade", post(trade_handler))
        .route("/market-data", get(market_data_handler))
        .route("/earn-xp", post(earn_xp_handler))
        .route("/instruments", get(instruments_handler))
        .route("/portfolio", get(portfolio_handler))
        .route("/progression", get(progression_handler));

    Router::new()
        .route("/health", get(health_check_handler))
        .nest("/api", api_router)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// A simple health check handler.
async fn health_check_handler() -> &'static str {
    "OK"
}

/// Handler for `POST /api/trade`.
/// Applies a buy or sell and returns the user's holdings afterwards.
async fn trade_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<TradeRequest>,
) -> Result<Json<TradeResponse>> {
    let holdings = state.ledger.place_trade(user, &request.into()).await?;

    Ok(Json(TradeResponse {
        success: true,
        portfolio: holdings.into_iter().map(Into::into).collect(),
    }))
}

/// Handler for `GET /api/market-data`.
/// Every call advances the simulated market by one tick.
async fn market_data_handler(State(state): State<AppState>) -> Result<Json<MarketDataResponse>> {
    let snapshots = state.feed.tick().await?;
    Ok(Json(snapshots.into()))
}

/// Handler for `POST /api/earn-xp`
async fn earn_xp_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<EarnXpRequest>,
) -> Result<Json<ProgressionResponse>> {
    let progression = state.progression.award_xp(user, request.amount).await?;
    Ok(Json(progression.into()))
}

/// Handler for `GET /api/instruments`
async fn instruments_handler(State(state): State<AppState>) -> Result<Json<MarketDataResponse>> {
    let snapshots = state.feed.catalog().await?;
    Ok(Json(snapshots.into()))
}

/// Handler for `GET /api/portfolio`
async fn portfolio_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<PortfolioResponse>> {
    let valuation = state.ledger.valuation(user).await?;
    Ok(Json(valuation.into()))
}

/// Handler for `GET /api/progression`
async fn progression_handler(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ProgressionResponse>> {
    let progression = state.progression.progression(user).await?;
    Ok(Json(progression.into()))
}

/// The main entry point for running the web server.
///
/// This function sets up the TCP listener and serves the application router.
/// It will run forever until the process is terminated.
pub async fn run(settings: ServerSettings, app_state: AppState) -> Result<()> {
    let app = create_router(app_state);

    let address = format!("{}:{}", settings.host, settings.port);
    let listener = TcpListener::bind(&address).await.map_err(Error::ServerBindError)?;
    tracing::info!("Web server listening on {}", address);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(Error::ServeError)?;

    Ok(())
}
