//! HTTP endpoint server using Axum

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{error, info, warn, Level};

use crate::cache::{CachedPage, PageCache};
use crate::charts::{ChartService, ChartStore, PlottersRenderer};
use crate::config::Config;
use crate::db::{EarningsStore, PostgresEarningsStore, MOST_ANTICIPATED_LIMIT};
use crate::metrics::Metrics;
use crate::models::EarningsWindow;
use crate::reports::{build_series, group_by_date};
use crate::services::summary::{summary_or_fallback, OpenAiSummarizer, Summarizer};
use crate::views;

pub const DASHBOARD_ROUTE: &str = "/most-anticipated";
pub const SERVICE_NAME: &str = "earnings-radar";

const DB_CONNECT_ATTEMPTS: usize = 3;

/// Source of the "today" anchor for the upcoming-earnings window.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(|| chrono::Local::now().date_naive())
}

/// Request-handler context, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub store: Option<Arc<dyn EarningsStore>>,
    pub cache: Arc<PageCache>,
    pub charts: ChartService,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(
        metrics: Arc<Metrics>,
        store: Option<Arc<dyn EarningsStore>>,
        cache: PageCache,
        charts: ChartService,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Self {
        Self {
            metrics,
            start_time: Arc::new(Instant::now()),
            store,
            cache: Arc::new(cache),
            charts,
            summarizer,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn require_store(&self) -> Result<&Arc<dyn EarningsStore>, StatusCode> {
        self.store.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
    }
}

impl IntoResponse for CachedPage {
    fn into_response(self) -> Response {
        match self {
            CachedPage::Html(body) => Html(body).into_response(),
            CachedPage::Text(body) => {
                ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
            }
        }
    }
}

/// Tickers are used in file names, so only a conservative alphabet passes.
pub fn is_valid_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 16
        && !ticker.starts_with('.')
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

/// `degraded` while the server runs without its earnings database.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let status = if state.store.is_some() { "healthy" } else { "degraded" };
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": status,
        "uptime_seconds": uptime_seconds,
        "service": SERVICE_NAME,
        "database": state.store.is_some(),
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();
    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();
    state.metrics.http_requests_in_flight.dec();

    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis() as u64,
            "HTTP request error"
        );
    }

    response
}

/// Upcoming earnings for the next week, grouped by date
async fn most_anticipated(State(state): State<AppState>) -> Result<Response, StatusCode> {
    if let Some(page) = state.cache.get(DASHBOARD_ROUTE).await {
        state.metrics.dashboard_cache_hits_total.inc();
        return Ok(page.into_response());
    }
    if state.cache.is_enabled() {
        state.metrics.dashboard_cache_misses_total.inc();
    }

    let store = state.require_store()?;
    let window = EarningsWindow::upcoming((state.clock)());
    let rows = store
        .most_anticipated(window, MOST_ANTICIPATED_LIMIT)
        .await
        .map_err(|e| {
            error!(error = %e, start = %window.start, end = %window.end, "Failed to load upcoming earnings");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let groups = group_by_date(rows);
    let page = if groups.is_empty() {
        info!(start = %window.start, end = %window.end, "No upcoming earnings in window");
        CachedPage::Text(views::NO_DATA.to_string())
    } else {
        CachedPage::Html(views::render_dashboard(&groups))
    };

    state.cache.put(DASHBOARD_ROUTE, &page).await;
    Ok(page.into_response())
}

/// EPS chart and optional narrative summary for one ticker
async fn stock_details(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Response, StatusCode> {
    if !is_valid_ticker(&ticker) {
        warn!(ticker = %ticker, "Rejected malformed ticker");
        return Ok(views::no_data_for_ticker(&ticker).into_response());
    }

    let store = state.require_store()?;
    let rows = store
        .ticker_estimates(&ticker, state.charts.style().estimate_source())
        .await
        .map_err(|e| {
            error!(error = %e, ticker = %ticker, "Failed to load estimates");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    let points = build_series(&rows);
    if points.is_empty() {
        info!(ticker = %ticker, rows = rows.len(), "No usable estimates");
        return Ok(views::no_data_for_ticker(&ticker).into_response());
    }

    let chart_path = match state.charts.render(&ticker, points).await {
        Ok(path) => {
            state.metrics.charts_rendered_total.inc();
            Some(path)
        }
        Err(e) => {
            error!(error = %e, ticker = %ticker, "Failed to render chart");
            None
        }
    };

    let summary = match &state.summarizer {
        Some(summarizer) => {
            Some(summary_or_fallback(summarizer.as_ref(), &ticker, Some(&state.metrics)).await)
        }
        None => None,
    };

    Ok(Html(views::render_stock_details(
        &ticker,
        chart_path.as_deref(),
        summary.as_deref(),
    ))
    .into_response())
}

pub fn create_router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.charts.store().static_root());

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route(DASHBOARD_ROUTE, get(most_anticipated))
        .route("/stock/{ticker}", get(stock_details))
        .nest_service("/static", static_files)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                ))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Build the application context from configuration.
pub async fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let metrics = Arc::new(Metrics::new()?);

    // The server starts without a database; data routes answer 503 until restart.
    let store: Option<Arc<dyn EarningsStore>> = match PostgresEarningsStore::connect_with_retry(
        &config.database_url,
        config.db_timeout,
        DB_CONNECT_ATTEMPTS,
    )
    .await
    {
        Ok(store) => {
            info!("Earnings database connected");
            metrics.database_connected.set(1.0);
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!(error = %e, "Earnings database unavailable - data endpoints will return 503");
            metrics.database_connected.set(0.0);
            None
        }
    };

    let cache = PageCache::from_config(&config.cache).await;

    let renderer = Arc::new(PlottersRenderer::new(config.chart_font_path.as_deref()));
    let charts = ChartService::new(
        config.chart_style,
        renderer,
        ChartStore::new(config.static_root.clone()),
    );

    let summarizer: Option<Arc<dyn Summarizer>> = match &config.summary {
        Some(summary_config) => match OpenAiSummarizer::new(summary_config.clone()) {
            Ok(client) => {
                info!(model = %summary_config.model, "Narrative summaries enabled");
                Some(Arc::new(client))
            }
            Err(e) => {
                warn!(error = %e, "Failed to build summary client - summaries disabled");
                None
            }
        },
        None => {
            info!("Narrative summaries disabled");
            None
        }
    };

    Ok(AppState::new(metrics, store, cache, charts, summarizer))
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = build_state(&config).await?;
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    info!(port = config.port, "HTTP server listening on port {}", config.port);
    info!(
        "Dashboard available at http://0.0.0.0:{}{}",
        config.port, DASHBOARD_ROUTE
    );
    axum::serve(listener, app).await?;

    Ok(())
}
