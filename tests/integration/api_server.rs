//! Integration tests for the API Server
//!
//! Routes run against an in-memory earnings store, a blank chart renderer
//! and, where needed, a mocked completions API.


use std::sync::atomic::Ordering;
use std::time::Duration;

use earnings_radar::charts::ChartStyle;
use earnings_radar::db::EstimateSource;
use earnings_radar::models::EstimateRow;
use earnings_radar::services::SUMMARY_FALLBACK;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_utils::{
    entry, mock_completion, mock_summarizer, unscored_entry, MemoryStore, TestAppBuilder,
};

fn week_of_earnings() -> MemoryStore {
    // today is 2024-06-01, so the window is 2024-06-02..=2024-06-08
    MemoryStore::with_calendar(vec![
        entry("AAPL", "2024-06-03", 3.0, 0.8),
        entry("MSFT", "2024-06-03", 2.0, 0.2),
        entry("GOOG", "2024-06-05", 1.0, 0.5),
        entry("GOOG", "2024-06-07", 0.5, 0.9),
        entry("TSLA", "2024-06-01", 1.0, 0.1),
        entry("NVDA", "2024-06-09", 1.0, 0.1),
    ])
}

fn aapl_estimates() -> Vec<EstimateRow> {
    vec![
        EstimateRow::pair("2024-06-30", "1.35", "1.40"),
        EstimateRow::pair("2024-03-31", "1.20", "1.15"),
        EstimateRow::pair("2023-12-31", "n/a", "1.30"),
    ]
}

#[tokio::test]
async fn health_endpoint_reports_healthy_status() {
    let app = TestAppBuilder::new("health").build();
    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert!(body["uptime_seconds"].as_u64().is_some());
    assert_eq!(body["service"], "earnings-radar");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn metrics_endpoint_exposes_prometheus_metrics() {
    let app = TestAppBuilder::new("metrics").build();
    let _ = app.server.get("/health").await;

    let response = app.server.get("/metrics").await;
    assert_eq!(response.status_code(), 200);

    let body = response.text();
    for name in [
        "http_requests_total",
        "http_request_duration_seconds",
        "http_requests_in_flight",
        "dashboard_cache_hits_total",
        "charts_rendered_total",
    ] {
        assert!(body.contains(name), "Expected {} metric", name);
    }
    assert!(app.metrics.http_requests_total.get() >= 1);
}

#[tokio::test]
async fn dashboard_groups_upcoming_earnings_by_date() {
    let app = TestAppBuilder::new("dashboard").store(week_of_earnings()).build();

    let response = app.server.get("/most-anticipated").await;
    assert_eq!(response.status_code(), 200);

    let html = response.text();
    let first_day = html.find("<h2>2024-06-03</h2>").expect("2024-06-03 group");
    let second_day = html.find("<h2>2024-06-05</h2>").expect("2024-06-05 group");
    assert!(first_day < second_day);

    let msft = html.find(">MSFT<").expect("MSFT row");
    let aapl = html.find(">AAPL<").expect("AAPL row");
    let goog = html.find(">GOOG<").expect("GOOG row");
    assert!(first_day < msft && msft < aapl && aapl < second_day && second_day < goog);

    // GOOG appears once, under its earliest date
    assert!(!html.contains("<h2>2024-06-07</h2>"));
    assert!(html.contains("href=\"/stock/GOOG\""));

    // outside [today+1, today+7]
    assert!(!html.contains("TSLA"));
    assert!(!html.contains("NVDA"));
}

#[tokio::test]
async fn dashboard_keeps_symbols_with_null_scores() {
    let app = TestAppBuilder::new("dashboard-null-scores")
        .store(MemoryStore::with_calendar(vec![
            entry("AAPL", "2024-06-03", 3.0, 0.8),
            unscored_entry("IBM", "2024-06-03"),
            unscored_entry("ORCL", "2024-06-03"),
            entry("ORCL", "2024-06-04", 1.0, 0.3),
        ]))
        .build();

    let response = app.server.get("/most-anticipated").await;
    assert_eq!(response.status_code(), 200);

    let html = response.text();
    // IBM has only null scores: listed with blank cells, ahead of scored rows
    assert!(html.contains("<a href=\"/stock/IBM\">IBM</a></td><td></td><td></td>"));
    // ORCL keeps its earliest date even though that row had no score
    assert!(!html.contains("<h2>2024-06-04</h2>"));
    assert!(html.contains("<a href=\"/stock/ORCL\">ORCL</a></td><td>1</td><td>0.3</td>"));

    let ibm = html.find(">IBM<").unwrap();
    let orcl = html.find(">ORCL<").unwrap();
    let aapl = html.find(">AAPL<").unwrap();
    assert!(ibm < orcl && orcl < aapl);
}

#[tokio::test]
async fn dashboard_without_upcoming_earnings_is_plain_no_data() {
    let app = TestAppBuilder::new("dashboard-empty")
        .store(MemoryStore::with_calendar(vec![entry("TSLA", "2024-06-20", 1.0, 0.1)]))
        .build();

    let response = app.server.get("/most-anticipated").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "No data found");

    let content_type = response.header("content-type");
    assert!(content_type.to_str().unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn dashboard_is_served_from_cache_within_ttl() {
    let app = TestAppBuilder::new("dashboard-cache")
        .store(week_of_earnings())
        .cache_ttl(Duration::from_secs(60))
        .build();

    let first = app.server.get("/most-anticipated").await;
    let second = app.server.get("/most-anticipated").await;

    assert_eq!(first.status_code(), 200);
    assert_eq!(second.status_code(), 200);
    assert_eq!(first.text(), second.text());
    assert_eq!(app.store.anticipated_calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.metrics.dashboard_cache_misses_total.get(), 1);
    assert_eq!(app.metrics.dashboard_cache_hits_total.get(), 1);
}

#[tokio::test]
async fn dashboard_without_cache_queries_every_time() {
    let app = TestAppBuilder::new("dashboard-nocache")
        .store(week_of_earnings())
        .build();

    let _ = app.server.get("/most-anticipated").await;
    let _ = app.server.get("/most-anticipated").await;

    assert_eq!(app.store.anticipated_calls.load(Ordering::SeqCst), 2);
    assert_eq!(app.metrics.dashboard_cache_hits_total.get(), 0);
}

#[tokio::test]
async fn database_failure_is_a_server_error() {
    let app = TestAppBuilder::new("db-failure")
        .store(MemoryStore::failing())
        .build();

    let dashboard = app.server.get("/most-anticipated").await;
    assert_eq!(dashboard.status_code(), 500);

    let details = app.server.get("/stock/AAPL").await;
    assert_eq!(details.status_code(), 500);
}

#[tokio::test]
async fn missing_database_answers_service_unavailable() {
    let app = TestAppBuilder::new("no-db").without_database().build();

    assert_eq!(app.server.get("/most-anticipated").await.status_code(), 503);
    assert_eq!(app.server.get("/stock/AAPL").await.status_code(), 503);

    let health = app.server.get("/health").await;
    assert_eq!(health.status_code(), 200);
    let body: Value = health.json();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], false);
}

#[tokio::test]
async fn unknown_ticker_reports_no_data_without_writing_a_chart() {
    let app = TestAppBuilder::new("unknown-ticker").build();

    let response = app.server.get("/stock/XYZ").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "No data found for ticker: XYZ");
    assert!(!app.static_root.join("graphs/XYZ_eps_comparison.png").exists());
    assert_eq!(app.metrics.charts_rendered_total.get(), 0);
}

#[tokio::test]
async fn ticker_with_only_unusable_rows_reports_no_data() {
    let store = MemoryStore::default().with_estimates(
        "BAD",
        EstimateSource::Consensus,
        vec![
            EstimateRow::pair("2024-03-31", "n/a", "1.15"),
            EstimateRow::pair("not a date", "1.0", "1.0"),
        ],
    );
    let app = TestAppBuilder::new("unusable-rows").store(store).build();

    let response = app.server.get("/stock/BAD").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "No data found for ticker: BAD");
}

#[tokio::test]
async fn malformed_ticker_never_reaches_the_store() {
    let app = TestAppBuilder::new("malformed-ticker").build();

    let response = app.server.get("/stock/..%2Fetc").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "No data found for ticker: ../etc");

    let response = app.server.get("/stock/.hidden").await;
    assert_eq!(response.text(), "No data found for ticker: .hidden");

    assert_eq!(app.store.estimate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stock_details_renders_chart_and_serves_it() {
    let store = MemoryStore::default().with_estimates("AAPL", EstimateSource::Consensus, aapl_estimates());
    let app = TestAppBuilder::new("details-line").store(store).build();

    let response = app.server.get("/stock/AAPL").await;
    assert_eq!(response.status_code(), 200);

    let html = response.text();
    assert!(html.contains("<img src=\"/static/graphs/AAPL_eps_comparison.png\""));
    // no summarizer configured
    assert!(!html.contains("class=\"summary\""));
    assert!(app.static_root.join("graphs/AAPL_eps_comparison.png").is_file());
    assert_eq!(app.metrics.charts_rendered_total.get(), 1);

    let image = app.server.get("/static/graphs/AAPL_eps_comparison.png").await;
    assert_eq!(image.status_code(), 200);
    assert_eq!(image.header("content-type"), "image/png");
}

#[tokio::test]
async fn bar_style_reads_history_and_uses_details_suffix() {
    let store = MemoryStore::default()
        .with_estimates("AAPL", EstimateSource::History, aapl_estimates());
    let app = TestAppBuilder::new("details-bar")
        .store(store)
        .style(ChartStyle::Bar)
        .build();

    let response = app.server.get("/stock/AAPL").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains("/static/graphs/AAPL_details.png"));
    assert!(app.static_root.join("graphs/AAPL_details.png").is_file());
}

#[tokio::test]
async fn repeated_requests_overwrite_a_single_chart() {
    let store = MemoryStore::default().with_estimates("AAPL", EstimateSource::Consensus, aapl_estimates());
    let app = TestAppBuilder::new("details-repeat").store(store).build();

    for _ in 0..3 {
        assert_eq!(app.server.get("/stock/AAPL").await.status_code(), 200);
    }

    let files: Vec<_> = std::fs::read_dir(app.static_root.join("graphs"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from("AAPL_eps_comparison.png")]);
}

#[tokio::test]
async fn stock_details_includes_generated_summary() {
    let mock = MockServer::start().await;
    mock_completion(&mock, "AAPL has grown steadily.\n- one\n- two\n- three").await;

    let store = MemoryStore::default().with_estimates("AAPL", EstimateSource::Consensus, aapl_estimates());
    let app = TestAppBuilder::new("details-summary")
        .store(store)
        .summarizer(mock_summarizer(&mock, Duration::from_secs(5)))
        .build();

    let html = app.server.get("/stock/AAPL").await.text();
    assert!(html.contains("AAPL has grown steadily."));
    assert!(html.contains("- three"));
    assert!(!html.contains(SUMMARY_FALLBACK));
}

#[tokio::test]
async fn summary_timeout_falls_back_and_still_renders_chart() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock)
        .await;

    let store = MemoryStore::default().with_estimates("AAPL", EstimateSource::Consensus, aapl_estimates());
    let app = TestAppBuilder::new("details-summary-timeout")
        .store(store)
        .summarizer(mock_summarizer(&mock, Duration::from_millis(100)))
        .build();

    let response = app.server.get("/stock/AAPL").await;
    assert_eq!(response.status_code(), 200);

    let html = response.text();
    assert!(html.contains(SUMMARY_FALLBACK));
    assert!(html.contains("<img src=\"/static/graphs/AAPL_eps_comparison.png\""));
    assert_eq!(
        app.metrics
            .summary_failures_total
            .with_label_values(&["timeout"])
            .get(),
        1
    );
}

#[tokio::test]
async fn summary_server_error_falls_back() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock)
        .await;

    let store = MemoryStore::default().with_estimates("AAPL", EstimateSource::Consensus, aapl_estimates());
    let app = TestAppBuilder::new("details-summary-500")
        .store(store)
        .summarizer(mock_summarizer(&mock, Duration::from_secs(5)))
        .build();

    let response = app.server.get("/stock/AAPL").await;
    assert_eq!(response.status_code(), 200);
    assert!(response.text().contains(SUMMARY_FALLBACK));
}
