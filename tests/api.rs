//! Integration tests for the HTTP API, driven through the router with a fake
//! provider and temporary data directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use finbot::models::{AppConfig, Bar, CacheConfig, CorporateEvents, Dividend, Interval, NewsItem};
use finbot::server::{create_router, AppState};
use finbot::services::{MarketDataProvider, ProviderError};

/// Serves `bars` for every symbol except `MISSING`
struct StubProvider {
    bars: Vec<Bar>,
    events: CorporateEvents,
}

#[async_trait]
impl MarketDataProvider for StubProvider {
    async fn fetch_bars(
        &self,
        symbol: &str,
        _interval: Interval,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Bar>, ProviderError> {
        if symbol == "MISSING" {
            return Err(ProviderError::NoData);
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| b.time >= start && b.time <= end)
            .cloned()
            .collect())
    }

    async fn fetch_events(&self, symbol: &str) -> Result<CorporateEvents, ProviderError> {
        if symbol == "MISSING" {
            return Err(ProviderError::NoData);
        }
        Ok(self.events.clone())
    }

    async fn fetch_news(&self, symbol: &str) -> Result<Vec<NewsItem>, ProviderError> {
        if symbol == "MISSING" {
            return Err(ProviderError::NoData);
        }
        Ok(vec![NewsItem {
            uuid: "n1".to_string(),
            title: format!("{} beats estimates", symbol),
            publisher: "Reuters".to_string(),
            link: "https://example.com/n1".to_string(),
            published_at: Utc::now().naive_utc() - Duration::hours(3),
            kind: "STORY".to_string(),
            related_tickers: vec![symbol.to_string()],
        }])
    }

    async fn fetch_option_expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, ProviderError> {
        if symbol == "MISSING" {
            return Ok(Vec::new());
        }
        Ok(vec![
            NaiveDate::from_ymd_opt(2030, 1, 18).unwrap(),
            NaiveDate::from_ymd_opt(2030, 2, 15).unwrap(),
        ])
    }
}

const EQUITIES: &str = r#"{
    "AAPL": {"name": "Apple Inc.", "exchange": "NMS", "sector": "Information Technology", "country": "United States"},
    "MSFT": {"name": "Microsoft Corporation", "exchange": "NMS", "sector": "Information Technology", "country": "United States"},
    "XOM": {"name": "Exxon Mobil Corporation", "exchange": "NYQ", "sector": "Energy", "country": "United States"}
}"#;

const GICS: &str = r#"[
    {"sector_code": "10", "sector_name": "Energy",
     "industry_group_code": "1010", "industry_group_name": "Energy",
     "industry_code": "101020", "industry_name": "Oil, Gas & Consumable Fuels",
     "sub_industry_code": "10102010", "sub_industry_name": "Integrated Oil & Gas"},
    {"sector_code": "45", "sector_name": "Information Technology",
     "industry_group_code": "4510", "industry_group_name": "Software & Services",
     "industry_code": "451030", "industry_name": "Software",
     "sub_industry_code": "45103010", "sub_industry_name": "Application Software"}
]"#;

struct TestApp {
    router: Router,
    cache_dir: TempDir,
    _data_dir: TempDir,
}

fn daily_bars(n: i64) -> Vec<Bar> {
    let today = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap();
    (1..=n)
        .map(|i| Bar::new(today - Duration::days(n + 1 - i), 100.0 + i as f64, 101.0, 99.0, 100.0 + i as f64, 1e6))
        .collect()
}

fn test_app() -> TestApp {
    let cache_dir = tempfile::tempdir().unwrap();
    let data_dir = tempfile::tempdir().unwrap();
    fs::write(data_dir.path().join("all_Equities.json"), EQUITIES).unwrap();
    fs::write(data_dir.path().join("gics.json"), GICS).unwrap();

    let config = AppConfig {
        cache: CacheConfig::new(cache_dir.path().to_path_buf()),
        reference_data_dir: data_dir.path().to_path_buf(),
        provider_base_url: "http://localhost".to_string(),
        port: 0,
    };

    let dividend_time = Utc::now().naive_utc() - Duration::days(30);
    let provider = StubProvider {
        bars: daily_bars(100),
        events: CorporateEvents {
            dividends: vec![Dividend {
                time: dividend_time,
                amount: 0.24,
            }],
            splits: Vec::new(),
        },
    };

    TestApp {
        router: create_router(AppState::new(&config, Arc::new(provider))),
        cache_dir,
        _data_dir: data_dir,
    }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn cache_file(dir: &Path, name: &str) -> std::path::PathBuf {
    dir.join(name)
}

#[tokio::test]
async fn test_root_and_health() {
    let app = test_app();

    let (status, body) = get(&app.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, body) = get(&app.router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cached_series_count"], 0);
    assert_eq!(body["refresh_enabled"], false);
}

#[tokio::test]
async fn test_history_backfills_and_previews_newest_first() {
    let app = test_app();

    let (status, body) = get(&app.router, "/history/AAPL?interval=1d&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["interval"], "1d");
    assert_eq!(body["count"], 100);

    let preview: Vec<Value> = serde_json::from_str(body["preview"].as_str().unwrap()).unwrap();
    assert_eq!(preview.len(), 5);
    assert_eq!(preview[0]["Close"], 200.0);
    let times: Vec<&str> = preview.iter().map(|r| r["Datetime"].as_str().unwrap()).collect();
    assert!(times.windows(2).all(|w| w[0] > w[1]));

    assert!(cache_file(app.cache_dir.path(), "AAPL_1d.csv").exists());

    // Second read is served from the cache with the same size
    let (status, body) = get(&app.router, "/history/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 100);

    let (_, health) = get(&app.router, "/health").await;
    assert_eq!(health["cached_series_count"], 1);
}

#[tokio::test]
async fn test_history_errors() {
    let app = test_app();

    let (status, body) = get(&app.router, "/history/MISSING").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("MISSING"));

    let (status, body) = get(&app.router, "/history/AAPL?interval=2d").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = get(&app.router, "/history/AAPL?start=whenever").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/history/AAPL?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/history/A%2FB").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_corporate_actions() {
    let app = test_app();

    let (status, body) = get(&app.router, "/dividends/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dividends"][0]["amount"], 0.24);

    let (status, _) = get(&app.router, "/splits/AAPL").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app.router, "/actions/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["dividends"].as_array().unwrap().len(), 1);
    assert!(body["splits"].as_array().unwrap().is_empty());

    let (status, _) = get(&app.router, "/actions/MISSING").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app.router, "/sectors").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["sectors"].as_array().unwrap().iter().any(|s| s == "technology"));
}

#[tokio::test]
async fn test_news_and_options() {
    let app = test_app();

    let (status, body) = get(&app.router, "/news/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symbol"], "AAPL");
    assert_eq!(body["news"][0]["title"], "AAPL beats estimates");
    assert_eq!(body["news"][0]["type"], "STORY");

    let (status, _) = get(&app.router, "/news/MISSING").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(&app.router, "/options/AAPL").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expirations"], serde_json::json!(["2030-01-18", "2030-02-15"]));

    let (status, body) = get(&app.router, "/options/MISSING").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_query_is_json_error() {
    let app = test_app();

    let (status, body) = get(&app.router, "/history/AAPL?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("limit"));

    let (status, body) = get(&app.router, "/autocomplete/equities?q=a&limit=-3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_instruments() {
    let app = test_app();

    let (status, body) = get(&app.router, "/instruments/types").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"].as_array().unwrap().len(), 7);

    let (status, body) = get(&app.router, "/instruments/equities?sector=information&limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "equities");
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["symbol"], "AAPL");

    let (status, _) = get(&app.router, "/instruments/equities?family=x").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&app.router, "/instruments/bonds").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Valid type without a data file
    let (status, _) = get(&app.router, "/instruments/funds").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_autocomplete_and_filters() {
    let app = test_app();

    let (status, body) = get(&app.router, "/autocomplete/equities?q=corp").await;
    assert_eq!(status, StatusCode::OK);
    let symbols: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["symbol"].as_str().unwrap()).collect();
    assert_eq!(symbols, vec!["MSFT", "XOM"]);

    let (status, _) = get(&app.router, "/autocomplete/equities").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(&app.router, "/filters/equities").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"][0], "country");
    assert!(body["fields"].as_array().unwrap().iter().any(|f| f == "symbol"));
}

#[tokio::test]
async fn test_gics_routes() {
    let app = test_app();

    let (status, body) = get(&app.router, "/gics/sectors").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sectors"], serde_json::json!(["Energy", "Information Technology"]));

    let (status, body) = get(&app.router, "/gics/hierarchy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Energy");
    assert_eq!(
        body[1]["industry_groups"][0]["industries"][0]["sub_industries"][0]["name"],
        "Application Software"
    );

    let (status, body) = get(&app.router, "/gics/industries?sector=energy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Oil, Gas & Consumable Fuels");

    let (status, body) = get(&app.router, "/gics/sub-industries?industry=Software").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["industry"], "Software");

    let (status, body) = get(&app.router, "/gics/industry-groups").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}
