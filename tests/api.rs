use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use analytics_services::build_app;
use analytics_services::config::Config;

fn app() -> Router {
    build_app(Config::default())
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    session: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = session {
        builder = builder.header("x-session-id", id);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn sample_rows() -> Value {
    json!({
        "rows": [
            {"region": "North", "units": 1, "price": 10.0},
            {"region": "South", "units": 2, "price": 20.0},
            {"region": null, "units": 3, "price": 30.5},
            {"region": "North", "units": 1, "price": 10.0}
        ]
    })
}

#[test]
fn health_reports_service() {
    let (status, body) = tokio_test::block_on(send(&app(), Method::GET, "/health", None, None));
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn analysis_before_ingest_is_not_found() {
    let app = app();
    for uri in ["/api/analytics/summary", "/api/cleaning/quality", "/api/ml/anomalies"] {
        let (status, body) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["code"], "NO_DATA_LOADED");
    }
}

#[tokio::test]
async fn ingest_preview_and_quality() {
    let app = app();
    let (status, info) = send(&app, Method::POST, "/api/data/rows", Some(sample_rows()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["rows"], 4);
    assert_eq!(info["headers"], json!(["region", "units", "price"]));

    let (_, preview) = send(&app, Method::GET, "/api/data/preview?limit=2", None, None).await;
    assert_eq!(preview["data"].as_array().unwrap().len(), 2);
    assert_eq!(preview["total_rows"], 4);
    assert_eq!(preview["has_cleaned"], false);
    assert_eq!(preview["data"][0]["region"], "North");

    let (_, quality) = send(&app, Method::GET, "/api/cleaning/quality", None, None).await;
    assert_eq!(quality["missing_count"], 1);
    assert_eq!(quality["duplicate_count"], 1);
    assert_eq!(quality["total_cells"], 12);
    assert_eq!(quality["completeness"], 91.67);
    assert_eq!(quality["quality_score"], "Fair");
}

#[tokio::test]
async fn cleaning_replaces_current_dataset() {
    let app = app();
    send(&app, Method::POST, "/api/data/rows", Some(sample_rows()), None).await;

    let (status, body) = send(&app, Method::GET, "/api/data/cleaned", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NO_CLEANED_DATA");

    let (status, result) = send(
        &app,
        Method::POST,
        "/api/cleaning/clean",
        Some(json!({"strategy": "mean"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["duplicates_removed"], 1);
    assert_eq!(result["final_rows"], 3);
    assert_eq!(result["strategy_used"], "mean");

    let (_, cleaned) = send(&app, Method::GET, "/api/data/cleaned", None, None).await;
    assert_eq!(cleaned["count"], 3);
    let (_, raw) = send(&app, Method::GET, "/api/data/raw", None, None).await;
    assert_eq!(raw["count"], 4);
    let (_, preview) = send(&app, Method::GET, "/api/data/preview", None, None).await;
    assert_eq!(preview["has_cleaned"], true);
    assert_eq!(preview["total_rows"], 3);

    // mean imputation leaves the categorical gap in place
    let (_, quality) = send(&app, Method::GET, "/api/cleaning/quality", None, None).await;
    assert_eq!(quality["total_cells"], 9);
    assert_eq!(quality["duplicate_count"], 0);
    assert_eq!(quality["missing_count"], 1);
    assert_eq!(quality["completeness"], 88.89);
}

#[tokio::test]
async fn invalid_strategy_leaves_store_untouched() {
    let app = app();
    send(&app, Method::POST, "/api/data/rows", Some(sample_rows()), None).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/cleaning/clean",
        Some(json!({"strategy": "magic"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CONFIG");

    let (_, preview) = send(&app, Method::GET, "/api/data/preview", None, None).await;
    assert_eq!(preview["has_cleaned"], false);
    assert_eq!(preview["total_rows"], 4);
}

#[tokio::test]
async fn correlation_with_one_numeric_column_is_an_error_object() {
    let app = app();
    let rows = json!({"rows": [{"a": 1, "b": "x"}, {"a": 2, "b": "y"}, {"a": 3, "b": "z"}]});
    send(&app, Method::POST, "/api/data/rows", Some(rows), None).await;

    let (status, body) = send(&app, Method::GET, "/api/analytics/correlation", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["error"].is_string());
    assert!(body.get("values").is_none());
}

#[tokio::test]
async fn unknown_column_is_a_bad_request() {
    let app = app();
    send(&app, Method::POST, "/api/data/rows", Some(sample_rows()), None).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/analytics/distribution?column=missing",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_COLUMN");

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/analytics/distribution?column=price&bins=2",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["values"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn hypothesis_endpoint_compares_two_columns() {
    let app = app();
    let rows: Vec<Value> = (1..=10)
        .map(|i| json!({"before": i, "after": i + 10, "group": "g"}))
        .collect();
    send(&app, Method::POST, "/api/data/rows", Some(json!({ "rows": rows })), None).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/analytics/hypothesis?col1=before&col2=after",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["significant"], true);
    assert_eq!(body["interpretation"], "Significant difference");
    assert!(body["t_statistic"].as_f64().unwrap() < -7.0);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/analytics/hypothesis?col1=before&col2=group",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_COLUMN");
}

#[tokio::test]
async fn sessions_do_not_share_datasets() {
    let app = app();
    let (_, created) = send(&app, Method::POST, "/api/session", None, None).await;
    let id = created["session_id"].as_str().unwrap().to_string();

    send(&app, Method::POST, "/api/data/rows", Some(sample_rows()), Some(&id)).await;

    let (status, _) = send(&app, Method::GET, "/api/analytics/summary", None, Some(&id)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/analytics/summary", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sample_sales_supports_ml_endpoints() {
    let app = app();
    let (status, info) = send(&app, Method::GET, "/api/data/generate/sales?size=200", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["rows"], 200);

    let (status, forecast) = send(
        &app,
        Method::POST,
        "/api/ml/forecast",
        Some(json!({"periods": 3})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(forecast["value_column"], "revenue");
    assert_eq!(forecast["date_column"], "date");
    let historical = forecast["historical"].as_array().unwrap().len();
    assert_eq!(forecast["forecast"].as_array().unwrap().len(), 3);
    assert_eq!(forecast["labels"].as_array().unwrap().len(), historical + 3);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/ml/forecast",
        Some(json!({"periods": 13})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, segments) = send(
        &app,
        Method::POST,
        "/api/ml/segment",
        Some(json!({"n_clusters": 1})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(segments["segments"].as_array().unwrap().len(), 2);
    assert_eq!(segments["algorithm"], "K-Means++");

    let (status, anomalies) = send(&app, Method::GET, "/api/ml/anomalies", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(anomalies["threshold"], 2.5);

    let (_, insights) = send(&app, Method::GET, "/api/analytics/insights", None, None).await;
    let insights = insights.as_array().unwrap();
    assert!(!insights.is_empty());
    let confidences: Vec<u64> = insights.iter().map(|i| i["confidence"].as_u64().unwrap()).collect();
    assert!(confidences.windows(2).all(|w| w[0] >= w[1]));

    let (_, recommendations) = send(&app, Method::GET, "/api/ml/recommendations", None, None).await;
    assert!(recommendations
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["confidence"] == 79));
}

#[tokio::test]
async fn csv_upload_and_unsupported_inputs() {
    let app = app();
    let csv = "date,revenue\n2024-01-01,100\n2024-01-02,150\n2024-01-03,\n";
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/data/upload?filename=sales.csv")
        .body(Body::from(csv))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let info: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(info["rows"], 3);

    let (_, trend) = send(
        &app,
        Method::GET,
        "/api/analytics/trend?date_col=date&value_col=revenue",
        None,
        None,
    )
    .await;
    assert_eq!(trend["labels"], json!(["2024-01-01", "2024-01-02"]));

    let (status, body) = send(&app, Method::POST, "/api/data/upload?filename=notes.txt", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/data/connect",
        Some(json!({"db_type": "postgres", "connection_string": "x", "table_name": "t"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_CONFIG");
}
