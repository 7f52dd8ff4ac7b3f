use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use health_etl::common::config::{AggregationPolicy, NamedQuery};
use health_etl::extract::{MetricsExtractor, BASIC_METRICS_SOURCE};
use serde_json::json;

use crate::{extract_config, start_mock_server, t0, FixedClock, Matcher, RecordingSleeper};

fn extractor(url: &str, sleeper: Arc<RecordingSleeper>) -> MetricsExtractor {
    MetricsExtractor::with_runtime(
        extract_config(url),
        sleeper,
        Arc::new(FixedClock(t0() + ChronoDuration::minutes(1))),
    )
    .unwrap()
}

fn up_vector() -> String {
    json!({
        "status": "success",
        "data": {
            "resultType": "vector",
            "result": [{
                "metric": {"__name__": "up", "job": "test-app", "instance": "localhost:8080"},
                "value": [1_700_000_000, "1"]
            }]
        }
    })
    .to_string()
}

fn matrix(name: &str, job: &str, points: &[(i64, &str)]) -> String {
    let values: Vec<_> = points.iter().map(|(ts, v)| json!([ts, v])).collect();
    json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [{
                "metric": {"__name__": name, "job": job, "instance": "localhost:8080"},
                "values": values
            }]
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_instant_query_yields_one_sample() {
    let mut server = match start_mock_server("test_instant_query_yields_one_sample").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::UrlEncoded("query".into(), "up".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(up_vector())
        .expect(1)
        .create_async()
        .await;

    let extractor = extractor(&server.url(), RecordingSleeper::new());
    let result = extractor.extract_instant("up", None).await;

    mock.assert_async().await;
    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.len(), 1);

    let sample = &result.data[0];
    assert_eq!(sample.metric_name, "up");
    assert_eq!(sample.value, 1.0);
    assert_eq!(sample.timestamp, t0());
    assert_eq!(sample.labels.get("job").map(String::as_str), Some("test-app"));
    assert!(!sample.labels.contains_key("__name__"));
}

#[tokio::test]
async fn test_range_query_sends_window_and_parses_matrix() {
    let mut server = match start_mock_server("test_range_query_sends_window_and_parses_matrix").await {
        Some(server) => server,
        None => return,
    };

    let start = t0();
    let end = t0() + ChronoDuration::minutes(1);

    let mock = server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "request_rate".into()),
            Matcher::UrlEncoded("start".into(), "1700000000.000".into()),
            Matcher::UrlEncoded("end".into(), "1700000060.000".into()),
            Matcher::UrlEncoded("step".into(), "15".into()),
        ]))
        .with_status(200)
        .with_body(matrix(
            "request_rate",
            "api",
            &[(1_700_000_000, "12.5"), (1_700_000_015, "NaN"), (1_700_000_030, "13")],
        ))
        .expect(1)
        .create_async()
        .await;

    let extractor = extractor(&server.url(), RecordingSleeper::new());
    let result = extractor
        .extract("request_rate", start, end, Duration::from_secs(15))
        .await;

    mock.assert_async().await;
    assert!(result.success);
    assert_eq!(result.source, "request_rate");
    assert_eq!(result.len(), 3);
    assert_eq!(result.data[0].value, 12.5);
    // NaN is kept here; cleaning is the transformer's job
    assert!(result.data[1].value.is_nan());
    assert_eq!(result.data[2].timestamp, t0() + ChronoDuration::seconds(30));
}

#[tokio::test]
async fn test_unavailable_backend_is_retried_up_to_budget() {
    let mut server = match start_mock_server("test_unavailable_backend_is_retried_up_to_budget").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(503)
        .with_body("service unavailable")
        .expect(4)
        .create_async()
        .await;

    let sleeper = RecordingSleeper::new();
    let extractor = extractor(&server.url(), Arc::clone(&sleeper));
    let result = extractor.extract_instant("up", None).await;

    mock.assert_async().await;
    assert!(!result.success);
    assert!(result.is_empty());
    assert_eq!(result.attempts, 4);
    assert!(result.error.as_deref().unwrap().contains("503"));
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(10); 3]);
}

#[tokio::test]
async fn test_rejected_query_is_not_retried() {
    let mut server = match start_mock_server("test_rejected_query_is_not_retried").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(400)
        .with_body(
            json!({"status": "error", "errorType": "bad_data", "error": "parse error at char 4"})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let sleeper = RecordingSleeper::new();
    let extractor = extractor(&server.url(), Arc::clone(&sleeper));
    let result = extractor.extract_instant("up{", None).await;

    mock.assert_async().await;
    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.error.as_deref().unwrap().contains("bad_data"));
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_invalid_window_never_reaches_backend() {
    let mut server = match start_mock_server("test_invalid_window_never_reaches_backend").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let extractor = extractor(&server.url(), RecordingSleeper::new());

    let reversed = extractor
        .extract("up", t0(), t0() - ChronoDuration::minutes(5), Duration::from_secs(15))
        .await;
    assert!(!reversed.success);
    assert_eq!(reversed.attempts, 0);

    let zero_step = extractor
        .extract("up", t0(), t0() + ChronoDuration::minutes(5), Duration::ZERO)
        .await;
    assert!(!zero_step.success);

    mock.assert_async().await;
}

async fn partial_failure(policy: AggregationPolicy) -> Option<health_etl::model::ExtractionResult> {
    let mut server = start_mock_server("partial_failure").await?;

    server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::UrlEncoded("query".into(), "up".into()))
        .with_status(200)
        .with_body(matrix("up", "api", &[(1_700_000_000, "1")]))
        .create_async()
        .await;

    server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::UrlEncoded(
            "query".into(),
            "sum(rate(http_requests_total[5m]))".into(),
        ))
        .with_status(422)
        .with_body(json!({"status": "error", "errorType": "execution", "error": "boom"}).to_string())
        .create_async()
        .await;

    let mut config = extract_config(&server.url());
    config.aggregation = policy;
    config.queries = vec![
        NamedQuery::new("up", "up"),
        NamedQuery::new("request_rate", "sum(rate(http_requests_total[5m]))"),
    ];

    let extractor = MetricsExtractor::with_runtime(
        config,
        RecordingSleeper::new(),
        Arc::new(FixedClock(t0() + ChronoDuration::minutes(1))),
    )
    .unwrap();

    Some(extractor.get_basic_metrics().await)
}

#[tokio::test]
async fn test_basic_metrics_keep_partial_data_under_any_success() {
    let Some(result) = partial_failure(AggregationPolicy::AnySuccess).await else {
        return;
    };

    assert!(result.success);
    assert_eq!(result.source, BASIC_METRICS_SOURCE);
    assert_eq!(result.len(), 1);
    assert_eq!(result.queries.len(), 2);
    assert!(result.queries[0].success);
    assert!(!result.queries[1].success);
    assert_eq!(result.queries[1].attempts, 1);
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_basic_metrics_fail_under_all_success() {
    let Some(result) = partial_failure(AggregationPolicy::AllSuccess).await else {
        return;
    };

    assert!(!result.success);
    // Successful queries still contribute their rows
    assert_eq!(result.len(), 1);
    assert!(result.error.as_deref().unwrap().starts_with("request_rate:"));
}

#[tokio::test]
async fn test_closed_extractor_skips_network() {
    let mut server = match start_mock_server("test_closed_extractor_skips_network").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut extractor = extractor(&server.url(), RecordingSleeper::new());
    extractor.close();
    extractor.close();
    assert!(extractor.is_closed());

    let result = extractor.extract_instant("up", None).await;
    assert!(!result.success);
    assert_eq!(result.attempts, 0);
    assert!(!extractor.test_connection().await);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_throttled_query_is_not_retried() {
    let mut server = match start_mock_server("test_throttled_query_is_not_retried").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query")
        .match_query(Matcher::Any)
        .with_status(429)
        .with_body("too many requests")
        .expect(1)
        .create_async()
        .await;

    let sleeper = RecordingSleeper::new();
    let extractor = extractor(&server.url(), Arc::clone(&sleeper));
    let result = extractor.extract_instant("up", None).await;

    mock.assert_async().await;
    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    assert!(result.error.as_deref().unwrap().contains("429"));
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_silent_backend_times_out_and_is_retried() {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("skipping test_silent_backend_times_out_and_is_retried - {e}");
            return;
        }
    };
    let addr = listener.local_addr().unwrap();

    // Accept connections and hold them open without ever answering
    let acceptor = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    let mut config = extract_config(&format!("http://{addr}"));
    config.timeout = 1;
    config.retry_attempts = 1;

    let sleeper = RecordingSleeper::new();
    let extractor = MetricsExtractor::with_runtime(
        config,
        Arc::<RecordingSleeper>::clone(&sleeper),
        Arc::new(FixedClock(t0())),
    )
    .unwrap();

    let result = extractor.extract_instant("up", None).await;
    acceptor.abort();

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("Timeout"));
    assert!(error.contains("1000ms"));
    assert_eq!(sleeper.sleeps().len(), 1);
}

#[tokio::test]
async fn test_unrepresentable_lookback_fails_without_network() {
    let mut server = match start_mock_server("test_unrepresentable_lookback_fails_without_network").await {
        Some(server) => server,
        None => return,
    };

    let mock = server
        .mock("GET", "/api/v1/query_range")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut config = extract_config(&server.url());
    config.lookback_minutes = 1_000_000_000_000;

    let extractor = MetricsExtractor::with_runtime(
        config,
        RecordingSleeper::new(),
        Arc::new(FixedClock(t0())),
    )
    .unwrap();

    let result = extractor.get_basic_metrics().await;

    mock.assert_async().await;
    assert!(!result.success);
    assert_eq!(result.source, BASIC_METRICS_SOURCE);
    assert!(result.error.as_deref().unwrap().contains("out of range"));
}
