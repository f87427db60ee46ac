use fedkick_core::{Model, Stats, UpdateAck};
use fedkick_server::{
    store::{BlobStore, MemoryStore},
    App, ModelInitConfig, ServerConfig,
};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

fn app() -> (App, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::default());
    let config = ServerConfig::default().model(ModelInitConfig::default().hidden(vec![16]));
    (App::new(store.clone(), &config), store)
}

async fn call(app: &App, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::empty(),
    };
    let req = Request::builder().method(method).uri(uri).body(body).unwrap();
    app.handle(req).await
}

async fn json<T: serde::de::DeserializeOwned>(resp: Response<Body>) -> T {
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn update(base_version: u64, count: u64, bias: f32) -> Value {
    json!({
        "who": "gregory",
        "baseVersion": base_version,
        "count": count,
        "delta": { "dense_1.bias": vec![bias; 10] }
    })
}

#[test_log::test(tokio::test)]
async fn scenario_fresh_model_accepts_concurrent_deltas() {
    let (app, _) = app();

    let resp = call(&app, Method::GET, "/model?who=gregory", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let model: Model = json(resp).await;
    assert_eq!(model.version, 0);
    let all: Vec<f32> = model.weights.values().flatten().copied().collect();
    assert!(all.iter().all(|v| v.abs() <= 0.05));
    assert!((all.iter().sum::<f32>() / all.len() as f32).abs() < 0.01);

    for expected_total in 1..=2 {
        let resp = call(&app, Method::POST, "/update", Some(update(0, 32, 0.5))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let ack: UpdateAck = json(resp).await;
        assert!(ack.ok);
        assert_eq!(ack.stats.unwrap().total, expected_total);
    }
}

#[test_log::test(tokio::test)]
async fn scenario_aggregation_makes_old_version_stale() {
    let (app, store) = app();
    let before: Model = json(call(&app, Method::GET, "/model?who=gregory", None).await).await;
    call(&app, Method::POST, "/update", Some(update(0, 32, 0.5))).await;
    call(&app, Method::POST, "/update", Some(update(0, 32, 1.5))).await;

    let resp = call(&app, Method::POST, "/aggregate", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
    assert!(store.list("updates/", 10).await.unwrap().is_empty());

    let after: Model = json(call(&app, Method::GET, "/model?who=gregory", None).await).await;
    assert_eq!(after.version, 1);
    for (a, b) in after.weights["dense_1.bias"]
        .iter()
        .zip(before.weights["dense_1.bias"].iter())
    {
        assert!((a - b - 0.1).abs() < 1e-6);
    }
    assert_eq!(after.weights["dense_0.weight"], before.weights["dense_0.weight"]);

    let resp = call(&app, Method::POST, "/update", Some(update(0, 32, 0.5))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let resp = call(&app, Method::POST, "/update", Some(update(1, 32, 0.5))).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_routing_errors() {
    let (app, _) = app();
    let cases = [
        (Method::GET, "/model?who=alice", StatusCode::BAD_REQUEST),
        (Method::GET, "/model", StatusCode::BAD_REQUEST),
        (Method::GET, "/update", StatusCode::METHOD_NOT_ALLOWED),
        (Method::POST, "/stats", StatusCode::METHOD_NOT_ALLOWED),
        (Method::GET, "/nowhere", StatusCode::NOT_FOUND),
        (Method::GET, "/", StatusCode::NOT_FOUND),
    ];
    for (method, uri, status) in cases {
        let resp = call(&app, method.clone(), uri, None).await;
        assert_eq!(resp.status(), status, "{} {}", method, uri);
    }

    let resp = call(&app, Method::POST, "/update", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err: Value = json(resp).await;
    assert!(err["error"].as_str().unwrap().contains("invalid json"));

    // No model has been created yet.
    let resp = call(&app, Method::POST, "/update", Some(update(0, 1, 0.0))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_count_accepted_updates_only() {
    let (app, _) = app();
    let stats: Stats = json(call(&app, Method::GET, "/stats", None).await).await;
    assert_eq!(stats.total, 0);
    assert_eq!(stats.per_agent["fred"], 0);

    call(&app, Method::GET, "/model?who=gregory", None).await;
    call(&app, Method::POST, "/update", Some(update(0, 4, 0.1))).await;
    call(&app, Method::POST, "/update", Some(update(9, 4, 0.1))).await;

    let stats: Stats = json(call(&app, Method::GET, "/stats", None).await).await;
    assert_eq!(stats.total, 1);
    assert_eq!(stats.per_agent["gregory"], 1);
    assert_eq!(stats.per_agent["fred"], 0);
}

#[test_log::test(tokio::test)]
async fn test_corrupt_model_is_served_as_initial() {
    let (app, store) = app();
    store
        .set("models/fred/latest.json", "{not json".to_string())
        .await
        .unwrap();

    let resp = call(&app, Method::GET, "/model?who=fr%65d", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let model: Model = json(resp).await;
    assert_eq!(model.version, 0);

    // The other participant is still aggregated.
    call(&app, Method::GET, "/model?who=gregory", None).await;
    call(&app, Method::POST, "/update", Some(update(0, 8, 0.5))).await;
    let resp = call(&app, Method::POST, "/aggregate", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let gregory: Model = json(call(&app, Method::GET, "/model?who=gregory", None).await).await;
    assert_eq!(gregory.version, 1);
}
