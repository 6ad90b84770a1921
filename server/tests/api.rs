use axum::{
    body::{to_bytes, Body},
    extract::ConnectInfo,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{Days, Local};
use meteo_server::model::NewStation;
use meteo_server::rest::{self, AppState};
use meteo_server::store::{MemoryStore, Store};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const DEVICE_ADDR: &str = "127.0.0.1:5000";
const OTHER_ADDR: &str = "10.0.0.99:41000";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

impl TestApp {
    async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store
            .create_station(
                NewStation::new("esp32-001", "Test Weather Station")
                    .location("Test Lab")
                    .address("http://127.0.0.1:5000"),
            )
            .await
            .unwrap();
        store
            .create_station(NewStation::new("esp32-open", "Open Station"))
            .await
            .unwrap();

        let router = rest::create_router(AppState::new(store.clone()));
        Self { router, store }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, Body::empty(), DEVICE_ADDR))
            .await
    }

    async fn put(&self, uri: &str, payload: Value) -> (StatusCode, Value) {
        self.put_from(uri, payload, DEVICE_ADDR).await
    }

    async fn put_from(&self, uri: &str, payload: Value, peer: &str) -> (StatusCode, Value) {
        self.send(request(
            Method::PUT,
            uri,
            Body::from(payload.to_string()),
            peer,
        ))
        .await
    }

    async fn sample_count(&self, station_ref: &str) -> u64 {
        let station = self.store.find_station(station_ref).await.unwrap().unwrap();
        self.store.sample_count(station.id).await.unwrap()
    }
}

fn request(method: Method, uri: &str, body: Body, peer: &str) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let peer: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

fn weather_batch(station_ref: &str, timestamps: &[&str]) -> Value {
    let data: Vec<Value> = timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| json!({"ts": ts, "tmp": 20.0 + i as f64, "hum": 50.0}))
        .collect();
    json!({"id": station_ref, "data": data})
}

#[tokio::test]
async fn test_weather_upload_stores_every_record() {
    let app = TestApp::new().await;
    let payload = weather_batch(
        "esp32-001",
        &["20250220140000", "20250220143000", "20250220150000"],
    );

    let (status, body) = app.put("/weather/upload/", payload).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["msg"], "Weather data received");
    assert_eq!(body["count"], 3);
    assert_eq!(app.sample_count("esp32-001").await, 3);
}

#[tokio::test]
async fn test_weather_upload_with_bad_timestamp_writes_nothing() {
    let app = TestApp::new().await;
    app.put(
        "/weather/upload/",
        weather_batch("esp32-001", &["20250220140000"]),
    )
    .await;
    assert_eq!(app.sample_count("esp32-001").await, 1);

    let payload = weather_batch(
        "esp32-001",
        &["20250220150000", "2025-02-20 15:30:00", "20250220160000"],
    );
    let (status, body) = app.put("/weather/upload/", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Invalid timestamp format: 2025-02-20 15:30:00"
    );
    assert_eq!(app.sample_count("esp32-001").await, 1);
}

#[tokio::test]
async fn test_weather_upload_with_out_of_range_reading_writes_nothing() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "esp32-001",
        "data": [
            {"ts": "20250220140000", "tmp": 21.0, "hum": 50.0},
            {"ts": "20250220143000", "tmp": 1e39, "hum": 50.0},
        ]
    });

    let (status, body) = app.put("/weather/upload/", payload).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid reading: "));
    assert_eq!(app.sample_count("esp32-001").await, 0);

    let (_, body) = app.get("/lastreport/esp32-001/").await;
    assert_eq!(body["error"], "No weather data available");
}

#[tokio::test]
async fn test_weather_upload_rounds_readings() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "esp32-001",
        "data": [{"ts": "20250220145900", "tmp": 25.04, "hum": 55.06}]
    });
    app.put("/weather/upload/", payload).await;

    let (status, body) = app.get("/lastreport/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "esp32-001");
    assert_eq!(body["ts"], "20250220145900");
    assert_eq!(body["tmp"].as_f64(), Some(25.0));
    assert_eq!(body["hum"].as_f64(), Some(55.1));
}

#[tokio::test]
async fn test_malformed_upload_bodies() {
    let app = TestApp::new().await;

    let (status, body) = app
        .send(request(
            Method::PUT,
            "/weather/upload/",
            Body::from("{not json"),
            DEVICE_ADDR,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid JSON");

    let (status, body) = app
        .put("/weather/upload/", json!({"id": "esp32-001", "data": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid data format. Expected a list.");

    let (status, _) = app
        .put("/minmax/upload/", json!({"id": "esp32-001"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            "/weather/upload/",
            json!({"id": "esp32-001", "data": [{"ts": "20250220140000", "tmp": 20.0}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("hum"));

    let (status, body) = app
        .put("/weather/upload/", json!({"data": []}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing station id");
}

#[tokio::test]
async fn test_unregistered_address_accepts_any_origin() {
    let app = TestApp::new().await;
    let (status, body) = app
        .put_from(
            "/weather/upload/",
            weather_batch("esp32-open", &["20250220140000"]),
            OTHER_ADDR,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_registered_address_rejects_other_origins() {
    let app = TestApp::new().await;

    let (status, body) = app
        .put_from(
            "/weather/upload/",
            weather_batch("esp32-001", &["20250220140000"]),
            OTHER_ADDR,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "IP and ID not coherent");
    assert_eq!(app.sample_count("esp32-001").await, 0);

    let minmax = json!({"id": "esp32-001", "data": []});
    let (status, _) = app.put_from("/minmax/upload/", minmax, OTHER_ADDR).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let status_payload =
        json!({"id": "esp32-001", "ts": "20250220150000", "upt": 1, "mem": 2, "wif": -3});
    let (status, _) = app
        .put_from("/status/upload/", status_payload, OTHER_ADDR)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(request(
            Method::GET,
            "/lastupdate/esp32-001/",
            Body::empty(),
            OTHER_ADDR,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_forwarded_for_overrides_peer_address() {
    let app = TestApp::new().await;
    let mut req = request(
        Method::PUT,
        "/weather/upload/",
        Body::from(weather_batch("esp32-001", &["20250220140000"]).to_string()),
        OTHER_ADDR,
    );
    req.headers_mut()
        .insert("x-forwarded-for", "127.0.0.1, 10.0.0.1".parse().unwrap());

    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_station_conventions() {
    let app = TestApp::new().await;

    for uri in [
        "/status/ghost/",
        "/lastreport/ghost/",
        "/history/ghost/",
        "/minmax/history/ghost/",
    ] {
        let (status, body) = app.get(uri).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["error"], "Station not found", "{}", uri);
    }

    let (status, body) = app.get("/lastupdate/ghost/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Station not defined");

    let (status, _) = app
        .put(
            "/weather/upload/",
            weather_batch("ghost", &["20250220140000"]),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .put("/minmax/upload/", json!({"id": "ghost", "data": []}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .put(
            "/status/upload/",
            json!({"id": "ghost", "ts": "20250220150000", "upt": 1, "mem": 2, "wif": -3}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_empty_station_reads() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/lastreport/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "No weather data available"}));

    let (status, body) = app.get("/status/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": "No system status available"}));

    let (_, body) = app.get("/history/esp32-001/").await;
    assert_eq!(body, json!({"id": "esp32-001", "history": []}));

    let (status, body) = app.get("/lastupdate/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "esp32-001", "ts": "19700101000000"}));
}

#[tokio::test]
async fn test_status_round_trip() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "esp32-001",
        "ts": "20250220150000",
        "upt": 120000,
        "mem": 200000,
        "wif": -75
    });
    let (status, body) = app.put("/status/upload/", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"msg": "System status updated"}));

    // An older report arriving later does not become current
    let older = json!({"id": "esp32-001", "ts": "20250220140000", "upt": 1, "mem": 1, "wif": -90});
    app.put("/status/upload/", older).await;

    let (status, body) = app.get("/status/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "id": "esp32-001",
            "ts": "20250220150000",
            "upt": 120000,
            "mem": 200000,
            "wif": -75
        })
    );
}

#[tokio::test]
async fn test_status_upload_requires_timestamp() {
    let app = TestApp::new().await;
    let (status, body) = app
        .put(
            "/status/upload/",
            json!({"id": "esp32-001", "upt": 150000, "mem": 220000, "wif": -70}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ts"));

    let (status, body) = app
        .put(
            "/status/upload/",
            json!({"id": "esp32-001", "ts": "2025022015", "upt": 1, "mem": 1, "wif": -1}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid timestamp format: 2025022015");
}

#[tokio::test]
async fn test_history_is_newest_first_and_capped() {
    let app = TestApp::new().await;
    let timestamps: Vec<String> = (0..60)
        .map(|minute| format!("202502201{}{:02}00", minute / 60, minute % 60))
        .collect();
    let refs: Vec<&str> = timestamps.iter().map(String::as_str).collect();
    let (status, body) = app
        .put("/weather/upload/", weather_batch("esp32-open", &refs))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["count"], 60);

    let (_, body) = app.get("/history/esp32-open/").await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history[0]["ts"], "20250220105900");
    assert_eq!(history[49]["ts"], "20250220101000");

    let (_, body) = app.get("/lastupdate/esp32-open/").await;
    assert_eq!(body["ts"], "20250220105900");
}

#[tokio::test]
async fn test_minmax_history_derived_from_samples() {
    let app = TestApp::new().await;
    let today = Local::now().date_naive();
    let two_days_ago = today.checked_sub_days(Days::new(2)).unwrap();
    let stamp = |day: chrono::NaiveDate, time: &str| format!("{}{}", day.format("%Y%m%d"), time);

    let payload = json!({
        "id": "esp32-001",
        "data": [
            {"ts": stamp(today, "000000"), "tmp": 18.3, "hum": 43.9},
            {"ts": stamp(today, "000001"), "tmp": 39.4, "hum": 37.1},
            {"ts": stamp(two_days_ago, "120000"), "tmp": 12.0, "hum": 60.0},
        ]
    });
    app.put("/weather/upload/", payload).await;

    // Pushed aggregates do not feed the derived history
    let pushed = json!({
        "id": "esp32-001",
        "data": [{"dt": today.format("%Y%m%d").to_string(), "tmin": -40.0, "tmax": 80.0, "hmin": 0.0, "hmax": 100.0}]
    });
    app.put("/minmax/upload/", pushed).await;

    let (status, body) = app.get("/minmax/history/esp32-001/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "esp32-001");
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);

    assert_eq!(history[0]["dt"], today.format("%Y%m%d").to_string());
    assert_eq!(history[0]["tmin"].as_f64(), Some(18.3));
    assert_eq!(history[0]["tmax"].as_f64(), Some(39.4));
    assert_eq!(history[0]["hmin"].as_f64(), Some(37.1));
    assert_eq!(history[0]["hmax"].as_f64(), Some(43.9));

    assert_eq!(history[1]["dt"], two_days_ago.format("%Y%m%d").to_string());
    assert_eq!(history[1]["tmin"].as_f64(), Some(12.0));
}

#[tokio::test]
async fn test_minmax_upload_upserts_per_day() {
    let app = TestApp::new().await;
    let first = json!({
        "id": "esp32-001",
        "data": [
            {"dt": "20250220", "tmin": 14.3, "tmax": 29.1, "hmin": 38.1, "hmax": 55.0},
            {"dt": "20250219", "tmin": 13.8, "tmax": 28.4, "hmin": 37.6, "hmax": 54.3}
        ]
    });
    let (status, body) = app.put("/minmax/upload/", first).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"msg": "Min/Max data received", "count": 2}));

    let second = json!({
        "id": "esp32-001",
        "data": [{"dt": "20250220", "tmin": 20.0, "tmax": 38.0, "hmin": 40.0, "hmax": 50.0}]
    });
    app.put("/minmax/upload/", second).await;

    let station = app.store.find_station("esp32-001").await.unwrap().unwrap();
    let since = chrono::NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
    let stored = app.store.daily_aggregates(station.id, since).await.unwrap();
    assert_eq!(stored.len(), 2);
    let entry = stored[0].to_entry();
    assert_eq!(entry.dt, "20250220");
    assert_eq!(entry.tmin, 20.0);
    assert_eq!(entry.tmax, 38.0);
    assert_eq!(entry.hmin, 40.0);
    assert_eq!(entry.hmax, 50.0);
}

#[tokio::test]
async fn test_minmax_upload_rejects_bad_date_atomically() {
    let app = TestApp::new().await;
    let payload = json!({
        "id": "esp32-001",
        "data": [
            {"dt": "20250220", "tmin": 1.0, "tmax": 2.0, "hmin": 3.0, "hmax": 4.0},
            {"dt": "2025-02-21", "tmin": 1.0, "tmax": 2.0, "hmin": 3.0, "hmax": 4.0}
        ]
    });
    let (status, body) = app.put("/minmax/upload/", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid date format: 2025-02-21");

    let station = app.store.find_station("esp32-001").await.unwrap().unwrap();
    let since = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    assert!(app
        .store
        .daily_aggregates(station.id, since)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_list_stations_hides_address() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/stations/").await;
    assert_eq!(status, StatusCode::OK);

    let stations = body["stations"].as_array().unwrap();
    assert_eq!(stations.len(), 2);
    let first = stations[0].as_object().unwrap();
    assert_eq!(first["id"], "esp32-001");
    assert_eq!(first["name"], "Test Weather Station");
    assert_eq!(first["loc"], "Test Lab");
    assert!(!first.contains_key("address"));
    assert!(!first.contains_key("http_address"));

    let created = first["created"].as_str().unwrap();
    assert_eq!(created.len(), 14);
    assert!(created.bytes().all(|b| b.is_ascii_digit()));
}

#[tokio::test]
async fn test_app_mounts_api_under_prefix() {
    let store = Arc::new(MemoryStore::new());
    let app = rest::app(AppState::new(store), "/api");

    let response = app
        .clone()
        .oneshot(Request::get("/api/stations/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
