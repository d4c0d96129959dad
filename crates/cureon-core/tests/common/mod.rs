//! In-process stub of the REST backend for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use cureon_core::api::ApiClient;
use cureon_core::config::ClientConfig;
use cureon_core::models::{apply_stock_updates, plan_dispense, Medicine, Prescription};

pub const TOKEN: &str = "pharmacist-token";

/// Leading bytes of the stub prescription PDF.
pub const PDF_MAGIC: &[u8] = b"%PDF-1.4";

#[derive(Default)]
pub struct Backend {
    pub prescriptions: Vec<Prescription>,
    pub inventory: Vec<Medicine>,
    pub dispense_calls: usize,
    pub idempotency_keys: Vec<String>,
    pub bulk_batches: Vec<usize>,
    pub fail_bulk: bool,
    /// Every stored reading, as the backend returns it
    pub readings: Vec<Value>,
    pub contacts: Vec<Value>,
    pub family: Vec<Value>,
    pub next_id: usize,
}

impl Backend {
    fn new_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}{}", prefix, self.next_id)
    }

    fn store_reading(&mut self, mut reading: Value, severity: &str) {
        let id = self.new_id("h");
        reading["_id"] = json!(id);
        reading["isAbnormal"] = json!(severity != "normal");
        reading["severity"] = json!(severity);
        self.readings.push(reading);
    }
}

fn heart_rate_severity(reading: &Value) -> &'static str {
    let bpm = reading["value"]["single"].as_f64().unwrap_or(0.0);
    match reading["type"].as_str() {
        Some("heart_rate") if bpm > 150.0 => "critical",
        Some("heart_rate") if bpm > 100.0 => "warning",
        _ => "normal",
    }
}

pub type Shared = Arc<Mutex<Backend>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn reject(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "success": false, "message": message }))).into_response()
}

async fn list_prescriptions(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Please login to access this resource");
    }
    let backend = state.lock().unwrap();
    Json(json!({ "success": true, "prescriptions": backend.prescriptions })).into_response()
}

async fn dispense(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return reject(StatusCode::UNAUTHORIZED, "Please login to access this resource");
    }
    let mut guard = state.lock().unwrap();
    let backend = &mut *guard;
    backend.dispense_calls += 1;
    if let Some(key) = headers.get("idempotency-key").and_then(|v| v.to_str().ok()) {
        backend.idempotency_keys.push(key.to_string());
    }

    let Some(pos) = backend.prescriptions.iter().position(|p| p.id == id) else {
        return reject(StatusCode::NOT_FOUND, "Prescription not found");
    };
    if backend.prescriptions[pos].is_dispensed() {
        return reject(StatusCode::BAD_REQUEST, "Prescription already dispensed");
    }

    let now = Utc::now();
    match plan_dispense(&backend.inventory, &backend.prescriptions[pos], now) {
        Err(short) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Insufficient stock for some medicines",
                "insufficientStock": short,
            })),
        )
            .into_response(),
        Ok(updates) => {
            apply_stock_updates(&mut backend.inventory, &updates);
            let _ = backend.prescriptions[pos].mark_dispensed(now, None);
            Json(json!({ "success": true, "stockUpdates": updates })).into_response()
        }
    }
}

async fn verify(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let backend = state.lock().unwrap();
    match backend.prescriptions.iter().find(|p| p.id == id) {
        Some(p) => {
            let message = if p.is_dispensed() {
                "Prescription already dispensed"
            } else {
                "Prescription is valid"
            };
            Json(json!({ "valid": !p.is_dispensed(), "message": message, "prescription": p }))
                .into_response()
        }
        None => reject(StatusCode::NOT_FOUND, "Prescription not found"),
    }
}

async fn my_pharmacy() -> Response {
    reject(StatusCode::FORBIDDEN, "Role patient is not allowed to access this resource")
}

async fn pharmacy_stats() -> Response {
    reject(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable")
}

async fn slow_appointments() -> Response {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "success": true, "appointments": [] })).into_response()
}

async fn bulk_readings(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut backend = state.lock().unwrap();
    if backend.fail_bulk {
        return reject(StatusCode::SERVICE_UNAVAILABLE, "Try again later");
    }

    let readings = body["readings"].as_array().cloned().unwrap_or_default();
    backend.bulk_batches.push(readings.len());
    let mut alerts = Vec::new();
    for reading in readings.iter().cloned() {
        let severity = heart_rate_severity(&reading);
        if severity == "critical" {
            alerts.push(json!({
                "type": "heart_rate",
                "severity": severity,
                "message": format!("Critical heart rate: {} bpm", reading["value"]["single"]),
            }));
        }
        backend.store_reading(reading, severity);
    }

    // The real backend sends null rather than an empty list
    let alerts = if alerts.is_empty() {
        Value::Null
    } else {
        json!(alerts)
    };
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "count": readings.len(), "alerts": alerts })),
    )
        .into_response()
}

async fn add_reading(State(state): State<Shared>, Json(reading): Json<Value>) -> Response {
    let mut guard = state.lock().unwrap();
    let backend = &mut *guard;
    let severity = heart_rate_severity(&reading);
    backend.store_reading(reading, severity);

    let alert = match severity {
        "critical" => json!({
            "type": "sos",
            "severity": "critical",
            "message": "Critical heart rate",
            "sosTriggered": true,
            "contactsNotified": backend.contacts.len(),
        }),
        "warning" => json!({
            "type": "notification",
            "severity": "warning",
            "message": "High heart rate",
        }),
        _ => Value::Null,
    };
    (StatusCode::CREATED, Json(json!({ "success": true, "alert": alert }))).into_response()
}

async fn list_readings(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let backend = state.lock().unwrap();
    let limit = params
        .get("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(100);
    let readings: Vec<&Value> = backend
        .readings
        .iter()
        .rev()
        .filter(|r| params.get("type").map_or(true, |t| r["type"] == t.as_str()))
        .take(limit)
        .collect();
    Json(json!({ "success": true, "count": readings.len(), "readings": readings })).into_response()
}

async fn reading_stats(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let backend = state.lock().unwrap();
    let count_severity = |s: &str| backend.readings.iter().filter(|r| r["severity"] == s).count();
    let mut by_type: HashMap<String, Value> = HashMap::new();
    for reading in &backend.readings {
        let kind = reading["type"].as_str().unwrap_or_default().to_string();
        let entry = by_type
            .entry(kind)
            .or_insert_with(|| json!({ "count": 0, "values": [], "abnormalCount": 0 }));
        entry["count"] = json!(entry["count"].as_u64().unwrap_or(0) + 1);
        if reading["isAbnormal"] == true {
            entry["abnormalCount"] = json!(entry["abnormalCount"].as_u64().unwrap_or(0) + 1);
        }
        entry["values"].as_array_mut().unwrap().push(json!({
            "value": reading["value"],
            "timestamp": reading["timestamp"],
            "isAbnormal": reading["isAbnormal"],
        }));
    }
    let days = params.get("days").cloned().unwrap_or_else(|| "7".into());
    Json(json!({
        "success": true,
        "period": format!("Last {} days", days),
        "stats": {
            "totalReadings": backend.readings.len(),
            "abnormalCount": backend.readings.iter().filter(|r| r["isAbnormal"] == true).count(),
            "criticalCount": count_severity("critical"),
            "warningCount": count_severity("warning"),
            "byType": by_type,
        }
    }))
    .into_response()
}

async fn prescription_pdf(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    let backend = state.lock().unwrap();
    if !backend.prescriptions.iter().any(|p| p.id == id) {
        return reject(StatusCode::NOT_FOUND, "Prescription not found");
    }
    let mut body = PDF_MAGIC.to_vec();
    body.extend_from_slice(format!("\n% prescription {}\n", id).as_bytes());
    ([(header::CONTENT_TYPE, "application/pdf")], body).into_response()
}

#[derive(Clone, Copy)]
enum Roster {
    Contacts,
    Family,
}

impl Roster {
    fn key(self) -> &'static str {
        match self {
            Roster::Contacts => "emergencyContacts",
            Roster::Family => "familyMembers",
        }
    }

    fn list(self, backend: &mut Backend) -> &mut Vec<Value> {
        match self {
            Roster::Contacts => &mut backend.contacts,
            Roster::Family => &mut backend.family,
        }
    }
}

fn roster_response(roster: Roster, backend: &mut Backend) -> Response {
    let key = roster.key();
    Json(json!({ "success": true, key: roster.list(backend) })).into_response()
}

fn roster_add(roster: Roster, state: &Shared, mut entry: Value) -> Response {
    let mut backend = state.lock().unwrap();
    let id = backend.new_id("c");
    entry["_id"] = json!(id);
    roster.list(&mut backend).push(entry);
    roster_response(roster, &mut backend)
}

fn roster_update(roster: Roster, state: &Shared, id: &str, mut entry: Value) -> Response {
    let mut backend = state.lock().unwrap();
    entry["_id"] = json!(id);
    match roster.list(&mut backend).iter_mut().find(|e| e["_id"] == id) {
        Some(slot) => *slot = entry,
        None => return reject(StatusCode::NOT_FOUND, "Contact not found"),
    }
    roster_response(roster, &mut backend)
}

fn roster_remove(roster: Roster, state: &Shared, id: &str) -> Response {
    let mut backend = state.lock().unwrap();
    let list = roster.list(&mut backend);
    let before = list.len();
    list.retain(|e| e["_id"] != id);
    if list.len() == before {
        return reject(StatusCode::NOT_FOUND, "Contact not found");
    }
    roster_response(roster, &mut backend)
}

async fn list_contacts(State(state): State<Shared>) -> Response {
    roster_response(Roster::Contacts, &mut state.lock().unwrap())
}

async fn add_contact(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    roster_add(Roster::Contacts, &state, body)
}

async fn update_contact(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    roster_update(Roster::Contacts, &state, &id, body)
}

async fn remove_contact(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    roster_remove(Roster::Contacts, &state, &id)
}

async fn list_family(State(state): State<Shared>) -> Response {
    roster_response(Roster::Family, &mut state.lock().unwrap())
}

async fn add_family(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    roster_add(Roster::Family, &state, body)
}

async fn update_family(
    State(state): State<Shared>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    roster_update(Roster::Family, &state, &id, body)
}

async fn remove_family(State(state): State<Shared>, Path(id): Path<String>) -> Response {
    roster_remove(Roster::Family, &state, &id)
}

/// Serve the stub on an ephemeral port. Returns its base URL.
pub async fn spawn(backend: Backend) -> (String, Shared) {
    let shared = Arc::new(Mutex::new(backend));
    let app = Router::new()
        .route("/api/v1/prescriptions", get(list_prescriptions))
        .route("/api/v1/prescription/:id/dispense", put(dispense))
        .route("/api/v1/prescription/:id/verify", get(verify))
        .route("/api/v1/prescription/:id/pdf", get(prescription_pdf))
        .route("/api/v1/pharmacy/my", get(my_pharmacy))
        .route("/api/v1/pharmacy/stats", get(pharmacy_stats))
        .route("/api/v1/appointment/my", get(slow_appointments))
        .route("/api/v1/health/reading", post(add_reading))
        .route("/api/v1/health/readings", get(list_readings))
        .route("/api/v1/health/readings/stats", get(reading_stats))
        .route("/api/v1/health/readings/bulk", post(bulk_readings))
        .route("/api/v1/emergency-contacts", get(list_contacts).post(add_contact))
        .route(
            "/api/v1/emergency-contacts/:id",
            put(update_contact).delete(remove_contact),
        )
        .route("/api/v1/family-members", get(list_family).post(add_family))
        .route("/api/v1/family-members/:id", put(update_family).delete(remove_family))
        .with_state(shared.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), shared)
}

pub fn client(base_url: &str, timeout_secs: u64) -> ApiClient {
    let config = ClientConfig {
        api_base_url: base_url.to_string(),
        request_timeout_secs: timeout_secs,
        ..ClientConfig::default()
    };
    ApiClient::new(&config).unwrap()
}
