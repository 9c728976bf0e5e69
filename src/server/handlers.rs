//! Route handlers. Each one validates its inputs, delegates to the lock
//! store, and maps the error taxonomy onto HTTP status codes.

use crate::error::ViseError;
use crate::locks::{DetectionMethod, LockRecord};
use crate::server::{LockEvent, ServerContext};
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Sweep threshold when a cleanup request does not name one.
const DEFAULT_SWEEP_AGE_HOURS: f64 = 24.0;

/// Wire representation of one lock.
#[derive(Debug, Serialize)]
pub(super) struct LockDto {
    file_path: String,
    user_name: String,
    computer_name: String,
    lock_time: DateTime<Utc>,
    last_seen: Option<DateTime<Utc>>,
    process_id: Option<u32>,
    lock_id: String,
    auto_created: bool,
    detection_method: String,
}

impl From<&LockRecord> for LockDto {
    fn from(record: &LockRecord) -> Self {
        Self {
            file_path: record.target_path.clone(),
            user_name: record.owner_user.clone(),
            computer_name: record.owner_host.clone(),
            lock_time: record.created_at,
            last_seen: record.last_seen_at,
            process_id: record.process_id,
            lock_id: record.lock_id.clone(),
            auto_created: record.auto_created,
            detection_method: record.detection_method.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateLockRequest {
    file_path: Option<String>,
    user_name: Option<String>,
    computer_name: Option<String>,
    process_id: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteLockParams {
    user_name: Option<String>,
}

pub(super) async fn index() -> Json<Value> {
    Json(json!({
        "name": "vise",
        "status": "running",
        "endpoints": {
            "locks": "/locks",
            "lock": "/locks/{path}",
            "cleanup": "/cleanup",
            "stats": "/stats",
            "events": "/ws",
        },
    }))
}

pub(super) async fn list_locks(State(ctx): State<Arc<ServerContext>>) -> Response {
    match ctx.store().list_locks() {
        Ok(records) => {
            let dtos: Vec<LockDto> = records.iter().map(LockDto::from).collect();
            Json(dtos).into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub(super) async fn create_lock(
    State(ctx): State<Arc<ServerContext>>,
    Json(body): Json<CreateLockRequest>,
) -> Response {
    let Some(file_path) = body.file_path else {
        return bad_request("file_path is required");
    };
    let Some(user_name) = body.user_name else {
        return bad_request("user_name is required");
    };
    let Some(computer_name) = body.computer_name else {
        return bad_request("computer_name is required");
    };

    match ctx.store().create_lock(
        &file_path,
        &user_name,
        &computer_name,
        body.process_id,
        false,
        DetectionMethod::Manual,
    ) {
        Ok(record) => {
            ctx.publish(LockEvent::LockCreated {
                file_path: record.target_path.clone(),
                user_name: record.owner_user.clone(),
            });
            (
                StatusCode::CREATED,
                Json(json!({
                    "message": format!("File {} locked successfully", record.target_path),
                    "success": true,
                })),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub(super) async fn get_lock(
    State(ctx): State<Arc<ServerContext>>,
    Path(path): Path<String>,
) -> Response {
    match ctx.store().check_lock(&path) {
        Ok(Some(record)) => Json(LockDto::from(&record)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "file not locked" })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

pub(super) async fn delete_lock(
    State(ctx): State<Arc<ServerContext>>,
    Path(path): Path<String>,
    Query(params): Query<DeleteLockParams>,
) -> Response {
    let Some(user_name) = params.user_name else {
        return bad_request("user_name query parameter is required");
    };

    match ctx.store().remove_lock(&path, &user_name) {
        Ok(record) => {
            ctx.publish(LockEvent::LockRemoved {
                file_path: record.target_path.clone(),
            });
            Json(json!({
                "message": format!("File {} unlocked successfully", record.target_path),
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub(super) async fn cleanup(State(ctx): State<Arc<ServerContext>>, body: Bytes) -> Response {
    let max_age_hours = match parse_max_age(&body) {
        Ok(hours) => hours,
        Err(message) => return bad_request(&message),
    };

    match ctx.store().sweep_stale(max_age_hours) {
        Ok(count) => {
            ctx.publish(LockEvent::LocksCleaned {
                removed_count: count,
            });
            Json(json!({
                "message": format!("Cleaned up {} stale locks", count),
                "removed_count": count,
            }))
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

pub(super) async fn stats(State(ctx): State<Arc<ServerContext>>) -> Response {
    let records = match ctx.store().list_locks() {
        Ok(records) => records,
        Err(e) => return error_response(&e),
    };

    let mut users = BTreeSet::new();
    let mut computers = BTreeSet::new();
    let mut extensions: BTreeMap<String, usize> = BTreeMap::new();

    for record in &records {
        users.insert(record.owner_user.clone());
        computers.insert(record.owner_host.clone());
        if let Some(ext) = extension_of(&record.display_name) {
            *extensions.entry(ext).or_insert(0) += 1;
        }
    }

    Json(json!({
        "total_locks": records.len(),
        "unique_users": users.len(),
        "unique_computers": computers.len(),
        "extensions": extensions,
        "users": users.into_iter().collect::<Vec<_>>(),
        "computers": computers.into_iter().collect::<Vec<_>>(),
    }))
    .into_response()
}

pub(super) async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<ServerContext>>,
) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, ctx))
}

/// Forward broadcast events to one subscriber until it disconnects.
///
/// Inbound messages are never read; the socket is a one-way feed. A
/// subscriber that lags far enough to lose events just misses them.
async fn stream_events(mut socket: WebSocket, ctx: Arc<ServerContext>) {
    let mut events = ctx.subscribe();

    let greeting = json!({ "event": "connected" }).to_string();
    if socket.send(Message::Text(greeting.into())).await.is_err() {
        return;
    }

    loop {
        match events.recv().await {
            Ok(event) => {
                let Ok(payload) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("websocket subscriber lagged, skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// `.ext` (lowercased) from a file name, for the stats histogram.
/// A leading dot is part of the name, not an extension.
fn extension_of(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(idx) if idx > 0 => Some(name[idx..].to_lowercase()),
        _ => None,
    }
}

fn parse_max_age(body: &[u8]) -> std::result::Result<f64, String> {
    if body.is_empty() {
        return Ok(DEFAULT_SWEEP_AGE_HOURS);
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|_| "request body must be JSON".to_string())?;

    match value.get("max_age_hours") {
        None | Some(Value::Null) => Ok(DEFAULT_SWEEP_AGE_HOURS),
        Some(v) => match v.as_f64() {
            Some(hours) if hours >= 0.0 => Ok(hours),
            _ => Err("max_age_hours must be a non-negative number".to_string()),
        },
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn error_status(err: &ViseError) -> StatusCode {
    match err {
        ViseError::UserError(_) | ViseError::UnsupportedFile(_) => StatusCode::BAD_REQUEST,
        ViseError::Conflict { .. } => StatusCode::CONFLICT,
        ViseError::NotFound(_) => StatusCode::NOT_FOUND,
        ViseError::NotOwner { .. } => StatusCode::FORBIDDEN,
        ViseError::Corrupt(_) | ViseError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &ViseError) -> Response {
    (error_status(err), Json(json!({ "error": err.to_string() }))).into_response()
}
