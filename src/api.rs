//! HTTP API. JSON endpoints for messages and groups, the HTML pages, and the
//! `/ws` live status channel.

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use wagate_core::{
    error::GatewayError,
    jid::{contact_jid, group_jid},
    session::OutgoingContent,
};
use wagate_whatsapp::generate_qr_image;

use crate::attachment::Attachment;
use crate::gateway::{ConnectionManager, CONNECTED_MESSAGE, SCAN_PROMPT};
use crate::groups::GroupCache;
use crate::notify::Notification;
use crate::pages;

/// Request bodies carry base64 images, which inflate by a third.
const BODY_LIMIT: usize = crate::attachment::MAX_ATTACHMENT_BYTES / 3 * 4 + 64 * 1024;

const QR_UNAVAILABLE: &str = "QR code not available";

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct AppState {
    manager: Arc<ConnectionManager>,
    cache: GroupCache,
    http: reqwest::Client,
    uptime: Instant,
}

impl AppState {
    pub fn new(manager: Arc<ConnectionManager>, cache: GroupCache) -> Self {
        Self {
            manager,
            cache,
            http: reqwest::Client::new(),
            uptime: Instant::now(),
        }
    }
}

/// Map a gateway error to its HTTP status and `{success:false}` body.
fn reject(err: GatewayError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        GatewayError::NotConnected => StatusCode::SERVICE_UNAVAILABLE,
        GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"success": false, "message": err.to_string()})),
    )
}

fn not_found(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "message": message})),
    )
}

/// Parse a JSON object body. Malformed or missing bodies are a 400.
fn parse_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, GatewayError> {
    let Json(value) =
        body.map_err(|e| GatewayError::Validation(format!("invalid request: {e}")))?;
    if !value.is_object() {
        return Err(GatewayError::Validation(
            "request body must be a JSON object".into(),
        ));
    }
    Ok(value)
}

/// A non-blank string field. Numbers are accepted and stringified so phone
/// numbers may be sent unquoted.
fn text_field(body: &Value, name: &str) -> Option<String> {
    let text = match body.get(name)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn require(body: &Value, name: &str) -> Result<String, GatewayError> {
    text_field(body, name).ok_or_else(|| GatewayError::Validation(format!("{name} is required")))
}

/// The `message` field, forwarded verbatim. Blank counts as missing.
fn require_message(body: &Value) -> Result<String, GatewayError> {
    match body.get("message") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(GatewayError::Validation("message is required".into())),
    }
}

/// Decode an inline `attachment` up front; URLs are fetched at send time.
fn optional_attachment(body: &Value) -> Result<Option<Attachment>, GatewayError> {
    text_field(body, "attachment")
        .map(|raw| Attachment::parse(&raw))
        .transpose()
}

/// Send `message` (and optional attachment) to an already normalized address.
async fn deliver(
    state: &AppState,
    recipient: String,
    message: String,
    attachment: Option<Attachment>,
) -> Result<Json<Value>, GatewayError> {
    let session = state.manager.session().await?;

    let content = match attachment {
        Some(attachment) => {
            let image = attachment.into_image(&state.http).await?;
            OutgoingContent::Image {
                data: image.data,
                mimetype: image.mimetype,
                caption: Some(message),
            }
        }
        None => OutgoingContent::Text(message),
    };

    let message_id = session.send(&recipient, content).await?;
    info!("message {message_id} sent to {recipient}");
    Ok(Json(json!({
        "success": true,
        "message": "Message sent successfully",
        "to": recipient,
        "messageId": message_id,
    })))
}

fn logged(route: &str, err: GatewayError) -> (StatusCode, Json<Value>) {
    match &err {
        GatewayError::Validation(_) | GatewayError::NotConnected => {
            debug!("{route} rejected: {err}")
        }
        _ => error!("{route} failed: {err}"),
    }
    reject(err)
}

/// `GET /groups`: cached groups; requires a live session.
async fn list_groups(State(state): State<AppState>) -> ApiResult {
    if !state.manager.is_connected().await {
        return Err(reject(GatewayError::NotConnected));
    }
    let groups = state.cache.list().await;
    Ok(Json(json!({"success": true, "groups": groups})))
}

/// `GET /groups/{id}`: one cached group; `id` may omit the `@g.us` suffix.
async fn get_group(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    if !state.manager.is_connected().await {
        return Err(reject(GatewayError::NotConnected));
    }
    let group = state
        .cache
        .find(&id)
        .await
        .ok_or_else(|| not_found("Group not found"))?;
    Ok(Json(json!({"success": true, "group": group})))
}

/// `POST /refresh-groups`: re-enumerate groups from the session.
async fn refresh_groups(State(state): State<AppState>) -> ApiResult {
    let session = state
        .manager
        .session()
        .await
        .map_err(|e| logged("refresh-groups", e))?;
    let groups = state
        .cache
        .refresh(session.as_ref())
        .await
        .map_err(|e| logged("refresh-groups", e))?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Refreshed {} groups", groups.len()),
        "groups": groups,
    })))
}

/// `POST /send-to-contact`: `{phone, message, attachment?}`.
async fn send_to_contact(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let route = "send-to-contact";
    let body = parse_body(body).map_err(|e| logged(route, e))?;
    let phone = require(&body, "phone").map_err(|e| logged(route, e))?;
    let message = require_message(&body).map_err(|e| logged(route, e))?;
    let recipient = contact_jid(&phone).map_err(|e| logged(route, e))?;
    let attachment = optional_attachment(&body).map_err(|e| logged(route, e))?;

    deliver(&state, recipient, message, attachment)
        .await
        .map_err(|e| logged(route, e))
}

/// `POST /send-to-group`: `{group, message, attachment?}`.
async fn send_to_group(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let route = "send-to-group";
    let body = parse_body(body).map_err(|e| logged(route, e))?;
    let group = require(&body, "group").map_err(|e| logged(route, e))?;
    let message = require_message(&body).map_err(|e| logged(route, e))?;
    let attachment = optional_attachment(&body).map_err(|e| logged(route, e))?;

    deliver(&state, group_jid(&group), message, attachment)
        .await
        .map_err(|e| logged(route, e))
}

/// `POST /send`: `{phone?, group?, message, attachment?}`. `group` wins
/// when both are present.
async fn send(State(state): State<AppState>, body: Result<Json<Value>, JsonRejection>) -> ApiResult {
    let route = "send";
    let body = parse_body(body).map_err(|e| logged(route, e))?;
    let message = require_message(&body).map_err(|e| logged(route, e))?;

    let recipient = match (text_field(&body, "group"), text_field(&body, "phone")) {
        (Some(group), _) => group_jid(&group),
        (None, Some(phone)) => contact_jid(&phone).map_err(|e| logged(route, e))?,
        (None, None) => {
            return Err(logged(
                route,
                GatewayError::Validation("phone or group is required".into()),
            ))
        }
    };
    let attachment = optional_attachment(&body).map_err(|e| logged(route, e))?;

    deliver(&state, recipient, message, attachment)
        .await
        .map_err(|e| logged(route, e))
}

async fn current_qr_png(state: &AppState) -> Result<Vec<u8>, (StatusCode, Json<Value>)> {
    let code = state
        .manager
        .pairing_code()
        .await
        .ok_or_else(|| not_found(QR_UNAVAILABLE))?;
    generate_qr_image(&code).map_err(|e| logged("qr", e))
}

/// `GET /qr`: pairing page with the current QR code.
async fn qr_page(
    State(state): State<AppState>,
) -> Result<Html<String>, (StatusCode, Json<Value>)> {
    let png = current_qr_png(&state).await?;
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(png));
    Ok(Html(pages::qr_page(&data_uri)))
}

/// `GET /qr.png`: the current QR code as an image.
async fn qr_png(State(state): State<AppState>) -> Result<Response, (StatusCode, Json<Value>)> {
    let png = current_qr_png(&state).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// `GET /status`
async fn status(State(state): State<AppState>) -> Json<Value> {
    let connected = state.manager.is_connected().await;
    let needs_qr = state.manager.pairing_code().await.is_some();
    Json(json!({"connected": connected, "needsQR": needs_qr}))
}

/// `GET /health`: liveness with uptime.
async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "connected": state.manager.is_connected().await,
    }))
}

/// `GET /`: dashboard.
async fn dashboard(State(state): State<AppState>) -> Html<String> {
    let connected = state.manager.is_connected().await;
    let qr_pending = state.manager.pairing_code().await.is_some();
    let groups = if connected {
        state.cache.list().await
    } else {
        Vec::new()
    };
    Html(pages::dashboard(connected, qr_pending, &groups))
}

/// `GET /ws`: live `status` and `qr` events.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Snapshot of the current state, sent once when a viewer connects.
async fn initial_notifications(state: &AppState) -> Vec<Notification> {
    let connected = state.manager.is_connected().await;
    match state.manager.pairing_code().await {
        Some(payload) => vec![
            Notification::Qr { payload },
            Notification::Status {
                connected: false,
                message: SCAN_PROMPT.into(),
            },
        ],
        None => vec![Notification::Status {
            connected,
            message: if connected {
                CONNECTED_MESSAGE.into()
            } else {
                "Disconnected".into()
            },
        }],
    }
}

async fn send_notification(socket: &mut WebSocket, notification: &Notification) -> bool {
    let text = match serde_json::to_string(notification) {
        Ok(t) => t,
        Err(e) => {
            warn!("failed to encode notification: {e}");
            return true;
        }
    };
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe before taking the snapshot so nothing falls in between.
    let mut rx = state.manager.notifier().subscribe();
    debug!("live viewer connected");

    for notification in initial_notifications(&state).await {
        if !send_notification(&mut socket, &notification).await {
            return;
        }
    }

    loop {
        let notification = tokio::select! {
            event = rx.recv() => match event {
                Ok(notification) => notification,
                Err(RecvError::Lagged(skipped)) => {
                    debug!("live viewer lagged, skipped {skipped} events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        };
        if !send_notification(&mut socket, &notification).await {
            break;
        }
    }
    debug!("live viewer disconnected");
}

/// Build the axum router with shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/groups", get(list_groups))
        .route("/groups/{id}", get(get_group))
        .route("/refresh-groups", post(refresh_groups))
        .route("/send-to-contact", post(send_to_contact))
        .route("/send-to-group", post(send_to_group))
        .route("/send", post(send))
        .route("/qr", get(qr_page))
        .route("/qr.png", get(qr_png))
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(axum::extract::DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve(
    addr: &str,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {addr}: {e}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
