#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};

use folio_client::session::{LogoutReason, MemoryTokenStore, Session, SessionObserver, TokenStore};
use folio_client::{ApiClient, ClientConfig};

pub const USER_ID: &str = "6f1c1f52-8a8e-4c1a-9a55-3c0d1e0b7a11";
pub const PASSWORD: &str = "secret";

/// Knobs and counters shared between a test and the mock backend
#[derive(Default)]
pub struct MockState {
    valid_tokens: Mutex<HashSet<String>>,
    pub refresh_calls: AtomicUsize,
    pub refresh_tokens_seen: Mutex<Vec<String>>,
    refresh_delay_ms: AtomicUsize,
    refresh_fails: AtomicBool,
    reject_all: AtomicBool,
    hold_stale: AtomicBool,
    release: tokio::sync::Notify,
    /// (path, bearer token) for every authenticated route hit
    pub requests: Mutex<Vec<(String, Option<String>)>>,
    pub last_query: Mutex<HashMap<String, String>>,
}

impl MockState {
    pub fn accept(&self, token: &str) {
        self.valid_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn revoke(&self, token: &str) {
        self.valid_tokens.lock().unwrap().remove(token);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms.store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    /// Every bearer token is rejected, including freshly refreshed ones
    pub fn reject_all(&self) {
        self.reject_all.store(true, Ordering::SeqCst);
    }

    /// The next rejected `/me` response is held until [`MockState::release_held`]
    pub fn hold_next_rejection(&self) {
        self.hold_stale.store(true, Ordering::SeqCst);
    }

    pub fn release_held(&self) {
        self.release.notify_one();
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Requests to `path` that carried `token`
    pub fn hits_with(&self, path: &str, token: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, t)| p == path && t.as_deref() == Some(token))
            .count()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|(p, _)| p == path).count()
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockBackend {
    pub async fn start() -> Result<Self> {
        let state = Arc::new(MockState::default());
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock backend")?;

        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
        })
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::new(&self.base_url).expect("mock base url is valid")
    }
}

/// A client wired to the mock backend plus handles to observe what it did
pub struct Harness {
    pub backend: MockBackend,
    pub client: Arc<ApiClient>,
    pub session: Arc<Session>,
    pub store: Arc<MemoryTokenStore>,
    pub logouts: Arc<Mutex<Vec<LogoutReason>>>,
}

impl Harness {
    /// Session restored from a store holding `A1`/`R1`; the backend accepts neither
    /// access token until told otherwise, so the first request needs a refresh.
    pub async fn with_expired_session() -> Result<Self> {
        Self::start(Some(("A1", "R1")), |_| {}).await
    }

    /// Like [`Harness::with_expired_session`] with a customised client config
    pub async fn with_expired_session_config(configure: impl FnOnce(&mut ClientConfig)) -> Result<Self> {
        Self::start(Some(("A1", "R1")), configure).await
    }

    pub async fn logged_out() -> Result<Self> {
        Self::start(None, |_| {}).await
    }

    async fn start(tokens: Option<(&str, &str)>, configure: impl FnOnce(&mut ClientConfig)) -> Result<Self> {
        let backend = MockBackend::start().await?;
        let mut config = backend.config();
        configure(&mut config);
        let store = Arc::new(match tokens {
            Some((access, refresh)) => MemoryTokenStore::with_tokens(access, refresh),
            None => MemoryTokenStore::new(),
        });
        let session = Arc::new(Session::restore(store.clone())?);

        let logouts = Arc::new(Mutex::new(Vec::new()));
        let seen = logouts.clone();
        let observer: Arc<dyn SessionObserver> = Arc::new(move |reason: &LogoutReason| {
            seen.lock().unwrap().push(reason.clone());
        });

        let client = Arc::new(ApiClient::new(config, session.clone(), observer)?);

        Ok(Self {
            backend,
            client,
            session,
            store,
            logouts,
        })
    }

    pub fn state(&self) -> &MockState {
        &self.backend.state
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.lock().unwrap().len()
    }

    pub fn stored(&self, key: &str) -> Option<String> {
        self.store.load(key).expect("memory store never fails")
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/portfolios", get(list_portfolios).post(create_portfolio))
        .route("/portfolios/:id", delete(delete_portfolio))
        .route("/portfolios/:id/summary", get(portfolio_summary))
        .route("/portfolios/:id/export/csv", get(export_portfolio_csv))
        .route("/budget/transactions", get(budget_transactions))
        .route("/budget/summary", get(budget_summary))
        .route("/budget/export/json", get(export_budget_json))
        .with_state(state)
}

fn detail(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Records the request and answers 401 unless its token is currently valid
fn authorize(state: &MockState, path: &str, headers: &HeaderMap) -> Result<(), Response> {
    let token = bearer(headers);
    state.requests.lock().unwrap().push((path.to_string(), token.clone()));

    let valid = match &token {
        Some(token) => {
            !state.reject_all.load(Ordering::SeqCst) && state.valid_tokens.lock().unwrap().contains(token)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
    }
}

async fn login(State(state): State<Arc<MockState>>, Form(form): Form<HashMap<String, String>>) -> Response {
    if form.get("password").map(String::as_str) != Some(PASSWORD) {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect email or password");
    }
    state.accept("L1");
    Json(json!({ "access_token": "L1", "refresh_token": "LR1", "token_type": "bearer" })).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    if email == "taken@example.com" {
        return detail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    Json(json!({ "id": USER_ID, "email": email, "created_at": "2024-05-01T12:30:00.123456" })).into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let token = body["refresh_token"].as_str().unwrap_or_default().to_string();
    state.refresh_tokens_seen.lock().unwrap().push(token);

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay as u64)).await;
    }

    if state.refresh_fails.load(Ordering::SeqCst) {
        return detail(StatusCode::UNAUTHORIZED, "Invalid refresh token");
    }
    state.accept("A2");
    Json(json!({ "access_token": "A2", "token_type": "bearer" })).into_response()
}

async fn me(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let authorized = authorize(&state, "/me", &headers);
    if authorized.is_err() && state.hold_stale.swap(false, Ordering::SeqCst) {
        state.release.notified().await;
    }
    if let Err(res) = authorized {
        return res;
    }
    Json(json!({ "id": USER_ID, "email": "user@example.com", "created_at": "2024-05-01T12:30:00" })).into_response()
}

async fn list_portfolios(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(res) = authorize(&state, "/portfolios", &headers) {
        return res;
    }
    Json(json!([
        { "id": 1, "name": "Main", "type": "crypto", "created_at": "2024-01-02T03:04:05" },
        { "id": 2, "name": "Dividends", "type": "stocks" }
    ]))
    .into_response()
}

async fn create_portfolio(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Err(res) = authorize(&state, "/portfolios", &headers) {
        return res;
    }
    let name = body["name"].as_str().unwrap_or_default();
    if name.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": [
                { "loc": ["body", "name"], "msg": "String should have at least 1 character", "type": "string_too_short" }
            ]})),
        )
            .into_response();
    }
    Json(json!({ "id": 9, "name": name, "type": body["type"] })).into_response()
}

async fn delete_portfolio(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(res) = authorize(&state, "/portfolios/:id", &headers) {
        return res;
    }
    if id != 1 {
        return detail(StatusCode::NOT_FOUND, "Portfolio not found");
    }
    Json(json!({ "message": "Portfolio deleted successfully" })).into_response()
}

async fn portfolio_summary(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(res) = authorize(&state, "/portfolios/:id/summary", &headers) {
        return res;
    }
    Json(json!({
        "portfolio": { "id": id, "name": "Main", "type": "crypto" },
        "items": [{
            "symbol": "BTC",
            "amount": 0.5,
            "avg_purchase_price": 40000.0,
            "current_price": 50000.0,
            "total_value": 25000.0,
            "profit_loss": 5000.0,
            "profit_loss_percentage": 25.0,
            "transactions": [{
                "id": 1, "type": "buy", "quantity": 0.5, "price": 40000.0,
                "date": "2024-03-01T09:30:00", "invested": 20000.0,
                "current_price": 50000.0, "current_value": 25000.0,
                "profit_loss": 5000.0, "profit_loss_percentage": 25.0
            }]
        }],
        "total_invested": 20000.0,
        "total_current_value": 25000.0,
        "total_profit_loss": 5000.0,
        "total_profit_loss_percentage": 25.0
    }))
    .into_response()
}

async fn export_portfolio_csv(State(state): State<Arc<MockState>>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(res) = authorize(&state, "/portfolios/:id/export/csv", &headers) {
        return res;
    }
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=portfolio_{}_20240501.csv", id),
            ),
        ],
        "symbol,amount\nBTC,0.5\n",
    )
        .into_response()
}

async fn budget_transactions(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(res) = authorize(&state, "/budget/transactions", &headers) {
        return res;
    }
    *state.last_query.lock().unwrap() = query;
    Json(json!([{
        "id": 5,
        "category_id": 2,
        "amount": 12.5,
        "description": "Lunch",
        "date": "2024-05-01T12:30:00",
        "category": { "id": 2, "name": "Food", "type": "expense", "icon": "🍔" }
    }]))
    .into_response()
}

async fn budget_summary(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Err(res) = authorize(&state, "/budget/summary", &headers) {
        return res;
    }
    *state.last_query.lock().unwrap() = query;
    Json(json!({
        "total_income": 1000.0,
        "total_expense": 250.0,
        "balance": 750.0,
        "transactions": [],
        "categories": []
    }))
    .into_response()
}

async fn export_budget_json(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if let Err(res) = authorize(&state, "/budget/export/json", &headers) {
        return res;
    }
    Json(json!([])).into_response()
}
