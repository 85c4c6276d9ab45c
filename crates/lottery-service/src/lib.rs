#![deny(unsafe_code)]

pub mod surface;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lottery_core::{
    catalog, AccountStore, ActorId, Command, CommandDefinition, CommandReply, LedgerClient,
    LotteryConfig, LotteryEngine, LotteryError, RequestId, WorkflowOutcome,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use surface::{Announcement, ChannelSurface, InteractionView};
use thiserror::Error;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<LotteryEngine>,
    pub surface: Arc<ChannelSurface>,
}

impl ServiceState {
    /// Wire the engine to a fresh channel surface.
    pub fn new(
        config: LotteryConfig,
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerClient>,
    ) -> Self {
        let surface = Arc::new(ChannelSurface::new());
        let engine = LotteryEngine::new(config, accounts, ledger, surface.clone());
        Self {
            engine: Arc::new(engine),
            surface,
        }
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/commands", get(list_commands))
        .route("/v1/commands/:name", post(invoke_command))
        .route("/v1/interactions/button", post(press_button))
        .route("/v1/presentations/:actor_id", get(list_presentations))
        .route(
            "/v1/presentations/:actor_id/:request_id",
            get(current_presentation),
        )
        .route("/v1/channel/announcements", get(list_announcements))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Lottery(#[from] LotteryError),
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn lottery_status(err: &LotteryError) -> StatusCode {
    match err {
        LotteryError::PromptNotFound(_) => StatusCode::NOT_FOUND,
        LotteryError::PromptOwnership(_) => StatusCode::FORBIDDEN,
        LotteryError::InvalidToken(_) | LotteryError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Lottery(err) => (
                lottery_status(&err),
                Json(serde_json::json!({
                    "error": err.to_string(),
                    "kind": err.kind(),
                })),
            )
                .into_response(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    accounts_backend: &'static str,
    ledger_network: String,
    lottery_configured: bool,
    pending_prompts: usize,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "lottery-service",
        accounts_backend: state.engine.accounts_backend(),
        ledger_network: state.engine.ledger_network().to_string(),
        lottery_configured: state.engine.config().lottery_address.is_some(),
        pending_prompts: state.engine.pending_prompts(),
    })
}

async fn list_commands() -> Json<Vec<CommandDefinition>> {
    Json(catalog())
}

#[derive(Debug, Clone, Deserialize)]
struct InvocationRequest {
    actor_id: String,
    #[serde(default)]
    options: BTreeMap<String, Value>,
}

fn actor_from(raw: &str) -> Result<ActorId, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("actor_id is required"));
    }
    Ok(ActorId::new(trimmed))
}

async fn invoke_command(
    Path(name): Path<String>,
    State(state): State<ServiceState>,
    Json(invocation): Json<InvocationRequest>,
) -> Result<Json<CommandReply>, ApiError> {
    let actor = actor_from(&invocation.actor_id)?;
    let command = Command::from_invocation(&name, &invocation.options)?;
    Ok(Json(state.engine.invoke(&actor, command).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct ButtonPress {
    actor_id: String,
    custom_id: String,
}

async fn press_button(
    State(state): State<ServiceState>,
    Json(press): Json<ButtonPress>,
) -> Result<Json<WorkflowOutcome>, ApiError> {
    let actor = actor_from(&press.actor_id)?;
    Ok(Json(state.engine.respond(&actor, &press.custom_id).await?))
}

#[derive(Debug, Clone, Serialize)]
struct PresentationsResponse {
    actor_id: String,
    items: Vec<InteractionView>,
}

async fn list_presentations(
    Path(actor_id): Path<String>,
    State(state): State<ServiceState>,
) -> Result<Json<PresentationsResponse>, ApiError> {
    let actor = actor_from(&actor_id)?;
    Ok(Json(PresentationsResponse {
        items: state.surface.views(&actor)?,
        actor_id: actor.to_string(),
    }))
}

async fn current_presentation(
    Path((actor_id, request_id)): Path<(String, RequestId)>,
    State(state): State<ServiceState>,
) -> Result<Json<InteractionView>, ApiError> {
    let actor = actor_from(&actor_id)?;
    state
        .surface
        .view(&actor, request_id)?
        .map(Json)
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "nothing is shown to actor '{actor}' for request '{request_id}'"
            ))
        })
}

#[derive(Debug, Clone, Serialize)]
struct AnnouncementsResponse {
    items: Vec<Announcement>,
}

async fn list_announcements(
    State(state): State<ServiceState>,
) -> Result<Json<AnnouncementsResponse>, ApiError> {
    Ok(Json(AnnouncementsResponse {
        items: state.surface.announcements()?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use lottery_core::mocks::MockLedger;
    use lottery_core::{
        ChainAddress, InMemoryAccountStore, SigningCredential, TokenAmount, WorkflowState,
    };
    use tower::ServiceExt;

    const WALLET: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    struct TestApp {
        app: Router,
        ledger: Arc<MockLedger>,
        wallet: ChainAddress,
    }

    fn test_app() -> TestApp {
        let ledger = Arc::new(MockLedger::new());
        let accounts = Arc::new(InMemoryAccountStore::new());
        let wallet = ChainAddress::parse(WALLET).unwrap();
        accounts
            .link(
                ActorId::new("alice"),
                SigningCredential::new(wallet.clone(), KEY),
            )
            .unwrap();
        let config = LotteryConfig::default().with_lottery_address(MockLedger::lottery_address());
        let state = ServiceState::new(config, accounts, ledger.clone());
        TestApp {
            app: build_router(state),
            ledger,
            wallet,
        }
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn confirm_token(reply: &Value) -> String {
        reply["presentation"]["options"][0]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn health_reports_backends() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["accounts_backend"], "memory");
        assert_eq!(body["lottery_configured"], true);
        assert_eq!(body["pending_prompts"], 0);
    }

    #[tokio::test]
    async fn catalog_lists_both_commands() {
        let t = test_app();
        let (status, body) = send(&t.app, "GET", "/v1/commands", None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|command| command["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["buy-lottery-ticket", "draw-lottery"]);
    }

    #[tokio::test]
    async fn purchase_flows_through_prompt_and_button() {
        let t = test_app();
        let balance = TokenAmount::from_whole(10, 18).unwrap();
        t.ledger.set_balance(&t.wallet, balance);

        let (status, reply) = send(
            &t.app,
            "POST",
            "/v1/commands/buy-lottery-ticket",
            Some(serde_json::json!({ "actor_id": "alice", "options": { "ticket-amount": 2 } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["status"], "prompted");

        let view_uri = format!(
            "/v1/presentations/alice/{}",
            reply["request_id"].as_str().unwrap()
        );
        let (_, view) = send(&t.app, "GET", &view_uri, None).await;
        assert_eq!(view["presentation"]["options"][0]["disabled"], false);

        let (status, outcome) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": confirm_token(&reply) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let outcome: WorkflowOutcome = serde_json::from_value(outcome).unwrap();
        assert_eq!(outcome.state, WorkflowState::Succeeded);
        assert_eq!(t.ledger.submitted_methods(), vec!["approve", "buyTicket"]);

        let (_, view) = send(&t.app, "GET", &view_uri, None).await;
        assert_eq!(
            view["presentation"],
            serde_json::to_value(&outcome.presentation).unwrap()
        );
    }

    #[tokio::test]
    async fn rejected_invocation_is_still_a_reply() {
        let t = test_app();
        let (status, reply) = send(
            &t.app,
            "POST",
            "/v1/commands/draw-lottery",
            Some(serde_json::json!({ "actor_id": "mallory" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply["status"], "rejected");
        assert_eq!(reply["failure"], "not_authorized");
    }

    #[tokio::test]
    async fn bad_invocations_are_bad_requests() {
        let t = test_app();
        let (status, _) = send(
            &t.app,
            "POST",
            "/v1/commands/buy-lottery-ticket",
            Some(serde_json::json!({ "actor_id": "alice", "options": { "ticket-amount": 0 } })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &t.app,
            "POST",
            "/v1/commands/spin-wheel",
            Some(serde_json::json!({ "actor_id": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn button_misuse_maps_to_http_statuses() {
        let t = test_app();
        t.ledger.set_active(true);
        t.ledger.set_participants(2);
        let (_, reply) = send(
            &t.app,
            "POST",
            "/v1/commands/draw-lottery",
            Some(serde_json::json!({ "actor_id": "alice" })),
        )
        .await;
        let token = confirm_token(&reply);

        let (status, _) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "bob", "custom_id": token })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": "not-a-token" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let cancel = token.replacen("confirm_draw", "cancel_draw", 1);
        let (status, outcome) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": cancel })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["state"], "cancelled");

        let (status, _) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": token })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn draw_winner_lands_in_the_channel_feed() {
        let t = test_app();
        t.ledger.set_active(true);
        t.ledger.set_participants(3);
        t.ledger.set_winner(t.wallet.clone());

        let (_, reply) = send(
            &t.app,
            "POST",
            "/v1/commands/draw-lottery",
            Some(serde_json::json!({ "actor_id": "alice" })),
        )
        .await;
        let (status, outcome) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": confirm_token(&reply) })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["state"], "succeeded");

        let (_, feed) = send(&t.app, "GET", "/v1/channel/announcements", None).await;
        let items = feed["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["presentation"]["embed"]["title"], "🎉 Lottery Winner");
        assert_eq!(items[0]["presentation"]["visibility"], "channel");
    }

    #[tokio::test]
    async fn cancelling_one_prompt_keeps_the_other_live() {
        let t = test_app();
        let buy = |count: u64| {
            serde_json::json!({ "actor_id": "alice", "options": { "ticket-amount": count } })
        };
        let uri = "/v1/commands/buy-lottery-ticket";
        let (_, first) = send(&t.app, "POST", uri, Some(buy(1))).await;
        let (_, second) = send(&t.app, "POST", uri, Some(buy(2))).await;

        let cancel = first["presentation"]["options"][1]["token"].clone();
        let (status, outcome) = send(
            &t.app,
            "POST",
            "/v1/interactions/button",
            Some(serde_json::json!({ "actor_id": "alice", "custom_id": cancel })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(outcome["state"], "cancelled");

        let (_, listing) = send(&t.app, "GET", "/v1/presentations/alice", None).await;
        let items = listing["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["request_id"], second["request_id"]);
        assert_eq!(items[0]["presentation"]["options"][0]["disabled"], false);
        assert_eq!(items[1]["request_id"], first["request_id"]);
        assert_eq!(
            items[1]["presentation"]["content"],
            "❌ Ticket purchase cancelled."
        );
    }

    #[tokio::test]
    async fn unknown_actor_has_no_presentations() {
        let t = test_app();
        let (status, listing) = send(&t.app, "GET", "/v1/presentations/nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(listing["items"].as_array().unwrap().is_empty());

        let uri = format!("/v1/presentations/nobody/{}", RequestId::generate());
        let (status, _) = send(&t.app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
