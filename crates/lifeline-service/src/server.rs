//! HTTP and WebSocket surface of the lifeline service.
//!
//! `/api/ws` is the downstream leg of the notification relay: one socket
//! per interested wallet, fed with `usdc_deposit` events. `/api/ws-listener`
//! asks the relay to ensure an upstream subscription. The donation routes
//! drive flow sessions.

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use lifeline_flow::{FlowCommand, FlowState};
use lifeline_relay::{Relay, RelayHealth};
use lifeline_types::WalletAddress;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::flows::{CommandOutcome, FlowManager};

#[derive(Clone)]
pub struct AppState {
	pub relay: Relay,
	pub flows: Arc<FlowManager>,
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/ws", get(ws_handler))
		.route("/api/ws-listener", post(subscribe_wallet))
		.route(
			"/api/donations/{donate_id}",
			post(start_donation).get(get_donation).delete(cancel_donation),
		)
		.route("/api/donations/{donate_id}/pay", post(pay_donation))
		.route("/api/donations/{donate_id}/confirm", post(confirm_donation))
		.route(
			"/api/donations/{donate_id}/connect-wallet",
			post(connect_wallet),
		)
		.with_state(state)
		.layer(TraceLayer::new_for_http())
		.layer(CorsLayer::permissive())
}

/// Liveness plus relay condition. 503 once the relay has given up.
async fn health(State(state): State<AppState>) -> Response {
	let relay = state.relay.health();
	let status = if relay == RelayHealth::Failed {
		StatusCode::SERVICE_UNAVAILABLE
	} else {
		StatusCode::OK
	};

	(
		status,
		Json(json!({
			"status": "running",
			"relay": relay,
			"timestamp": chrono::Utc::now().timestamp()
		})),
	)
		.into_response()
}

#[derive(Deserialize)]
struct WsQuery {
	wallet: String,
}

async fn ws_handler(
	ws: WebSocketUpgrade,
	Query(query): Query<WsQuery>,
	State(state): State<AppState>,
) -> Response {
	let wallet = match WalletAddress::new(query.wallet) {
		Ok(wallet) => wallet,
		Err(e) => {
			return (
				StatusCode::BAD_REQUEST,
				Json(json!({ "error": e.to_string() })),
			)
				.into_response();
		}
	};

	ws.on_upgrade(move |socket| serve_wallet_socket(socket, state, wallet))
}

async fn serve_wallet_socket(socket: WebSocket, state: AppState, wallet: WalletAddress) {
	let (client_id, mut events) = state.relay.add_client(wallet.clone()).await;
	debug!(wallet = %wallet, "deposit listener connected");

	let (mut sink, mut stream) = socket.split();
	loop {
		tokio::select! {
			event = events.recv() => match event {
				Some(event) => {
					let Ok(payload) = serde_json::to_string(&event) else {
						continue;
					};
					if sink.send(WsMessage::Text(payload.into())).await.is_err() {
						break;
					}
				}
				None => break,
			},

			message = stream.next() => match message {
				// This channel carries no client-to-server messages.
				Some(Ok(_)) => {}
				Some(Err(_)) | None => break,
			},
		}
	}

	state.relay.remove_client(&wallet, client_id).await;
	debug!(wallet = %wallet, "deposit listener disconnected");
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeBody {
	wallet_address: String,
}

async fn subscribe_wallet(
	State(state): State<AppState>,
	Json(body): Json<SubscribeBody>,
) -> Response {
	match WalletAddress::new(body.wallet_address) {
		Ok(wallet) => {
			state.relay.subscribe_to_wallet(wallet).await;
			Json(json!({ "ok": true })).into_response()
		}
		Err(e) => (
			StatusCode::BAD_REQUEST,
			Json(json!({ "ok": false, "error": e.to_string() })),
		)
			.into_response(),
	}
}

async fn start_donation(
	State(state): State<AppState>,
	Path(donate_id): Path<String>,
) -> Response {
	let Some(mut watcher) = state.flows.start(&donate_id).await else {
		return (
			StatusCode::CONFLICT,
			Json(json!({ "error": "donation session already active" })),
		)
			.into_response();
	};

	// Wait for the intent fetch to settle so the caller sees either the
	// loaded donation or the load failure.
	let response = match watcher.wait_for(|s| s.state != FlowState::Loading).await {
		Ok(snapshot) => Json(snapshot.clone()).into_response(),
		Err(_) => (
			StatusCode::INTERNAL_SERVER_ERROR,
			Json(json!({ "error": "donation session ended unexpectedly" })),
		)
			.into_response(),
	};
	response
}

async fn get_donation(State(state): State<AppState>, Path(donate_id): Path<String>) -> Response {
	match state.flows.snapshot(&donate_id).await {
		Some(snapshot) => Json(snapshot).into_response(),
		None => not_found(),
	}
}

async fn pay_donation(State(state): State<AppState>, Path(donate_id): Path<String>) -> Response {
	dispatch(&state, &donate_id, FlowCommand::Pay).await
}

async fn confirm_donation(
	State(state): State<AppState>,
	Path(donate_id): Path<String>,
) -> Response {
	dispatch(&state, &donate_id, FlowCommand::ConfirmManual).await
}

async fn connect_wallet(State(state): State<AppState>, Path(donate_id): Path<String>) -> Response {
	dispatch(&state, &donate_id, FlowCommand::ConnectWallet).await
}

async fn cancel_donation(
	State(state): State<AppState>,
	Path(donate_id): Path<String>,
) -> Response {
	if state.flows.cancel(&donate_id).await {
		Json(json!({ "ok": true })).into_response()
	} else {
		not_found()
	}
}

async fn dispatch(state: &AppState, donate_id: &str, command: FlowCommand) -> Response {
	match state.flows.command(donate_id, command).await {
		CommandOutcome::Sent => Json(json!({ "ok": true })).into_response(),
		CommandOutcome::NotFound => not_found(),
		CommandOutcome::Finished => (
			StatusCode::CONFLICT,
			Json(json!({ "error": "donation session is finished" })),
		)
			.into_response(),
	}
}

fn not_found() -> Response {
	(
		StatusCode::NOT_FOUND,
		Json(json!({ "error": "unknown donation session" })),
	)
		.into_response()
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use async_trait::async_trait;
	use axum::body::Body;
	use axum::http::Request;
	use lifeline_flow::FlowTimers;
	use lifeline_relay::RelayConfig;
	use lifeline_store::{MemoryStore, SessionStore};
	use lifeline_types::{
		BackendError, DonationBackend, DonationCheck, DonationIntent, TransferError,
		TransferReceipt, TransferSubmitter,
	};
	use rust_decimal::Decimal;
	use serde_json::Value;
	use solana_sdk::pubkey::Pubkey;
	use tower::ServiceExt;

	use super::*;

	struct MockBackend;

	#[async_trait]
	impl DonationBackend for MockBackend {
		async fn donation_info(&self, donate_id: &str) -> Result<DonationIntent, BackendError> {
			Ok(DonationIntent {
				donate_id: donate_id.to_string(),
				wallet_address: test_wallet(),
				amount: Decimal::from(10),
				name: None,
				email: None,
				note: None,
				anonymous: false,
				fundraiser: None,
			})
		}

		async fn check_donation(&self, _donate_id: &str) -> Result<DonationCheck, BackendError> {
			Ok(DonationCheck {
				success: true,
				message: None,
			})
		}
	}

	struct MockTransfer;

	#[async_trait]
	impl TransferSubmitter for MockTransfer {
		fn wallet_connected(&self) -> bool {
			true
		}

		fn wallet_address(&self) -> Option<WalletAddress> {
			Some(test_wallet())
		}

		async fn submit_usdc_transfer(
			&self,
			_recipient: &WalletAddress,
			_amount: Decimal,
		) -> Result<TransferReceipt, TransferError> {
			Ok(TransferReceipt {
				signature: "sig".to_string(),
				recipient_account_created: false,
			})
		}
	}

	fn test_wallet() -> WalletAddress {
		WalletAddress::new(Pubkey::new_unique().to_string()).unwrap()
	}

	fn test_state() -> AppState {
		let relay = Relay::spawn(RelayConfig {
			// Nothing listens here; the supervisor retries in the
			// background, which is all these tests need.
			ws_url: "ws://127.0.0.1:9".to_string(),
			usdc_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
			reconnect_initial: Duration::from_secs(60),
			reconnect_max: Duration::from_secs(60),
			give_up_after: None,
		});
		let flows = Arc::new(FlowManager::new(
			Arc::new(MockBackend),
			Arc::new(MockTransfer),
			Arc::new(SessionStore::new(Box::new(MemoryStore::new()))),
			FlowTimers::default(),
		));
		AppState { relay, flows }
	}

	async fn body_json(response: Response) -> Value {
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn health_reports_relay_condition() {
		let app = router(test_state());
		let response = app
			.oneshot(Request::get("/health").body(Body::empty()).unwrap())
			.await
			.unwrap();

		assert_ne!(response.status(), StatusCode::NOT_FOUND);
		let body = body_json(response).await;
		assert_eq!(body["status"], "running");
		assert!(body["relay"].is_string());
	}

	#[tokio::test]
	async fn ws_listener_acknowledges_subscription() {
		let app = router(test_state());
		let request = Request::post("/api/ws-listener")
			.header("content-type", "application/json")
			.body(Body::from(
				json!({ "walletAddress": test_wallet().as_str() }).to_string(),
			))
			.unwrap();

		let response = app.oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_json(response).await, json!({ "ok": true }));
	}

	#[tokio::test]
	async fn ws_listener_rejects_invalid_wallets() {
		let app = router(test_state());
		let request = Request::post("/api/ws-listener")
			.header("content-type", "application/json")
			.body(Body::from(json!({ "walletAddress": "bogus" }).to_string()))
			.unwrap();

		let response = app.oneshot(request).await.unwrap();
		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn unknown_donation_session_is_404() {
		let app = router(test_state());
		let response = app
			.oneshot(
				Request::get("/api/donations/nope")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn donation_session_lifecycle_over_http() {
		let app = router(test_state());

		let response = app
			.clone()
			.oneshot(
				Request::post("/api/donations/d-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let body = body_json(response).await;
		assert_eq!(body["state"], "ready_to_pay");
		assert_eq!(body["intent"]["donateId"], "d-1");

		// A second start while the session is live conflicts.
		let response = app
			.clone()
			.oneshot(
				Request::post("/api/donations/d-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::CONFLICT);

		let response = app
			.clone()
			.oneshot(
				Request::get("/api/donations/d-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let response = app
			.clone()
			.oneshot(
				Request::delete("/api/donations/d-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let response = app
			.oneshot(
				Request::get("/api/donations/d-1")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);
	}
}
