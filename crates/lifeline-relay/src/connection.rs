//! One upstream socket session.
//!
//! The driver is generic over the socket so tests can drive it with an
//! in-memory duplex. On entry it replays a subscribe request for every
//! tracked address (initial connect and reconnect look identical), then
//! multiplexes between subscribe commands and inbound frames. Within one
//! session each address is subscribed at most once.

use std::collections::HashSet;
use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use lifeline_types::{RelayEvent, WalletAddress};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use crate::protocol::{self, Inbound};
use crate::state::RelayState;

/// Commands the relay handle sends to the live upstream session.
#[derive(Debug)]
pub(crate) enum UpstreamCommand {
	Subscribe(WalletAddress),
}

/// Why a session ended without a transport error.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SessionEnd {
	/// The upstream closed the socket or the stream finished.
	SocketClosed,
	/// Every relay handle is gone; no reconnect makes sense.
	CommandsClosed,
}

pub(crate) async fn run_connection<S>(
	socket: S,
	state: &Arc<Mutex<RelayState>>,
	commands: &mut mpsc::UnboundedReceiver<UpstreamCommand>,
	mint: &str,
	request_id: &mut u64,
) -> Result<SessionEnd, WsError>
where
	S: Stream<Item = Result<Message, WsError>> + Sink<Message, Error = WsError> + Unpin,
{
	let (mut sink, mut stream) = socket.split();
	let mut subscribed = HashSet::new();

	// Resubscription replay: every tracked address, whether it was added
	// during a previous session or while disconnected.
	let tracked = state.lock().await.tracked();
	for wallet in tracked {
		*request_id += 1;
		sink.send(Message::Text(
			protocol::subscribe_request(*request_id, &wallet).into(),
		))
		.await?;
		subscribed.insert(wallet);
	}

	loop {
		tokio::select! {
			command = commands.recv() => match command {
				Some(UpstreamCommand::Subscribe(wallet)) => {
					if subscribed.contains(&wallet) {
						continue;
					}
					*request_id += 1;
					sink.send(Message::Text(
						protocol::subscribe_request(*request_id, &wallet).into(),
					))
					.await?;
					subscribed.insert(wallet);
				}
				None => return Ok(SessionEnd::CommandsClosed),
			},

			message = stream.next() => match message {
				Some(Ok(Message::Text(text))) => {
					handle_frame(text.as_str(), state, mint).await;
				}
				Some(Ok(Message::Ping(payload))) => {
					sink.send(Message::Pong(payload)).await?;
				}
				Some(Ok(Message::Close(frame))) => {
					info!(?frame, "upstream closed the connection");
					return Ok(SessionEnd::SocketClosed);
				}
				Some(Ok(_)) => {}
				Some(Err(e)) => return Err(e),
				None => return Ok(SessionEnd::SocketClosed),
			},
		}
	}
}

async fn handle_frame(text: &str, state: &Arc<Mutex<RelayState>>, mint: &str) {
	match protocol::parse_inbound(text) {
		Ok(Inbound::Transaction(notification)) => match notification.deposits(mint) {
			Ok(deposits) => {
				for deposit in deposits {
					let event = RelayEvent::UsdcDeposit {
						wallet: deposit.wallet.clone(),
						amount: deposit.amount,
					};
					let delivered = state.lock().await.broadcast(&deposit.wallet, &event);
					if delivered > 0 {
						info!(
							wallet = %deposit.wallet,
							amount = %deposit.amount,
							listeners = delivered,
							"deposit fanned out"
						);
					}
				}
			}
			Err(e) => warn!(error = %e, "discarding malformed deposit notification"),
		},
		Ok(Inbound::SubscriptionAck { id, subscription }) => {
			debug!(id, subscription, "subscription acknowledged");
		}
		Ok(Inbound::Unhandled) => {}
		Err(e) => warn!(error = %e, "discarding invalid upstream message"),
	}
}
