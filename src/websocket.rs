//! # WebSocket Transport
//!
//! One actor per connection, bridging the wire to the matchmaking service.
//! Clients connect to `/ws`, send JSON control frames and binary audio
//! frames, and receive JSON notifications plus relayed audio.
//!
//! ## Connection Lifecycle:
//! 1. **Actor start**: the connection registers with the service, which
//!    allocates the participant id and sends the welcome message
//! 2. **Text frames**: parsed as `ClientMessage` and dispatched; malformed
//!    frames are logged and dropped with no participant-visible effect
//! 3. **Binary frames**: opaque audio, forwarded to the relay
//! 4. **Actor stop**: the participant is deregistered; this is the single
//!    cancellation path and it is idempotent
//!
//! Delivery back to the client goes through actix `Recipient`s with
//! fire-and-forget sends, so a slow or gone peer never blocks the engine.

use crate::matching::messages::ClientMessage;
use crate::matching::registry::Connection;
use crate::matching::service::MatchmakingService;
use crate::state::AppState;

use actix::prelude::*;
use actix_web::web::Bytes;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How often the server pings the client.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// How long without any client traffic before the connection is dropped.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outbound JSON control message for a connection actor.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundText(pub String);

/// Outbound binary audio frame for a connection actor.
#[derive(Message)]
#[rtype(result = "()")]
pub struct OutboundFrame(pub Bytes);

/// `Connection` handle the registry keeps for a WebSocket participant.
///
/// `do_send` drops the message if the mailbox is gone or full; that is the
/// intended best-effort behavior for both notifications and audio.
pub struct WsConnection {
    text: Recipient<OutboundText>,
    binary: Recipient<OutboundFrame>,
}

impl WsConnection {
    fn new(addr: Addr<MatchSocket>) -> Self {
        Self {
            text: addr.clone().recipient(),
            binary: addr.recipient(),
        }
    }
}

impl Connection for WsConnection {
    fn send_text(&self, payload: String) {
        let _ = self.text.do_send(OutboundText(payload));
    }

    fn send_binary(&self, payload: Bytes) {
        let _ = self.binary.do_send(OutboundFrame(payload));
    }
}

/// WebSocket actor for one participant's connection.
pub struct MatchSocket {
    /// Participant id allocated by the service at registration.
    participant_id: Option<Uuid>,

    service: Arc<MatchmakingService>,

    /// Last time the client showed any sign of life.
    last_heartbeat: Instant,
}

impl MatchSocket {
    pub fn new(service: Arc<MatchmakingService>) -> Self {
        Self {
            participant_id: None,
            service,
            last_heartbeat: Instant::now(),
        }
    }

    fn handle_control(&mut self, message: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let Some(id) = self.participant_id else {
            return;
        };

        match message {
            ClientMessage::FindMatch { profile } => self.service.find_match(id, profile),
            ClientMessage::NextMatch { profile } => self.service.next_match(id, profile),
            ClientMessage::EndMatch => self.service.end_match(id, false),
            // Same as the client closing the connection; the stop path
            // performs the (idempotent) disconnect.
            ClientMessage::EndSession => ctx.stop(),
        }
    }
}

impl Actor for MatchSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let conn = Arc::new(WsConnection::new(ctx.address()));
        let id = self.service.connect(conn);
        self.participant_id = Some(id);

        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                warn!("heartbeat timeout, closing connection");
                ctx.stop();
            } else {
                ctx.ping(b"");
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(id) = self.participant_id.take() {
            self.service.disconnect(id);
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for MatchSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => self.handle_control(message, ctx),
                    Err(err) => {
                        // Malformed control frame: dropped, never escalated.
                        warn!(
                            participant = ?self.participant_id,
                            error = %err,
                            "dropping malformed control frame"
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(data)) => {
                self.last_heartbeat = Instant::now();
                if let Some(id) = self.participant_id {
                    self.service.relay_audio(id, data);
                }
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                info!(participant = ?self.participant_id, "connection closed: {:?}", reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!("unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                warn!(participant = ?self.participant_id, "protocol error: {}", err);
                ctx.stop();
            }
        }
    }
}

impl Handler<OutboundText> for MatchSocket {
    type Result = ();

    fn handle(&mut self, msg: OutboundText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<OutboundFrame> for MatchSocket {
    type Result = ();

    fn handle(&mut self, msg: OutboundFrame, ctx: &mut Self::Context) {
        debug!("forwarding {} byte audio frame", msg.0.len());
        ctx.binary(msg.0);
    }
}

/// HTTP → WebSocket upgrade handler for `/ws`.
pub async fn match_websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    info!(
        "new connection request from {:?}",
        req.connection_info().peer_addr()
    );
    ws::start(MatchSocket::new(state.matchmaking.clone()), &req, stream)
}
