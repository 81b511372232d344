//! Station console sessions over WebSocket
//!
//! Each session owns a bounded send queue. A console that cannot drain its
//! queue is a slow consumer and gets dropped; it can always reconnect.

use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use dashmap::DashMap;
use futures::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::net::protocol::{
    ErrorData, GameMasterCommand, HeartbeatData, InputEventData, Message, MessageType,
    MissionLoadData, StateUpdateData, StationConnectData, StationType,
};
use crate::util::rate_limit::SessionRateLimiter;

/// Interval between server pings; below the 60 s read deadline
const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Send queue depth per session
const SEND_QUEUE_DEPTH: usize = 256;

/// One connected console
pub struct RoleSession {
    pub client_id: String,
    pub station: Option<StationType>,
    tx: mpsc::Sender<String>,
}

/// Registry of live console sessions
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, RoleSession>,
}

impl SessionRegistry {
    pub fn new() -> SessionRegistry {
        SessionRegistry {
            sessions: DashMap::new(),
        }
    }

    fn insert(&self, id: Uuid, session: RoleSession) {
        self.sessions.insert(id, session);
    }

    pub fn remove(&self, id: &Uuid) {
        self.sessions.remove(id);
    }

    fn bind_station(&self, id: &Uuid, station: StationType, client_id: String) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.station = Some(station);
            session.client_id = client_id;
        }
    }

    fn station_of(&self, id: &Uuid) -> Option<StationType> {
        self.sessions.get(id).and_then(|session| session.station)
    }

    /// Queue a frame on one session; false means the session is gone or its
    /// queue is full
    fn try_send(&self, id: &Uuid, text: String) -> bool {
        match self.sessions.get(id) {
            Some(session) => session.tx.try_send(text).is_ok(),
            None => false,
        }
    }

    /// Queue a frame to every session of a station. Returns the sessions
    /// whose queue was full; the caller drops them.
    pub fn send_to_station(&self, station: StationType, text: &str) -> Vec<Uuid> {
        let mut stale = Vec::new();
        for entry in self.sessions.iter() {
            if entry.value().station == Some(station)
                && entry.value().tx.try_send(text.to_string()).is_err()
            {
                stale.push(*entry.key());
            }
        }
        stale
    }

    pub fn counts_by_station(&self) -> HashMap<StationType, usize> {
        let mut counts = HashMap::new();
        for entry in self.sessions.iter() {
            if let Some(station) = entry.value().station {
                *counts.entry(station).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Inbound frames are bounded; the floor keeps heartbeats working even
    // with a hostile config
    let max_frame = {
        let config = state.config.read().unwrap();
        config.network.max_message_size.max(512)
    };

    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "Console connected");

    let (ws_sink, mut ws_stream) = socket.split();
    let (tx, rx) = mpsc::channel::<String>(SEND_QUEUE_DEPTH);

    state.sessions.insert(
        session_id,
        RoleSession {
            client_id: session_id.to_string(),
            station: None,
            tx,
        },
    );

    let writer_handle = tokio::spawn(run_writer(ws_sink, rx));

    let read_timeout = {
        let config = state.config.read().unwrap();
        config.client_timeout_duration()
    };
    let rate_limiter = SessionRateLimiter::new();

    loop {
        let frame = match tokio::time::timeout(read_timeout, ws_stream.next()).await {
            Err(_) => {
                warn!(session_id = %session_id, "Console read deadline exceeded");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(session_id = %session_id, error = %err, "WebSocket error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            WsMessage::Text(text) => {
                handle_text(&state, &session_id, &text, &rate_limiter);
            }
            WsMessage::Binary(_) => {
                warn!(session_id = %session_id, "Binary frame ignored");
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {}
            WsMessage::Close(_) => {
                info!(session_id = %session_id, "Console closed connection");
                break;
            }
        }
    }

    state.sessions.remove(&session_id);
    writer_handle.abort();
    info!(session_id = %session_id, "Console disconnected");
}

/// Drain the send queue to the socket and keep the connection pinged
async fn run_writer(mut sink: SplitSink<WebSocket, WsMessage>, mut rx: mpsc::Receiver<String>) {
    let mut ping = tokio::time::interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.tick().await; // The first tick fires immediately

    loop {
        tokio::select! {
            frame = rx.recv() => match frame {
                Some(text) => {
                    if sink.send(WsMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if sink.send(WsMessage::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    let _ = sink.close().await;
}

fn handle_text(state: &AppState, session_id: &Uuid, text: &str, limiter: &SessionRateLimiter) {
    let message = match Message::from_json(text) {
        Ok(message) => message,
        Err(err) => {
            debug!(session_id = %session_id, error = %err, "Message decode failed");
            send_error(state, session_id, 400, "Invalid message format", Some(err.to_string()));
            return;
        }
    };

    match message.msg_type {
        MessageType::StationConnect => {
            let connect: StationConnectData = match message.parse_data() {
                Ok(data) => data,
                Err(err) => {
                    send_error(state, session_id, 400, "Invalid station connect data", Some(err.to_string()));
                    return;
                }
            };

            state
                .sessions
                .bind_station(session_id, connect.station, connect.client_id.clone());
            info!(
                station = ?connect.station,
                client_id = %connect.client_id,
                "Station connected"
            );

            // Confirm the binding with a meta-only state update
            let mut meta = serde_json::Map::new();
            meta.insert("status".to_string(), "connected".into());
            meta.insert(
                "station".to_string(),
                serde_json::to_value(connect.station).unwrap_or_default(),
            );
            meta.insert("client_id".to_string(), connect.client_id.into());

            let ack = StateUpdateData {
                meta,
                ..Default::default()
            };
            send_message(state, session_id, MessageType::StateUpdate, &ack);
        }

        MessageType::InputEvent => {
            if !limiter.check_input() {
                warn!(session_id = %session_id, "Input rate limited");
                return;
            }

            let Some(station) = state.sessions.station_of(session_id) else {
                send_error(state, session_id, 400, "Not bound to a station", None);
                return;
            };

            let mut input: InputEventData = match message.parse_data() {
                Ok(data) => data,
                Err(err) => {
                    send_error(state, session_id, 400, "Invalid input data", Some(err.to_string()));
                    return;
                }
            };
            input.station = station;

            if !state.stations.handle_input(station, &input) {
                send_error(state, session_id, 400, "Input rejected", None);
            }
        }

        MessageType::Heartbeat => {
            if let Ok(heartbeat) = message.parse_data::<HeartbeatData>() {
                let response = HeartbeatData {
                    client_id: heartbeat.client_id,
                    ping: heartbeat.ping,
                };
                send_message(state, session_id, MessageType::Heartbeat, &response);
            }
        }

        MessageType::MissionLoad => {
            if state.sessions.station_of(session_id) != Some(StationType::Gamemaster) {
                send_error(state, session_id, 403, "Unauthorized", None);
                return;
            }

            let mission: MissionLoadData = match message.parse_data() {
                Ok(data) => data,
                Err(err) => {
                    send_error(state, session_id, 400, "Invalid mission data", Some(err.to_string()));
                    return;
                }
            };

            let result = {
                let scripts = state.scripts.lock().unwrap();
                scripts.load_mission_file(&mission.mission_file)
            };
            if let Err(err) = result {
                error!(file = %mission.mission_file, error = %err, "Mission load failed");
                send_error(state, session_id, 500, "Mission load failed", Some(err.to_string()));
            }
        }

        MessageType::GamemasterCommand => {
            if state.sessions.station_of(session_id) != Some(StationType::Gamemaster) {
                send_error(state, session_id, 403, "Unauthorized", None);
                return;
            }

            let command: GameMasterCommand = match message.parse_data() {
                Ok(data) => data,
                Err(err) => {
                    send_error(state, session_id, 400, "Invalid GM command", Some(err.to_string()));
                    return;
                }
            };

            // Inline scripts run through the mission sandbox
            if let Some(script) = &command.script {
                let result = {
                    let scripts = state.scripts.lock().unwrap();
                    scripts.execute(script)
                };
                if let Err(err) = result {
                    send_error(state, session_id, 400, "Script error", Some(err.to_string()));
                    return;
                }
            }

            let mut context = serde_json::Map::new();
            if let Some(data) = &message.data {
                context.insert("gm_command".to_string(), data.clone());
            }

            let input = InputEventData {
                station: StationType::Gamemaster,
                action: "gamemaster_command".to_string(),
                value: serde_json::to_value(&command).unwrap_or_default(),
                timestamp: message.timestamp,
                context,
            };
            state.stations.handle_input(StationType::Gamemaster, &input);
        }

        MessageType::MissionControl => {
            debug!(session_id = %session_id, "mission_control not routed");
        }

        other => {
            warn!(session_id = %session_id, msg_type = ?other, "Unexpected message type");
        }
    }
}

fn send_message<T: serde::Serialize>(
    state: &AppState,
    session_id: &Uuid,
    msg_type: MessageType,
    data: &T,
) {
    let Ok(message) = Message::new(msg_type, data) else {
        return;
    };
    let Ok(text) = message.to_json() else {
        return;
    };

    if !state.sessions.try_send(session_id, text) {
        // Full queue means a slow consumer: drop the whole session
        state.sessions.remove(session_id);
        warn!(session_id = %session_id, "Send queue full, session dropped");
    }
}

fn send_error(state: &AppState, session_id: &Uuid, code: u16, message: &str, details: Option<String>) {
    let error = ErrorData {
        code,
        message: message.to_string(),
        details,
    };
    send_message(state, session_id, MessageType::Error, &error);
}

/// Samples universe state on the configured cadence and fans role-filtered
/// frames out to every bound session
pub async fn broadcast_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = {
        let config = state.config.read().unwrap();
        config.state_update_duration()
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(period_ms = period.as_millis() as u64, "Broadcast loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }

        // One snapshot per cycle, one encode per station
        let snapshot = {
            let universe = state.universe.read().unwrap();
            universe.state()
        };

        for station in StationType::ALL {
            let update = state.stations.filter_update(station, &snapshot);
            if update.is_empty() {
                continue;
            }

            let Ok(message) = Message::new(MessageType::StateUpdate, &update) else {
                continue;
            };
            let Ok(text) = message.to_json() else {
                continue;
            };

            for session_id in state.sessions.send_to_station(station, &text) {
                warn!(session_id = %session_id, station = ?station, "Slow consumer dropped");
                state.sessions.remove(&session_id);
            }
        }
    }

    info!("Broadcast loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_queue(depth: usize) -> (RoleSession, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(depth);
        (
            RoleSession {
                client_id: "test".to_string(),
                station: None,
                tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn frames_route_to_bound_station_only() {
        let registry = SessionRegistry::new();

        let helm_id = Uuid::new_v4();
        let (session, mut helm_rx) = session_with_queue(8);
        registry.insert(helm_id, session);
        registry.bind_station(&helm_id, StationType::Helm, "helm-console".to_string());

        let tactical_id = Uuid::new_v4();
        let (session, mut tactical_rx) = session_with_queue(8);
        registry.insert(tactical_id, session);
        registry.bind_station(&tactical_id, StationType::Tactical, "tac-console".to_string());

        let unbound_id = Uuid::new_v4();
        let (session, mut unbound_rx) = session_with_queue(8);
        registry.insert(unbound_id, session);

        let stale = registry.send_to_station(StationType::Helm, "frame");
        assert!(stale.is_empty());

        assert_eq!(helm_rx.try_recv().unwrap(), "frame");
        assert!(tactical_rx.try_recv().is_err());
        assert!(unbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_marks_session_stale() {
        let registry = SessionRegistry::new();

        let id = Uuid::new_v4();
        let (session, _rx) = session_with_queue(1);
        registry.insert(id, session);
        registry.bind_station(&id, StationType::Captain, "cap".to_string());

        // First frame fills the queue, second overflows
        assert!(registry.send_to_station(StationType::Captain, "one").is_empty());
        let stale = registry.send_to_station(StationType::Captain, "two");
        assert_eq!(stale, vec![id]);

        registry.remove(&id);
        assert_eq!(registry.session_count(), 0);
    }

    #[tokio::test]
    async fn station_counts_track_bindings() {
        let registry = SessionRegistry::new();

        let mut receivers = Vec::new();
        for _ in 0..2 {
            let id = Uuid::new_v4();
            let (session, rx) = session_with_queue(1);
            registry.insert(id, session);
            registry.bind_station(&id, StationType::Helm, "h".to_string());
            receivers.push(rx);
        }

        let counts = registry.counts_by_station();
        assert_eq!(counts.get(&StationType::Helm), Some(&2));
        assert_eq!(counts.get(&StationType::Tactical), None);
    }
}
