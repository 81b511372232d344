//! Panel transport: newline-delimited JSON over TCP
//!
//! A connecting panel is anonymous until its first panel_heartbeat or
//! panel_status carries an ID; the server then pushes its device
//! configuration and starts accepting input. Output frames are dropped on a
//! full queue, never the session - a panel must keep working even if one
//! burst of LED updates is lost.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::net::protocol::{
    HeartbeatData, Message, MessageType, PanelInputData, PanelOutputData, PanelStatusData,
};

/// Write deadline per outbound frame
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Output queue depth per panel
const OUTPUT_QUEUE_DEPTH: usize = 100;

/// Silence threshold before a panel is forcibly disconnected
const PANEL_TIMEOUT: Duration = Duration::from_secs(60);

struct PanelClient {
    tx: mpsc::Sender<String>,
    last_seen: Instant,
    configured: bool,
    close: Arc<Notify>,
}

/// Registry of identified panel connections
#[derive(Default)]
pub struct PanelRegistry {
    clients: DashMap<String, PanelClient>,
}

impl PanelRegistry {
    pub fn new() -> PanelRegistry {
        PanelRegistry {
            clients: DashMap::new(),
        }
    }

    fn register(&self, panel_id: &str, tx: mpsc::Sender<String>, close: Arc<Notify>) {
        self.clients.insert(
            panel_id.to_string(),
            PanelClient {
                tx,
                last_seen: Instant::now(),
                configured: false,
                close,
            },
        );
    }

    fn touch(&self, panel_id: &str) {
        if let Some(mut client) = self.clients.get_mut(panel_id) {
            client.last_seen = Instant::now();
        }
    }

    fn set_configured(&self, panel_id: &str) {
        if let Some(mut client) = self.clients.get_mut(panel_id) {
            client.configured = true;
        }
    }

    fn remove(&self, panel_id: &str) {
        self.clients.remove(panel_id);
    }

    /// Queue one frame; a full queue drops the frame, not the panel
    pub fn send_frame(&self, panel_id: &str, text: String) -> bool {
        match self.clients.get(panel_id) {
            Some(client) => match client.tx.try_send(text) {
                Ok(()) => true,
                Err(_) => {
                    warn!(panel_id = %panel_id, "Panel output queue full, frame dropped");
                    false
                }
            },
            None => false,
        }
    }

    /// Map of connected panel IDs to their configured flag
    pub fn connected_panels(&self) -> HashMap<String, bool> {
        self.clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().configured))
            .collect()
    }

    pub fn panel_count(&self) -> usize {
        self.clients.len()
    }

    /// Close and forget every panel silent for longer than `timeout`
    fn sweep(&self, timeout: Duration) -> Vec<String> {
        let stale: Vec<String> = self
            .clients
            .iter()
            .filter(|entry| entry.value().last_seen.elapsed() > timeout)
            .map(|entry| entry.key().clone())
            .collect();

        for panel_id in &stale {
            if let Some((_, client)) = self.clients.remove(panel_id) {
                client.close.notify_one();
            }
        }
        stale
    }

    /// Close every connection; used during server shutdown
    pub fn close_all(&self) {
        for entry in self.clients.iter() {
            entry.value().close.notify_one();
        }
        self.clients.clear();
    }
}

/// Accept loop plus the heartbeat sweeper
pub async fn run_panel_server(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Panel TCP server listening");

    let sweeper_state = state.clone();
    let mut sweeper_shutdown = shutdown.clone();
    let sweeper = tokio::spawn(async move {
        let period = {
            let config = sweeper_state.config.read().unwrap();
            config.panel_sweep_duration()
        };
        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = sweeper_shutdown.changed() => break,
            }

            for panel_id in sweeper_state.panel_registry.sweep(PANEL_TIMEOUT) {
                warn!(panel_id = %panel_id, "Panel timed out, disconnecting");
                sweeper_state.panels.set_panel_offline(&panel_id);
            }
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    debug!(peer = %addr, "Panel connection accepted");
                    let state = state.clone();
                    tokio::spawn(handle_panel_connection(stream, state));
                }
                Err(err) => {
                    error!(error = %err, "Panel accept error");
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    sweeper.abort();
    state.panel_registry.close_all();
    info!("Panel TCP server stopped");
}

async fn handle_panel_connection(stream: TcpStream, state: AppState) {
    let (reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTPUT_QUEUE_DEPTH);
    let close = Arc::new(Notify::new());

    // Writer half: drain the output queue onto the socket
    let writer_handle = tokio::spawn(async move {
        while let Some(mut line) = rx.recv().await {
            line.push('\n');
            match tokio::time::timeout(WRITE_TIMEOUT, writer.write_all(line.as_bytes())).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    debug!(error = %err, "Panel write error");
                    break;
                }
                Err(_) => {
                    warn!("Panel write deadline exceeded");
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(reader).lines();
    let mut panel_id = String::new();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = close.notified() => break,
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                debug!(panel_id = %panel_id, error = %err, "Panel read error");
                break;
            }
        };

        if line.is_empty() {
            continue;
        }

        let message = match Message::from_json(&line) {
            Ok(message) => message,
            Err(err) => {
                // Panels get no error frames; decode failures are dropped
                warn!(panel_id = %panel_id, error = %err, "Panel message parse error");
                continue;
            }
        };

        if !panel_id.is_empty() {
            state.panel_registry.touch(&panel_id);
        }

        match message.msg_type {
            MessageType::PanelHeartbeat => {
                handle_panel_heartbeat(&state, &message, &mut panel_id, &tx, &close);
            }
            MessageType::PanelStatus => {
                handle_panel_status(&state, &message, &mut panel_id, &tx, &close);
            }
            MessageType::PanelInput => {
                handle_panel_input(&state, &message, &panel_id);
            }
            other => {
                warn!(panel_id = %panel_id, msg_type = ?other, "Unknown panel message type");
            }
        }
    }

    if !panel_id.is_empty() {
        state.panel_registry.remove(&panel_id);
        state.panels.set_panel_offline(&panel_id);
        info!(panel_id = %panel_id, "Panel disconnected");
    }
    writer_handle.abort();
}

/// First identified message wins: register the client and push its config
fn identify_panel(
    state: &AppState,
    panel_id: &mut String,
    id: &str,
    tx: &mpsc::Sender<String>,
    close: &Arc<Notify>,
) {
    if !panel_id.is_empty() || id.is_empty() {
        return;
    }

    *panel_id = id.to_string();
    state.panel_registry.register(panel_id, tx.clone(), close.clone());
    info!(panel_id = %panel_id, "Panel connected");

    match state.panels.configuration(panel_id) {
        Some(config) => {
            if let Ok(message) = Message::new(MessageType::PanelConfig, &config) {
                if let Ok(text) = message.to_json() {
                    state.panel_registry.send_frame(panel_id, text);
                    state.panel_registry.set_configured(panel_id);
                    info!(panel_id = %panel_id, "Configuration sent to panel");
                }
            }
        }
        None => {
            warn!(panel_id = %panel_id, "No configuration found for panel");
        }
    }
}

fn handle_panel_heartbeat(
    state: &AppState,
    message: &Message,
    panel_id: &mut String,
    tx: &mpsc::Sender<String>,
    close: &Arc<Notify>,
) {
    let heartbeat: HeartbeatData = match message.parse_data() {
        Ok(data) => data,
        Err(err) => {
            warn!(panel_id = %panel_id, error = %err, "Invalid panel heartbeat");
            return;
        }
    };

    identify_panel(state, panel_id, &heartbeat.client_id, tx, close);
    if panel_id.is_empty() {
        return;
    }

    state.panel_registry.touch(panel_id);
    state.panels.set_panel_online(panel_id);

    let response = HeartbeatData {
        client_id: panel_id.clone(),
        ping: heartbeat.ping,
    };
    if let Ok(reply) = Message::new(MessageType::PanelHeartbeat, &response) {
        if let Ok(text) = reply.to_json() {
            state.panel_registry.send_frame(panel_id, text);
        }
    }
}

fn handle_panel_status(
    state: &AppState,
    message: &Message,
    panel_id: &mut String,
    tx: &mpsc::Sender<String>,
    close: &Arc<Notify>,
) {
    let status: PanelStatusData = match message.parse_data() {
        Ok(data) => data,
        Err(err) => {
            warn!(panel_id = %panel_id, error = %err, "Invalid panel status");
            return;
        }
    };

    identify_panel(state, panel_id, &status.panel_id, tx, close);
    if panel_id.is_empty() {
        return;
    }

    state.panels.update_panel_status(panel_id, &status);
}

fn handle_panel_input(state: &AppState, message: &Message, panel_id: &str) {
    if panel_id.is_empty() {
        return;
    }

    // Input arriving before the configuration push is discarded
    let configured = state
        .panel_registry
        .connected_panels()
        .get(panel_id)
        .copied()
        .unwrap_or(false);
    if !configured {
        debug!(panel_id = %panel_id, "Ignoring input from unconfigured panel");
        return;
    }

    let mut input: PanelInputData = match message.parse_data() {
        Ok(data) => data,
        Err(err) => {
            warn!(panel_id = %panel_id, error = %err, "Invalid panel input");
            return;
        }
    };

    input.panel_id = panel_id.to_string();
    state.panels.process_input(&input);
}

/// Panel-manager output callback target
pub fn send_output_to_panel(registry: &PanelRegistry, panel_id: &str, output: &PanelOutputData) {
    let Ok(message) = Message::new(MessageType::PanelOutput, output) else {
        return;
    };
    let Ok(text) = message.to_json() else {
        return;
    };
    registry.send_frame(panel_id, text);
}
