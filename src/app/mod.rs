//! Component wiring and the long-running simulation loop

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::config::Config;
use crate::panels::PanelManager;
use crate::scripting::{ScriptError, ScriptHost};
use crate::sim::{SharedUniverse, Universe, UniverseEvent};
use crate::stations::StationManager;
use crate::tcp::{self, PanelRegistry};
use crate::ws::session::SessionRegistry;

/// Shared application state handed to every transport and route
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub universe: SharedUniverse,
    pub stations: Arc<StationManager>,
    pub panels: Arc<PanelManager>,
    pub scripts: Arc<Mutex<ScriptHost>>,
    pub sessions: Arc<SessionRegistry>,
    pub panel_registry: Arc<PanelRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Result<AppState, ScriptError> {
        let universe: SharedUniverse = Arc::new(RwLock::new(Universe::new(&config.universe)));
        let stations = Arc::new(StationManager::new(universe.clone()));
        let panels = Arc::new(PanelManager::new(stations.clone()));
        let scripts = Arc::new(Mutex::new(ScriptHost::new(
            universe.clone(),
            &config.missions,
        )?));
        let sessions = Arc::new(SessionRegistry::new());
        let panel_registry = Arc::new(PanelRegistry::new());

        // Panel outputs flow straight into the TCP session layer
        let registry = panel_registry.clone();
        panels.add_output_callback(Box::new(move |panel_id, output| {
            tcp::send_output_to_panel(&registry, panel_id, output);
        }));

        Ok(AppState {
            config: Arc::new(RwLock::new(config)),
            universe,
            stations,
            panels,
            scripts,
            sessions,
            panel_registry,
        })
    }
}

/// The simulation tick: advance the universe, react to its events, then
/// sweep the script triggers. The universe lock is released before either
/// reaction step runs.
pub async fn game_loop(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let period = {
        let config = state.config.read().unwrap();
        config.tick_duration()
    };
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    info!(tick_ms = period.as_millis() as u64, "Game loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }

        let events = {
            let mut universe = state.universe.write().unwrap();
            universe.update();
            universe.take_events()
        };

        dispatch_events(&state, events);

        {
            let scripts = state.scripts.lock().unwrap();
            scripts.update();
        }
    }

    info!("Game loop stopped");
}

/// React to universe events outside the universe lock
fn dispatch_events(state: &AppState, events: Vec<UniverseEvent>) {
    for event in events {
        match event {
            UniverseEvent::AlertLevelChanged { level } => {
                state.panels.apply_alert_level(level);
            }

            UniverseEvent::Collision(collision) => {
                if collision.first.is_player_ship || collision.second.is_player_ship {
                    state.panels.flash_bridge_red();

                    let panels = state.panels.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        panels.restore_bridge_lights();
                    });
                }
            }

            UniverseEvent::ObjectAdded { id, kind } => {
                debug!(id = %id, kind = ?kind, "Object added");
            }

            UniverseEvent::ShipAdded { id } => {
                debug!(id = %id, "Ship added");
            }

            UniverseEvent::ObjectRemoved { id } => {
                debug!(id = %id, "Object removed");
            }
        }
    }
}
