//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use engage_chat::{
    ChatBackend, ControllerSettings, ConversationController, PromptGenerator, ViewSnapshot,
};
use engage_core::config::EngageConfig;
use tokio::sync::broadcast;

/// Shared application state. Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EngageConfig>,
    /// Owner of all view and session state.
    pub controller: Arc<ConversationController>,
    /// View snapshots published after every state change, fanned out to SSE.
    pub event_tx: broadcast::Sender<ViewSnapshot>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: EngageConfig,
        backend: Arc<dyn ChatBackend>,
        prompt_generator: Arc<dyn PromptGenerator>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        let controller = ConversationController::new(
            backend,
            prompt_generator,
            ControllerSettings::from_config(&config),
        )
        .with_events(event_tx.clone());

        Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
            event_tx,
            start_time: Instant::now(),
        }
    }
}
