use server_api::ApiContext;
use shared::protocol::ServerEvent;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) events: broadcast::Sender<ServerEvent>,
}

impl AppState {
    pub(crate) fn new(api: ApiContext, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self { api, events }
    }

    /// Fans an event out to every connected socket. Having no listeners is
    /// not an error.
    pub(crate) fn publish(&self, event: ServerEvent) {
        let receivers = self.events.send(event).unwrap_or(0);
        debug!(receivers, "server event published");
    }
}
