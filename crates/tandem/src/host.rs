//! The hosting participant: lives in the server process, never handshakes,
//! and talks to the world through the same handle the connection handlers
//! use.

use std::time::Duration;

use tandem_protocol::{ClientId, ClientRequest, ServerEvent};
use tandem_world::{InputAxes, ParticipantView, WorldHandle, WorldSnapshot};
use tokio::sync::mpsc;

use crate::TandemError;

pub struct HostParticipant {
    world: WorldHandle,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    view: ParticipantView,
}

impl HostParticipant {
    pub(crate) fn new(
        world: WorldHandle,
        events: mpsc::UnboundedReceiver<ServerEvent>,
        move_speed: f32,
    ) -> Self {
        Self {
            world,
            events,
            view: ParticipantView::new(ClientId::HOST, move_speed),
        }
    }

    pub fn client_id(&self) -> ClientId {
        ClientId::HOST
    }

    /// Waits for the next world event and applies it to the local view.
    /// `None` once the world has stopped.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        let event = self.events.recv().await?;
        self.view.apply(&event);
        Some(event)
    }

    /// Applies every event already delivered. Returns how many there were.
    pub fn drain_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.view.apply(&event);
            applied += 1;
        }
        applied
    }

    /// Samples local input for one tick and submits the resulting intent.
    /// Returns whether anything was sent.
    pub async fn sample_input(&mut self, input: InputAxes, dt: Duration) -> Result<bool, TandemError> {
        match self.view.sample(input, dt) {
            Some(request) => {
                self.world.request(ClientId::HOST, request).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn submit(&self, request: ClientRequest) -> Result<(), TandemError> {
        self.world.request(ClientId::HOST, request).await?;
        Ok(())
    }

    /// Resets the whole world. Runs through the same queue as a guest's
    /// reset request, so both behave identically.
    pub async fn reset_all(&self) -> Result<(), TandemError> {
        self.submit(ClientRequest::RequestReset).await
    }

    pub async fn snapshot(&self) -> Result<WorldSnapshot, TandemError> {
        Ok(self.world.snapshot().await?)
    }

    pub fn view(&self) -> &ParticipantView {
        &self.view
    }

    pub fn world(&self) -> &WorldHandle {
        &self.world
    }
}
