// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Analysis Events
//
// In-memory event streaming over tokio broadcast channels. Events are not
// persisted; the proposal and report ledgers are the durable record.

use crate::domain::events::AnalysisEvent;
use crate::domain::proposal::ProposalId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Event bus for publishing and subscribing to analysis events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<AnalysisEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: AnalysisEvent) {
        debug!(event_type = event.event_type(), "Publishing event");

        // send() only fails when nobody is listening
        if self.sender.send(event).is_err() {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all analysis events
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to the events of a single proposal
    pub fn subscribe_proposal(&self, proposal_id: ProposalId) -> ProposalEventReceiver {
        ProposalEventReceiver {
            receiver: self.sender.subscribe(),
            proposal_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all analysis events
pub struct EventReceiver {
    receiver: broadcast::Receiver<AnalysisEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<AnalysisEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<AnalysisEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one proposal's lifecycle events
pub struct ProposalEventReceiver {
    receiver: broadcast::Receiver<AnalysisEvent>,
    proposal_id: ProposalId,
}

impl ProposalEventReceiver {
    pub async fn recv(&mut self) -> Result<AnalysisEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    fn matches(&self, event: &AnalysisEvent) -> bool {
        match event {
            AnalysisEvent::ProposalDrafted { proposal_id, .. }
            | AnalysisEvent::ProposalApplied { proposal_id, .. }
            | AnalysisEvent::ProposalRejected { proposal_id, .. }
            | AnalysisEvent::ProposalVerified { proposal_id, .. } => *proposal_id == self.proposal_id,
            AnalysisEvent::CycleCompleted { .. }
            | AnalysisEvent::GenerationFailed { .. }
            | AnalysisEvent::ArtifactRolledBack { .. } => false,
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
