//! Event Bus - Dashboard Broadcast
//!
//! Every connected dashboard subscribes to the same broadcast channel.
//! Messages are `{ "event": name, "data": payload }` envelopes.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::logic::model::ModelInfo;
use crate::logic::threat::FrontendThreat;
use crate::logic::threat_log::ThreatStats;

/// Event names
pub mod names {
    pub const MODEL_INFO: &str = "model_info";
    pub const STATS_UPDATE: &str = "stats_update";
    pub const NEW_THREAT: &str = "new_threat";
}

/// Buffered events per subscriber before the slowest one starts lagging
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: serde_json::Value,
}

impl Envelope {
    pub fn new<S: Serialize>(event: &str, payload: &S) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(payload)?,
        })
    }

    pub fn model_info(info: &ModelInfo) -> Result<Self, serde_json::Error> {
        Self::new(names::MODEL_INFO, info)
    }

    pub fn stats_update(stats: &ThreatStats) -> Result<Self, serde_json::Error> {
        Self::new(names::STATS_UPDATE, stats)
    }

    pub fn new_threat(threat: &FrontendThreat) -> Result<Self, serde_json::Error> {
        Self::new(names::NEW_THREAT, threat)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Cloneable handle onto one broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Envelope>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Send to every subscriber; returns how many received it.
    /// No subscribers is not an error.
    pub fn publish(&self, envelope: Envelope) -> usize {
        match self.sender.send(envelope) {
            Ok(n) => n,
            Err(broadcast::error::SendError(dropped)) => {
                log::debug!("No dashboard subscribers, '{}' dropped", dropped.event);
                0
            }
        }
    }

    /// Serialize and publish; serialization failures are logged
    pub fn emit<S: Serialize>(&self, event: &str, payload: &S) -> usize {
        match Envelope::new(event, payload) {
            Ok(envelope) => self.publish(envelope),
            Err(e) => {
                log::error!("Failed to serialize '{}' event: {}", event, e);
                0
            }
        }
    }

    pub fn emit_stats_update(&self, stats: &ThreatStats) -> usize {
        self.emit(names::STATS_UPDATE, stats)
    }

    pub fn emit_new_threat(&self, threat: &FrontendThreat) -> usize {
        self.emit(names::NEW_THREAT, threat)
    }

    pub fn emit_model_info(&self, info: &ModelInfo) -> usize {
        self.emit(names::MODEL_INFO, info)
    }
}
