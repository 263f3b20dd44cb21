use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use crate::BoxFuture;
use mnema_domain::{DocumentType, RecordPayload, Tenant};

pub const RECORD_STORED: &str = "record.stored";

/// Emitted after (and only after) the durable write commits. Carries the
/// already-normalized payload so downstream stages never re-detect shapes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecordStored {
	pub record_id: Uuid,
	pub tenant: Tenant,
	pub document_type: DocumentType,
	pub payload: RecordPayload,
	pub created_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
	RecordStored(RecordStored),
}
impl Event {
	pub fn name(&self) -> &'static str {
		match self {
			Self::RecordStored(_) => RECORD_STORED,
		}
	}
}

pub trait EventHandler
where
	Self: Send + Sync,
{
	fn handle<'a>(&'a self, event: Event) -> BoxFuture<'a, ()>;
}

/// In-process publish side of the bus. Publishing never blocks and never
/// fails the caller: when the queue is full or the dispatcher is gone the
/// event is dropped with a warning. At-most-once, no retry.
#[derive(Clone)]
pub struct EventBus {
	tx: mpsc::Sender<Event>,
}
impl EventBus {
	pub fn channel(capacity: usize) -> (Self, Dispatcher) {
		let (tx, rx) = mpsc::channel(capacity.max(1));

		(Self { tx }, Dispatcher { rx, handlers: Vec::new() })
	}

	pub fn publish(&self, event: Event) {
		match self.tx.try_send(event) {
			Ok(()) => {},
			Err(TrySendError::Full(event)) => {
				tracing::warn!(event = event.name(), "Event queue is full. Dropping event.");
			},
			Err(TrySendError::Closed(event)) => {
				tracing::warn!(event = event.name(), "Event bus is closed. Dropping event.");
			},
		}
	}
}

/// Receive side: drains the bounded queue and fans each event out to its
/// subscribers as detached tasks. Tasks for different events may complete
/// out of order; nothing awaits them.
pub struct Dispatcher {
	rx: mpsc::Receiver<Event>,
	handlers: Vec<(String, Arc<dyn EventHandler>)>,
}
impl Dispatcher {
	pub fn subscribe(&mut self, event_name: &str, handler: Arc<dyn EventHandler>) {
		self.handlers.push((event_name.to_string(), handler));
	}

	/// Runs until every publisher handle is dropped.
	pub async fn run(mut self) {
		while let Some(event) = self.rx.recv().await {
			for (name, handler) in &self.handlers {
				if name != event.name() {
					continue;
				}

				let handler = handler.clone();
				let event = event.clone();

				tokio::spawn(async move {
					handler.handle(event).await;
				});
			}
		}

		tracing::debug!("Event bus closed. Dispatcher stopping.");
	}
}
