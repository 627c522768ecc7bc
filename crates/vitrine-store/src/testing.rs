//! Shared fixtures for this crate's unit tests.

use std::sync::Mutex;
use tokio::sync::mpsc;

use vitrine_core::{Product, StaticCatalog};

use crate::events::{StoreEvent, StoreEventEmitter};

pub fn catalog() -> StaticCatalog {
    StaticCatalog::new(vec![
        Product::new("headset", "Vision Headset", 49_900),
        Product::new("controller", "Arc Controller", 12_900),
        Product::new("dock", "Charging Dock", 3_900),
        Product::new("strap", "Comfort Strap", 2_900),
    ])
    .unwrap()
}

/// Records every event, optionally forwarding them to a channel.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<StoreEvent>>,
    forward: Option<mpsc::UnboundedSender<StoreEvent>>,
}

impl RecordingEmitter {
    pub fn with_channel() -> (Self, mpsc::UnboundedReceiver<StoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = RecordingEmitter {
            events: Mutex::new(Vec::new()),
            forward: Some(tx),
        };
        (emitter, rx)
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl StoreEventEmitter for RecordingEmitter {
    fn emit(&self, event: StoreEvent) {
        if let Some(forward) = &self.forward {
            let _ = forward.send(event.clone());
        }
        self.events.lock().unwrap().push(event);
    }
}
