use std::sync::Arc;

use morph_core::runner::{ProgressEvent, ProgressListener};

/// Forwards every event to each listener in order.
#[derive(Default, Clone)]
pub struct FanoutListener {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl FanoutListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl ProgressListener for FanoutListener {
    fn on_event(&self, event: &ProgressEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}
