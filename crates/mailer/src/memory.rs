//! In-memory mail transport for tests and the smoke command.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::transport::{MailMessage, MailSession, MailTransport, TransportError};

/// Accepts every submission and records it for inspection.
#[derive(Default)]
pub struct MemoryMailTransport {
    delivered: Arc<Mutex<Vec<MailMessage>>>,
}

impl MemoryMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<MailMessage> {
        self.delivered.lock().expect("delivered lock poisoned").clone()
    }
}

#[async_trait]
impl MailTransport for MemoryMailTransport {
    async fn connect(&self) -> Result<Box<dyn MailSession>, TransportError> {
        Ok(Box::new(MemorySession { delivered: Arc::clone(&self.delivered) }))
    }
}

struct MemorySession {
    delivered: Arc<Mutex<Vec<MailMessage>>>,
}

#[async_trait]
impl MailSession for MemorySession {
    async fn authenticate(&mut self, _identity: &str, _secret: &str) -> Result<(), TransportError> {
        Ok(())
    }

    async fn submit(&mut self, message: &MailMessage) -> Result<Vec<String>, TransportError> {
        self.delivered.lock().expect("delivered lock poisoned").push(message.clone());
        Ok(Vec::new())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
