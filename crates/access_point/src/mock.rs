//! In-memory connector that records what a sender would put on the wire.

use crate::transport::{
    Connector, SoapRequest, SoapResponse, SoapTransport, TransportError, TransportPolicy,
};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Reply {
    Respond { status: u16, body: String },
    Fail(String),
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<Reply>,
    connect_error: Option<String>,
    policies: Vec<TransportPolicy>,
    requests: Vec<SoapRequest>,
}

/// Hands out transports that answer from a queue of canned replies. When the
/// queue is empty every request succeeds with a random document id. Clones
/// share their state.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn reply_with(&self, status: u16, body: impl Into<String>) -> &Self {
        self.state().replies.push_back(Reply::Respond {
            status,
            body: body.into(),
        });
        self
    }

    /// Next request fails as if the connection broke.
    pub fn fail_with(&self, reason: impl Into<String>) -> &Self {
        self.state().replies.push_back(Reply::Fail(reason.into()));
        self
    }

    /// Every following `connect` fails.
    pub fn refuse_connect(&self, reason: impl Into<String>) -> &Self {
        self.state().connect_error = Some(reason.into());
        self
    }

    pub fn requests(&self) -> Vec<SoapRequest> {
        self.state().requests.clone()
    }

    pub fn policies(&self) -> Vec<TransportPolicy> {
        self.state().policies.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().requests.len()
    }
}

impl Connector for MockConnector {
    fn connect(&self, policy: &TransportPolicy) -> Result<Box<dyn SoapTransport>, TransportError> {
        let mut state = self.state();
        state.policies.push(*policy);
        if let Some(reason) = &state.connect_error {
            return Err(TransportError::Client(reason.clone()));
        }
        Ok(Box::new(MockTransport {
            state: self.state.clone(),
        }))
    }
}

struct MockTransport {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl SoapTransport for MockTransport {
    async fn send(&self, request: SoapRequest) -> Result<SoapResponse, TransportError> {
        let reply = {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            state.requests.push(request.clone());
            state.replies.pop_front()
        };

        match reply {
            Some(Reply::Respond { status, body }) => Ok(SoapResponse {
                status,
                body: body.into_bytes(),
            }),
            Some(Reply::Fail(reason)) => Err(TransportError::Send {
                url: request.endpoint.to_string(),
                reason,
            }),
            None => {
                let id: String = rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(16)
                    .map(char::from)
                    .collect();
                tracing::debug!(document_id = %id, "mock delivery accepted");
                Ok(SoapResponse {
                    status: 200,
                    body: success_envelope(&id).into_bytes(),
                })
            }
        }
    }
}

/// Generic success answer; decodes under both protocol versions.
fn success_envelope(document_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><S:Envelope xmlns:S="http://schemas.xmlsoap.org/soap/envelope/"><S:Body><Response><Success><DocumentID>{document_id}</DocumentID></Success></Response></S:Body></S:Envelope>"#
    )
}
