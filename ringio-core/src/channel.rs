use crate::error::{Result, RingError};
use crate::message::{Ack, AckStatus, Message};
use crate::topology::PeerAddr;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Synchronous request/response send to a peer. Timeouts, refusals and
/// non-success statuses all surface as `RingError::Http`; the engines
/// absorb every such failure into retry or repair.
#[async_trait]
pub trait PeerChannel: Send + Sync {
    async fn send(&self, addr: &PeerAddr, message: &Message) -> Result<Ack>;
}

#[derive(Debug, Deserialize)]
struct MessageResponsePayload {
    node_id: u64,
}

/// HTTP transport: POST the JSON-encoded message to the peer's `/message`
/// endpoint with a fixed request timeout.
pub struct HttpPeerChannel {
    client: reqwest::Client,
}

impl HttpPeerChannel {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RingError::Http(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PeerChannel for HttpPeerChannel {
    async fn send(&self, addr: &PeerAddr, message: &Message) -> Result<Ack> {
        let url = format!("http://{}/message", addr);
        let response = self
            .client
            .post(&url)
            .json(message)
            .send()
            .await
            .map_err(|error| RingError::Http(error.to_string()))?;

        let status = match response.status() {
            StatusCode::OK => AckStatus::Accepted,
            StatusCode::CREATED => AckStatus::ElectionStale,
            other => {
                return Err(RingError::Http(format!(
                    "peer {} replied with status {}",
                    addr, other
                )))
            }
        };

        let payload: MessageResponsePayload = response
            .json()
            .await
            .map_err(|error| RingError::Http(error.to_string()))?;

        Ok(Ack {
            node_id: payload.node_id,
            status,
        })
    }
}
