use crate::config::Config;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rand::Rng;
use ringio_core::{
    AckStatus, HttpPeerChannel, Message, Result, RingError, RingNode, RingTopology,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ids below this bound are drawn at random; a pinned id above it is
/// guaranteed to win the first election.
const RANDOM_ID_BOUND: u64 = 2_000_000_000;

pub struct ServerState {
    node: RingNode,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    node_id: u64,
}

pub async fn run_server(config: Config) -> Result<()> {
    let id = config
        .node
        .id
        .unwrap_or_else(|| rand::thread_rng().gen_range(0..RANDOM_ID_BOUND));

    let topology = RingTopology::new(
        config.node.neighbours.clone(),
        config.node.node_count,
        config.node.index,
    );

    tracing::info!(
        "Node {} starting at {} (ring size {}, right neighbour {})",
        id,
        topology.self_address(),
        topology.node_count(),
        topology.right_neighbour()
    );

    let channel = Arc::new(HttpPeerChannel::new(config.timing.send_timeout())?);
    let node = RingNode::new(id, topology, config.timing.intervals(), channel);
    node.start();

    let state = Arc::new(ServerState { node });

    let app = Router::new()
        .route("/health", get(health))
        .route("/message", post(post_message))
        .with_state(state);

    let listener = TcpListener::bind(&config.node.bind_addr).await?;
    tracing::info!("ringio listening on {}", config.node.bind_addr);

    axum::serve(listener, app)
        .await
        .map_err(|error| RingError::Http(error.to_string()))?;

    Ok(())
}

async fn health(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.node.snapshot().await)
}

async fn post_message(
    State(state): State<Arc<ServerState>>,
    Json(message): Json<Message>,
) -> Response {
    let ack = state.node.handle(message).await;
    let status = match ack.status {
        AckStatus::Accepted => StatusCode::OK,
        // an election message rejected because a leader already exists
        AckStatus::ElectionStale => StatusCode::CREATED,
    };
    (
        status,
        Json(MessageResponse {
            node_id: ack.node_id,
        }),
    )
        .into_response()
}
