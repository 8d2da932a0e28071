//! Component G: the spawn listener. Runs as its own task for the life of the
//! process, subscribed to the `aircraft.created` notification stream,
//! claiming newly spawned arrivals for the engine and ignoring everything
//! else. Talks to the store only through `claim_arrival` (§4.G) — it never
//! touches a `Flight` directly.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use crate::store::StateStore;

const SPAWN_CHANNEL: &str = "aircraft.created";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SpawnEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: SpawnData,
}

#[derive(Debug, Deserialize)]
struct SpawnData {
    aircraft: SpawnAircraft,
}

#[derive(Debug, Deserialize)]
struct SpawnAircraft {
    id: i64,
    flight_type: String,
}

/// Runs until `shutdown` resolves, resubscribing with exponential backoff
/// (capped at 30s) whenever the underlying subscription drops.
pub async fn run(
    redis_url: String,
    store: Arc<dyn StateStore>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut backoff = Duration::from_millis(500);

    loop {
        if *shutdown.borrow() {
            return;
        }

        match subscribe_and_listen(&redis_url, &store, &mut shutdown).await {
            Ok(()) => return, // shutdown signaled cleanly from inside the loop
            Err(e) => {
                warn!(target: "SPAWN", error = %e, backoff_secs = backoff.as_secs(), "subscription lost, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn subscribe_and_listen(
    redis_url: &str,
    store: &Arc<dyn StateStore>,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let client = redis::Client::open(redis_url)?;
    let conn = client.get_async_connection().await?;
    let mut pubsub = conn.into_pubsub();
    pubsub.subscribe(SPAWN_CHANNEL).await?;
    info!(target: "SPAWN", channel = SPAWN_CHANNEL, "subscribed");

    let mut stream = pubsub.on_message();
    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(msg) => {
                        let payload: String = msg.get_payload()?;
                        handle_message(&payload, store).await;
                    }
                    None => return Ok(()), // subscription closed, caller resubscribes
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_message(payload: &str, store: &Arc<dyn StateStore>) {
    let parsed: Result<SpawnEnvelope, _> = serde_json::from_str(payload);
    let envelope = match parsed {
        Ok(e) => e,
        Err(e) => {
            warn!(target: "SPAWN", error = %e, "malformed spawn payload, ignoring");
            return;
        }
    };

    if envelope.event_type != "aircraft.created" {
        return;
    }
    if envelope.data.aircraft.flight_type != "ARRIVAL" {
        return;
    }

    match store.claim_arrival(envelope.data.aircraft.id).await {
        Ok(true) => info!(target: "SPAWN", flight_id = envelope.data.aircraft.id, "claimed arrival"),
        Ok(false) => warn!(target: "SPAWN", flight_id = envelope.data.aircraft.id, "arrival already owned, skipping"),
        Err(e) => warn!(target: "SPAWN", flight_id = envelope.data.aircraft.id, error = %e, "claim failed"),
    }
}
