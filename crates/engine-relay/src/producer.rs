//! Engine reader task.
//!
//! One task owns the engine session. It reads with a short deadline in
//! a loop, filters decoded events, serializes each survivor once, and
//! hands the buffer to the hub. Transient read errors are tolerated;
//! only a terminal transport close ends the task.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use engine_client::{Incoming, Session};
use engine_codec::EventKind;
use engine_transport::TransportError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::hub::Hub;
use crate::serialize::event_to_json;

/// Per-iteration read deadline. Short enough that a shutdown flag is
/// noticed promptly.
const READ_POLL: Duration = Duration::from_millis(200);

/// Back-off after a transient read error.
const RETRY_AFTER: Duration = Duration::from_millis(100);

/// Run the producer loop until the engine transport dies or shutdown
/// is signalled. Owns (and finally closes) the session.
pub async fn run(
    mut session: Session,
    hub: Arc<Hub>,
    filter: HashSet<EventKind>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("producer started ({} event kinds forwarded)", filter.len());
    let mut forwarded: u64 = 0;

    loop {
        if *shutdown.borrow() {
            break;
        }

        match session.recv(READ_POLL).await {
            Ok(None) => continue,
            Ok(Some(Incoming::Event(event))) => {
                if !filter.contains(&event.kind()) {
                    continue;
                }
                let text = event_to_json(&event);
                hub.broadcast(&text).await;
                forwarded += 1;
                if forwarded % 10_000 == 0 {
                    debug!("{forwarded} events forwarded");
                }
            }
            Ok(Some(Incoming::Malformed(m))) => {
                warn!("undecodable payload from engine ({}): {} bytes", m.kind, m.raw.len());
            }
            Err(e) => {
                if is_terminal(&e) {
                    info!("engine transport closed, producer stopping");
                    break;
                }
                warn!("engine read error (retrying): {e:#}");
                tokio::select! {
                    _ = tokio::time::sleep(RETRY_AFTER) => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }

    session.close().await;
    info!("producer done after {forwarded} events");
}

fn is_terminal(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<TransportError>(),
        Some(TransportError::Closed)
    )
}
