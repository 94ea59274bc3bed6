//! Event collection helpers

use std::time::Duration;
use background_dl::Event;
use tokio::sync::broadcast::Receiver;

/// Collect events until the terminal event of `id`
///
/// Panics on timeout or when the channel closes.
pub async fn events_until_terminal(
    events: &mut Receiver<Event>,
    id: &str,
    timeout: Duration,
) -> Vec<Event> {
    let mut seen = Vec::new();
    let finished = tokio::time::timeout(timeout, async {
        loop {
            let event = events.recv().await.expect("event channel closed");
            let terminal = match &event {
                Event::Complete { id: done, .. } | Event::Failed { id: done, .. } => done == id,
                _ => false,
            };
            seen.push(event);
            if terminal {
                return;
            }
        }
    })
    .await
    .is_ok();
    assert!(finished, "no terminal event for {id}; saw {seen:?}");
    seen
}

/// Number of begin events for `id`
pub fn begin_count(events: &[Event], id: &str) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, Event::Begin { id: begun, .. } if begun == id))
        .count()
}
