//! Server-Sent Events support for widget sessions

use crate::runtime::WidgetEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::collections::HashSet;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
pub fn sse_stream(
    init_event: WidgetEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<WidgetEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut seen = SeenMessages::from_init(&init_event);
    let init = futures::stream::once(async move { Ok(widget_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| match result {
        Ok(event) if seen.admit(&event) => Some(Ok(widget_event_to_axum(event))),
        // Already delivered, or lagged; the next state_change resyncs
        _ => None,
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Message ids already delivered to this client. The subscription opens
/// before the init snapshot is taken, so a bubble can show up in both.
#[derive(Debug, Default)]
struct SeenMessages {
    ids: HashSet<String>,
}

impl SeenMessages {
    fn from_init(event: &WidgetEvent) -> Self {
        let ids = match event {
            WidgetEvent::Init { snapshot } => snapshot.messages.iter().map(|m| m.id.clone()).collect(),
            _ => HashSet::new(),
        };
        Self { ids }
    }

    /// Whether `event` should reach the client
    fn admit(&mut self, event: &WidgetEvent) -> bool {
        match event {
            WidgetEvent::Message { message } => self.ids.insert(message.id.clone()),
            WidgetEvent::Reset { .. } => {
                self.ids.clear();
                true
            }
            WidgetEvent::Init { .. } | WidgetEvent::StateChange { .. } => true,
        }
    }
}

fn widget_event_to_axum(event: WidgetEvent) -> Event {
    let (event_type, data) = event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}

fn event_payload(event: WidgetEvent) -> (&'static str, serde_json::Value) {
    match event {
        WidgetEvent::Init { snapshot } => (
            "init",
            json!({
                "type": "init",
                "snapshot": snapshot
            }),
        ),
        WidgetEvent::Message { message } => (
            "message",
            json!({
                "type": "message",
                "message": message
            }),
        ),
        WidgetEvent::StateChange { snapshot } => (
            "state_change",
            json!({
                "type": "state_change",
                "snapshot": snapshot
            }),
        ),
        WidgetEvent::Reset { pass } => (
            "reset",
            json!({
                "type": "reset",
                "pass": pass
            }),
        ),
    }
}
