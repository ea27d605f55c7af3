//! In-process API server for client tests.

use axum::Router;
use mitter_core::{ChannelReferencingMessage, EntityMetadata, SENT_TIME_EVENT_TYPE, TimelineEvent};
use tokio::net::TcpListener;

use crate::{MitterApiConfig, MitterHttpClient};

/// Serve `app` on an ephemeral port and return a client pointed at it.
pub(crate) async fn serve(app: Router) -> MitterHttpClient {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    MitterHttpClient::new(&MitterApiConfig::new(format!("http://{addr}")))
        .expect("client should build")
}

pub(crate) fn fixture_message(channel_id: &str, n: u64) -> ChannelReferencingMessage {
    let message_id = format!("m{n:02}");
    ChannelReferencingMessage {
        channel_id: channel_id.to_owned(),
        message_id: message_id.clone(),
        sender_id: "alice".to_owned(),
        payload_type: "Standard".to_owned(),
        text_payload: format!("message {n}"),
        timeline_events: vec![TimelineEvent {
            event_type: SENT_TIME_EVENT_TYPE.to_owned(),
            event_time_ms: n * 1_000,
            subject: message_id,
        }],
        entity_metadata: EntityMetadata::default(),
    }
}
