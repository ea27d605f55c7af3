use async_trait::async_trait;
use mitter_core::{CursorPage, FetchGateway, MitterError, PageRequest};
use tracing::trace;

use crate::messages::MessagesClient;

/// Page source backed by the channel message list endpoint.
///
/// The endpoint returns a bare list, so a full page is taken to mean more
/// data may follow.
#[derive(Debug, Clone)]
pub struct HttpFetchGateway {
    messages: MessagesClient,
}

impl HttpFetchGateway {
    pub fn new(messages: MessagesClient) -> Self {
        Self { messages }
    }
}

#[async_trait]
impl FetchGateway for HttpFetchGateway {
    async fn fetch_page(&self, request: PageRequest) -> Result<CursorPage, MitterError> {
        let direction = request.direction();
        let items = self
            .messages
            .get_messages(
                &request.channel_id,
                request.before.as_ref(),
                request.after.as_ref(),
                request.limit,
            )
            .await?;
        trace!(channel_id = %request.channel_id, ?direction, count = items.len(), "fetched page");
        CursorPage::from_fetch(direction, items, request.limit)
    }
}
