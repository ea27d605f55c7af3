use std::sync::Arc;

use async_trait::async_trait;

use crate::{error::MitterError, page::CursorPage, types::PageRequest};

/// Executes a single page fetch against the platform.
///
/// Implementations return well-formed pages or a transport error; they never
/// return partial pages. Timeouts, if any, belong to the implementation.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    async fn fetch_page(&self, request: PageRequest) -> Result<CursorPage, MitterError>;
}

#[async_trait]
impl<G: FetchGateway + ?Sized> FetchGateway for Arc<G> {
    async fn fetch_page(&self, request: PageRequest) -> Result<CursorPage, MitterError> {
        (**self).fetch_page(request).await
    }
}
