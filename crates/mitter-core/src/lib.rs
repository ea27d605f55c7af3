//! Client-side core of the Mitter messaging SDK.
//!
//! Holds the bidirectional message pagination engine, the lazy remote-value
//! proxy, the command/event protocol views use to drive pagination, and the
//! wire types shared with the HTTP layer.

/// Pagination command/event channel primitives.
pub mod channel;
/// Stable SDK error types and HTTP classification helpers.
pub mod error;
/// Page-fetch seam implemented by transports.
pub mod gateway;
/// Validated cursor pages.
pub mod page;
/// Bidirectional pagination manager.
pub mod pagination;
/// Lazily fetched, cacheable remote values.
pub mod proxy;
/// Backoff policy for caller-driven retries.
pub mod retry;
/// Spawned, command-driven pagination runtime.
pub mod runtime;
/// Canonical-ordered message store.
pub mod store;
/// Wire types (messages, channels, profiles) and page requests.
pub mod types;
/// Viewport boundary detection.
pub mod viewport;

#[cfg(test)]
mod testing;

pub use channel::{
    EventStream, PaginationChannelError, PaginationChannels, PaginationCommand, PaginationEvent,
};
pub use error::{MitterError, MitterErrorCategory, classify_http_status};
pub use gateway::FetchGateway;
pub use page::CursorPage;
pub use pagination::{PaginationManager, PaginationState, RequestOutcome, SkipReason};
pub use proxy::{CacheState, FetchMode, LazyRemote};
pub use retry::RetryPolicy;
pub use runtime::{PaginationHandle, spawn_pagination_runtime};
pub use store::{MergeReport, MessageStore, Upsert};
pub use types::{
    Channel, ChannelParticipation, ChannelReferencingMessage, Cursor, Direction, EntityIdentifier,
    EntityMetadata, EntityProfile, EntityProfileAttribute, MAX_MESSAGE_LIST_LENGTH, Message,
    MessageTimelineEvent, OrderKey, PageRequest, ParticipationStatus, SENT_TIME_EVENT_TYPE,
    StandardRuleSet, TimelineEvent, clamp_page_limit,
};
pub use viewport::{BoundaryConfig, BoundaryTrigger};
