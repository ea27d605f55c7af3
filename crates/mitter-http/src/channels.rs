use mitter_core::{
    Channel, ChannelParticipation, EntityProfile, FetchMode, LazyRemote, MitterError,
    PaginationManager,
};
use tracing::debug;

use crate::{MitterHttpClient, gateway::HttpFetchGateway};

/// Channel endpoints of one API deployment.
#[derive(Debug, Clone)]
pub struct ChannelsClient {
    http: MitterHttpClient,
}

impl ChannelsClient {
    pub fn new(http: MitterHttpClient) -> Self {
        Self { http }
    }

    pub async fn get_channel(&self, channel_id: &str) -> Result<Channel, MitterError> {
        let url = self.http.endpoint(&["channels", channel_id])?;
        self.http
            .send_json(self.http.http().get(url), "get_channel")
            .await
    }

    /// Lazily fetched handle over `channel_id`.
    pub fn channel_handle(&self, channel_id: impl Into<String>, mode: FetchMode) -> ChannelHandle {
        let channel_id = channel_id.into();
        debug!(%channel_id, ?mode, "creating channel handle");
        let client = self.clone();
        let id = channel_id.clone();
        let remote = LazyRemote::new(
            move || {
                let client = client.clone();
                let id = id.clone();
                async move { client.get_channel(&id).await }
            },
            mode,
        );
        ChannelHandle {
            channel_id,
            http: self.http.clone(),
            remote,
        }
    }
}

/// A channel whose aggregate is fetched on first read and cached afterwards.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    channel_id: String,
    http: MitterHttpClient,
    remote: LazyRemote<Channel>,
}

impl ChannelHandle {
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn remote(&self) -> &LazyRemote<Channel> {
        &self.remote
    }

    pub async fn channel(&self) -> Result<Channel, MitterError> {
        self.remote.get().await
    }

    /// Refetch the channel, replacing the cached copy on success.
    pub async fn sync(&self) -> Result<Channel, MitterError> {
        self.remote.sync().await
    }

    pub fn set_ref(&self, channel: Channel) {
        self.remote.set_ref(channel);
    }

    pub async fn default_rule_set(&self) -> Result<String, MitterError> {
        self.remote.proxy(|c| c.default_rule_set.clone()).await
    }

    pub async fn participation(&self) -> Result<Vec<ChannelParticipation>, MitterError> {
        self.remote.proxy(|c| c.participation.clone()).await
    }

    pub async fn entity_profile(&self) -> Result<EntityProfile, MitterError> {
        self.remote.proxy(|c| c.entity_profile.clone()).await
    }

    /// Pagination manager over this channel's messages.
    pub fn messages(&self, limit: u16) -> PaginationManager<HttpFetchGateway> {
        self.http
            .messages()
            .get_paginated_messages_manager(self.channel_id.clone(), limit)
    }
}
