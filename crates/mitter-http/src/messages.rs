use mitter_core::{
    ChannelReferencingMessage, Cursor, Message, MessageTimelineEvent, MitterError,
    MitterErrorCategory, PaginationManager, TimelineEvent, clamp_page_limit,
};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::{MitterHttpClient, gateway::HttpFetchGateway};

/// Form part carrying the JSON message of a multipart upload.
pub const MULTIPART_MESSAGE_NAME_KEY: &str = "io.mitter.wire.requestbody";
const MULTIPART_MESSAGE_FILE_NAME: &str = "io.mitter.wire.requestbody.json";

/// A file attached to an uploaded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Message endpoints of one API deployment.
#[derive(Debug, Clone)]
pub struct MessagesClient {
    http: MitterHttpClient,
}

impl MessagesClient {
    pub fn new(http: MitterHttpClient) -> Self {
        Self { http }
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        message: &Message,
    ) -> Result<Message, MitterError> {
        let url = self.http.endpoint(&["channels", channel_id, "messages"])?;
        self.http
            .send_json(self.http.http().post(url).json(message), "send_message")
            .await
    }

    pub async fn get_message(&self, message_id: &str) -> Result<Message, MitterError> {
        let url = self.http.endpoint(&["messages", message_id])?;
        self.http
            .send_json(self.http.http().get(url), "get_message")
            .await
    }

    /// One page of a channel's messages.
    ///
    /// With `before` the result is newest-first; with `after` it is
    /// oldest-first. `limit` is clamped to the platform maximum.
    pub async fn get_messages(
        &self,
        channel_id: &str,
        before: Option<&Cursor>,
        after: Option<&Cursor>,
        limit: u16,
    ) -> Result<Vec<ChannelReferencingMessage>, MitterError> {
        let url = self.http.endpoint(&["channels", channel_id, "messages"])?;
        let query = list_query(before, after, clamp_page_limit(limit));
        debug!(%channel_id, ?query, "listing messages");
        self.http
            .send_json(self.http.http().get(url).query(&query), "get_messages")
            .await
    }

    /// Pagination manager for `channel_id` backed by this client.
    pub fn get_paginated_messages_manager(
        &self,
        channel_id: impl Into<String>,
        limit: u16,
    ) -> PaginationManager<HttpFetchGateway> {
        PaginationManager::new(channel_id, limit, HttpFetchGateway::new(self.clone()))
    }

    pub async fn get_message_timeline_events(
        &self,
        channel_id: &str,
        message_ids: &[&str],
    ) -> Result<Vec<MessageTimelineEvent>, MitterError> {
        let ids = join_ids(message_ids)?;
        let url = self
            .http
            .endpoint(&["channels", channel_id, "messages", ids.as_str(), "timeline"])?;
        self.http
            .send_json(self.http.http().get(url), "get_message_timeline_events")
            .await
    }

    pub async fn add_message_timeline_event(
        &self,
        channel_id: &str,
        message_id: &str,
        event: &TimelineEvent,
    ) -> Result<(), MitterError> {
        let url = self
            .http
            .endpoint(&["channels", channel_id, "messages", message_id, "timeline"])?;
        self.http
            .send_empty(
                self.http.http().post(url).json(event),
                "add_message_timeline_event",
            )
            .await
    }

    pub async fn delete_messages(
        &self,
        channel_id: &str,
        message_ids: &[&str],
    ) -> Result<(), MitterError> {
        let ids = join_ids(message_ids)?;
        let url = self
            .http
            .endpoint(&["channels", channel_id, "messages", ids.as_str()])?;
        self.http
            .send_empty(self.http.http().delete(url), "delete_messages")
            .await
    }

    /// Send `message` with an attached file as a multipart request.
    pub async fn upload_file(
        &self,
        channel_id: &str,
        message: &Message,
        file: FileUpload,
    ) -> Result<Message, MitterError> {
        let form = upload_form(message, file)?;
        let url = self.http.endpoint(&["channels", channel_id, "messages"])?;
        self.http
            .send_json(self.http.http().post(url).multipart(form), "upload_file")
            .await
    }
}

fn list_query(before: Option<&Cursor>, after: Option<&Cursor>, limit: u16) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(3);
    if let Some(after) = after {
        query.push(("after", after.to_string()));
    }
    if let Some(before) = before {
        query.push(("before", before.to_string()));
    }
    query.push(("limit", limit.to_string()));
    query
}

fn join_ids(message_ids: &[&str]) -> Result<String, MitterError> {
    if message_ids.is_empty() {
        return Err(MitterError::new(
            MitterErrorCategory::Config,
            "empty_message_ids",
            "at least one message id is required",
        ));
    }
    Ok(message_ids.join(","))
}

fn upload_form(message: &Message, file: FileUpload) -> Result<Form, MitterError> {
    let body = serde_json::to_vec(message).map_err(|err| {
        MitterError::new(
            MitterErrorCategory::Serialization,
            "invalid_request_body",
            err.to_string(),
        )
    })?;
    let invalid_mime = |err: reqwest::Error| {
        MitterError::new(MitterErrorCategory::Config, "invalid_mime_type", err.to_string())
    };

    let file_part = Part::bytes(file.bytes)
        .file_name(file.filename.clone())
        .mime_str(&file.mime_type)
        .map_err(invalid_mime)?;
    let message_part = Part::bytes(body)
        .file_name(MULTIPART_MESSAGE_FILE_NAME)
        .mime_str("application/json")
        .map_err(invalid_mime)?;

    Ok(Form::new()
        .part(file.filename, file_part)
        .part(MULTIPART_MESSAGE_NAME_KEY, message_part))
}
