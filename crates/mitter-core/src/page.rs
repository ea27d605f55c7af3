use std::collections::HashSet;

use crate::{
    error::{MitterError, MitterErrorCategory},
    types::{ChannelReferencingMessage, Cursor, Direction},
};

/// One fetched batch of messages plus the cursors to its neighbours.
///
/// Items arrive in server send order (newest-first for backward fetches,
/// oldest-first for forward fetches) and never repeat an identifier. The
/// server's order may disagree with the canonical key on same-millisecond or
/// undated messages, so only uniqueness is checked here; the store re-sorts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPage {
    items: Vec<ChannelReferencingMessage>,
    next_before_cursor: Option<Cursor>,
    next_after_cursor: Option<Cursor>,
    has_more: bool,
}

impl CursorPage {
    /// Build a page, rejecting item lists that repeat an identifier.
    pub fn new(
        items: Vec<ChannelReferencingMessage>,
        next_before_cursor: Option<Cursor>,
        next_after_cursor: Option<Cursor>,
        has_more: bool,
    ) -> Result<Self, MitterError> {
        validate_items(&items)?;
        Ok(Self {
            items,
            next_before_cursor,
            next_after_cursor,
            has_more,
        })
    }

    /// An empty, final page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_before_cursor: None,
            next_after_cursor: None,
            has_more: false,
        }
    }

    /// Derive cursors the way the list endpoint implies them: a full page means
    /// more data may follow.
    pub fn from_fetch(
        direction: Direction,
        items: Vec<ChannelReferencingMessage>,
        limit: u16,
    ) -> Result<Self, MitterError> {
        let has_more = !items.is_empty() && items.len() >= usize::from(limit);
        Self::from_items(direction, items, has_more)
    }

    /// Build a page fetched in `direction`, anchoring the continuation cursor at
    /// the far edge of the batch when `has_more` is set.
    pub fn from_items(
        direction: Direction,
        items: Vec<ChannelReferencingMessage>,
        has_more: bool,
    ) -> Result<Self, MitterError> {
        let far_edge = match direction {
            Direction::Backward => items.iter().min_by_key(|item| item.order_key()),
            Direction::Forward => items.iter().max_by_key(|item| item.order_key()),
        }
        .filter(|_| has_more)
        .map(ChannelReferencingMessage::cursor);

        let (before, after) = match direction {
            Direction::Backward => (far_edge, None),
            Direction::Forward => (None, far_edge),
        };
        Self::new(items, before, after, has_more)
    }

    pub fn items(&self) -> &[ChannelReferencingMessage] {
        &self.items
    }

    pub fn into_items(self) -> Vec<ChannelReferencingMessage> {
        self.items
    }

    pub fn next_before_cursor(&self) -> Option<&Cursor> {
        self.next_before_cursor.as_ref()
    }

    pub fn next_after_cursor(&self) -> Option<&Cursor> {
        self.next_after_cursor.as_ref()
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Cursor continuing in `direction`.
    pub fn cursor_for(&self, direction: Direction) -> Option<&Cursor> {
        match direction {
            Direction::Backward => self.next_before_cursor(),
            Direction::Forward => self.next_after_cursor(),
        }
    }

    /// The page reports no further data in `direction`.
    pub fn is_final(&self, direction: Direction) -> bool {
        !self.has_more && self.cursor_for(direction).is_none()
    }
}

fn validate_items(items: &[ChannelReferencingMessage]) -> Result<(), MitterError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.message_id.as_str()) {
            return Err(malformed(format!(
                "duplicate message id '{}' in page",
                item.message_id
            )));
        }
    }
    Ok(())
}

fn malformed(message: impl Into<String>) -> MitterError {
    MitterError::new(MitterErrorCategory::Serialization, "malformed_page", message)
}
