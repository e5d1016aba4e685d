use std::collections::HashSet;

use shared::domain::MessageId;

#[derive(Debug, Default, Clone)]
pub struct ReadTrackingSet {
    claimed: HashSet<MessageId>,
}

impl ReadTrackingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// True on the first claim of `message_id` in this session only.
    pub fn try_claim(&mut self, message_id: MessageId) -> bool {
        self.claimed.insert(message_id)
    }

    pub fn is_claimed(&self, message_id: MessageId) -> bool {
        self.claimed.contains(&message_id)
    }

    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }

    pub fn clear(&mut self) {
        self.claimed.clear();
    }
}
