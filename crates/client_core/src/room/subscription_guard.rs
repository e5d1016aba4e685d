#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoomPhase {
    #[default]
    Unmounted,
    Loading,
    Subscribed,
}

#[derive(Debug, Default, Clone)]
pub struct SubscriptionGuard {
    subscribed: bool,
}

impl SubscriptionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once, on the first call that observes room data.
    pub fn try_arm(&mut self, has_room_data: bool) -> bool {
        if self.subscribed || !has_room_data {
            return false;
        }
        self.subscribed = true;
        true
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}
