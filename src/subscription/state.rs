//! Subscription lifecycle states.

use serde::Serialize;

/// Lifecycle state of one upstream subscription.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Created = 0,
    Subscribing = 1,
    Active = 2,
    Cancelled = 3,
}

impl From<u8> for SubscriptionState {
    fn from(val: u8) -> Self {
        match val {
            0 => SubscriptionState::Created,
            1 => SubscriptionState::Subscribing,
            2 => SubscriptionState::Active,
            _ => SubscriptionState::Cancelled,
        }
    }
}

impl SubscriptionState {
    pub fn is_terminal(self) -> bool {
        self == SubscriptionState::Cancelled
    }
}
