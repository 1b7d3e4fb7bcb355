//! Channel states and the per-attempt session record.

use std::fmt;

use super::error::TransportError;
use super::transport::SessionId;

/// Lifecycle state of a [`SyncChannel`](super::SyncChannel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// No session
    Idle,
    /// A connect request is outstanding with the transport
    Connecting,
    /// Session established, no role taken yet
    Connected,
    /// Session established, acting as the producer
    Publishing,
    /// Session established, a subscription is attached
    Listening,
    /// The transport reported a transient interruption
    Suspended,
    /// Closed for good
    Disconnected,
}

impl ChannelState {
    /// True when a session is established and usable.
    pub fn is_established(&self) -> bool {
        matches!(
            self,
            ChannelState::Connected | ChannelState::Publishing | ChannelState::Listening
        )
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "idle"),
            ChannelState::Connecting => write!(f, "connecting"),
            ChannelState::Connected => write!(f, "connected"),
            ChannelState::Publishing => write!(f, "publishing"),
            ChannelState::Listening => write!(f, "listening"),
            ChannelState::Suspended => write!(f, "suspended"),
            ChannelState::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Which side of the exchange a channel plays once connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Publisher => write!(f, "publisher"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// One attempt to reach the remote peer.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSession {
    pub id: SessionId,
    pub state: ChannelState,
    /// Failed connect attempts since the last successful connect
    pub retry_count: u32,
    pub last_error: Option<TransportError>,
}

impl ChannelSession {
    pub(crate) fn new(id: SessionId, retry_count: u32, last_error: Option<TransportError>) -> Self {
        Self {
            id,
            state: ChannelState::Connecting,
            retry_count,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_established() {
        assert!(ChannelState::Connected.is_established());
        assert!(ChannelState::Publishing.is_established());
        assert!(ChannelState::Listening.is_established());
        assert!(!ChannelState::Idle.is_established());
        assert!(!ChannelState::Connecting.is_established());
        assert!(!ChannelState::Suspended.is_established());
        assert!(!ChannelState::Disconnected.is_established());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ChannelState::Suspended.to_string(), "suspended");
        assert_eq!(Role::Publisher.to_string(), "publisher");
    }
}
