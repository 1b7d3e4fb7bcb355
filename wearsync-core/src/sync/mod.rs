//! Weather record sync between the phone and the watch.
//!
//! The record travels as a flat key/value item at a fixed topic on a shared
//! data layer. This module provides the pieces on either side of it:
//!
//! - [`protocol`] maps a [`SyncRecord`](crate::SyncRecord) to and from the wire map
//! - [`Transport`] is the narrow surface over the data layer
//! - [`SyncChannel`] drives one session through its states
//! - [`MemoryHub`] is an in-process data layer for tests and demos

mod channel;
mod error;
mod memory;
pub mod protocol;
mod state;
mod transport;

pub use channel::{PendingConnect, PendingPublish, SyncChannel, UpdateCallback};
pub use error::{ChannelError, DecodeError, TransportError};
pub use memory::{MemoryHub, MemoryTransport, TransportStats, NOT_CONNECTED_CODE};
pub use protocol::{decode, encode, WireKey, WireMap, WireValue, WEATHER_TOPIC};
pub use state::{ChannelSession, ChannelState, Role};
pub use transport::{EventSink, SessionEvent, SessionId, Transport, TransportEvent};
