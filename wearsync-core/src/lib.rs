//! Wearsync Core Library
//!
//! Weather record sync between a phone and a watch, and the watch face
//! layout that renders it.

pub mod config;
pub mod consumer;
pub mod layout;
pub mod models;
pub mod producer;
pub mod sync;

pub use config::{CoreConfig, LayoutConfig, RetryMode, RetryPolicy, MAX_FIT_ITERATIONS};
pub use consumer::{Consumer, RedrawSink, RenderState, RECONNECT_DELAY};
pub use layout::{
    DrawOp, FaceGeometry, FaceMetrics, FacePainter, FacePlan, LayoutError, LayoutFitter,
    TextMeasure, TextStyle,
};
pub use models::{SyncRecord, TemperatureUnit, WeatherIcon, WeatherSnapshot};
pub use producer::{Producer, PublishOutcome, WeatherSource};
pub use sync::{
    ChannelError, ChannelSession, ChannelState, DecodeError, MemoryHub, MemoryTransport, Role,
    SyncChannel, Transport, TransportError,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
