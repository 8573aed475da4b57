// airctl-core: request/response correlation and the schedule domain on top of airctl-api.

pub mod channels;
pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod model;
pub mod service;
pub mod topic_watch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channels::ScheduleAction;
pub use client::AirconClient;
pub use config::ClientConfig;
pub use correlator::RequestCorrelator;
pub use error::CoreError;
pub use service::{ScheduleService, ScheduleSummary, ServiceState};
pub use topic_watch::{FeedItem, TopicFeed, TopicSnapshot, TopicWatch};

// Transport types consumers commonly need alongside the client.
pub use airctl_api::{ConnectionState, TlsMode, TransportConfig, TransportConnection};

pub use model::{
    ControlCommand, DayOfWeek, FanSpeed, Mode, RepeatRule, ResponseStatus, ScheduleItem,
    SchedulerResponse, Temperature, TriggerEvent,
};
