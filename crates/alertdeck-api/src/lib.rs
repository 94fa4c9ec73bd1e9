// alertdeck-api: Async client for the disaster-alert admin API
// (paginated REST queries, acknowledgment commands, WebSocket push).

pub mod client;
pub mod error;
pub mod model;
pub mod push;
pub mod transport;

pub use client::AlertsClient;
pub use error::Error;
pub use model::{Alert, AlertPage, AlertQuery, Severity};
pub use push::{ChannelState, PushChannel, ReconnectPolicy};
