// alertdeck-core: the realtime alert subsystem of the admin console.
//
// Session token holder, push channel manager, notification dispatcher,
// alert list reconciler, and query/filter controller, wired together by
// `AlertConsole`. The presentation layer reads snapshots and watch
// channels; all mutation happens here.

pub mod channel;
pub mod config;
pub mod console;
pub mod error;
pub mod notify;
pub mod query;
pub mod reconciler;
pub mod session;

pub use channel::ChannelManager;
pub use config::ConsoleConfig;
pub use console::AlertConsole;
pub use error::CoreError;
pub use notify::{Notice, NotificationDispatcher};
pub use query::FilterController;
pub use reconciler::{AlertListReconciler, PendingAck};
pub use session::{Session, SessionHolder};

// Wire types shared with the api crate.
pub use alertdeck_api::{Alert, AlertPage, AlertQuery, ChannelState, ReconnectPolicy, Severity};
