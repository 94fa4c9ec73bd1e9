// ── Runtime connection configuration ──
//
// Describes *how* to reach the alert platform. The embedding application
// constructs a `ConsoleConfig` and hands it in -- core never reads files.

use std::time::Duration;

use alertdeck_api::push::ReconnectPolicy;
use alertdeck_api::transport::TlsVerification;
use url::Url;

/// Configuration for one console instance.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// REST base URL (e.g., `https://alerts.example.org/api/`).
    pub base_url: Url,
    /// WebSocket endpoint for the push channel.
    pub ws_url: Url,
    /// TLS verification strategy for the REST client.
    pub tls: TlsVerification,
    /// Request timeout for queries and commands.
    pub timeout: Duration,
    /// Page size for the alert listing.
    pub page_size: u32,
    /// Reconnect behavior for the push channel.
    pub reconnect: ReconnectPolicy,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/"
                .parse()
                .expect("default base URL"),
            ws_url: "ws://localhost:8080/ws".parse().expect("default ws URL"),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            page_size: 10,
            reconnect: ReconnectPolicy::default(),
        }
    }
}
