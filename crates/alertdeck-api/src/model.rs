// ── Alert wire types ──
//
// These mirror the server's JSON exactly (camelCase field names). The same
// `Alert` shape arrives from both sources: paginated query responses and
// single push frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    /// Critical alerts get distinct visual treatment in notices.
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Critical)
    }
}

/// A single disaster alert.
///
/// Identity is `id`: two alerts with the same `id` from different sources
/// (query batch vs. push frame) refer to the same logical alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub alert_type: String,
    pub severity: Severity,
    #[serde(default)]
    pub location: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
}

/// One page of the paginated alert listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertPage {
    pub content: Vec<Alert>,
    pub total_pages: u32,
}

/// Query parameters for `GET /alerts`.
///
/// Unset filters are omitted from the query string entirely -- the server
/// treats an empty `severity=` differently from an absent one.
#[derive(Debug, Clone, Serialize)]
pub struct AlertQuery {
    pub page: u32,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged: Option<bool>,
}

impl AlertQuery {
    /// First page with no filters.
    pub fn first_page(size: u32) -> Self {
        Self {
            page: 0,
            size,
            severity: None,
            acknowledged: None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn deserialize_alert() {
        let json = r#"{
            "id": "42",
            "alertType": "FLOOD",
            "severity": "CRITICAL",
            "location": "Mumbai",
            "timestamp": "2026-02-10T12:00:00Z",
            "acknowledged": false
        }"#;

        let alert: Alert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.id, "42");
        assert_eq!(alert.alert_type, "FLOOD");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.location.as_deref(), Some("Mumbai"));
        assert!(!alert.acknowledged);
    }

    #[test]
    fn deserialize_alert_without_optional_fields() {
        let json = r#"{
            "id": "7",
            "alertType": "EARTHQUAKE",
            "severity": "HIGH",
            "timestamp": "2026-02-10T12:00:00Z"
        }"#;

        let alert: Alert = serde_json::from_str(json).unwrap();
        assert!(alert.location.is_none());
        assert!(!alert.acknowledged);
    }

    #[test]
    fn query_omits_unset_filters() {
        let query = AlertQuery::first_page(10);
        let value = serde_json::to_value(&query).unwrap();
        let fields = value.as_object().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains_key("page"));
        assert!(fields.contains_key("size"));
        assert!(!fields.contains_key("severity"));
        assert!(!fields.contains_key("acknowledged"));
    }

    #[test]
    fn query_includes_set_filters() {
        let query = AlertQuery {
            page: 2,
            size: 10,
            severity: Some(Severity::Critical),
            acknowledged: Some(false),
        };
        let value = serde_json::to_value(&query).unwrap();
        assert_eq!(value["severity"], "CRITICAL");
        assert_eq!(value["acknowledged"], false);
        assert_eq!(value["page"], 2);
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Low);
        assert!(Severity::Critical.is_critical());
        assert!(!Severity::High.is_critical());
    }
}
