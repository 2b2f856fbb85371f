//! Inbound event envelope
//!
//! The JSON body EventBridge posts to the platform webhook through the API
//! destination. Only `region`, `source`, `detail-type` and `detail` take part
//! in matching; the remaining fields are carried through to trigger logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,

    pub region: String,

    pub source: String,

    #[serde(rename = "detail-type")]
    pub detail_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub resources: Vec<String>,

    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl EventEnvelope {
    /// Parse a webhook body
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Look up a detail field, allowing one level of nesting (`state.value`)
    ///
    /// A key containing a dot is tried verbatim first.
    pub fn detail_field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.detail.get(path) {
            return Some(value);
        }
        let (outer, inner) = path.split_once('.')?;
        self.detail.get(outer)?.as_object()?.get(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alarm_event() -> EventEnvelope {
        serde_json::from_value(json!({
            "id": "c4c1c1c9-6542-e61b-6ef0-8c4d36933a92",
            "account": "123456789012",
            "region": "us-east-1",
            "source": "aws.cloudwatch",
            "detail-type": "CloudWatch Alarm State Change",
            "time": "2024-03-01T10:00:00Z",
            "resources": ["arn:aws:cloudwatch:us-east-1:123456789012:alarm:cpu-high"],
            "detail": {
                "alarmName": "cpu-high",
                "state": { "value": "ALARM", "reason": "threshold crossed" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_eventbridge_body() {
        let event = alarm_event();
        assert_eq!(event.detail_type, "CloudWatch Alarm State Change");
        assert_eq!(event.resources.len(), 1);
        assert!(event.time.is_some());
    }

    #[test]
    fn test_detail_field_lookup() {
        let event = alarm_event();
        assert_eq!(event.detail_field("alarmName"), Some(&json!("cpu-high")));
        assert_eq!(event.detail_field("state.value"), Some(&json!("ALARM")));
        assert_eq!(event.detail_field("state.missing"), None);
        assert_eq!(event.detail_field("alarmName.value"), None);
        assert_eq!(event.detail_field("nothing"), None);
    }

    #[test]
    fn test_from_slice_minimal() {
        let body = br#"{"region":"eu-west-1","source":"aws.ecr","detail-type":"ECR Image Action"}"#;
        let event = EventEnvelope::from_slice(body).unwrap();
        assert!(event.detail.is_empty());
        assert!(event.id.is_none());
    }
}
