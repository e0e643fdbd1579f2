//! EnvelopeBusMessage - bus を流れる唯一のメッセージ形式
//!
//! `purpose` で tagged union にしています（request / response / notification）。
//! JSON 例:
//!
//! ```json
//! {
//!   "envelopeServerId": "envelope-server-01J...",
//!   "purpose": "request",
//!   "requestId": "request-01J...",
//!   "type": "taskDetails__getTask",
//!   "args": { "taskId": "t1" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ApiError;
use super::ids::{EnvelopeServerId, RequestId};

/// One message on the bus, addressed to one envelope server pairing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeBusMessage {
    pub envelope_server_id: EnvelopeServerId,
    #[serde(flatten)]
    pub body: MessageBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "camelCase")]
pub enum MessageBody {
    #[serde(rename_all = "camelCase")]
    Request {
        request_id: RequestId,
        #[serde(rename = "type")]
        method: String,
        #[serde(default)]
        args: Value,
    },

    #[serde(rename_all = "camelCase")]
    Response {
        request_id: RequestId,
        #[serde(rename = "type")]
        method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ApiError>,
    },

    Notification {
        #[serde(rename = "type")]
        method: String,
        #[serde(default)]
        args: Value,
    },
}

impl MessageBody {
    /// Build the response body for a handled request.
    pub fn response(request_id: RequestId, method: String, outcome: Result<Value, ApiError>) -> Self {
        match outcome {
            Ok(result) => MessageBody::Response {
                request_id,
                method,
                result: Some(result),
                error: None,
            },
            Err(error) => MessageBody::Response {
                request_id,
                method,
                result: None,
                error: Some(error),
            },
        }
    }

    pub fn method(&self) -> &str {
        match self {
            MessageBody::Request { method, .. }
            | MessageBody::Response { method, .. }
            | MessageBody::Notification { method, .. } => method,
        }
    }

    pub fn purpose(&self) -> &'static str {
        match self {
            MessageBody::Request { .. } => "request",
            MessageBody::Response { .. } => "response",
            MessageBody::Notification { .. } => "notification",
        }
    }
}

impl EnvelopeBusMessage {
    pub fn new(envelope_server_id: EnvelopeServerId, body: MessageBody) -> Self {
        Self {
            envelope_server_id,
            body,
        }
    }
}

/// Outcome carried by a response. A `null` result is a successful unit reply.
pub fn response_outcome(result: Option<Value>, error: Option<ApiError>) -> Result<Value, ApiError> {
    match error {
        Some(error) => Err(error),
        None => Ok(result.unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ApiErrorKind;
    use serde_json::json;
    use ulid::Ulid;

    #[test]
    fn request_wire_shape() {
        let server = EnvelopeServerId::from_ulid(Ulid::new());
        let request = RequestId::from_ulid(Ulid::new());
        let msg = EnvelopeBusMessage::new(
            server,
            MessageBody::Request {
                request_id: request,
                method: "taskDetails__getTask".into(),
                args: json!({ "taskId": "t1" }),
            },
        );

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "envelopeServerId": server.to_string(),
                "purpose": "request",
                "requestId": request.to_string(),
                "type": "taskDetails__getTask",
                "args": { "taskId": "t1" },
            })
        );

        let back: EnvelopeBusMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn error_response_carries_no_result() {
        let body = MessageBody::response(
            RequestId::from_ulid(Ulid::new()),
            "taskDetails__getTask".into(),
            Err(ApiError::new(ApiErrorKind::BackingOperation, "boom")),
        );
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["purpose"], "response");
        assert!(value.get("result").is_none());
        assert_eq!(value["error"]["kind"], "backingOperation");
    }

    #[test]
    fn unit_results_survive_the_wire() {
        let body = MessageBody::response(
            RequestId::from_ulid(Ulid::new()),
            "processList__openProcess".into(),
            Ok(Value::Null),
        );
        let text = serde_json::to_string(&body).unwrap();
        let MessageBody::Response { result, error, .. } = serde_json::from_str(&text).unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response_outcome(result, error).unwrap(), Value::Null);
    }

    #[test]
    fn notification_without_args_decodes() {
        let value = json!({
            "envelopeServerId": EnvelopeServerId::from_ulid(Ulid::new()).to_string(),
            "purpose": "notification",
            "type": "processList__refresh",
        });
        let msg: EnvelopeBusMessage = serde_json::from_value(value).unwrap();
        assert_eq!(msg.body.method(), "processList__refresh");
        assert_eq!(msg.body.purpose(), "notification");
    }
}
