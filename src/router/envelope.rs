//! Command and response envelopes.
//!
//! A command is a JSON object `{"cmd": name, "id"?: any, ...params}`. A
//! response always carries `version` and `status`, echoes `id` when the
//! command had one, and adds `msg` on failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ProbeError, Result};

/// Envelope format version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Largest byte count a single `read` command may request (64 KiB).
pub const MAX_TRANSFER_SIZE: usize = 0x1_0000;

/// Fields a command handler adds to a success response.
pub type Fields = Map<String, Value>;

/// A decoded command envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Command name.
    pub cmd: String,
    /// Correlation id, echoed in the response.
    pub id: Option<Value>,
    /// Everything except `cmd` and `id`.
    pub params: Fields,
}

impl Request {
    /// Decode a command envelope.
    pub fn parse(value: Value) -> Result<Self> {
        let Value::Object(mut params) = value else {
            return Err(ProbeError::Protocol(
                "Command envelope must be a JSON object".into(),
            ));
        };
        let id = params.remove("id");
        let cmd = match params.remove("cmd") {
            Some(Value::String(cmd)) if !cmd.is_empty() => cmd,
            Some(Value::String(_)) | None | Some(Value::Null) => {
                return Err(ProbeError::Protocol("No command specified".into()))
            }
            Some(other) => {
                return Err(ProbeError::Protocol(format!(
                    "Command name must be a string, got {}",
                    other
                )))
            }
        };
        Ok(Self { cmd, id, params })
    }

    /// Build a request (used by clients).
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            id: None,
            params: Fields::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Set the correlation id.
    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Number of parameters, excluding `cmd` and `id`.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Required string parameter.
    pub fn str(&self, name: &str) -> Result<&str> {
        self.opt_str(name)?.ok_or_else(|| missing(name))
    }

    /// Optional string parameter; `null` counts as absent.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.params.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(ProbeError::Protocol(format!(
                "Parameter '{}' must be a string, got {}",
                name, other
            ))),
        }
    }

    /// Required address: a JSON integer or a decimal / `0x` hex string.
    pub fn address(&self, name: &str) -> Result<u32> {
        let invalid =
            |v: &Value| ProbeError::Protocol(format!("Invalid address '{}': {}", name, v));
        let value = self.params.get(name).ok_or_else(|| missing(name))?;
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid(value)),
            Value::String(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                    Some(digits) => u32::from_str_radix(digits, 16),
                    None => s.parse(),
                };
                parsed.map_err(|_| invalid(value))
            }
            _ => Err(invalid(value)),
        }
    }

    /// Required non-negative count no larger than `max`.
    pub fn count(&self, name: &str, max: usize) -> Result<usize> {
        let value = self.params.get(name).ok_or_else(|| missing(name))?;
        let count = value
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| ProbeError::Protocol(format!("Invalid count '{}': {}", name, value)))?;
        if count > max {
            return Err(ProbeError::Protocol(format!(
                "Count '{}' of {} exceeds maximum {}",
                name, count, max
            )));
        }
        Ok(count)
    }

    /// Encode back into an envelope.
    pub fn into_value(self) -> Value {
        let mut map = Fields::new();
        map.insert("cmd".into(), Value::String(self.cmd));
        if let Some(id) = self.id {
            map.insert("id".into(), id);
        }
        map.extend(self.params);
        Value::Object(map)
    }
}

fn missing(name: &str) -> ProbeError {
    ProbeError::Protocol(format!("Missing parameter '{}'", name))
}

/// A response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    /// Operation fields.
    #[serde(flatten)]
    pub fields: Fields,
}

impl Response {
    /// Success response carrying `fields`.
    ///
    /// A `msg` field is lifted into [`Response::msg`].
    pub fn success(id: Option<Value>, mut fields: Fields) -> Self {
        let msg = match fields.remove("msg") {
            Some(Value::String(msg)) => Some(msg),
            Some(other) => Some(other.to_string()),
            None => None,
        };
        Self {
            version: ENVELOPE_VERSION,
            id,
            status: 0,
            msg,
            fields,
        }
    }

    /// Failure response for `error`.
    pub fn failure(id: Option<Value>, error: &ProbeError) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            id,
            status: error.status(),
            msg: Some(error.to_string()),
            fields: Fields::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Operation field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Convert a failure envelope into an error.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProbeError::Remote {
                status: self.status,
                msg: self.msg.unwrap_or_default(),
            })
        }
    }

    /// Encode as a JSON object.
    pub fn into_value(self) -> Value {
        let mut map = Fields::new();
        map.insert("version".into(), Value::from(self.version));
        if let Some(id) = self.id {
            map.insert("id".into(), id);
        }
        map.insert("status".into(), Value::from(self.status));
        if let Some(msg) = self.msg {
            map.insert("msg".into(), Value::String(msg));
        }
        map.extend(self.fields);
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_splits_cmd_and_id() {
        let req = Request::parse(json!({"cmd": "read", "id": 7, "addr": 0, "nb": 2})).unwrap();
        assert_eq!(req.cmd, "read");
        assert_eq!(req.id, Some(json!(7)));
        assert_eq!(req.param_count(), 2);
    }

    #[test]
    fn test_parse_rejects_bad_envelopes() {
        for bad in [json!([1, 2]), json!({"addr": 1}), json!({"cmd": ""}), json!({"cmd": 5})] {
            let err = Request::parse(bad).unwrap_err();
            assert!(matches!(err, ProbeError::Protocol(_)));
        }
    }

    #[test]
    fn test_address_forms() {
        let req = Request::new("read")
            .param("a", 0xAC25)
            .param("b", "0xAC25")
            .param("c", "44069")
            .param("d", -1)
            .param("e", "0xZZ");
        assert_eq!(req.address("a").unwrap(), 0xAC25);
        assert_eq!(req.address("b").unwrap(), 0xAC25);
        assert_eq!(req.address("c").unwrap(), 44069);
        assert!(req.address("d").is_err());
        assert!(req.address("e").is_err());
        assert!(req.address("missing").is_err());
    }

    #[test]
    fn test_count_bounds() {
        let req = Request::new("read")
            .param("nb", 4)
            .param("big", u64::MAX)
            .param("neg", -2)
            .param("text", "4");
        assert_eq!(req.count("nb", MAX_TRANSFER_SIZE).unwrap(), 4);
        assert_eq!(req.count("nb", 4).unwrap(), 4);
        assert!(req.count("nb", 3).is_err());
        for name in ["big", "neg", "text", "missing"] {
            let err = req.count(name, MAX_TRANSFER_SIZE).unwrap_err();
            assert!(matches!(err, ProbeError::Protocol(_)), "{name}");
        }
    }

    #[test]
    fn test_optional_string() {
        let req = Request::new("connect").param("uri", Value::Null).param("n", 3);
        assert_eq!(req.opt_str("uri").unwrap(), None);
        assert_eq!(req.opt_str("other").unwrap(), None);
        assert!(req.opt_str("n").is_err());
    }

    #[test]
    fn test_success_envelope() {
        let mut fields = Fields::new();
        fields.insert("data".into(), json!("3412"));
        let value = Response::success(Some(json!("a")), fields).into_value();
        assert_eq!(value, json!({"version": 1, "id": "a", "status": 0, "data": "3412"}));
    }

    #[test]
    fn test_failure_envelope() {
        let err = ProbeError::UnknownCommand("bogus".into());
        let value = Response::failure(None, &err).into_value();
        assert_eq!(
            value,
            json!({"version": 1, "status": 1, "msg": "Unknown command: bogus"})
        );
    }

    #[test]
    fn test_response_roundtrip_through_serde() {
        let text = r#"{"version":1,"id":3,"status":0,"msg":"Probe set successfully","probe":"DummyProbe"}"#;
        let resp: Response = serde_json::from_str(text).unwrap();
        assert_eq!(resp.msg.as_deref(), Some("Probe set successfully"));
        assert_eq!(resp.field("probe"), Some(&json!("DummyProbe")));
        assert!(resp.into_result().is_ok());

        let text = r#"{"version":1,"status":2,"msg":"Probe is not connected"}"#;
        let resp: Response = serde_json::from_str(text).unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(err.is_transport());
    }
}
