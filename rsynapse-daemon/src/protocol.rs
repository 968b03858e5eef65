use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Query,
    QuerySelection,
    Action,
    Refresh,
    RegisterMainHotkey,
}

impl FromStr for Method {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Query" => Ok(Self::Query),
            "QuerySelection" => Ok(Self::QuerySelection),
            "Action" => Ok(Self::Action),
            "Refresh" => Ok(Self::Refresh),
            "RegisterMainHotkey" => Ok(Self::RegisterMainHotkey),
            other => Err(CoreError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Request {
    /// Decodes a transport payload.
    pub fn from_json(payload: &str) -> Result<Self, CoreError> {
        serde_json::from_str(payload).map_err(|e| CoreError::InvalidRequest(e.to_string()))
    }

    pub fn new(method: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            method: method.to_string(),
            params: HashMap::new(),
        }
    }

    pub fn with_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    /// Gives the request a random id when the client sent none, so every
    /// response stays correlated.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        &self.id
    }

    pub fn param(&self, name: &'static str) -> Result<&str, CoreError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or(CoreError::MissingParameter(name))
    }

    pub fn optional_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }
}

/// One answer to a request. A query request gets several, all sharing
/// the request id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub method: String,
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn success<T: Serialize>(request: &Request, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                id: request.id.clone(),
                method: request.method.clone(),
                success: true,
                data,
                error: None,
            },
            Err(error) => Self::error(request, &error),
        }
    }

    pub fn empty_success(request: &Request) -> Self {
        Self {
            id: request.id.clone(),
            method: request.method.clone(),
            success: true,
            data: Value::Null,
            error: None,
        }
    }

    pub fn error(request: &Request, error: &dyn std::fmt::Display) -> Self {
        Self {
            id: request.id.clone(),
            method: request.method.clone(),
            success: false,
            data: Value::Null,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_decodes_without_params() {
        let request: Request = serde_json::from_str(r#"{"id":"1","method":"Query"}"#).unwrap();
        assert!(request.params.is_empty());
        assert_eq!(request.param("query"), Err(CoreError::MissingParameter("query")));
    }

    #[test]
    fn malformed_payload_is_invalid_request() {
        let request = Request::from_json(r#"{"method":"Query","params":{"query":"fi"}}"#).unwrap();
        assert_eq!(request.param("query"), Ok("fi"));

        let error = Request::from_json("{not-json").unwrap_err();
        assert!(matches!(error, CoreError::InvalidRequest(_)));
        let response = Response::error(&Request::default(), &error);
        assert!(!response.success);
        assert!(response.error.unwrap().starts_with("invalid request: "));
    }

    #[test]
    fn ensure_id_only_fills_missing_ids() {
        let mut request = Request::default();
        let generated = request.ensure_id().to_string();
        assert!(!generated.is_empty());
        assert_eq!(request.ensure_id(), generated);
    }

    #[test]
    fn method_names_match_wire_format() {
        assert_eq!("Query".parse::<Method>(), Ok(Method::Query));
        assert_eq!(
            "RegisterMainHotkey".parse::<Method>(),
            Ok(Method::RegisterMainHotkey)
        );
        assert_eq!(
            "Launch".parse::<Method>(),
            Err(CoreError::UnknownMethod("Launch".to_string()))
        );
    }

    #[test]
    fn error_response_echoes_request() {
        let request = Request::new("Action").with_param("id", "r1");
        let response = Response::error(&request, &CoreError::ResultNotFound("r1".into()));
        assert_eq!(response.id, request.id);
        assert!(!response.success);

        let encoded = serde_json::to_string(&response).unwrap();
        assert!(encoded.contains("\"error\":\"result not found: r1\""));
    }
}
