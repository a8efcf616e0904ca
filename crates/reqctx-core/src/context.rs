//! The request context record and its field keys.

use crate::error::ContextError;
use crate::ids::{RequestId, TraceId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partial request context: any of the fields may be unset.
///
/// Serializes with the camelCase field names used on the wire (`reqId`,
/// `traceId`); unset fields are omitted, so an empty context is `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_req_id(mut self, req_id: impl Into<RequestId>) -> Self {
        self.req_id = Some(req_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<TraceId>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    /// Raw value of a field, if set. An empty string is returned as-is.
    pub fn get(&self, key: ContextKey) -> Option<&str> {
        match key {
            ContextKey::ReqId => self.req_id.as_ref().map(RequestId::as_str),
            ContextKey::TraceId => self.trace_id.as_ref().map(TraceId::as_str),
        }
    }

    pub fn set(&mut self, key: ContextKey, value: String) {
        match key {
            ContextKey::ReqId => self.req_id = Some(RequestId::from(value)),
            ContextKey::TraceId => self.trace_id = Some(TraceId::from(value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.req_id.is_none() && self.trace_id.is_none()
    }
}

/// Names of the fields a [`Context`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKey {
    ReqId,
    TraceId,
}

impl ContextKey {
    pub const ALL: [ContextKey; 2] = [ContextKey::ReqId, ContextKey::TraceId];

    pub fn as_str(self) -> &'static str {
        match self {
            ContextKey::ReqId => "reqId",
            ContextKey::TraceId => "traceId",
        }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKey {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContextKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ContextError::UnknownKey(s.to_string()))
    }
}
