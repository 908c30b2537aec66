//! Distributed tracing support.
//!
//! # Responsibilities
//! - Extract trace context from incoming requests
//! - Let filters override the sampling decision
//! - Propagate the (possibly overridden) context to backend requests
//!
//! # Design Decisions
//! - Supports W3C Trace Context (`traceparent`) and B3 (`x-b3-sampled`)
//! - Malformed `traceparent` values are ignored, never rejected
//! - A sampling override is written into every propagation format so the
//!   decision survives whichever tracer the backend runs

use axum::http::{HeaderMap, HeaderValue};

pub const TRACEPARENT: &str = "traceparent";
pub const X_B3_SAMPLED: &str = "x-b3-sampled";

const SAMPLED_FLAG: u8 = 0x01;

/// Span handle a filter can adjust.
pub trait Span {
    /// Force the sampling decision for this span and its children.
    fn set_sampled(&mut self, sampled: bool);
}

/// Parsed W3C `traceparent` header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Traceparent {
    version: String,
    trace_id: String,
    parent_id: String,
    flags: u8,
}

impl Traceparent {
    fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let parent_id = parts.next()?;
        let flags = parts.next()?;

        let is_hex = |s: &str, len: usize| s.len() == len && s.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex(version, 2) || !is_hex(trace_id, 32) || !is_hex(parent_id, 16) || !is_hex(flags, 2) {
            return None;
        }
        // Only version 00 forbids trailing fields.
        if version == "00" && parts.next().is_some() {
            return None;
        }

        Some(Self {
            version: version.to_string(),
            trace_id: trace_id.to_string(),
            parent_id: parent_id.to_string(),
            flags: u8::from_str_radix(flags, 16).ok()?,
        })
    }

    fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{:02x}",
            self.version, self.trace_id, self.parent_id, self.flags
        )
    }
}

/// Trace context of one request.
#[derive(Debug, Clone, Default)]
pub struct TraceContext {
    traceparent: Option<Traceparent>,
    b3_sampled: Option<bool>,
    sampled_override: Option<bool>,
}

impl TraceContext {
    /// Extract the trace context from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let traceparent = headers
            .get(TRACEPARENT)
            .and_then(|v| v.to_str().ok())
            .and_then(Traceparent::parse);

        let b3_sampled = headers
            .get(X_B3_SAMPLED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| match v {
                "1" | "d" | "true" => Some(true),
                "0" | "false" => Some(false),
                _ => None,
            });

        Self {
            traceparent,
            b3_sampled,
            sampled_override: None,
        }
    }

    /// Effective sampling decision, if any party made one.
    pub fn is_sampled(&self) -> Option<bool> {
        self.sampled_override
            .or_else(|| self.traceparent.as_ref().map(|tp| tp.flags & SAMPLED_FLAG != 0))
            .or(self.b3_sampled)
    }

    /// Write the context into headers of a request about to be forwarded.
    pub fn inject(&self, headers: &mut HeaderMap) {
        let Some(sampled) = self.sampled_override else {
            return;
        };

        if let Some(tp) = &self.traceparent {
            let mut tp = tp.clone();
            if sampled {
                tp.flags |= SAMPLED_FLAG;
            } else {
                tp.flags &= !SAMPLED_FLAG;
            }
            if let Ok(value) = HeaderValue::from_str(&tp.encode()) {
                headers.insert(TRACEPARENT, value);
            }
        }

        let b3 = if sampled { "1" } else { "0" };
        headers.insert(X_B3_SAMPLED, HeaderValue::from_static(b3));
    }
}

impl Span for TraceContext {
    fn set_sampled(&mut self, sampled: bool) {
        self.sampled_override = Some(sampled);
    }
}
