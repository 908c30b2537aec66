//! Stream filter contract.
//!
//! # Responsibilities
//! - Define the status values a filter returns for each request phase
//! - Define the per-request diagnostic record (`StreamInfo`)
//! - Define the callbacks a filter uses to talk back to the pipeline
//!
//! # Design Decisions
//! - Callbacks are passed into each phase rather than stored in the filter,
//!   so a filter never holds a borrow of the stream
//! - Local replies are built by the pipeline, the filter only chooses the
//!   status and mutates headers

use std::fmt;

use axum::http::{HeaderMap, StatusCode};

use crate::observability::tracing::Span;

/// Result of the request-headers phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterHeadersStatus {
    /// Hand the request to the next stage.
    Continue,
    /// Do not forward; the filter owns the request from here on.
    StopIteration,
}

/// Result of a request-body phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDataStatus {
    Continue,
    /// Drop the chunk without buffering it.
    StopIterationNoBuffer,
}

/// Result of the request-trailers phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTrailersStatus {
    Continue,
    StopIteration,
}

/// Diagnostic flags attached to a stream for access logging.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFlag {
    /// The node answered a request because of its own health state.
    FailedLocalHealthCheck = 1,
    /// No healthy upstream host was available.
    NoHealthyUpstream = 2,
    /// Connecting to the upstream host failed.
    UpstreamConnectionFailure = 4,
}

impl ResponseFlag {
    const ALL: [ResponseFlag; 3] = [
        ResponseFlag::FailedLocalHealthCheck,
        ResponseFlag::NoHealthyUpstream,
        ResponseFlag::UpstreamConnectionFailure,
    ];

    /// Short code used in access logs.
    pub fn short_code(self) -> &'static str {
        match self {
            ResponseFlag::FailedLocalHealthCheck => "LH",
            ResponseFlag::NoHealthyUpstream => "UH",
            ResponseFlag::UpstreamConnectionFailure => "UF",
        }
    }
}

/// A set of [`ResponseFlag`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseFlags(u8);

impl ResponseFlags {
    pub fn insert(&mut self, flag: ResponseFlag) {
        self.0 |= flag as u8;
    }

    pub fn contains(&self, flag: ResponseFlag) -> bool {
        self.0 & flag as u8 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ResponseFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let mut first = true;
        for flag in ResponseFlag::ALL {
            if self.contains(flag) {
                if !first {
                    write!(f, ",")?;
                }
                write!(f, "{}", flag.short_code())?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Per-request diagnostic record.
#[derive(Debug, Clone, Default)]
pub struct StreamInfo {
    health_check: bool,
    response_flags: ResponseFlags,
}

impl StreamInfo {
    /// Mark the stream as a health-check probe.
    pub fn set_health_check(&mut self, is_health_check: bool) {
        self.health_check = is_health_check;
    }

    pub fn is_health_check(&self) -> bool {
        self.health_check
    }

    pub fn set_response_flag(&mut self, flag: ResponseFlag) {
        self.response_flags.insert(flag);
    }

    pub fn has_response_flag(&self, flag: ResponseFlag) -> bool {
        self.response_flags.contains(flag)
    }

    pub fn response_flags(&self) -> ResponseFlags {
        self.response_flags
    }
}

/// Pipeline services available to a filter while decoding a request.
pub trait DecoderFilterCallbacks {
    /// Diagnostic record of the current stream.
    fn stream_info(&mut self) -> &mut StreamInfo;

    /// Tracing span of the current stream.
    fn active_span(&mut self) -> &mut dyn Span;

    /// Answer the request locally. `modify_headers` runs on the reply
    /// headers before the reply enters the response path.
    fn send_local_reply(
        &mut self,
        status: StatusCode,
        body: &str,
        modify_headers: &dyn Fn(&mut HeaderMap),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_flags_display() {
        let mut flags = ResponseFlags::default();
        assert_eq!(flags.to_string(), "-");

        flags.insert(ResponseFlag::UpstreamConnectionFailure);
        flags.insert(ResponseFlag::FailedLocalHealthCheck);
        assert_eq!(flags.to_string(), "LH,UF");
        assert!(!flags.contains(ResponseFlag::NoHealthyUpstream));
    }

    #[test]
    fn test_stream_info_flags_accumulate() {
        let mut info = StreamInfo::default();
        info.set_health_check(true);
        info.set_response_flag(ResponseFlag::FailedLocalHealthCheck);
        info.set_response_flag(ResponseFlag::FailedLocalHealthCheck);

        assert!(info.is_health_check());
        assert!(info.has_response_flag(ResponseFlag::FailedLocalHealthCheck));
        assert_eq!(info.response_flags().to_string(), "LH");
    }
}
