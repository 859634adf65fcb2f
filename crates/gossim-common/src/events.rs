//! Consumer-facing event log.
//!
//! The simulator keeps a small bounded log of notable events (user sends,
//! jam refusals, deliveries of tracked messages, control actions). It is
//! part of every snapshot and is the only channel through which failures
//! are reported to consumers; `tracing` output is for operators.

use crate::Tick;
use serde::{Deserialize, Serialize};

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
}

/// One entry of the bounded event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Tick at which the event occurred.
    pub tick: Tick,
    /// Human-readable description.
    pub message: String,
    /// Severity.
    pub level: LogLevel,
}

impl LogEvent {
    pub fn info(tick: Tick, message: impl Into<String>) -> Self {
        LogEvent {
            tick,
            message: message.into(),
            level: LogLevel::Info,
        }
    }

    pub fn success(tick: Tick, message: impl Into<String>) -> Self {
        LogEvent {
            tick,
            message: message.into(),
            level: LogLevel::Success,
        }
    }

    pub fn warn(tick: Tick, message: impl Into<String>) -> Self {
        LogEvent {
            tick,
            message: message.into(),
            level: LogLevel::Warn,
        }
    }
}
