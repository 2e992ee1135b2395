//! Error types for the edge-bridge.
//!
//! This module defines a hierarchy of error types using `thiserror`:
//! - [`BridgeError`]: Top-level errors for the bridge
//! - [`GuestFault`]: A fault captured inside the guest and carried as a value
//!
//! The split matters at the event boundary: a [`BridgeError`] means the
//! bridge could not deliver the event to the guest at all, while a
//! [`GuestFault`] means the guest's own logic failed after delivery.

use std::io;

use thiserror::Error;

/// Top-level bridge errors.
///
/// These errors represent failures that can occur between receiving a
/// platform event and handing it to the guest module, from compilation
/// through the readiness handshake to binding dispatch.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The guest module could not be read or compiled.
    #[error("Module load failed: {reason}")]
    ModuleLoad {
        /// Description of the load or compilation failure.
        reason: String,
    },

    /// The guest's entrypoint trapped before signaling readiness.
    #[error("Guest startup fault: {message}")]
    Startup {
        /// Description of the startup trap.
        message: String,
    },

    /// The guest never signaled readiness within the configured bound.
    #[error("Guest not ready after {waited_ms}ms")]
    ReadinessTimeout {
        /// How long the bridge waited, in milliseconds.
        waited_ms: u64,
    },

    /// The event kind has no registered handler in the guest.
    #[error("No guest binding registered for '{binding}'")]
    BindingMissing {
        /// The wire name of the missing binding.
        binding: String,
    },

    /// The guest's handler logic failed after the event was delivered.
    #[error("Guest fault: {0}")]
    Guest(#[from] GuestFault),

    /// The guest produced a reply the bridge could not decode.
    #[error("Malformed guest payload: {reason}")]
    MalformedPayload {
        /// Description of the decode failure.
        reason: String,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A fault raised by guest logic and captured at the call boundary.
///
/// Faults never unwind across the host/guest boundary. The capture
/// primitive turns them into this value, which handlers and the event
/// router inspect like any other result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct GuestFault {
    /// Human-readable description of the fault.
    pub message: String,

    /// The wasm trap kind, when the fault came from a trap.
    pub code: Option<String>,
}

impl GuestFault {
    /// Create a fault from any printable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a fault carrying the trap kind that raised it.
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

impl BridgeError {
    /// Create a new `ModuleLoad` error.
    pub fn module_load(reason: impl Into<String>) -> Self {
        Self::ModuleLoad {
            reason: reason.into(),
        }
    }

    /// Create a new `Startup` error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Create a new `BindingMissing` error.
    pub fn binding_missing(binding: impl Into<String>) -> Self {
        Self::BindingMissing {
            binding: binding.into(),
        }
    }

    /// Create a new `MalformedPayload` error.
    pub fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            reason: reason.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the guest instance never became available.
    ///
    /// Covers every failure before the first event could be delivered:
    /// compilation, the startup call, and the readiness handshake.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ModuleLoad { .. } | Self::Startup { .. } | Self::ReadinessTimeout { .. }
        )
    }

    /// Returns `true` if this error originated inside guest logic.
    pub fn is_guest_fault(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::module_load("unexpected end of section");
        assert_eq!(
            err.to_string(),
            "Module load failed: unexpected end of section"
        );

        let err = BridgeError::ReadinessTimeout { waited_ms: 5000 };
        assert_eq!(err.to_string(), "Guest not ready after 5000ms");
    }

    #[test]
    fn test_error_from_guest_fault() {
        let fault = GuestFault::new("worker panicked in handler");
        let bridge_err: BridgeError = fault.into();

        assert!(matches!(bridge_err, BridgeError::Guest(_)));
        assert!(bridge_err.is_guest_fault());
    }

    #[test]
    fn test_is_unavailable() {
        assert!(BridgeError::module_load("bad magic").is_unavailable());
        assert!(BridgeError::startup("unreachable").is_unavailable());
        assert!(BridgeError::ReadinessTimeout { waited_ms: 100 }.is_unavailable());
        assert!(!BridgeError::binding_missing("handleRequest").is_unavailable());
    }

    #[test]
    fn test_guest_fault_is_a_value() {
        let a = GuestFault::new("boom");
        let b = a.clone();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "boom");
        assert!(a.code.is_none());

        let trapped = GuestFault::with_code("boom", "UnreachableCodeReached");
        assert_eq!(trapped.code.as_deref(), Some("UnreachableCodeReached"));
        assert_eq!(trapped.to_string(), "boom");
    }
}
