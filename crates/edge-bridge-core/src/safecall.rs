//! Fault capture at the host/guest call boundary.
//!
//! Guest operations are never allowed to unwind across the boundary.
//! [`safe_call`] runs an operation and always hands back a
//! [`SafeCallResult`]: the operation's value on success, or the captured
//! [`GuestFault`] on failure. Exactly one of the two, never both, and the
//! wrapper itself never fails.
//!
//! The primitive is pure and holds no state; recording captured faults on
//! the event context is the caller's concern.

use std::future::Future;

use wasmtime::Trap;

use edge_bridge_common::GuestFault;

/// Outcome of a guest operation run behind the capture boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafeCallResult<T> {
    /// The operation completed with a value.
    Result(T),
    /// The operation faulted; the fault, as data.
    Error(GuestFault),
}

impl<T> SafeCallResult<T> {
    /// Returns `true` if the operation completed.
    pub fn is_result(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns `true` if the operation faulted.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<T, GuestFault> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error(fault) => Err(fault),
        }
    }

    /// The captured fault, if the operation faulted.
    pub fn fault(&self) -> Option<&GuestFault> {
        match self {
            Self::Result(_) => None,
            Self::Error(fault) => Some(fault),
        }
    }
}

impl<T> From<Result<T, GuestFault>> for SafeCallResult<T> {
    fn from(result: Result<T, GuestFault>) -> Self {
        match result {
            Ok(value) => Self::Result(value),
            Err(fault) => Self::Error(fault),
        }
    }
}

/// Run a fallible operation, capturing failure as a [`GuestFault`].
pub fn safe_call<T, E, F>(op: F) -> SafeCallResult<T>
where
    F: FnOnce() -> Result<T, E>,
    E: std::fmt::Display,
{
    match op() {
        Ok(value) => SafeCallResult::Result(value),
        Err(e) => SafeCallResult::Error(GuestFault::new(e.to_string())),
    }
}

/// Run a fallible async operation, capturing failure as a [`GuestFault`].
pub async fn safe_call_async<T, E, Fut>(fut: Fut) -> SafeCallResult<T>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match fut.await {
        Ok(value) => SafeCallResult::Result(value),
        Err(e) => SafeCallResult::Error(GuestFault::new(e.to_string())),
    }
}

/// Capture a Wasmtime error as a fault, keeping the trap kind if any.
pub fn wasm_fault(error: &wasmtime::Error) -> GuestFault {
    match error.downcast_ref::<Trap>() {
        Some(trap) => GuestFault::with_code(error.to_string(), format!("{trap:?}")),
        None => GuestFault::new(error.to_string()),
    }
}
