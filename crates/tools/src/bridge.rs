//! Drive an async operation to completion from synchronous code.
//!
//! Tool functions are called synchronously by the agent framework, which may
//! itself be running inside a tokio runtime. Blocking on a runtime from one of
//! its own worker threads panics, so [`run_blocking`] picks one of two paths:
//!
//! - no runtime on the calling thread: build a current-thread runtime right
//!   here and block on the future;
//! - a runtime is active: build the current-thread runtime on a scoped worker
//!   thread instead and join it.
//!
//! Either way the runtime lives exactly as long as the one call.

use magpie_types::{MagpieError, Result};
use std::{
    any::Any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    thread,
};
use tokio::runtime::{Builder, Handle};

/// Run `fut` to completion and return its output.
///
/// The future may borrow from the caller; it never outlives this call.
///
/// # Errors
///
/// Returns the future's own error, or [`MagpieError::Runtime`] if the runtime
/// cannot be built or the future panics.
pub fn run_blocking<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
    T: Send,
{
    if Handle::try_current().is_ok() {
        tracing::trace!("runtime active, bridging on a worker thread");
        thread::scope(|scope| {
            scope
                .spawn(|| block_on(fut))
                .join()
                .unwrap_or_else(|payload| Err(panicked(payload.as_ref())))
        })
    } else {
        panic::catch_unwind(AssertUnwindSafe(|| block_on(fut)))
            .unwrap_or_else(|payload| Err(panicked(payload.as_ref())))
    }
}

fn block_on<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| MagpieError::Runtime(format!("failed to build runtime: {e}")))?;
    rt.block_on(fut)
}

fn panicked(payload: &(dyn Any + Send)) -> MagpieError {
    let msg = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!(panic = %msg, "bridged operation panicked");
    MagpieError::Runtime(format!("operation panicked: {msg}"))
}
