// src/router/middleware/recoverer.rs
// Converts a handler panic into an ordinary error so the rest of the
// middleware chain (retry, poison, circuit breaker) sees a uniform
// Result instead of an unwind, via `futures::FutureExt::catch_unwind`
// (`futures` is already a teacher dependency).

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::MemoriaError;

/// Runs `fut` to completion, turning a panic into `MemoriaError::Internal`.
pub async fn recover<Fut>(fut: Fut) -> Result<(), MemoriaError>
where
    Fut: Future<Output = Result<(), MemoriaError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic_message(&panic);
            Err(MemoriaError::internal(format!("task handler panicked: {message}")))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
