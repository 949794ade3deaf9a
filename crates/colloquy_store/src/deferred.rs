//! Deferred actions.
//!
//! A deferred action is an action whose value is still being computed. The
//! store resolves it before it enters the middleware chain: only the
//! dispatch call that submitted it is suspended, and a failure of the
//! computation fails that dispatch.

use core::any::Any;
use core::future::Future;
use core::pin::Pin;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::action::Action;
use crate::store::{BoxError, StoreError};

/// A boxed future that is Send.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A pending computation that will produce an [`Action`].
///
/// [`Store::dispatch_deferred`](crate::store::Store::dispatch_deferred)
/// accepts any such future; this boxed form lets deferred actions of
/// different origins be held in one collection before dispatch.
pub type DeferredAction = BoxFuture<'static, Result<Action, BoxError>>;

/// Awaits `deferred`, converting failures and panics into [`StoreError`]s.
pub(crate) async fn resolve<F, E>(deferred: F) -> Result<Action, StoreError>
where
    F: Future<Output = Result<Action, E>>,
    E: Into<BoxError>,
{
    match AssertUnwindSafe(deferred).catch_unwind().await {
        Ok(Ok(action)) => Ok(action),
        Ok(Err(err)) => Err(StoreError::DeferredAction(err.into())),
        Err(panic) => Err(StoreError::DeferredPanicked(describe_panic(&*panic))),
    }
}

/// Extracts a readable message from a panic payload.
#[must_use]
pub fn describe_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_str_and_string_panics() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(describe_panic(&*payload), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(describe_panic(&*payload), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(describe_panic(&*payload), "unknown panic payload");
    }
}
