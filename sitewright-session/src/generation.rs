//! The single in-flight generation and the backend it talks to.

use facet::Facet;
use futures::future::poll_fn;
use futures::stream::LocalBoxStream;
use futures::task::AtomicWaker;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;

use crate::context::PromptMessage;

/// Why a generation produced no new site.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum GenerationError {
    /// generation {id} is no longer in flight
    Stale { id: u64 },

    /// generation was cancelled
    Cancelled,

    /// {message}
    Transport { message: String },

    /// invalid model response: {message}
    InvalidResponse { message: String },

    /// unusable generated markup: {message}
    InvalidMarkup { message: String },
}

impl GenerationError {
    /// Cancellation is silent; everything else is shown to the user.
    pub fn is_visible(&self) -> bool {
        !matches!(self, GenerationError::Cancelled | GenerationError::Stale { .. })
    }
}

#[derive(Debug, Default)]
struct AbortState {
    aborted: AtomicBool,
    waker: AtomicWaker,
}

/// Shared stop signal for one generation. Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AbortState>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the stop and wake whoever awaits [`Self::aborted`].
    pub fn abort(&self) {
        self.0.aborted.store(true, Ordering::SeqCst);
        self.0.waker.wake();
    }

    pub fn is_aborted(&self) -> bool {
        self.0.aborted.load(Ordering::SeqCst)
    }

    /// Resolves once [`Self::abort`] has been called. Only the most recent
    /// waiter is woken.
    pub fn aborted(&self) -> impl Future<Output = ()> + 'static {
        let state = self.0.clone();
        poll_fn(move |cx| {
            if state.aborted.load(Ordering::SeqCst) {
                return Poll::Ready(());
            }
            state.waker.register(cx.waker());
            if state.aborted.load(Ordering::SeqCst) {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        })
    }
}

/// Ticket for a started generation. Operations on a ticket whose
/// generation was superseded or cancelled fail with
/// [`GenerationError::Stale`].
#[derive(Debug)]
pub struct Generation {
    pub(crate) id: u64,
    pub(crate) prompt: Vec<PromptMessage>,
    pub(crate) abort: AbortHandle,
}

impl Generation {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn prompt(&self) -> &[PromptMessage] {
        &self.prompt
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

/// Private state of the generation in flight.
#[derive(Debug)]
pub(crate) struct InFlight {
    pub(crate) id: u64,
    pub(crate) placeholder_id: String,
    pub(crate) buffer: String,
    pub(crate) abort: AbortHandle,
}

/// A streaming completion backend. Chunks are raw text; an `Err` chunk is a
/// transport failure.
pub trait CompletionClient {
    fn stream(&self, prompt: &[PromptMessage]) -> LocalBoxStream<'static, Result<String, String>>;
}

/// What a successful generation changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub version_id: String,
    pub explanation: String,
    /// Identifier → text of the new site
    pub editable: sitewright::ContentMap,
    /// Manual edits that no longer apply to the new site
    pub dropped_edits: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn abort_is_shared_between_clones() {
        let handle = AbortHandle::new();
        let other = handle.clone();
        assert!(!other.is_aborted());
        handle.abort();
        assert!(other.is_aborted());
    }

    #[test]
    fn aborted_resolves_after_abort() {
        use futures::FutureExt;

        let handle = AbortHandle::new();
        let mut waiting = Box::pin(handle.aborted());
        assert!((&mut waiting).now_or_never().is_none());
        handle.clone().abort();
        assert_eq!(waiting.now_or_never(), Some(()));
        assert_eq!(handle.aborted().now_or_never(), Some(()));
    }

    #[test]
    fn cancellation_is_silent() {
        assert!(!GenerationError::Cancelled.is_visible());
        assert!(
            GenerationError::Transport {
                message: "timeout".into()
            }
            .is_visible()
        );
        assert_eq!(
            GenerationError::InvalidResponse {
                message: "the model response has no html".into()
            }
            .to_string(),
            "invalid model response: the model response has no html"
        );
    }
}
