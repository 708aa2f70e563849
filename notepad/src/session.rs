//! Auth/session collaborator.
//!
//! The core never inspects why a fetch failed while priming categories or
//! refreshing the collection: every such failure is reported here as a
//! possible session expiry. Redirecting to a login view is the observer's job.

use std::sync::Arc;

pub trait SessionObserver: Send + Sync + 'static {
    fn on_auth_error(&self);
}

impl<F> SessionObserver for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn on_auth_error(&self) {
        self()
    }
}

pub type SharedSessionObserver = Arc<dyn SessionObserver>;

/// Observer that only logs; used when nothing upstream handles auth errors
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlySession;

impl SessionObserver for LogOnlySession {
    fn on_auth_error(&self) {
        tracing::warn!("Notes API rejected the request; session may have expired");
    }
}
