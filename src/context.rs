//! Per-call validation context.
//!
//! [`ValidationContext`] carries the shared schema arena, the options, and a
//! cancellation token through a validation pass. It is cheap to clone; the
//! arena is shared through an `Arc` and only read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::options::ValidatorOptions;
use crate::schema::SchemaArena;

/// Cooperative cancellation signal.
///
/// Clones observe the same flag, so the request owner keeps one clone and
/// hands another to the validator.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Everything a validation pass needs besides the request itself.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    arena: Arc<SchemaArena>,
    options: ValidatorOptions,
    cancel: CancelToken,
}

impl ValidationContext {
    pub fn new(arena: Arc<SchemaArena>) -> Self {
        Self {
            arena,
            options: ValidatorOptions::default(),
            cancel: CancelToken::default(),
        }
    }

    pub fn with_options(mut self, options: ValidatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn arena(&self) -> &SchemaArena {
        &self.arena
    }

    pub fn shared_arena(&self) -> &Arc<SchemaArena> {
        &self.arena
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_cancellation() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn context_uses_given_token() {
        let token = CancelToken::new();
        let ctx =
            ValidationContext::new(Arc::new(SchemaArena::new())).with_cancel_token(token.clone());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
