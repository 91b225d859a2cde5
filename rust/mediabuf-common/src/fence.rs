//! The fence boundary: an opaque synchronization token signaling when a
//! producer's writes are safely observable by a consumer.
//!
//! The model performs no implicit synchronization beyond exposing the fence
//! token. A reader that waits on the fence returned by `share()` before
//! dereferencing a view is guaranteed to observe all writes the producer
//! issued before sharing; wait discipline is the caller's responsibility.
//! Fence internals are supplied by the integration (a semaphore, a
//! completion token, a driver sync object).

use std::sync::Arc;
use std::time::Duration;

use crate::Result;

/// An opaque synchronization token with wait/signal semantics.
pub trait Fence: Send + Sync {
    /// Blocks until the fence signals.
    ///
    /// `timeout` of `None` waits indefinitely. Expiry of a finite timeout
    /// yields a `TimedOut` error; the fence remains valid and may be waited
    /// on again.
    fn wait(&self, timeout: Option<Duration>) -> Result<()>;

    /// Returns `true` if the fence has already signaled.
    ///
    /// A `true` result is sticky: once ready, a fence stays ready.
    fn is_ready(&self) -> bool;
}

/// A shared handle to a fence.
pub type SharedFence = Arc<dyn Fence>;

/// Returns the always-ready fence, for producers that synchronize by other
/// means (or not at all, in single-threaded use).
pub fn ready() -> SharedFence {
    static FENCE: std::sync::OnceLock<SharedFence> = std::sync::OnceLock::new();
    FENCE.get_or_init(|| Arc::new(ReadyFence)).clone()
}

struct ReadyFence;

impl Fence for ReadyFence {
    fn wait(&self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }

    fn is_ready(&self) -> bool {
        true
    }
}
