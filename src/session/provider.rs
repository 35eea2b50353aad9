//! Session/account provider seam.

/// Supplies the identity context under which cycles and calls execute.
///
/// The engine compares the provider's answers across ticks to detect
/// account switches and logouts; it never caches beyond one tick.
pub trait SessionProvider: Send + Sync {
    /// Session identifier currently visible in the host application, if
    /// any.
    fn current_session_id(&self) -> Option<String>;

    /// Session identifier that is actually authenticated. Defaults to
    /// [`current_session_id`](Self::current_session_id); providers that
    /// can distinguish a stale visible identity from a live login should
    /// override this.
    fn current_authenticated_session_id(&self) -> Option<String> {
        self.current_session_id()
    }
}
