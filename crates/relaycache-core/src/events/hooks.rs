//! Hook traits for cache update notifications.
//!
//! Hooks are asynchronous handlers that react to writes.
//! They are designed to be:
//! - **Async**: Non-blocking, run in separate tokio tasks
//! - **Isolated**: Errors in one hook don't affect others or the writer
//! - **Composable**: Multiple hooks can react to the same write

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;

/// Error type for hook operations.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Hook execution failed with a message.
    #[error("Hook execution failed: {0}")]
    Execution(String),
}

impl HookError {
    /// Create an execution error from a string.
    pub fn execution(msg: impl Into<String>) -> Self {
        HookError::Execution(msg.into())
    }
}

// ============================================================================
// Hook Traits
// ============================================================================

/// Hook fired with the written key on every write to any key.
///
/// # Implementation Notes
///
/// - Hooks should be quick and non-blocking
/// - Errors are logged but don't propagate to the writer
/// - Hooks run in isolated tokio tasks with panic protection
#[async_trait]
pub trait UpdateHook<K>: Send + Sync {
    /// Unique name for this hook (for logging).
    fn name(&self) -> &str;

    /// Handle a write to `key`.
    async fn on_update(&self, key: &K) -> Result<(), HookError>;

    /// Check if this hook should handle the given key.
    ///
    /// Default implementation returns true for all keys.
    fn matches(&self, _key: &K) -> bool {
        true
    }
}

/// Hook bound to a single key, fired each time that key is written.
#[async_trait]
pub trait KeyHook: Send + Sync {
    /// Unique name for this hook (for logging).
    fn name(&self) -> &str;

    /// Handle a write to the bound key.
    async fn on_update(&self) -> Result<(), HookError>;
}

// ============================================================================
// Closure adapters
// ============================================================================

/// Adapts a plain `Fn()` closure to a [`KeyHook`].
pub struct FnKeyHook<F> {
    name: String,
    f: F,
}

impl<F> FnKeyHook<F>
where
    F: Fn() + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F> KeyHook for FnKeyHook<F>
where
    F: Fn() + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_update(&self) -> Result<(), HookError> {
        (self.f)();
        Ok(())
    }
}

/// Adapts a plain `Fn(K)` closure to an [`UpdateHook`].
pub struct FnUpdateHook<K, F> {
    name: String,
    f: F,
    _key: PhantomData<fn(K)>,
}

impl<K, F> FnUpdateHook<K, F>
where
    F: Fn(K) + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
            _key: PhantomData,
        }
    }
}

#[async_trait]
impl<K, F> UpdateHook<K> for FnUpdateHook<K, F>
where
    K: Clone + Send + Sync + 'static,
    F: Fn(K) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_update(&self, key: &K) -> Result<(), HookError> {
        (self.f)(key.clone());
        Ok(())
    }
}

impl<F> fmt::Debug for FnKeyHook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnKeyHook").field("name", &self.name).finish()
    }
}

impl<K, F> fmt::Debug for FnUpdateHook<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnUpdateHook")
            .field("name", &self.name)
            .finish()
    }
}
