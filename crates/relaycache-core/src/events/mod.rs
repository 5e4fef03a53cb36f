//! Update notification for cache writes.
//!
//! Every write dispatches the key's own hooks and then every global hook.
//!
//! ```text
//!                 Cache::write(key, value)
//!                           │
//!                 SubscriptionRegistry::notify_write
//!          ┌────────────────┼────────────────┐
//!          ▼                ▼                ▼
//!    ┌──────────┐     ┌──────────┐     ┌──────────┐
//!    │ Key hook │     │ Global 1 │     │ Global 2 │
//!    │ (task)   │     │ (task)   │     │ (task)   │
//!    └──────────┘     └──────────┘     └──────────┘
//! ```
//!
//! - [`hooks`]: Hook traits, closure adapters and error types
//! - [`registry`]: Per-key and global hook registry with isolated dispatch

pub mod hooks;
pub mod registry;

pub use hooks::{FnKeyHook, FnUpdateHook, HookError, KeyHook, UpdateHook};
pub use registry::{DEFAULT_HOOK_TIMEOUT, SubscriptionRegistry};
