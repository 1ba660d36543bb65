//! Memoizing Wrappers
//!
//! Adapters that put a TTL cache in front of a callable:
//! - `Memoized` - free functions and closures
//! - `MemoizedMethod` - methods, partitioned by the owner's `Scope`
//! - `AsyncMemoized` - async callables on tokio

mod async_fn;
mod engine;
mod function;
mod method;

pub use async_fn::AsyncMemoized;
pub use function::Memoized;
pub use method::MemoizedMethod;
