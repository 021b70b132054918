//! Core engines for drift
//!
//! This crate provides:
//! - Normalized change representation (tagged kind + metadata)
//! - Path template matcher (`$user`/`$path` formats)
//! - Event decoder (JSON and legacy pipe payloads)
//! - Blocking listen loop with cooperative shutdown
//! - Change dispatcher with the dangling-transaction safety net
//!
//! All external collaborators (queue transport, mount resolution, index
//! mutation) are consumed through traits so the engines can be exercised
//! with in-memory fakes.

pub mod change;
pub mod decode;
pub mod dispatch;
pub mod listen;
pub mod template;

// Re-exports
pub use change::{Change, ChangeKind};
pub use decode::{DiagnosticSink, EventDecoder};
pub use dispatch::{
    CacheUpdater, ChangeDispatcher, DispatchError, MountPoint, MountResolver, UpdateError,
};
pub use listen::{Flow, Listener, Queue, QueueError};
pub use template::{PathMatchError, PathTemplate, TemplateError};
