//! Host-facing collaborators
//!
//! - [`ExtractCallback`]: progress, prompts, messages and result notifications
//! - [`PathFilter`]: per-item include/exclude decision, made before any work
//! - [`NoOpCallback`] / [`AcceptAll`]: defaults for unattended runs

mod noop;
mod traits;

pub use noop::NoOpCallback;
pub use traits::{AcceptAll, ExtractCallback, PathFilter};
