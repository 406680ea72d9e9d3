//! # Reactive Action
//!
//! A coordination primitive that wraps a fallible, asynchronous unit of work
//! behind observable streams.
//!
//! An [`Action`] is built from a work factory (`input -> stream of
//! Result<output, failure>`) and an optional [`EnableCondition`]. It runs at
//! most one execution at a time, rejects inputs while disabled, and exposes:
//!
//! - [`Action::elements`]: output values, replaying the last one
//! - [`Action::errors`]: [`ActionError`] events, live only
//! - [`Action::is_executing`]: deduplicated executing state
//! - [`Action::is_enabled`]: deduplicated `!executing && condition`
//!
//! The crate does not pick an executor. Background work is handed to a
//! [`Spawner`]; smol, tokio and async-std implementations are available
//! behind cargo features.
//!
//! # Examples
//!
//! ```no_run
//! use futures::{stream, StreamExt};
//! use reactive_action::prelude::*;
//!
//! # #[cfg(feature = "smol")]
//! smol::block_on(async {
//!     let action = Action::new(SmolSpawner, |n: u32| {
//!         stream::once(async move { Ok::<_, String>(n * 2) })
//!     });
//!
//!     let mut elements = action.elements();
//!     action.execute(21);
//!     assert_eq!(elements.next().await, Some(42));
//! });
//! ```

#![warn(missing_docs)]

pub mod action;
pub mod condition;
pub mod config;
pub mod error;
pub mod execution;
pub mod runtime;
pub mod signal;

pub use action::{Action, ActionBuilder};
pub use condition::EnableCondition;
pub use config::ActionConfig;
pub use error::{ActionError, Error, Result};
pub use execution::{ExecutionId, WorkStream};
pub use runtime::{BoxTask, Spawner, current_runtime_spawner};
pub use signal::Observer;

#[cfg(feature = "smol")]
pub use runtime::SmolSpawner;

#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;

#[cfg(feature = "async-std")]
pub use runtime::AsyncStdSpawner;

/// Convenience prelude for reactive-action users
pub mod prelude {
    pub use crate::action::{Action, ActionBuilder};
    pub use crate::condition::EnableCondition;
    pub use crate::config::ActionConfig;
    pub use crate::error::ActionError;
    pub use crate::runtime::Spawner;
    pub use crate::signal::Observer;

    #[cfg(feature = "smol")]
    pub use crate::runtime::SmolSpawner;

    #[cfg(feature = "tokio")]
    pub use crate::runtime::TokioSpawner;

    #[cfg(feature = "async-std")]
    pub use crate::runtime::AsyncStdSpawner;
}
