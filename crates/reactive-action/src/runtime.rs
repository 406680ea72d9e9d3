//! Runtime-agnostic task spawning
//!
//! An action never picks an executor itself. Execution drivers, the enable
//! condition watcher and bound input pumps are handed to a [`Spawner`] the
//! caller provides. Cancellation is done with abort handles owned by the
//! action, so a spawner only ever has to poll futures to completion.

use futures::future::BoxFuture;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A background unit of work owned by an action
pub type BoxTask = BoxFuture<'static, ()>;

/// Something that can run futures in the background
pub trait Spawner: Send + Sync {
    /// Run the task to completion in the background
    fn spawn(&self, task: BoxTask);
}

impl<S: Spawner + ?Sized> Spawner for Arc<S> {
    fn spawn(&self, task: BoxTask) {
        (**self).spawn(task);
    }
}

impl<S: Spawner + ?Sized> Spawner for Box<S> {
    fn spawn(&self, task: BoxTask) {
        (**self).spawn(task);
    }
}

/// Resolve a spawner for the runtime driving the calling thread
///
/// Only tokio exposes reliable detection; smol and async-std users pass
/// their spawner explicitly.
pub fn current_runtime_spawner() -> Result<Arc<dyn Spawner>> {
    #[cfg(feature = "tokio")]
    {
        if let Ok(handle) = ::tokio::runtime::Handle::try_current() {
            return Ok(Arc::new(self::tokio_rt::TokioSpawner::new(handle)));
        }
    }

    Err(Error::NoRuntime)
}

#[cfg(feature = "smol")]
pub use self::smol_rt::SmolSpawner;

#[cfg(feature = "tokio")]
pub use self::tokio_rt::TokioSpawner;

#[cfg(feature = "async-std")]
pub use self::async_std_rt::AsyncStdSpawner;

#[cfg(feature = "smol")]
mod smol_rt {
    use super::{BoxTask, Spawner};

    /// Spawner for smol's global executor
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SmolSpawner;

    impl Spawner for SmolSpawner {
        fn spawn(&self, task: BoxTask) {
            ::smol::spawn(task).detach();
        }
    }
}

#[cfg(feature = "tokio")]
mod tokio_rt {
    use super::{BoxTask, Spawner};
    use ::tokio::runtime::Handle;

    /// Spawner bound to a tokio runtime
    ///
    /// Holding the handle lets the action be driven from threads that are not
    /// part of the runtime.
    #[derive(Debug, Clone)]
    pub struct TokioSpawner {
        handle: Handle,
    }

    impl TokioSpawner {
        /// Spawn onto the given runtime
        pub fn new(handle: Handle) -> Self {
            Self { handle }
        }

        /// Spawn onto the runtime of the calling thread
        ///
        /// Returns `None` outside of a tokio runtime.
        pub fn current() -> Option<Self> {
            Handle::try_current().ok().map(Self::new)
        }
    }

    impl Spawner for TokioSpawner {
        fn spawn(&self, task: BoxTask) {
            // JoinHandle detaches on drop
            self.handle.spawn(task);
        }
    }
}

#[cfg(feature = "async-std")]
mod async_std_rt {
    use super::{BoxTask, Spawner};

    /// Spawner for async-std's global executor
    #[derive(Debug, Clone, Copy, Default)]
    pub struct AsyncStdSpawner;

    impl Spawner for AsyncStdSpawner {
        fn spawn(&self, task: BoxTask) {
            ::async_std::task::spawn(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "tokio"))]
    #[test]
    fn test_no_runtime_detected() {
        assert!(matches!(current_runtime_spawner(), Err(Error::NoRuntime)));
    }

    #[cfg(feature = "smol")]
    #[smol_potat::test]
    async fn test_smol_spawner() {
        let spawner = SmolSpawner;
        let (tx, rx) = async_channel::bounded(1);

        spawner.spawn(Box::pin(async move {
            tx.send(42).await.unwrap();
        }));

        assert_eq!(rx.recv().await.unwrap(), 42);
    }

    #[cfg(feature = "smol")]
    #[smol_potat::test]
    async fn test_shared_spawner_forwards() {
        let spawner: Arc<dyn Spawner> = Arc::new(SmolSpawner);
        let (tx, rx) = async_channel::bounded(1);

        spawner.spawn(Box::pin(async move {
            tx.send("forwarded").await.unwrap();
        }));

        assert_eq!(rx.recv().await.unwrap(), "forwarded");
    }

    #[cfg(feature = "tokio")]
    #[tokio::test]
    async fn test_tokio_spawner_detected() {
        let spawner = current_runtime_spawner().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        spawner.spawn(Box::pin(async move {
            tx.send(123).unwrap();
        }));

        assert_eq!(rx.await.unwrap(), 123);
    }

    #[cfg(feature = "tokio")]
    #[test]
    fn test_tokio_spawner_outside_runtime() {
        assert!(TokioSpawner::current().is_none());
        assert!(matches!(current_runtime_spawner(), Err(Error::NoRuntime)));
    }
}
