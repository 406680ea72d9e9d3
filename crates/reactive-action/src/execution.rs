//! A single invocation of an action's work factory
//!
//! Each accepted input gets an [`ExecutionId`] and an abort handle. The
//! driver future polls the work stream and reports into an
//! [`ExecutionSink`], which decides whether the execution is still the
//! current one. Output from an execution that was cancelled or superseded is
//! discarded by the sink even if the producer has not noticed the abort yet.
//!
//! A driver always settles its execution. If the work stream panics, or the
//! runtime drops the driver before the stream ends, the sink is told the
//! execution was abandoned so the action never stays stuck executing.

use futures::FutureExt;
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use futures::stream::{BoxStream, StreamExt};
use std::fmt;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;

/// The asynchronous unit of work produced for one input
///
/// Each `Ok` item is an output value. The first `Err` item terminates the
/// execution as a failure. The end of the stream is normal completion.
pub type WorkStream<O, F> = BoxStream<'static, Result<O, F>>;

/// Identity of one work factory invocation within an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub(crate) fn first() -> Self {
        Self(1)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an execution ended without being cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Termination<F> {
    Completed,
    Failed(F),
    /// The work stream panicked or its driver was dropped
    Abandoned,
}

/// The live handle to an in-flight execution
#[derive(Debug)]
pub(crate) struct Execution {
    id: ExecutionId,
    abort: AbortHandle,
}

impl Execution {
    /// Register a new execution. The returned registration must wrap the
    /// work stream so that [`Execution::abort`] can stop it.
    pub(crate) fn start(id: ExecutionId) -> (Self, AbortRegistration) {
        let (abort, registration) = AbortHandle::new_pair();
        (Self { id, abort }, registration)
    }

    pub(crate) fn id(&self) -> ExecutionId {
        self.id
    }

    /// Stop the producer. Aborting before the driver first polls is fine:
    /// the stream then yields nothing.
    pub(crate) fn abort(self) {
        self.abort.abort();
    }
}

/// Receiver of everything a driver observes
pub(crate) trait ExecutionSink<O, F>: Send + 'static {
    /// Forward one output value. Returning `false` stops the driver.
    fn element(&self, id: ExecutionId, value: O) -> bool;

    /// Record that the work stream ended by itself
    fn terminate(&self, id: ExecutionId, termination: Termination<F>);
}

/// Reports an execution as abandoned if its driver goes away unsettled
struct Settlement<S, O, F>
where
    S: ExecutionSink<O, F>,
{
    id: ExecutionId,
    sink: S,
    settled: bool,
    _items: PhantomData<fn(O, F)>,
}

impl<S, O, F> Settlement<S, O, F>
where
    S: ExecutionSink<O, F>,
{
    fn new(id: ExecutionId, sink: S) -> Self {
        Self {
            id,
            sink,
            settled: false,
            _items: PhantomData,
        }
    }

    fn element(&mut self, value: O) -> bool {
        let accepted = self.sink.element(self.id, value);
        if !accepted {
            self.settled = true;
        }
        accepted
    }

    fn terminate(&mut self, termination: Termination<F>) {
        self.settled = true;
        self.sink.terminate(self.id, termination);
    }

    /// The execution was cancelled or superseded; nothing left to report
    fn release(&mut self) {
        self.settled = true;
    }
}

impl<S, O, F> Drop for Settlement<S, O, F>
where
    S: ExecutionSink<O, F>,
{
    fn drop(&mut self) {
        if !self.settled {
            self.sink.terminate(self.id, Termination::Abandoned);
        }
    }
}

/// Poll `work` until it ends, fails or is aborted, reporting into `sink`
pub(crate) async fn drive<O, F, S>(
    id: ExecutionId,
    work: WorkStream<O, F>,
    registration: AbortRegistration,
    sink: S,
) where
    S: ExecutionSink<O, F>,
{
    let mut settlement = Settlement::new(id, sink);
    let mut work = Abortable::new(work, registration);

    loop {
        let Ok(item) = AssertUnwindSafe(work.next()).catch_unwind().await else {
            settlement.terminate(Termination::Abandoned);
            return;
        };
        match item {
            Some(Ok(value)) => {
                if !settlement.element(value) {
                    return;
                }
            }
            Some(Err(failure)) => {
                settlement.terminate(Termination::Failed(failure));
                return;
            }
            None => break,
        }
    }

    // An aborted stream ends early; cancellation reports nothing
    if work.is_aborted() {
        settlement.release();
    } else {
        settlement.terminate(Termination::Completed);
    }
}
