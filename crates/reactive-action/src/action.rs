//! The action state machine
//!
//! An [`Action`] wraps a fallible, asynchronous unit of work behind four
//! observable streams and two commands. At most one execution is in flight at
//! a time and inputs are gated on `!executing && condition`.
//!
//! All state lives behind a single lock. Every transition, whether it comes
//! from a command, a work stream or the enable condition, recomputes the
//! derived signals and notifies observers before the lock is released, so
//! observers see one strictly ordered sequence of events. For one accepted
//! input that sequence is always `is_executing = true`, zero or more
//! elements, `is_executing = false`, then at most one error.

use futures::future::{AbortHandle, Abortable};
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, trace, warn};

use crate::condition::EnableCondition;
use crate::config::ActionConfig;
use crate::error::{ActionError, Result};
use crate::execution::{self, Execution, ExecutionId, ExecutionSink, Termination, WorkStream};
use crate::runtime::Spawner;
use crate::signal::{Broadcast, Observer, Replay, StateSignal};

type WorkFactory<I, O, F> = Box<dyn Fn(I) -> WorkStream<O, F> + Send + Sync>;

/// A single-flight, gated asynchronous action
///
/// Dropping the action disposes it: the in-flight execution is cancelled,
/// every background task it owns is aborted and all observer streams end.
pub struct Action<I, O, F> {
    inner: Arc<Inner<I, O, F>>,
}

struct Inner<I, O, F> {
    name: Arc<str>,
    work_factory: WorkFactory<I, O, F>,
    spawner: Arc<dyn Spawner>,
    state: Mutex<State<O, F>>,
}

struct State<O, F> {
    is_executing: StateSignal<bool>,
    is_enabled: StateSignal<bool>,
    condition: bool,
    elements: Replay<O>,
    errors: Broadcast<ActionError<F>>,
    current: Option<Execution>,
    next_execution: ExecutionId,
    background: Vec<AbortHandle>,
    disposed: bool,
}

impl<O, F> State<O, F> {
    fn new(name: &Arc<str>, condition: bool, capacity: Option<usize>) -> Self {
        Self {
            is_executing: StateSignal::new(false, Arc::clone(name), "is_executing", capacity),
            is_enabled: StateSignal::new(condition, Arc::clone(name), "is_enabled", capacity),
            condition,
            elements: Replay::new(Arc::clone(name), "elements", capacity),
            errors: Broadcast::new(Arc::clone(name), "errors", capacity),
            current: None,
            next_execution: ExecutionId::first(),
            background: Vec::new(),
            disposed: false,
        }
    }

    fn current_id(&self) -> Option<ExecutionId> {
        self.current.as_ref().map(Execution::id)
    }

    fn set_executing(&mut self, executing: bool) {
        if self.is_executing.set(executing) {
            self.refresh_enabled();
        }
    }

    fn set_condition(&mut self, condition: bool) {
        self.condition = condition;
        self.refresh_enabled();
    }

    fn refresh_enabled(&mut self) {
        let enabled = !self.is_executing.get() && self.condition;
        self.is_enabled.set(enabled);
    }
}

impl<I, O, F> Action<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Create an always-enabled action with default settings
    pub fn new<S, W, St>(spawner: S, work_factory: W) -> Self
    where
        S: Spawner + 'static,
        W: Fn(I) -> St + Send + Sync + 'static,
        St: Stream<Item = std::result::Result<O, F>> + Send + 'static,
    {
        Self::assemble(
            Arc::new(spawner),
            box_factory(work_factory),
            EnableCondition::always(),
            ActionConfig::default(),
        )
    }

    /// Start configuring an action
    pub fn builder<S, W, St>(spawner: S, work_factory: W) -> ActionBuilder<I, O, F>
    where
        S: Spawner + 'static,
        W: Fn(I) -> St + Send + Sync + 'static,
        St: Stream<Item = std::result::Result<O, F>> + Send + 'static,
    {
        ActionBuilder {
            spawner: Arc::new(spawner),
            work_factory: box_factory(work_factory),
            condition: EnableCondition::default(),
            config: ActionConfig::default(),
        }
    }

    fn assemble(
        spawner: Arc<dyn Spawner>,
        work_factory: WorkFactory<I, O, F>,
        condition: EnableCondition,
        config: ActionConfig,
    ) -> Self {
        let name: Arc<str> = Arc::from(config.name.as_str());
        let state = State::new(&name, condition.initial(), config.observer_capacity);
        let inner = Arc::new(Inner {
            name,
            work_factory,
            spawner,
            state: Mutex::new(state),
        });

        if let Some(updates) = condition.into_updates() {
            let weak = Arc::downgrade(&inner);
            inner.spawn_owned(async move {
                let mut updates = updates;
                while let Some(value) = updates.next().await {
                    let Some(inner) = weak.upgrade() else { break };
                    inner.apply_condition(value);
                }
            });
        }

        debug!(action = %inner.name, "Action created");
        Self { inner }
    }

    /// Submit an input
    ///
    /// If the action is enabled at the moment of the call, any live execution
    /// is cancelled and a new one starts for `input`. Otherwise a
    /// [`ActionError::NotEnabled`] event is published on [`Action::errors`].
    /// Never blocks and never fails.
    pub fn execute(&self, input: I) {
        self.inner.execute(input);
    }

    /// Cancel the live execution, if any
    ///
    /// Idempotent. Publishes no error; the cancelled execution's later
    /// output is discarded.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Output values; the most recent one is replayed to new observers
    pub fn elements(&self) -> Observer<O> {
        self.inner.lock().elements.subscribe()
    }

    /// Rejections and failures; live only
    pub fn errors(&self) -> Observer<ActionError<F>> {
        self.inner.lock().errors.subscribe()
    }

    /// Executing state, starting with the current value, deduplicated
    pub fn is_executing(&self) -> Observer<bool> {
        self.inner.lock().is_executing.subscribe()
    }

    /// Enabled state (`!executing && condition`), starting with the current
    /// value, deduplicated
    pub fn is_enabled(&self) -> Observer<bool> {
        self.inner.lock().is_enabled.subscribe()
    }

    /// Whether an execution is in flight right now
    pub fn is_executing_now(&self) -> bool {
        self.inner.lock().is_executing.get()
    }

    /// Whether an input submitted right now would be accepted
    pub fn is_enabled_now(&self) -> bool {
        self.inner.lock().is_enabled.get()
    }

    /// The most recently produced output value
    pub fn last_element(&self) -> Option<O> {
        self.inner.lock().elements.latest().cloned()
    }

    /// The label used in log events
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Feed every item of `inputs` to [`Action::execute`]
    ///
    /// The pump is owned by the action and stops on disposal.
    pub fn bind_inputs<S>(&self, inputs: S)
    where
        S: Stream<Item = I> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        self.inner.spawn_owned(async move {
            let mut inputs = inputs.boxed();
            while let Some(input) = inputs.next().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.execute(input);
            }
        });
    }

    /// Call [`Action::cancel`] for every item of `cancellations`
    ///
    /// The pump is owned by the action and stops on disposal.
    pub fn bind_cancellations<S, T>(&self, cancellations: S)
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        self.inner.spawn_owned(async move {
            let mut cancellations = cancellations.boxed();
            while cancellations.next().await.is_some() {
                let Some(inner) = weak.upgrade() else { break };
                inner.cancel();
            }
        });
    }

    /// Tear the action down now rather than on drop
    pub fn dispose(self) {
        drop(self);
    }
}

impl<I, O, F> Drop for Action<I, O, F> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl<I, O, F> fmt::Debug for Action<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Action")
            .field("name", &self.inner.name)
            .field("current", &state.current_id())
            .field("condition", &state.condition)
            .field("error_observers", &state.errors.observer_count())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<I, O, F> Inner<I, O, F> {
    fn lock(&self) -> MutexGuard<'_, State<O, F>> {
        // Transitions complete before the guard is released, so a poisoned
        // lock still holds consistent state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispose(&self) {
        let mut state = self.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;

        if let Some(execution) = state.current.take() {
            debug!(action = %self.name, execution = %execution.id(), "Cancelling execution on disposal");
            execution.abort();
        }
        state.set_executing(false);
        for handle in state.background.drain(..) {
            handle.abort();
        }

        state.is_executing.close();
        state.is_enabled.close();
        state.elements.close();
        state.errors.close();
        debug!(action = %self.name, "Action disposed");
    }
}

impl<I, O, F> Inner<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Spawn a background task that is aborted on disposal
    ///
    /// A task that finishes on its own drops its handle from the action.
    fn spawn_owned<Fut>(self: &Arc<Self>, task: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.background.push(handle.clone());
        }
        let weak = Arc::downgrade(self);
        self.spawner.spawn(Box::pin(async move {
            if Abortable::new(task, registration).await.is_ok() {
                handle.abort();
                if let Some(inner) = weak.upgrade() {
                    inner.lock().background.retain(|task| !task.is_aborted());
                }
            }
        }));
    }

    fn execute(self: &Arc<Self>, input: I) {
        let (id, registration) = {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            if !state.is_enabled.get() {
                debug!(action = %self.name, "Input rejected, action not enabled");
                state.errors.publish(ActionError::NotEnabled);
                return;
            }
            if let Some(previous) = state.current.take() {
                debug!(action = %self.name, execution = %previous.id(), "Cancelling superseded execution");
                previous.abort();
            }

            let id = state.next_execution;
            state.next_execution = id.next();
            let (execution, registration) = Execution::start(id);
            state.current = Some(execution);
            state.set_executing(true);
            debug!(action = %self.name, execution = %id, "Execution started");
            (id, registration)
        };

        // The factory runs outside the lock so it may call back into the
        // action. A cancel or disposal that lands in between leaves the
        // registration aborted, so the driver drops the work unpolled.
        if !self.is_current(id) {
            trace!(action = %self.name, execution = %id, "Execution ended before the factory ran");
            return;
        }
        let work = (self.work_factory)(input);
        if !self.is_current(id) {
            trace!(action = %self.name, execution = %id, "Dropping work of an ended execution");
            return;
        }
        let sink = Arc::downgrade(self);
        self.spawner.spawn(Box::pin(execution::drive(id, work, registration, sink)));
    }

    fn is_current(&self, id: ExecutionId) -> bool {
        let state = self.lock();
        !state.disposed && state.current_id() == Some(id)
    }

    fn cancel(&self) {
        let mut state = self.lock();
        if let Some(execution) = state.current.take() {
            debug!(action = %self.name, execution = %execution.id(), "Execution cancelled");
            execution.abort();
        }
        state.set_executing(false);
    }

    fn apply_condition(&self, condition: bool) {
        let mut state = self.lock();
        if state.disposed || state.condition == condition {
            return;
        }
        debug!(action = %self.name, condition, "Enable condition changed");
        state.set_condition(condition);
    }
}

impl<I, O, F> ExecutionSink<O, F> for Weak<Inner<I, O, F>>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    fn element(&self, id: ExecutionId, value: O) -> bool {
        let Some(inner) = self.upgrade() else {
            return false;
        };
        let mut state = inner.lock();
        if state.disposed || state.current_id() != Some(id) {
            trace!(action = %inner.name, execution = %id, "Discarding output of stale execution");
            return false;
        }
        trace!(action = %inner.name, execution = %id, "Forwarding element");
        state.elements.publish(value);
        true
    }

    fn terminate(&self, id: ExecutionId, termination: Termination<F>) {
        let Some(inner) = self.upgrade() else {
            return;
        };
        let mut state = inner.lock();
        if state.disposed || state.current_id() != Some(id) {
            trace!(action = %inner.name, execution = %id, "Ignoring termination of stale execution");
            return;
        }
        state.current = None;
        state.set_executing(false);

        match termination {
            Termination::Completed => {
                debug!(action = %inner.name, execution = %id, "Execution completed");
            }
            Termination::Failed(failure) => {
                debug!(action = %inner.name, execution = %id, "Execution failed");
                state.errors.publish(ActionError::Failed(failure));
            }
            Termination::Abandoned => {
                warn!(
                    action = %inner.name,
                    execution = %id,
                    "Execution abandoned without completing"
                );
            }
        }
    }
}

fn box_factory<I, O, F, W, St>(work_factory: W) -> WorkFactory<I, O, F>
where
    W: Fn(I) -> St + Send + Sync + 'static,
    St: Stream<Item = std::result::Result<O, F>> + Send + 'static,
{
    Box::new(move |input| work_factory(input).boxed())
}

/// Configures an [`Action`] before it is created
pub struct ActionBuilder<I, O, F> {
    spawner: Arc<dyn Spawner>,
    work_factory: WorkFactory<I, O, F>,
    condition: EnableCondition,
    config: ActionConfig,
}

impl<I, O, F> ActionBuilder<I, O, F>
where
    I: Send + 'static,
    O: Clone + Send + 'static,
    F: Clone + Send + 'static,
{
    /// Gate inputs on an external condition in addition to the executing state
    pub fn enable_condition(mut self, condition: impl Into<EnableCondition>) -> Self {
        self.condition = condition.into();
        self
    }

    /// Replace the default settings
    pub fn config(mut self, config: ActionConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate the settings and create the action
    pub fn build(self) -> Result<Action<I, O, F>> {
        self.config.validate()?;
        Ok(Action::assemble(
            self.spawner,
            self.work_factory,
            self.condition,
            self.config,
        ))
    }
}

impl<I, O, F> fmt::Debug for ActionBuilder<I, O, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBuilder")
            .field("condition", &self.condition)
            .field("config", &self.config)
            .finish()
    }
}
