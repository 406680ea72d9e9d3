//! Common test utilities for reactive-action integration tests

#![allow(dead_code)]

use async_channel::{Receiver, Sender};
use futures::StreamExt;
use reactive_action::Observer;
use smol::Timer;
use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Upper bound for anything the test expects to happen
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a stream must stay silent to count as quiet
pub const QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Failure type used by test work factories
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TestFailure {
    /// The work took too long
    #[error("timed out")]
    Timeout,
    /// The work was refused
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Item type of every scripted work stream
pub type WorkItem = Result<u32, TestFailure>;

/// Install a log subscriber controlled by `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Next value of `observer`, or `None` if it ended or stayed silent for `timeout`
pub async fn next_within<T>(observer: &mut Observer<T>, timeout: Duration) -> Option<T> {
    smol::future::or(observer.next(), async {
        Timer::after(timeout).await;
        None
    })
    .await
}

/// Next value of `observer`, failing the test if none arrives in time
pub async fn expect_next<T>(observer: &mut Observer<T>) -> T {
    match next_within(observer, STEP_TIMEOUT).await {
        Some(value) => value,
        None => panic!("observer produced nothing within {:?}", STEP_TIMEOUT),
    }
}

/// Fail the test if `observer` produces a value within the quiet period
pub async fn assert_quiet<T: Debug>(observer: &mut Observer<T>) {
    if let Some(value) = next_within(observer, QUIET_PERIOD).await {
        panic!("expected no value, got {:?}", value);
    }
}

/// Assert the observer ended rather than just being silent
pub async fn assert_ended<T: Debug>(observer: &mut Observer<T>) {
    let outcome = smol::future::or(async { Ok(observer.next().await) }, async {
        Timer::after(STEP_TIMEOUT).await;
        Err(())
    })
    .await;
    match outcome {
        Ok(None) => {}
        Ok(Some(value)) => panic!("expected stream end, got {:?}", value),
        Err(()) => panic!("stream did not end within {:?}", STEP_TIMEOUT),
    }
}

/// Poll `condition` until it holds, failing the test after the step timeout
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + STEP_TIMEOUT;
    while !condition() {
        assert!(
            std::time::Instant::now() < deadline,
            "condition not reached within {:?}",
            STEP_TIMEOUT
        );
        Timer::after(Duration::from_millis(5)).await;
    }
}

/// Work factory whose executions are driven by the test
///
/// Every invocation opens a fresh channel; the test feeds execution `n`
/// through [`ScriptedWork::execution`] and completes it by closing it.
#[derive(Clone, Default)]
pub struct ScriptedWork {
    executions: Arc<Mutex<Vec<Sender<WorkItem>>>>,
    inputs: Arc<Mutex<Vec<u32>>>,
}

impl ScriptedWork {
    /// Create an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// The factory to hand to an action
    pub fn factory(&self) -> impl Fn(u32) -> Receiver<WorkItem> + Send + Sync + 'static {
        let script = self.clone();
        move |input| {
            let (sender, receiver) = async_channel::unbounded();
            script.executions.lock().unwrap().push(sender);
            script.inputs.lock().unwrap().push(input);
            receiver
        }
    }

    /// Producer side of the `index`-th invocation
    pub fn execution(&self, index: usize) -> Sender<WorkItem> {
        self.executions.lock().unwrap()[index].clone()
    }

    /// Number of times the factory was invoked
    pub fn invocations(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    /// Inputs the factory was invoked with, in order
    pub fn inputs(&self) -> Vec<u32> {
        self.inputs.lock().unwrap().clone()
    }
}
