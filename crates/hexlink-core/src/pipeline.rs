//! # Staged Pipeline Coordinator
//!
//! A pipeline run is a linear chain of workers:
//!
//! ```text
//! source -> stage 1 -> stage 2 -> ... -> stage N -> sink
//! ```
//!
//! Every worker runs on its own scoped thread and hands items on through a
//! bounded channel of capacity [`HANDOFF_CAPACITY`]. All workers share one
//! [`CancelScope`]; every receive and every send also selects on it, so a
//! cancelled run drains without deadlock whichever worker is blocked.
//!
//! ## Error Policy
//!
//! - Each worker owns a dedicated error channel holding its first error.
//! - A fatal error ([`HexlinkError::is_fatal`]) cancels the whole run.
//! - A non-fatal error drops only the item being processed.
//! - The coordinator waits for every worker to exit, then returns the first
//!   error observed across all of them, wrapped with the stage name.

use crate::HexlinkError;
use crate::primitives::HANDOFF_CAPACITY;
use crossbeam_channel::{Receiver, Select, Sender, bounded, select};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

// =============================================================================
// STAGE
// =============================================================================

/// One transform in a pipeline.
///
/// `process` returns `Ok(None)` to drop an item without error.
pub trait Stage<T>: Send {
    /// Stage name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Transform one item.
    fn process(&mut self, item: T) -> Result<Option<T>, HexlinkError>;
}

/// A stage built from a closure.
pub struct FnStage<F> {
    name: &'static str,
    f: F,
}

/// Wrap a closure as a named stage.
pub fn stage_fn<T, F>(name: &'static str, f: F) -> FnStage<F>
where
    F: FnMut(T) -> Result<Option<T>, HexlinkError> + Send,
{
    FnStage { name, f }
}

impl<T, F> Stage<T> for FnStage<F>
where
    F: FnMut(T) -> Result<Option<T>, HexlinkError> + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn process(&mut self, item: T) -> Result<Option<T>, HexlinkError> {
        (self.f)(item)
    }
}

// =============================================================================
// CANCELLATION
// =============================================================================

/// Shared cancellation signal for one run.
///
/// Cancelling drops the only sender of a never-used channel; every clone's
/// receiver then becomes ready at once.
#[derive(Debug, Clone)]
pub struct CancelScope {
    signal: Receiver<()>,
    trigger: Arc<Mutex<Option<Sender<()>>>>,
}

impl CancelScope {
    #[must_use]
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            signal,
            trigger: Arc::new(Mutex::new(Some(trigger))),
        }
    }

    /// Stop every worker of the run. Idempotent.
    pub fn cancel(&self) {
        self.trigger.lock().take();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.trigger.lock().is_none()
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

/// Send `item` downstream unless the run is cancelled or downstream is gone.
fn hand_off<T>(output: &Sender<T>, item: T, cancel: &CancelScope) -> bool {
    select! {
        send(output, item) -> sent => sent.is_ok(),
        recv(cancel.signal) -> _ => false,
    }
}

/// Next item from upstream, or `None` once upstream closes or the run is cancelled.
fn next_item<T>(input: &Receiver<T>, cancel: &CancelScope) -> Option<T> {
    select! {
        recv(input) -> item => item.ok(),
        recv(cancel.signal) -> _ => None,
    }
}

// =============================================================================
// ERROR SINK
// =============================================================================

struct ErrorSink {
    pipeline: &'static str,
    stage: &'static str,
    errors: Sender<HexlinkError>,
    cancel: CancelScope,
}

impl ErrorSink {
    /// Record an error. Returns `true` if the worker must stop.
    fn report(&self, err: HexlinkError) -> bool {
        let fatal = err.is_fatal();
        if fatal {
            self.cancel.cancel();
        }
        tracing::debug!(
            pipeline = self.pipeline,
            stage = self.stage,
            fatal,
            error = %err,
            "stage error"
        );
        // Only the first error per stage is kept.
        let _ = self.errors.try_send(err.in_stage(self.stage));
        fatal
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// A linear chain of stages over items of type `T`.
pub struct Pipeline<'a, T> {
    name: &'static str,
    stages: Vec<Box<dyn Stage<T> + 'a>>,
    cancel: CancelScope,
}

impl<'a, T: Send + 'a> Pipeline<'a, T> {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
            cancel: CancelScope::new(),
        }
    }

    /// Share an externally owned cancellation scope (caller abort).
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelScope) -> Self {
        self.cancel = cancel;
        self
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage<T> + 'a) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Names of the stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the pipeline to completion.
    ///
    /// Returns the number of items the sink accepted, or the first error
    /// observed once every worker has exited.
    pub fn run<I, S>(self, source: I, sink: S) -> Result<usize, HexlinkError>
    where
        I: IntoIterator<Item = Result<T, HexlinkError>>,
        I::IntoIter: Send + 'a,
        S: FnMut(T) -> Result<(), HexlinkError> + Send + 'a,
    {
        let Self {
            name,
            stages,
            cancel,
        } = self;
        let started = Instant::now();
        let source = source.into_iter();

        let (delivered, first_error) = thread::scope(|scope| {
            let mut error_channels = Vec::with_capacity(stages.len() + 2);
            let mut error_sink = |stage: &'static str| {
                let (errors, receiver) = bounded(1);
                error_channels.push(receiver);
                ErrorSink {
                    pipeline: name,
                    stage,
                    errors,
                    cancel: cancel.clone(),
                }
            };

            let mut workers = Vec::with_capacity(stages.len() + 2);

            let (output, mut upstream) = bounded::<T>(HANDOFF_CAPACITY);
            let errors = error_sink("source");
            workers.push((
                "source",
                scope.spawn(move || run_source(source, &output, &errors)),
            ));

            for mut stage in stages {
                let stage_name = stage.name();
                let (output, next) = bounded::<T>(HANDOFF_CAPACITY);
                let input = std::mem::replace(&mut upstream, next);
                let errors = error_sink(stage_name);
                workers.push((
                    stage_name,
                    scope.spawn(move || run_stage(&mut *stage, &input, &output, &errors)),
                ));
            }

            let errors = error_sink("sink");
            workers.push((
                "sink",
                scope.spawn(move || run_sink(sink, &upstream, &errors)),
            ));

            let first_error = watch_errors(&error_channels, &cancel);

            let mut delivered = 0;
            let mut panicked = None;
            for (stage, worker) in workers {
                match worker.join() {
                    Ok(count) => delivered += count,
                    Err(_) => {
                        panicked.get_or_insert_with(|| {
                            HexlinkError::PipelineFailed(format!("{stage} worker panicked"))
                        });
                    }
                }
            }
            (delivered, first_error.or(panicked))
        });

        tracing::debug!(
            pipeline = name,
            delivered,
            failed = first_error.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pipeline run complete"
        );

        match first_error {
            Some(err) => Err(err),
            None => Ok(delivered),
        }
    }
}

// =============================================================================
// WORKERS
// =============================================================================

fn run_source<T, I>(source: I, output: &Sender<T>, errors: &ErrorSink) -> usize
where
    I: Iterator<Item = Result<T, HexlinkError>>,
{
    for item in source {
        if errors.cancel.is_cancelled() {
            break;
        }
        match item {
            Ok(item) => {
                if !hand_off(output, item, &errors.cancel) {
                    break;
                }
            }
            Err(err) => {
                if errors.report(err) {
                    break;
                }
            }
        }
    }
    0
}

fn run_stage<T, S>(stage: &mut S, input: &Receiver<T>, output: &Sender<T>, errors: &ErrorSink) -> usize
where
    S: Stage<T> + ?Sized,
{
    while let Some(item) = next_item(input, &errors.cancel) {
        match stage.process(item) {
            Ok(Some(item)) => {
                if !hand_off(output, item, &errors.cancel) {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => {
                if errors.report(err) {
                    break;
                }
            }
        }
    }
    0
}

fn run_sink<T, S>(mut sink: S, input: &Receiver<T>, errors: &ErrorSink) -> usize
where
    S: FnMut(T) -> Result<(), HexlinkError>,
{
    let mut delivered = 0;
    while let Some(item) = next_item(input, &errors.cancel) {
        match sink(item) {
            Ok(()) => delivered += 1,
            Err(err) => {
                if errors.report(err) {
                    break;
                }
            }
        }
    }
    delivered
}

/// Wait until every worker's error channel closes; keep the first error.
fn watch_errors(channels: &[Receiver<HexlinkError>], cancel: &CancelScope) -> Option<HexlinkError> {
    let mut open: Vec<&Receiver<HexlinkError>> = channels.iter().collect();
    let mut first = None;

    while !open.is_empty() {
        let mut select = Select::new();
        for receiver in open.iter().copied() {
            select.recv(receiver);
        }
        let operation = select.select();
        let index = operation.index();
        match operation.recv(open[index]) {
            Ok(err) => {
                if err.is_fatal() {
                    cancel.cancel();
                }
                if first.is_none() {
                    first = Some(err);
                }
            }
            Err(_) => {
                open.swap_remove(index);
            }
        }
    }
    first
}

// =============================================================================
// TESTS
// =============================================================================
