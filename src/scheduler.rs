//! Generator and reconciler loops.
//!
//! A run spawns two threads inside a scope:
//!
//! - the **generator** makes a fixed number of dispatch attempts. Each one
//!   finds an idle account, marks it in flight and spawns a worker thread
//!   running an [`AccountTask`] on a copy of the account's snapshot.
//! - the **reconciler** receives finished snapshots from a bounded queue,
//!   installs them in the [`AccountDirectory`] and clears their marker.
//!
//! The queue holds as many completions as there are accounts. Because an
//! account has at most one task in flight, a worker never blocks on a full
//! queue.

use crate::directory::AccountDirectory;
use crate::task::{AccountTask, AmountRanges, Completion, TaskKind, TaskOutcome};
use crate::BankError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use rand::{rngs::StdRng, Rng, SeedableRng};
use seqlock_ledger::{Ledger, SpinLimit};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Configuration for a scheduler run.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of tasks the generator dispatches.
    pub task_attempts: usize,
    /// How long the reconciler waits on the queue before checking for shutdown.
    pub poll_interval: Duration,
    /// Sampling budget for each idle-account search.
    pub idle_search_limit: SpinLimit,
    /// Amount ranges handed to every task.
    pub amounts: AmountRanges,
    /// Random seed for account selection, task kinds and amounts.
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            task_attempts: 1000,
            poll_interval: Duration::from_secs(1),
            idle_search_limit: SpinLimit::Unbounded,
            amounts: AmountRanges::default(),
            seed: 42,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Tasks dispatched by the generator.
    pub dispatched: usize,
    /// Completions installed by the reconciler.
    pub reconciled: usize,
    /// Successful purchase withdrawals.
    pub withdrawals: usize,
    /// Withdrawals refused for insufficient funds.
    pub insufficient_funds: usize,
    /// Deposits applied.
    pub deposits: usize,
    /// Deposits skipped because the cached balance was too small.
    pub deposits_skipped: usize,
    /// Pay credited.
    pub payments: usize,
    /// Tasks whose ledger call failed.
    pub ledger_faults: usize,
    /// Reconciler polls that timed out with nothing received.
    pub idle_polls: usize,
    /// Tasks dispatched per account, indexed by id.
    pub dispatch_counts: Vec<usize>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl RunReport {
    fn record(&mut self, kind: TaskKind, outcome: &TaskOutcome) {
        self.reconciled += 1;
        match outcome {
            TaskOutcome::Withdrew(_) => self.withdrawals += 1,
            TaskOutcome::InsufficientFunds(_) => self.insufficient_funds += 1,
            TaskOutcome::Deposited(_) => self.deposits += 1,
            TaskOutcome::DepositSkipped => self.deposits_skipped += 1,
            TaskOutcome::Paid(_) => self.payments += 1,
            TaskOutcome::LedgerFault(_) => {
                debug!(?kind, "reconciled task with ledger fault");
                self.ledger_faults += 1;
            }
        }
    }

    /// Tasks per second over the whole run.
    pub fn throughput(&self) -> f64 {
        self.reconciled as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }

    /// Ids of accounts that were dispatched at least once.
    pub fn selected_accounts(&self) -> impl Iterator<Item = usize> + '_ {
        self.dispatch_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(id, _)| id)
    }
}

/// Owns the shared state of a run: directory, ledger and configuration.
#[derive(Debug)]
pub struct TaskScheduler<L> {
    directory: AccountDirectory,
    ledger: L,
    config: SchedulerConfig,
}

impl<L: Ledger> TaskScheduler<L> {
    /// Creates a scheduler after validating `config`.
    pub fn new(
        directory: AccountDirectory,
        ledger: L,
        config: SchedulerConfig,
    ) -> Result<Self, BankError> {
        config.amounts.validate()?;
        if config.poll_interval.is_zero() {
            return Err(BankError::InvalidConfig("poll_interval must be non-zero".into()));
        }
        Ok(Self {
            directory,
            ledger,
            config,
        })
    }

    /// The account directory.
    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// The ledger.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Tears the scheduler down into its directory and ledger.
    pub fn into_parts(self) -> (AccountDirectory, L) {
        (self.directory, self.ledger)
    }

    /// Runs the generator and reconciler until every dispatched task has been
    /// reconciled.
    pub fn run(&self) -> Result<RunReport, BankError> {
        let start = Instant::now();
        let (done_tx, done_rx) = channel::bounded::<Completion>(self.directory.len());
        let shutdown = AtomicBool::new(false);
        let dispatched = AtomicUsize::new(0);

        info!(
            ledger = self.ledger.name(),
            accounts = self.directory.len(),
            tasks = self.config.task_attempts,
            "starting run"
        );

        let (generated, reconciled) = thread::scope(|s| {
            let shutdown = &shutdown;
            let dispatched = &dispatched;
            let generator = s.spawn(move || self.generate(s, done_tx, shutdown, dispatched));
            let reconciler = s.spawn(move || self.reconcile(done_rx, shutdown, dispatched));
            (generator.join(), reconciler.join())
        });

        let dispatch_counts = generated.map_err(|_| BankError::WorkerPanicked(1))??;
        let mut report = reconciled.map_err(|_| BankError::WorkerPanicked(1))??;
        report.dispatched = dispatched.load(Ordering::Acquire);
        report.dispatch_counts = dispatch_counts;
        report.elapsed = start.elapsed();

        info!(
            dispatched = report.dispatched,
            reconciled = report.reconciled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run complete"
        );
        Ok(report)
    }

    /// Dispatches every task, then waits for the workers to exit.
    fn generate<'scope, 'env>(
        &'env self,
        s: &'scope Scope<'scope, 'env>,
        done: Sender<Completion>,
        shutdown: &AtomicBool,
        dispatched: &AtomicUsize,
    ) -> Result<Vec<usize>, BankError> {
        let mut workers = Workers::default();
        let result = self.dispatch_all(s, &done, dispatched, &mut workers);

        shutdown.store(true, Ordering::Release);
        // Once every worker is gone too, the reconciler sees a disconnected queue.
        drop(done);
        debug!(running = workers.handles.len(), "generator finished dispatching");

        let panicked = workers.join_all();
        let counts = result?;
        if panicked > 0 {
            return Err(BankError::WorkerPanicked(panicked));
        }
        Ok(counts)
    }

    fn dispatch_all<'scope, 'env>(
        &'env self,
        s: &'scope Scope<'scope, 'env>,
        done: &Sender<Completion>,
        dispatched: &AtomicUsize,
        workers: &mut Workers<'scope>,
    ) -> Result<Vec<usize>, BankError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut counts = vec![0usize; self.directory.len()];

        for _ in 0..self.config.task_attempts {
            let idx = self
                .directory
                .find_idle_account(&mut rng, self.config.idle_search_limit)?;
            let account = self.directory.snapshot(idx)?;
            self.directory.mark_in_flight(account.id)?;

            let task = AccountTask::new(account, TaskKind::random(&mut rng), rng.gen());
            let ledger = &self.ledger;
            let amounts = &self.config.amounts;
            let done = done.clone();

            workers.reap();
            let handle = thread::Builder::new()
                .name(format!("account-{}", account.id))
                .spawn_scoped(s, move || {
                    if let Err(err) = task.run(ledger, amounts, &done) {
                        warn!(%err, "worker could not publish its completion");
                    }
                });
            let handle = match handle {
                Ok(handle) => handle,
                Err(err) => {
                    // Nothing will reconcile this account.
                    let _ = self.directory.clear_in_flight(account.id);
                    return Err(BankError::SpawnFailed(err.to_string()));
                }
            };

            workers.handles.push(handle);
            counts[account.id] += 1;
            dispatched.fetch_add(1, Ordering::AcqRel);
        }

        Ok(counts)
    }

    /// Drains completions until shutdown is signalled and nothing is outstanding.
    fn reconcile(
        &self,
        done: Receiver<Completion>,
        shutdown: &AtomicBool,
        dispatched: &AtomicUsize,
    ) -> Result<RunReport, BankError> {
        let mut report = RunReport::default();
        let mut first_error = None;

        loop {
            match done.recv_timeout(self.config.poll_interval) {
                Ok(completion) => {
                    let id = completion.account.id;
                    let installed = self
                        .directory
                        .install(completion.account)
                        .and_then(|()| self.directory.clear_in_flight(id));
                    if let Err(err) = installed {
                        // Keep draining so workers and the generator can finish.
                        error!(account = id, %err, "failed to reconcile completion");
                        first_error.get_or_insert(err);
                    }
                    report.record(completion.kind, &completion.outcome);
                }
                Err(RecvTimeoutError::Timeout) => {
                    report.idle_polls += 1;
                    let outstanding = dispatched
                        .load(Ordering::Acquire)
                        .saturating_sub(report.reconciled);
                    if shutdown.load(Ordering::Acquire) && outstanding == 0 {
                        break;
                    }
                    debug!(outstanding, "completion queue idle");
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if !shutdown.load(Ordering::Acquire) {
                        warn!("completion queue closed before shutdown");
                    }
                    break;
                }
            }
        }

        debug!(reconciled = report.reconciled, "reconciler drained");
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

/// Worker threads that have not been joined yet.
///
/// Finished workers are reaped before every spawn, so the set stays around the
/// number of accounts in flight however many tasks a run dispatches.
#[derive(Default)]
struct Workers<'scope> {
    handles: Vec<ScopedJoinHandle<'scope, ()>>,
    panicked: usize,
}

impl Workers<'_> {
    fn reap(&mut self) {
        let mut idx = 0;
        while idx < self.handles.len() {
            if self.handles[idx].is_finished() {
                let handle = self.handles.swap_remove(idx);
                if handle.join().is_err() {
                    self.panicked += 1;
                }
            } else {
                idx += 1;
            }
        }
    }

    /// Joins every remaining worker and returns how many panicked overall.
    fn join_all(self) -> usize {
        let panicked = self
            .handles
            .into_iter()
            .map(ScopedJoinHandle::join)
            .filter(Result::is_err)
            .count();
        self.panicked + panicked
    }
}
