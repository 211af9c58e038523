//! CLI for running the bank simulation.

use bank_sim::{BankError, Population, PopulationConfig, SchedulerConfig, TaskScheduler};
use clap::Parser;
use seqlock_ledger::{Dollars, LedgerConfig, SpinLimit};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Drives one scheduler run and prints what happened.
#[derive(Debug, Parser)]
#[command(name = "bank-sim", version, about)]
struct Args {
    /// Number of accounts in the population.
    #[arg(long, default_value_t = 500)]
    accounts: usize,

    /// Number of tasks to dispatch.
    #[arg(long, default_value_t = 1000)]
    tasks: usize,

    /// Random seed for the population and the scheduler.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Reconciler poll interval in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    /// Give up an idle-account search after this many samples.
    #[arg(long)]
    idle_search_limit: Option<u64>,

    /// Give up a ledger lock acquisition after this many attempts.
    #[arg(long)]
    spin_limit: Option<u64>,

    /// Print every account after the run.
    #[arg(long)]
    show_accounts: bool,
}

fn limit(attempts: Option<u64>) -> SpinLimit {
    attempts.map_or(SpinLimit::Unbounded, SpinLimit::Attempts)
}

fn main() -> Result<(), BankError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    println!("=== Bank Simulation ===\n");
    println!(
        "Configuration: {} accounts, {} tasks, seed {}\n",
        args.accounts, args.tasks, args.seed
    );

    let population = Population::generate(PopulationConfig {
        num_accounts: args.accounts,
        seed: args.seed,
        ..Default::default()
    })?;
    let ledger = population.open_ledger(LedgerConfig {
        spin_limit: limit(args.spin_limit),
        ..Default::default()
    })?;
    let opening_total = ledger.total_balance()?;

    let scheduler = TaskScheduler::new(
        population.directory()?,
        ledger,
        SchedulerConfig {
            task_attempts: args.tasks,
            poll_interval: Duration::from_millis(args.poll_ms),
            idle_search_limit: limit(args.idle_search_limit),
            seed: args.seed,
            ..Default::default()
        },
    )?;

    let report = scheduler.run()?;
    let ledger = scheduler.ledger();
    let stats = ledger.lock_stats();

    println!("--- Tasks ---");
    println!("{:20} | {:6}", "dispatched", report.dispatched);
    println!("{:20} | {:6}", "reconciled", report.reconciled);
    println!("{:20} | {:6}", "withdrawals", report.withdrawals);
    println!("{:20} | {:6}", "insufficient funds", report.insufficient_funds);
    println!("{:20} | {:6}", "deposits", report.deposits);
    println!("{:20} | {:6}", "deposits skipped", report.deposits_skipped);
    println!("{:20} | {:6}", "payments", report.payments);
    println!("{:20} | {:6}", "ledger faults", report.ledger_faults);
    println!(
        "{:20} | {:8.2} ms | {:8.0} tasks/s",
        "elapsed",
        report.elapsed.as_secs_f64() * 1000.0,
        report.throughput()
    );

    println!("\n--- Ledger ---");
    println!("{:20} | {}", "opening total", Dollars(opening_total));
    println!("{:20} | {}", "closing total", Dollars(ledger.total_balance()?));
    println!("{:20} | {}", "lock word", ledger.lock_word());
    println!("{:20} | {}", "acquisitions", stats.acquisitions);
    println!("{:20} | {}", "failed CAS", stats.failed_cas);
    println!("{:20} | {}", "spins while held", stats.held_spins);

    if args.show_accounts {
        println!("\n--- Accounts ---");
        for account in scheduler.directory().snapshots() {
            println!("{account}");
        }
    }

    Ok(())
}
