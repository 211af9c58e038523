//! Throughput benchmarks for full runs and for the ledger lock on its own.

use bank_sim::{Population, PopulationConfig, SchedulerConfig, TaskScheduler};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use seqlock_ledger::{Ledger, LedgerConfig, SequencedLedger};
use std::thread;
use std::time::Duration;

/// Benchmarks bootstrap plus a complete scheduler run, like the original harness.
fn bench_full_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank_run/full_run");
    group.sample_size(10);

    let num_tasks = 1000;
    for &num_accounts in &[50usize, 500, 5_000] {
        let config = PopulationConfig {
            num_accounts,
            ..Default::default()
        };

        group.throughput(Throughput::Elements(num_tasks as u64));
        group.bench_with_input(
            BenchmarkId::new("sequenced", num_accounts),
            &config,
            |b, config| {
                b.iter(|| {
                    let population = Population::generate(config.clone()).expect("population");
                    let ledger = population
                        .open_ledger(LedgerConfig::default())
                        .expect("ledger");
                    let scheduler = TaskScheduler::new(
                        population.directory().expect("directory"),
                        ledger,
                        SchedulerConfig {
                            task_attempts: num_tasks,
                            poll_interval: Duration::from_millis(10),
                            ..Default::default()
                        },
                    )
                    .expect("scheduler");
                    scheduler.run().expect("run").reconciled
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks raw deposit throughput on one account as threads are added.
fn bench_lock_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("bank_run/lock_contention");

    let ops_per_thread = 10_000;
    for &threads in &[1usize, 2, 4, 8] {
        group.throughput(Throughput::Elements((threads * ops_per_thread) as u64));
        group.bench_with_input(BenchmarkId::new("deposit", threads), &threads, |b, &threads| {
            b.iter(|| {
                let ledger = SequencedLedger::new();
                ledger.open_account(0, 0).expect("open");
                thread::scope(|s| {
                    for _ in 0..threads {
                        s.spawn(|| {
                            for _ in 0..ops_per_thread {
                                ledger.deposit(black_box(0), 1).expect("deposit");
                            }
                        });
                    }
                });
                ledger.balance(0).expect("balance")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_full_run, bench_lock_contention);
criterion_main!(benches);
