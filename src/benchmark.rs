use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::unwind::{
    call_with_escape, call_with_unwind_protect, call_with_variable_bound, escape, reset_stats,
    set_thread_settings, stats, thread_settings, BlockExit, Symbol, TransferResult, UnwindStats,
    Value, Values,
};

/// Which transfer path(s) to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BenchPath {
    Fast,
    Fallback,
    Both,
}

pub struct BenchmarkParams {
    /// Frames between the escape and its block
    pub depth: usize,
    pub iterations: usize,
    pub path: BenchPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathReport {
    pub path: BenchPath,
    pub elapsed: Duration,
    pub per_transfer_ns: f64,
    pub cleanups_run: u64,
    pub stats: UnwindStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub depth: usize,
    pub iterations: usize,
    pub runs: Vec<PathReport>,
}

pub fn run_benchmark(params: BenchmarkParams) -> Result<BenchmarkReport> {
    validate_params(&params)?;

    let paths: &[BenchPath] = match params.path {
        BenchPath::Fast => &[BenchPath::Fast],
        BenchPath::Fallback => &[BenchPath::Fallback],
        BenchPath::Both => &[BenchPath::Fast, BenchPath::Fallback],
    };

    let mut runs = Vec::with_capacity(paths.len());
    for path in paths {
        runs.push(run_path(*path, params.depth, params.iterations)?);
    }

    Ok(BenchmarkReport {
        depth: params.depth,
        iterations: params.iterations,
        runs,
    })
}

fn validate_params(params: &BenchmarkParams) -> Result<()> {
    if params.iterations == 0 {
        bail!("Must run at least 1 iteration");
    }
    if params.depth > 10_000 {
        bail!("Depth {} is too deep for the native stack (max 10000)", params.depth);
    }
    Ok(())
}

fn run_path(path: BenchPath, depth: usize, iterations: usize) -> Result<PathReport> {
    let previous = thread_settings();
    let mut settings = previous.clone();
    settings.force_fallback = path == BenchPath::Fallback;
    set_thread_settings(settings);
    reset_stats();

    let symbol = Symbol::gensym("*bench-");
    let cleanups = Rc::new(Cell::new(0u64));

    let start = Instant::now();
    let mut outcome = Ok(());
    for i in 0..iterations {
        let expected = Value::Int(i as i64);
        let result = call_with_escape(|exit| nest(depth, symbol, &cleanups, exit, i as i64));
        match result {
            Ok(values) if values.primary() == expected => {}
            Ok(values) => {
                outcome = Err(anyhow!(
                    "iteration {} landed with {} instead of {}",
                    i,
                    values.primary(),
                    expected
                ));
                break;
            }
            Err(unwind) => {
                outcome = Err(anyhow!("iteration {} failed: {}", i, unwind));
                break;
            }
        }
    }
    let elapsed = start.elapsed();

    let run_stats = stats();
    set_thread_settings(previous);
    outcome?;

    Ok(PathReport {
        path,
        elapsed,
        per_transfer_ns: elapsed.as_nanos() as f64 / iterations as f64,
        cleanups_run: cleanups.get(),
        stats: run_stats,
    })
}

/// Interleave binding and unwind-protect frames down to `depth`, then escape.
fn nest(
    depth: usize,
    symbol: Symbol,
    cleanups: &Rc<Cell<u64>>,
    exit: BlockExit,
    payload: i64,
) -> TransferResult<Values> {
    if depth == 0 {
        return Err(escape(exit, || Ok(Values::one(Value::Int(payload)))));
    }
    if depth % 2 == 0 {
        call_with_variable_bound(symbol, Value::Int(depth as i64), || {
            nest(depth - 1, symbol, cleanups, exit, payload)
        })
    } else {
        let counter = Rc::clone(cleanups);
        call_with_unwind_protect(
            || nest(depth - 1, symbol, cleanups, exit, payload),
            move || {
                counter.set(counter.get() + 1);
                Ok(())
            },
        )
    }
}

pub fn display_report(report: &BenchmarkReport) {
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Unwind Benchmark Results");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("Depth: {} frames", report.depth);
    println!("Iterations: {}", report.iterations);

    for run in &report.runs {
        println!();
        println!("{:?} path:", run.path);
        println!("   Total: {:.2}ms", run.elapsed.as_secs_f64() * 1000.0);
        println!("   Per transfer: {:.0}ns", run.per_transfer_ns);
        println!(
            "   Transfers: {} ({} fast, {} fallback)",
            run.stats.transfers, run.stats.fast_transfers, run.stats.fallback_transfers
        );
        println!("   Cleanups run: {}", run.cleanups_run);
    }

    if let [fast, fallback] = report.runs.as_slice() {
        if fast.per_transfer_ns > 0.0 {
            println!();
            println!(
                "Fallback / fast: {:.1}x",
                fallback.per_transfer_ns / fast.per_transfer_ns
            );
        }
    }
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
