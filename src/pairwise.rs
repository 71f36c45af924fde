//! All-pairs kernel matrix.
//!
//! The `n(n+1)/2` pairs `(i <= j)` are cut into one contiguous range per worker
//! (see `work`). Each worker receives its `WorkRange`, aligns every pair in it, and
//! reports a `RangeResult`; the driver scatters the values into the matrix and mirrors
//! them. Workers share the parameters and the sequences by reference and never need
//! each other's results, so the order in which ranges come back does not matter.
use crate::error::KernelError;
use crate::kernel::LocalAlignmentKernel;
use crate::logspace::Combine;
use crate::sequence::Sequence;
use crate::work::{self, RangeResult, WorkRange};
use std::io::Write;

/// How ranges are handed to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// One scoped thread per range, dispatch and gather over crossbeam channels.
    Channel,
    /// One rayon task per range on a dedicated pool.
    Rayon,
}

impl std::str::FromStr for Backend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel" => Ok(Backend::Channel),
            "rayon" => Ok(Backend::Rayon),
            _ => Err(format!("unknown backend `{}`", s)),
        }
    }
}

#[derive(Debug, Clone)]
/// Configurations
pub struct DriverConfig {
    /// Number of workers, and therefore of ranges.
    pub workers: usize,
    pub backend: Backend,
    /// How many times a failed range is dispatched again before giving up.
    pub retries: usize,
}

impl DriverConfig {
    pub fn new(workers: usize, backend: Backend, retries: usize) -> Self {
        Self {
            workers,
            backend,
            retries,
        }
    }
}

impl std::default::Default for DriverConfig {
    fn default() -> Self {
        Self::new(1, Backend::Channel, 0)
    }
}

/// The outcome of one dispatched range.
pub type Report = (WorkRange, Result<RangeResult, KernelError>);

/// Runs a job on every range, one worker per range, and blocks until all have finished.
/// A worker that dies without reporting must still produce an `Err` report for its range.
pub trait Dispatcher {
    fn dispatch<F>(&self, ranges: &[WorkRange], job: &F) -> Result<Vec<Report>, KernelError>
    where
        F: Fn(WorkRange) -> Result<RangeResult, KernelError> + Sync;
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn lost(range: WorkRange, reason: &str) -> Report {
    let err = KernelError::WorkerFailure {
        offset: range.offset,
        count: range.count,
        reason: reason.to_string(),
    };
    (range, Err(err))
}

/// Scoped threads talking over channels.
#[derive(Debug, Clone, Default)]
pub struct ChannelPool;

impl Dispatcher for ChannelPool {
    fn dispatch<F>(&self, ranges: &[WorkRange], job: &F) -> Result<Vec<Report>, KernelError>
    where
        F: Fn(WorkRange) -> Result<RangeResult, KernelError> + Sync,
    {
        let (result_snd, result_rcv) = crossbeam::channel::unbounded::<Report>();
        let mut reports: Vec<Report> = Vec::with_capacity(ranges.len());
        let scoped = crossbeam::scope(|s| {
            let mut dispatch = Vec::with_capacity(ranges.len());
            for (rank, _) in ranges.iter().enumerate() {
                // Each worker owns a one-slot inbox and receives exactly one range.
                let (range_snd, range_rcv) = crossbeam::channel::bounded::<WorkRange>(1);
                let sendr = result_snd.clone();
                s.spawn(move |_| {
                    if let Ok(range) = range_rcv.recv() {
                        debug!("Worker {} started {}", rank, range);
                        let result = job(range);
                        // The driver outlives every worker inside the scope.
                        let _ = sendr.send((range, result));
                    }
                });
                dispatch.push(range_snd);
            }
            // Close the channel, otherwise the gather below will never exit the for-loop.
            drop(result_snd);
            for (range_snd, &range) in dispatch.iter().zip(ranges.iter()) {
                if range_snd.send(range).is_err() {
                    warn!("Worker for {} exited before dispatch", range);
                }
            }
            drop(dispatch);
            for report in result_rcv.iter() {
                reports.push(report);
            }
        });
        if scoped.is_err() {
            warn!("Worker thread(s) panicked");
        }
        let missing: Vec<_> = ranges
            .iter()
            .filter(|r| !reports.iter().any(|(reported, _)| reported == *r))
            .copied()
            .collect();
        for range in missing {
            reports.push(lost(range, "worker exited without reporting"));
        }
        Ok(reports)
    }
}

/// A dedicated rayon pool with one thread per worker.
#[derive(Debug, Clone)]
pub struct RayonPool {
    threads: usize,
}

impl RayonPool {
    pub fn new(threads: usize) -> Self {
        Self { threads }
    }
}

impl Dispatcher for RayonPool {
    fn dispatch<F>(&self, ranges: &[WorkRange], job: &F) -> Result<Vec<Report>, KernelError>
    where
        F: Fn(WorkRange) -> Result<RangeResult, KernelError> + Sync,
    {
        use rayon::prelude::*;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|why| KernelError::WorkerFailure {
                offset: ranges.first().map(|r| r.offset).unwrap_or(0),
                count: ranges.iter().map(|r| r.count).sum(),
                reason: why.to_string(),
            })?;
        let reports = pool.install(|| {
            ranges
                .par_iter()
                .map(|&range| {
                    let call = std::panic::AssertUnwindSafe(|| job(range));
                    match std::panic::catch_unwind(call) {
                        Ok(result) => (range, result),
                        Err(payload) => lost(range, &panic_message(payload.as_ref())),
                    }
                })
                .collect()
        });
        Ok(reports)
    }
}

/// A symmetric kernel matrix with one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelMatrix {
    labels: Vec<String>,
    values: Vec<f64>,
    // Number of (i <= j) cells written so far.
    filled: usize,
}

impl KernelMatrix {
    fn new(labels: Vec<String>) -> Result<Self, KernelError> {
        let n = labels.len();
        let mut values = Vec::new();
        values
            .try_reserve_exact(n * n)
            .map_err(|_| KernelError::Allocation {
                what: "kernel matrix",
            })?;
        values.resize(n * n, 0f64);
        Ok(Self {
            labels,
            values,
            filled: 0,
        })
    }
    pub fn len(&self) -> usize {
        self.labels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.len() + j]
    }
    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.len();
        &self.values[i * n..(i + 1) * n]
    }
    fn is_complete(&self) -> bool {
        self.filled == work::pair_count(self.len())
    }
    // Write the values of `result` to (i, j) and (j, i).
    fn scatter(&mut self, range: WorkRange, result: &RangeResult) -> Result<(), KernelError> {
        if result.offset != range.offset
            || result.count != range.count
            || result.values.len() != range.count
        {
            return Err(KernelError::WorkerFailure {
                offset: range.offset,
                count: range.count,
                reason: format!(
                    "reported {} values for [{}, {})",
                    result.values.len(),
                    result.offset,
                    result.offset + result.count
                ),
            });
        }
        let n = self.len();
        for ((i, j), &value) in range.units(n).zip(result.values.iter()) {
            self.values[i * n + j] = value;
            self.values[j * n + i] = value;
            self.filled += 1;
        }
        Ok(())
    }
    /// Tab-separated table: a `matrix` header with the labels, then one row per sequence
    /// with `precision` decimals.
    pub fn write_tsv<W: Write>(&self, wtr: &mut W, precision: usize) -> std::io::Result<()> {
        write!(wtr, "matrix")?;
        for label in self.labels.iter() {
            write!(wtr, "\t{}", label)?;
        }
        writeln!(wtr)?;
        for (i, label) in self.labels.iter().enumerate() {
            let row: Vec<_> = self
                .row(i)
                .iter()
                .map(|x| format!("{:.*}", precision, x))
                .collect();
            writeln!(wtr, "{}\t{}", label, row.join("\t"))?;
        }
        Ok(())
    }
}

/// Align every pair in `range`, in rank order.
pub fn compute_range<C: Combine>(
    kernel: &LocalAlignmentKernel<C>,
    seqs: &[Sequence],
    range: WorkRange,
) -> Result<RangeResult, KernelError> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(range.count)
        .map_err(|_| KernelError::Allocation {
            what: "range values",
        })?;
    for (i, j) in range.units(seqs.len()) {
        values.push(kernel.align(&seqs[i], &seqs[j])?);
    }
    debug!("Finished {} ({} pairs)", range, values.len());
    Ok(RangeResult {
        offset: range.offset,
        count: range.count,
        values,
    })
}

/// Compute the full kernel matrix of `seqs` with `config.workers` workers.
/// The result does not depend on the worker count or the backend.
pub fn compute_all_pairs<C: Combine>(
    kernel: &LocalAlignmentKernel<C>,
    seqs: &[Sequence],
    config: &DriverConfig,
) -> Result<KernelMatrix, KernelError> {
    info!(
        "Aligning {} pairs of {} sequences with {} {:?} worker(s) in {} mode",
        work::pair_count(seqs.len()),
        seqs.len(),
        config.workers,
        config.backend,
        C::NAME
    );
    let job = |range: WorkRange| compute_range(kernel, seqs, range);
    match config.backend {
        Backend::Channel => gather(&ChannelPool, seqs, config, &job),
        Backend::Rayon => gather(&RayonPool::new(config.workers), seqs, config, &job),
    }
}

// Dispatch every range, re-dispatch failed ones up to `config.retries` times,
// and return the matrix only once every cell has been written.
fn gather<D, F>(
    dispatcher: &D,
    seqs: &[Sequence],
    config: &DriverConfig,
    job: &F,
) -> Result<KernelMatrix, KernelError>
where
    D: Dispatcher,
    F: Fn(WorkRange) -> Result<RangeResult, KernelError> + Sync,
{
    let total = work::pair_count(seqs.len());
    let mut pending = work::partition(total, config.workers)?;
    let labels: Vec<_> = seqs.iter().map(|s| s.label().to_string()).collect();
    let mut matrix = KernelMatrix::new(labels)?;
    for attempt in 0.. {
        let mut failed = vec![];
        for (range, outcome) in dispatcher.dispatch(&pending, job)? {
            match outcome.and_then(|result| matrix.scatter(range, &result)) {
                Ok(_) => {}
                Err(why) => failed.push((range, why)),
            }
        }
        let (range, why) = match failed.first() {
            None => break,
            Some(&(range, ref why)) => (range, why.to_string()),
        };
        if config.retries <= attempt {
            // Report the first failure as is.
            return Err(failed.swap_remove(0).1);
        }
        warn!(
            "{} range(s) failed (first {}: {}). Retry {}/{}",
            failed.len(),
            range,
            why,
            attempt + 1,
            config.retries
        );
        pending = failed.into_iter().map(|(range, _)| range).collect();
    }
    if !matrix.is_complete() {
        return Err(KernelError::WorkerFailure {
            offset: 0,
            count: total,
            reason: format!("only {} of {} pairs were gathered", matrix.filled, total),
        });
    }
    Ok(matrix)
}
