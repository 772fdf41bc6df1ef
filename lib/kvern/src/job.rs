//! Job execution: the shared job context, the per-worker driver loop, and
//! the public start/state/wait/close surface.
//!
//! A job runs Map -> Shuffle -> Reduce over a fixed pool of worker
//! threads. Work is handed out by an atomic claim index; phases are
//! bounded by a reusable barrier; worker 0 performs the single-producer
//! shuffle between the two barrier crossings.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info};

use crate::api::{InputPair, Mapper, MidPair, OutputPair, Reducer};
use crate::barrier::Barrier;
use crate::progress::{decode, encode, JobState, Stage, PROCESSED_ONE};
use crate::shuffle::{self, Group};
use crate::stats::JobStats;
use crate::utils::die;

/// Per-worker slot: the sorted intermediate buffer is moved in here right
/// before the post-map barrier, which hands its ownership to worker 0 for
/// the shuffle.
struct WorkerSlot<M: Mapper> {
    buffer: Vec<MidPair<M>>,
    task_ms: u64,
}

impl<M: Mapper> WorkerSlot<M> {
    fn new() -> Self {
        Self {
            buffer: Vec::new(),
            task_ms: 0,
        }
    }
}

/// State shared by every worker of one job, plus the handle.
struct Shared<M: Mapper, R: Reducer> {
    mapper: M,
    reducer: R,
    input: Vec<InputPair<M>>,
    slots: Vec<Mutex<WorkerSlot<M>>>,
    /// Written once by worker 0 during shuffle; reads after the second
    /// barrier are lock-free.
    groups: OnceLock<Vec<Group<M::OutKey, M::OutValue>>>,
    output: Mutex<Vec<OutputPair<R>>>,
    /// Claim index for both the map loop (inputs) and the reduce loop
    /// (groups); worker 0 resets it between phases while everyone else is
    /// parked at the barrier.
    work_index: AtomicUsize,
    /// Packed (stage, processed, total); see [`crate::progress`]. Advisory
    /// only, so all accesses are relaxed; the barriers carry the real
    /// ordering.
    progress: AtomicU64,
    barrier: Barrier,
    stats: Mutex<JobStats>,
    started: Instant,
    reduce_started: OnceLock<Instant>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(_) => die(&format!("{what} mutex poisoned")),
    }
}

/// Starts a job over `input` with `workers.max(1)` threads and returns its
/// handle. The progress word is published as `(Map, 0, |input|)` before
/// any worker can observe it.
pub fn start_job<M, R>(
    mapper: M,
    reducer: R,
    input: Vec<InputPair<M>>,
    workers: usize,
) -> JobHandle<M, R>
where
    M: Mapper + Send + Sync + 'static,
    R: Reducer<Key = M::OutKey, Value = M::OutValue> + Send + Sync + 'static,
{
    let workers = workers.max(1);
    info!(workers, inputs = input.len(), "job starting, entering map phase");

    let shared = Arc::new(Shared {
        progress: AtomicU64::new(encode(Stage::Map, 0, input.len() as u64)),
        mapper,
        reducer,
        input,
        slots: (0..workers).map(|_| Mutex::new(WorkerSlot::new())).collect(),
        groups: OnceLock::new(),
        output: Mutex::new(Vec::new()),
        work_index: AtomicUsize::new(0),
        barrier: Barrier::new(workers),
        stats: Mutex::new(JobStats::default()),
        started: Instant::now(),
        reduce_started: OnceLock::new(),
    });

    let mut handles = Vec::with_capacity(workers);
    for worker in 0..workers {
        let shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name(format!("kvern-worker-{worker}"))
            .spawn(move || run_worker(&shared, worker));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => die(&format!("failed to spawn worker thread: {e}")),
        }
    }

    JobHandle {
        shared,
        workers: handles,
    }
}

/// Exits the process if a worker unwinds out of a client callback; the
/// remaining workers would otherwise park at the barrier forever.
struct AbortOnPanic;

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            die("worker thread panicked");
        }
    }
}

/// Driver executed by every worker thread.
fn run_worker<M, R>(shared: &Shared<M, R>, worker: usize)
where
    M: Mapper,
    R: Reducer<Key = M::OutKey, Value = M::OutValue>,
{
    let _abort = AbortOnPanic;

    // Map: claim inputs until the index runs off the end. The local buffer
    // has a single owner, so emission is just a push.
    let map_started = Instant::now();
    let mut buffer: Vec<MidPair<M>> = Vec::new();
    loop {
        let index = shared.work_index.fetch_add(1, Ordering::Relaxed);
        if index >= shared.input.len() {
            break;
        }
        let (key, value) = &shared.input[index];
        let mut emit = |k, v| buffer.push((k, v));
        shared.mapper.map(key, value, &mut emit);
        shared.progress.fetch_add(PROCESSED_ONE, Ordering::Relaxed);
    }

    buffer.sort_unstable_by(|a, b| a.0.cmp(&b.0));
    debug!(worker, pairs = buffer.len(), "map task finished");

    {
        let mut slot = lock(&shared.slots[worker], "worker slot");
        slot.task_ms = map_started.elapsed().as_millis() as u64;
        slot.buffer = buffer;
    }

    // Makes every worker's sorted buffer visible to worker 0.
    shared.barrier.arrive();

    if worker == 0 {
        run_shuffle(shared);
    }

    // Publishes the group queue, the reduce-stage progress word and the
    // work-index reset to everyone.
    shared.barrier.arrive();

    let groups = shared
        .groups
        .get()
        .expect("group queue published before reduce");
    loop {
        let index = shared.work_index.fetch_add(1, Ordering::Relaxed);
        if index >= groups.len() {
            break;
        }
        let mut emit = |k, v| lock(&shared.output, "output").push((k, v));
        shared.reducer.reduce(&groups[index], &mut emit);
        shared.progress.fetch_add(PROCESSED_ONE, Ordering::Relaxed);
    }
    debug!(worker, "reduce loop finished");
}

/// Shuffle, run by worker 0 only: takes ownership of all buffers, merges
/// them into key groups, publishes the queue, then flips the job into the
/// reduce phase. The progress store happens after the queue is fully
/// populated, and the work-index reset after the store; other workers see
/// none of it until they pass the second barrier.
fn run_shuffle<M, R>(shared: &Shared<M, R>)
where
    M: Mapper,
    R: Reducer,
{
    let shuffle_started = Instant::now();

    let mut buffers = Vec::with_capacity(shared.slots.len());
    let mut per_worker = Vec::with_capacity(shared.slots.len());
    for slot in &shared.slots {
        let mut slot = lock(slot, "worker slot");
        per_worker.push((slot.buffer.len() as u64, slot.task_ms));
        buffers.push(std::mem::take(&mut slot.buffer));
    }
    let pairs: usize = buffers.iter().map(Vec::len).sum();

    lock(&shared.stats, "stats").record_map(
        shared.input.len() as u64,
        &per_worker,
        shared.started.elapsed().as_millis() as u64,
    );

    shared
        .progress
        .store(encode(Stage::Shuffle, 0, pairs as u64), Ordering::Relaxed);

    let groups = shuffle::merge_groups(buffers, &shared.progress);
    let group_count = groups.len();
    if shared.groups.set(groups).is_err() {
        die("group queue published twice");
    }

    let wall_ms = shuffle_started.elapsed().as_millis() as u64;
    lock(&shared.stats, "stats").record_shuffle(pairs as u64, group_count as u64, wall_ms);
    info!(pairs, groups = group_count, wall_ms, "shuffle complete, entering reduce phase");

    let _ = shared.reduce_started.set(Instant::now());
    shared
        .progress
        .store(encode(Stage::Reduce, 0, group_count as u64), Ordering::Relaxed);
    shared.work_index.store(0, Ordering::Relaxed);
}

/// Handle to a running (or finished) job.
///
/// `state` never blocks and may be called at any time; `wait` joins the
/// workers and is idempotent; `close` consumes the handle and returns the
/// output collection. Dropping an unclosed handle joins the workers.
pub struct JobHandle<M: Mapper, R: Reducer> {
    shared: Arc<Shared<M, R>>,
    workers: Vec<JoinHandle<()>>,
}

impl<M: Mapper, R: Reducer> JobHandle<M, R> {
    /// Progress snapshot from a single atomic load.
    pub fn state(&self) -> JobState {
        JobState::from_word(self.shared.progress.load(Ordering::Relaxed))
    }

    /// Blocks until every worker has exited. The first call joins; later
    /// calls return immediately.
    pub fn wait(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                die("worker thread panicked; aborting job");
            }
        }
        let (_, _, groups) = decode(self.shared.progress.load(Ordering::Relaxed));
        let pairs_out = lock(&self.shared.output, "output").len() as u64;
        let wall_ms = self
            .shared
            .reduce_started
            .get()
            .map(|at| at.elapsed().as_millis() as u64)
            .unwrap_or(0);
        lock(&self.shared.stats, "stats").record_reduce(groups, pairs_out, wall_ms);
        info!(groups, pairs_out, "job complete");
    }

    /// Per-phase statistics recorded so far; complete after [`wait`].
    ///
    /// [`wait`]: JobHandle::wait
    pub fn stats(&self) -> JobStats {
        lock(&self.shared.stats, "stats").clone()
    }

    /// Waits for the job and hands the output collection to the caller.
    pub fn close(mut self) -> Vec<OutputPair<R>> {
        self.wait();
        std::mem::take(&mut *lock(&self.shared.output, "output"))
    }
}

impl<M: Mapper, R: Reducer> Drop for JobHandle<M, R> {
    fn drop(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
