//! Opt-in per-stage timings for the query pipeline.
//!
//! Set `QUARRY_PROFILE` to any value to turn collection on; it is read once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

/// Accumulated time and pass count per pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueryProfileSnapshot {
    /// Nanoseconds building candidate rows.
    pub seed_ns: u64,
    /// Candidate row sets built.
    pub seed_count: u64,
    /// Nanoseconds in `where`.
    pub filter_ns: u64,
    /// `where` passes.
    pub filter_count: u64,
    /// Nanoseconds in `order`.
    pub sort_ns: u64,
    /// Sorts performed.
    pub sort_count: u64,
    /// Nanoseconds applying cursors, offsets, and limits.
    pub slice_ns: u64,
    /// Windows applied.
    pub slice_count: u64,
    /// Nanoseconds in `select`.
    pub project_ns: u64,
    /// Projection passes.
    pub project_count: u64,
    /// Nanoseconds in `group`.
    pub group_ns: u64,
    /// Rollups performed.
    pub group_count: u64,
}

#[derive(Clone, Copy, Debug)]
pub(crate) enum QueryProfileKind {
    Seed,
    Filter,
    Sort,
    Slice,
    Project,
    Group,
}

const STAGES: usize = 6;

/// `(elapsed nanoseconds, passes)` per stage, indexed by `QueryProfileKind`.
type Counters = [(AtomicU64, AtomicU64); STAGES];

static COUNTERS: OnceLock<Option<Counters>> = OnceLock::new();

fn counters() -> Option<&'static Counters> {
    COUNTERS
        .get_or_init(|| {
            std::env::var_os("QUARRY_PROFILE")
                .map(|_| std::array::from_fn(|_| (AtomicU64::new(0), AtomicU64::new(0))))
        })
        .as_ref()
}

/// Starts a stage timer, or `None` while profiling is off.
pub(crate) fn profile_timer() -> Option<Instant> {
    counters().map(|_| Instant::now())
}

pub(crate) fn record_profile_timer(kind: QueryProfileKind, start: Option<Instant>) {
    let (Some(start), Some(counters)) = (start, counters()) else {
        return;
    };
    let nanos = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);
    let (elapsed, passes) = &counters[kind as usize];
    elapsed.fetch_add(nanos, Ordering::Relaxed);
    passes.fetch_add(1, Ordering::Relaxed);
}

/// Reads the stage counters, zeroing them when `reset` is set.
///
/// Returns `None` unless `QUARRY_PROFILE` is set.
///
/// ```no_run
/// use quarry::query::profile::profile_snapshot;
///
/// if let Some(snapshot) = profile_snapshot(true) {
///     println!("filter passes: {}", snapshot.filter_count);
/// }
/// ```
pub fn profile_snapshot(reset: bool) -> Option<QueryProfileSnapshot> {
    let counters = counters()?;
    let read = |kind: QueryProfileKind| {
        let (elapsed, passes) = &counters[kind as usize];
        if reset {
            (elapsed.swap(0, Ordering::Relaxed), passes.swap(0, Ordering::Relaxed))
        } else {
            (elapsed.load(Ordering::Relaxed), passes.load(Ordering::Relaxed))
        }
    };
    let (seed_ns, seed_count) = read(QueryProfileKind::Seed);
    let (filter_ns, filter_count) = read(QueryProfileKind::Filter);
    let (sort_ns, sort_count) = read(QueryProfileKind::Sort);
    let (slice_ns, slice_count) = read(QueryProfileKind::Slice);
    let (project_ns, project_count) = read(QueryProfileKind::Project);
    let (group_ns, group_count) = read(QueryProfileKind::Group);
    Some(QueryProfileSnapshot {
        seed_ns,
        seed_count,
        filter_ns,
        filter_count,
        sort_ns,
        sort_count,
        slice_ns,
        slice_count,
        project_ns,
        project_count,
        group_ns,
        group_count,
    })
}
