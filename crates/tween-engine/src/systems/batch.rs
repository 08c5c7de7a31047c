//! Position batch: move tasks resolved as one parallel job per tick.
//!
//! Entries wait in an unordered pending queue until their start time, then
//! become rows of index-aligned columns (time window, domain, easing, start,
//! target, output). Each tick the driving thread promotes, refreshes and
//! dispatches; later the same tick it joins and writes results back.
//!
//! The job takes the columns by value and hands them back through a
//! rendezvous channel, so no worker can observe a reallocation and the
//! driving thread cannot touch inputs mid-flight.

use std::mem;

use crossbeam_channel::{bounded, Receiver};
use glam::Vec3;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::api::config::SchedulerConfig;
use crate::api::error::SchedulerError;
use crate::api::types::{BatchHandle, ObjectHandle, TimeDomain};
use crate::core::arena::TransformStore;
use crate::core::time::Now;
use crate::extensions::easing::{Easing, Lerp, EASING_TABLE};
use crate::systems::tasks::{FinishFn, TIME_EPSILON};

/// Absolute `[start, end]` window in one time domain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    /// Normalized progress at `now`, clamped to [0, 1].
    /// An empty window, or one within [`TIME_EPSILON`] of its end, is complete.
    #[inline]
    pub fn progress(&self, now: f64) -> f32 {
        let span = self.end - self.start;
        if span <= 0.0 || self.is_complete(now) {
            return 1.0;
        }
        ((now - self.start) / span).clamp(0.0, 1.0) as f32
    }

    /// Same tolerance as non-batched tasks, so summed frame deltas close the
    /// window on the tick they reach its end.
    #[inline]
    pub fn is_complete(&self, now: f64) -> bool {
        now + TIME_EPSILON as f64 >= self.end
    }
}

/// Where a move ends up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveTarget {
    /// Follow another object, re-read every tick.
    Object(ObjectHandle),
    /// A fixed world position.
    Point(Vec3),
}

/// Description of a position move, built like a tween.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveRequest {
    pub owner: ObjectHandle,
    pub target: MoveTarget,
    pub duration: f32,
    pub delay: f32,
    pub domain: TimeDomain,
    pub easing: Easing,
}

impl MoveRequest {
    /// Move `owner` onto `target`, tracking it if it moves.
    pub fn to_object(owner: ObjectHandle, target: ObjectHandle, duration: f32) -> Self {
        Self::new(owner, MoveTarget::Object(target), duration)
    }

    /// Move `owner` to a fixed point.
    pub fn to_point(owner: ObjectHandle, point: Vec3, duration: f32) -> Self {
        Self::new(owner, MoveTarget::Point(point), duration)
    }

    fn new(owner: ObjectHandle, target: MoveTarget, duration: f32) -> Self {
        Self {
            owner,
            target,
            duration,
            delay: 0.0,
            domain: TimeDomain::Scaled,
            easing: Easing::Linear,
        }
    }

    // -- Builder methods --

    pub fn with_delay(mut self, delay: f32) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_domain(mut self, domain: TimeDomain) -> Self {
        self.domain = domain;
        self
    }

    pub fn unscaled(self) -> Self {
        self.with_domain(TimeDomain::Unscaled)
    }
}

/// Evaluate one row. Full progress writes the target exactly.
#[inline]
pub fn evaluate_row(
    window: TimeWindow,
    domain: TimeDomain,
    easing: Easing,
    start: Vec3,
    target: Vec3,
    now: Now,
) -> Vec3 {
    let t = window.progress(now.get(domain));
    if t >= 1.0 {
        target
    } else {
        <Vec3 as Lerp>::lerp(start, target, EASING_TABLE[easing as usize](t))
    }
}

/// The parallel arrays. Index `i` of every column describes one row.
#[derive(Debug, Default)]
struct BatchColumns {
    windows: Vec<TimeWindow>,
    domains: Vec<TimeDomain>,
    easings: Vec<Easing>,
    starts: Vec<Vec3>,
    targets: Vec<Vec3>,
    outputs: Vec<Vec3>,
}

impl BatchColumns {
    fn len(&self) -> usize {
        self.windows.len()
    }

    fn is_aligned(&self) -> bool {
        let n = self.windows.len();
        self.domains.len() == n
            && self.easings.len() == n
            && self.starts.len() == n
            && self.targets.len() == n
            && self.outputs.len() == n
    }

    /// Make room for `capacity` rows in every column.
    fn grow_to(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.len());
        self.windows.reserve_exact(additional);
        self.domains.reserve_exact(additional);
        self.easings.reserve_exact(additional);
        self.starts.reserve_exact(additional);
        self.targets.reserve_exact(additional);
        self.outputs.reserve_exact(additional);
    }

    fn push(&mut self, window: TimeWindow, domain: TimeDomain, easing: Easing, start: Vec3, target: Vec3) {
        self.windows.push(window);
        self.domains.push(domain);
        self.easings.push(easing);
        self.starts.push(start);
        self.targets.push(target);
        self.outputs.push(start);
    }

    /// Drop rows whose `keep` flag is clear. Surviving rows keep their order.
    fn retain(&mut self, keep: &[bool]) {
        retain_flagged(&mut self.windows, keep);
        retain_flagged(&mut self.domains, keep);
        retain_flagged(&mut self.easings, keep);
        retain_flagged(&mut self.starts, keep);
        retain_flagged(&mut self.targets, keep);
        retain_flagged(&mut self.outputs, keep);
    }

    /// Worker-side pass: reads inputs, writes each row's own output slot.
    fn evaluate(&mut self, now: Now, min_len: usize) {
        let windows = &self.windows;
        let domains = &self.domains;
        let easings = &self.easings;
        let starts = &self.starts;
        let targets = &self.targets;
        self.outputs
            .par_iter_mut()
            .enumerate()
            .with_min_len(min_len.max(1))
            .for_each(|(i, out)| {
                *out = evaluate_row(windows[i], domains[i], easings[i], starts[i], targets[i], now);
            });
    }
}

fn retain_flagged<T>(column: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    column.retain(|_| flags.next().copied().unwrap_or(false));
}

/// Driving-thread bookkeeping for one row, aligned with the columns.
#[derive(Debug, Clone, Copy)]
struct RowMeta {
    handle: BatchHandle,
    owner: ObjectHandle,
    target: MoveTarget,
}

#[derive(Debug, Clone, Copy)]
struct PendingMove {
    handle: BatchHandle,
    owner: ObjectHandle,
    target: MoveTarget,
    window: TimeWindow,
    domain: TimeDomain,
    easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Vacant,
    Pending,
    Active,
    /// Stopped by the caller; the row or pending entry is dropped at the
    /// next promotion, refresh or join.
    Stopped,
}

struct BatchSlot {
    generation: u32,
    state: SlotState,
    on_finish: Option<FinishFn>,
}

struct InFlight {
    receiver: Receiver<BatchColumns>,
    now: Now,
}

/// Owns the pending queue, the active columns and the worker pool.
pub struct BatchRunner {
    pool: ThreadPool,
    min_rows_per_job: usize,
    min_capacity: usize,
    columns: BatchColumns,
    rows: Vec<RowMeta>,
    /// Rows the columns can hold without reallocating.
    capacity: usize,
    pending: Vec<PendingMove>,
    slots: Vec<BatchSlot>,
    free: Vec<u32>,
    in_flight: Option<InFlight>,
}

impl BatchRunner {
    pub fn new(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        // Without a handler rayon aborts on a panicking job. With one, the
        // job's sender is dropped during unwinding and the join sees it lost.
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|i| format!("tween-batch-{i}"))
            .panic_handler(|_| log::error!("position batch worker panicked"))
            .build()?;

        let min_capacity = config.initial_batch_capacity.max(1);
        let mut columns = BatchColumns::default();
        columns.grow_to(min_capacity);

        Ok(Self {
            pool,
            min_rows_per_job: config.min_rows_per_job,
            min_capacity,
            columns,
            rows: Vec::with_capacity(min_capacity),
            capacity: min_capacity,
            pending: Vec::new(),
            slots: Vec::new(),
            free: Vec::new(),
            in_flight: None,
        })
    }

    /// Queue a move. Its window opens `delay` seconds from `now` in the
    /// request's domain; the start position is read at promotion.
    pub fn enqueue(&mut self, request: MoveRequest, now: Now) -> BatchHandle {
        let index = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(BatchSlot {
                    generation: 0,
                    state: SlotState::Vacant,
                    on_finish: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.state = SlotState::Pending;
        let handle = BatchHandle { index, generation: slot.generation };

        let start = now.get(request.domain) + request.delay.max(0.0) as f64;
        self.pending.push(PendingMove {
            handle,
            owner: request.owner,
            target: request.target,
            window: TimeWindow {
                start,
                end: start + request.duration.max(0.0) as f64,
            },
            domain: request.domain,
            easing: request.easing,
        });
        handle
    }

    pub fn is_active(&self, handle: BatchHandle) -> bool {
        matches!(
            self.slot(handle).map(|s| s.state),
            Some(SlotState::Pending | SlotState::Active)
        )
    }

    /// Stop a move. Takes effect immediately for `is_active`; the row itself
    /// is dropped at the next promotion, refresh or join. The finish callback
    /// never fires.
    pub fn stop(&mut self, handle: BatchHandle) -> bool {
        match self.slot_mut(handle) {
            Some(slot) if matches!(slot.state, SlotState::Pending | SlotState::Active) => {
                slot.state = SlotState::Stopped;
                slot.on_finish = None;
                true
            }
            _ => false,
        }
    }

    /// Stop every move driving `owner`. Returns how many were stopped.
    pub fn stop_owner(&mut self, owner: ObjectHandle) -> usize {
        let handles: Vec<BatchHandle> = self
            .pending
            .iter()
            .map(|p| (p.handle, p.owner))
            .chain(self.rows.iter().map(|r| (r.handle, r.owner)))
            .filter(|&(_, o)| o == owner)
            .map(|(h, _)| h)
            .collect();
        handles.into_iter().filter(|&h| self.stop(h)).count()
    }

    /// Stop every pending and active move.
    pub fn stop_all(&mut self) {
        for slot in &mut self.slots {
            if matches!(slot.state, SlotState::Pending | SlotState::Active) {
                slot.state = SlotState::Stopped;
                slot.on_finish = None;
            }
        }
    }

    pub fn set_on_finish(&mut self, handle: BatchHandle, on_finish: FinishFn) -> bool {
        match self.slot_mut(handle) {
            Some(slot) if matches!(slot.state, SlotState::Pending | SlotState::Active) => {
                slot.on_finish = Some(on_finish);
                true
            }
            _ => false,
        }
    }

    /// Move due pending entries into the columns, in insertion order.
    pub fn promote<S: TransformStore + ?Sized>(&mut self, store: &S, now: Now) {
        debug_assert!(self.in_flight.is_none(), "promotion while a batch is in flight");
        if self.pending.is_empty() {
            return;
        }

        for entry in mem::take(&mut self.pending) {
            match self.slot(entry.handle).map(|s| s.state) {
                Some(SlotState::Pending) => {}
                _ => {
                    self.release(entry.handle);
                    continue;
                }
            }
            if entry.window.start > now.get(entry.domain) {
                self.pending.push(entry);
                continue;
            }
            let Some(start) = store.position(entry.owner) else {
                log::trace!("dropping move {:?}: owner {:?} is gone", entry.handle, entry.owner);
                self.release(entry.handle);
                continue;
            };
            let target = match entry.target {
                MoveTarget::Point(p) => p,
                MoveTarget::Object(t) => store.position(t).unwrap_or(start),
            };

            self.reserve_row();
            self.columns.push(entry.window, entry.domain, entry.easing, start, target);
            self.rows.push(RowMeta {
                handle: entry.handle,
                owner: entry.owner,
                target: entry.target,
            });
            if let Some(slot) = self.slot_mut(entry.handle) {
                slot.state = SlotState::Active;
            }
        }
    }

    /// Re-read live targets and evict stopped or invalid rows.
    pub fn refresh<S: TransformStore + ?Sized>(&mut self, store: &S) {
        debug_assert!(self.in_flight.is_none(), "refresh while a batch is in flight");
        let mut keep = Vec::with_capacity(self.rows.len());
        for i in 0..self.rows.len() {
            let row = self.rows[i];
            let active = self.slot(row.handle).map(|s| s.state) == Some(SlotState::Active);
            let target = match row.target {
                MoveTarget::Point(p) => Some(p),
                MoveTarget::Object(t) => store.position(t),
            };
            match target {
                Some(target) if active && store.contains(row.owner) => {
                    self.columns.targets[i] = target;
                    keep.push(true);
                }
                _ => {
                    self.release(row.handle);
                    keep.push(false);
                }
            }
        }
        self.compact(&keep);
    }

    /// Launch the batch job on the worker pool. Returns `false` when there
    /// is nothing to evaluate.
    pub fn dispatch(&mut self, now: Now) -> bool {
        debug_assert!(self.in_flight.is_none(), "batch dispatched twice");
        if self.columns.len() == 0 {
            return false;
        }

        let min_len = self.min_rows_per_job;
        log::trace!("dispatching position batch: {} rows", self.columns.len());
        self.launch(now, move |mut columns| {
            columns.evaluate(now, min_len);
            columns
        });
        true
    }

    /// Hand the columns to `job` on the pool. They come back through the
    /// channel, or not at all if the job panics.
    fn launch<F>(&mut self, now: Now, job: F)
    where
        F: FnOnce(BatchColumns) -> BatchColumns + Send + 'static,
    {
        let columns = mem::take(&mut self.columns);
        let (sender, receiver) = bounded(1);
        self.pool.spawn(move || {
            let columns = job(columns);
            // The runner may have been dropped mid-flight; nothing to report then.
            let _ = sender.send(columns);
        });
        self.in_flight = Some(InFlight { receiver, now });
    }

    /// Block until the dispatched job is done, write outputs back and evict
    /// finished or invalid rows. Returns the finish callbacks to run, in row
    /// order, once the store is no longer borrowed.
    pub fn join<S: TransformStore + ?Sized>(&mut self, store: &mut S) -> Vec<FinishFn> {
        let Some(now) = self.wait() else {
            return Vec::new();
        };

        let mut finished = Vec::new();
        let mut keep = Vec::with_capacity(self.rows.len());
        for i in 0..self.rows.len() {
            let row = self.rows[i];
            let active = self.slot(row.handle).map(|s| s.state) == Some(SlotState::Active);
            let target_live = match row.target {
                MoveTarget::Point(_) => true,
                MoveTarget::Object(t) => store.contains(t),
            };
            if !(active && target_live && store.set_position(row.owner, self.columns.outputs[i])) {
                self.release(row.handle);
                keep.push(false);
                continue;
            }

            let done = self.columns.windows[i].is_complete(now.get(self.columns.domains[i]));
            if done {
                if let Some(on_finish) = self.slot_mut(row.handle).and_then(|s| s.on_finish.take()) {
                    finished.push(on_finish);
                }
                self.release(row.handle);
            }
            keep.push(!done);
        }
        self.compact(&keep);
        finished
    }

    /// Block on an outstanding job and take the columns back without
    /// resolving rows. Returns the dispatch snapshot if a job was in flight.
    fn wait(&mut self) -> Option<Now> {
        let flight = self.in_flight.take()?;
        match flight.receiver.recv() {
            Ok(columns) => {
                self.columns = columns;
                log::trace!("joined position batch: {} rows", self.columns.len());
                Some(flight.now)
            }
            Err(_) => {
                log::error!("position batch job was lost; dropping {} rows", self.rows.len());
                self.drop_rows();
                None
            }
        }
    }

    /// Join any outstanding job, then drop every entry without callbacks
    /// and release the columns.
    pub fn shutdown(&mut self) {
        if self.wait().is_some() {
            log::debug!("forced join of in-flight position batch at shutdown");
        }
        self.drop_rows();
        for entry in mem::take(&mut self.pending) {
            self.release(entry.handle);
        }
        self.columns = BatchColumns::default();
        self.rows = Vec::new();
        self.capacity = 0;
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Rows in the active registry.
    pub fn active_len(&self) -> usize {
        self.rows.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Moves not yet finished or stopped, pending and active.
    pub fn live_len(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s.state, SlotState::Pending | SlotState::Active))
            .count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Whether every column, and the row metadata, has the same length.
    /// While a job is in flight only the metadata is held here.
    pub fn is_aligned(&self) -> bool {
        self.columns.is_aligned() && (self.in_flight.is_some() || self.columns.len() == self.rows.len())
    }

    fn reserve_row(&mut self) {
        let needed = self.columns.len() + 1;
        if needed <= self.capacity {
            return;
        }
        let new_capacity = (self.capacity * 2).max(needed).max(self.min_capacity);
        self.columns.grow_to(new_capacity);
        self.rows.reserve_exact(new_capacity - self.rows.len());
        log::debug!("position batch capacity {} -> {}", self.capacity, new_capacity);
        self.capacity = new_capacity;
    }

    /// Remove rows whose handles were already released.
    fn compact(&mut self, keep: &[bool]) {
        if keep.iter().all(|&k| k) {
            return;
        }
        self.columns.retain(keep);
        retain_flagged(&mut self.rows, keep);
    }

    fn drop_rows(&mut self) {
        for row in mem::take(&mut self.rows) {
            self.release(row.handle);
        }
        self.columns = BatchColumns::default();
        self.capacity = 0;
    }

    /// Return a slot to the free list. Its handle goes stale.
    fn release(&mut self, handle: BatchHandle) {
        if let Some(slot) = self.slot_mut(handle) {
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = SlotState::Vacant;
            slot.on_finish = None;
            self.free.push(handle.index);
        }
    }

    fn slot(&self, handle: BatchHandle) -> Option<&BatchSlot> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: BatchHandle) -> Option<&mut BatchSlot> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        // Workers own the columns until they report back.
        self.wait();
    }
}
