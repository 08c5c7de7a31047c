//! Non-batched tasks: generic interpolations and the auxiliary waits.
//!
//! Tasks are plain state re-visited once per tick by the scheduler. They live
//! in a generational slot list so callbacks can create or stop tasks while
//! the scheduler is walking it.

use crate::api::types::{TaskHandle, TimeDomain};
use crate::core::scheduler::Scheduler;
use crate::extensions::easing::{Easing, EasingCurve};

/// Completion tolerance in seconds. Absorbs float drift from summing frame
/// deltas, so ten ticks of 0.1 s finish a 1 s tween on the tenth tick.
pub const TIME_EPSILON: f32 = 1e-5;

/// Completion callback shared by every task kind.
pub type FinishFn = Box<dyn FnOnce(&mut Scheduler)>;

/// Type-erased value emitter built around the user's `on_tick`.
pub(crate) type EmitFn = Box<dyn FnMut(&mut Scheduler, Emit)>;

/// Condition polled by a condition-wait task.
pub(crate) type Predicate = Box<dyn FnMut() -> bool>;

/// What an interpolation hands to its emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Emit {
    /// Eased progress; the emitter interpolates `from → to` unclamped.
    Progress(f32),
    /// Completion; the emitter passes the literal `to`.
    Final,
}

pub(crate) enum EasingMode {
    Table(Easing),
    Curve(EasingCurve),
}

impl EasingMode {
    fn apply(&self, t: f32) -> f32 {
        match self {
            EasingMode::Table(easing) => easing.apply(t),
            EasingMode::Curve(curve) => curve.sample(t),
        }
    }
}

pub(crate) struct Interpolation {
    duration: f32,
    elapsed: f32,
    easing: EasingMode,
    /// `None` while lent out to a running callback.
    emit: Option<EmitFn>,
}

impl Interpolation {
    pub fn new(duration: f32, emit: EmitFn) -> Self {
        Self {
            duration,
            elapsed: 0.0,
            easing: EasingMode::Table(Easing::Linear),
            emit: Some(emit),
        }
    }
}

/// Countdown of a deferred call. Finishes under the same tolerance as an
/// interpolation of the same length.
pub(crate) struct Wait {
    duration: f32,
    elapsed: f32,
}

impl Wait {
    pub fn new(duration: f32) -> Self {
        Self { duration: duration.max(0.0), elapsed: 0.0 }
    }
}

pub(crate) enum TaskKind {
    Interpolate(Interpolation),
    Deferred(Wait),
    NextTick,
    NextPhysicsTick,
    Condition(Predicate),
}

/// Which driver pass advances a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Frame,
    Fixed,
}

/// Outcome of advancing a task by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Step {
    Idle,
    Emit(f32),
    Finish,
}

pub(crate) struct Task {
    pub kind: TaskKind,
    pub delay: f32,
    pub domain: TimeDomain,
    pub on_finish: Option<FinishFn>,
    /// Value of the phase's tick counter at creation. The driver skips a task
    /// during the tick it was created in.
    pub epoch: u64,
}

impl Task {
    pub fn new(kind: TaskKind, epoch: u64) -> Self {
        Self {
            kind,
            delay: 0.0,
            domain: TimeDomain::Scaled,
            on_finish: None,
            epoch,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.kind {
            TaskKind::NextPhysicsTick => Phase::Fixed,
            _ => Phase::Frame,
        }
    }

    /// Advance by `dt` seconds of this task's time domain.
    ///
    /// The delay counts down first, with no tolerance, so nothing is emitted
    /// before it has fully elapsed. The tick that exhausts it carries the
    /// remainder into the task's own elapsed time.
    pub fn advance(&mut self, dt: f32) -> Step {
        let mut dt = dt;
        if self.delay > 0.0 {
            self.delay -= dt;
            if self.delay > 0.0 {
                return Step::Idle;
            }
            dt = (-self.delay).max(0.0);
            self.delay = 0.0;
        }

        match &mut self.kind {
            TaskKind::Interpolate(interp) => {
                interp.elapsed += dt;
                if interp.elapsed + TIME_EPSILON >= interp.duration {
                    Step::Finish
                } else {
                    Step::Emit(interp.easing.apply(interp.elapsed / interp.duration))
                }
            }
            TaskKind::Deferred(wait) => {
                wait.elapsed += dt;
                if wait.elapsed + TIME_EPSILON >= wait.duration {
                    Step::Finish
                } else {
                    Step::Idle
                }
            }
            TaskKind::NextTick | TaskKind::NextPhysicsTick => Step::Finish,
            TaskKind::Condition(predicate) => {
                if predicate() {
                    Step::Finish
                } else {
                    Step::Idle
                }
            }
        }
    }

    /// Returns `false` for kinds without a progress curve.
    pub fn set_easing(&mut self, easing: Easing) -> bool {
        match &mut self.kind {
            TaskKind::Interpolate(interp) => {
                interp.easing = EasingMode::Table(easing);
                true
            }
            _ => false,
        }
    }

    pub fn set_easing_curve(&mut self, curve: EasingCurve) -> bool {
        match &mut self.kind {
            TaskKind::Interpolate(interp) => {
                interp.easing = EasingMode::Curve(curve);
                true
            }
            _ => false,
        }
    }

    pub fn take_emit(&mut self) -> Option<EmitFn> {
        match &mut self.kind {
            TaskKind::Interpolate(interp) => interp.emit.take(),
            _ => None,
        }
    }

    pub fn restore_emit(&mut self, emit: EmitFn) {
        if let TaskKind::Interpolate(interp) = &mut self.kind {
            interp.emit.get_or_insert(emit);
        }
    }
}

struct Slot {
    generation: u32,
    task: Option<Task>,
}

/// Index-stable task storage. Removing a task bumps its slot generation, so
/// stale handles miss; a freed slot may be reused by the next insert.
#[derive(Default)]
pub(crate) struct TaskSlab {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl TaskSlab {
    pub fn insert(&mut self, task: Task) -> TaskHandle {
        let index = match self.free.pop() {
            Some(idx) => idx,
            None => {
                self.slots.push(Slot { generation: 0, task: None });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.task = Some(task);
        self.len += 1;
        TaskHandle { index, generation: slot.generation }
    }

    pub fn get(&self, handle: TaskHandle) -> Option<&Task> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .task
            .as_ref()
    }

    pub fn get_mut(&mut self, handle: TaskHandle) -> Option<&mut Task> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?
            .task
            .as_mut()
    }

    pub fn remove(&mut self, handle: TaskHandle) -> Option<Task> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let task = slot.task.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(task)
    }

    /// Handle of the task occupying `index`, if any.
    pub fn handle_at(&self, index: usize) -> Option<TaskHandle> {
        let slot = self.slots.get(index)?;
        slot.task.as_ref()?;
        Some(TaskHandle { index: index as u32, generation: slot.generation })
    }

    /// Number of slots ever allocated; the driver walks `0..slot_count()`.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn handles(&self) -> Vec<TaskHandle> {
        (0..self.slots.len()).filter_map(|i| self.handle_at(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp(duration: f32) -> Task {
        Task::new(
            TaskKind::Interpolate(Interpolation::new(duration, Box::new(|_: &mut Scheduler, _: Emit| {}))),
            0,
        )
    }

    #[test]
    fn interpolation_emits_then_finishes() {
        let mut task = interp(1.0);
        assert_eq!(task.advance(0.25), Step::Emit(0.25));
        assert_eq!(task.advance(0.25), Step::Emit(0.5));
        assert_eq!(task.advance(0.5), Step::Finish);
    }

    #[test]
    fn drifting_deltas_still_finish_on_time() {
        let mut task = interp(1.0);
        let mut finished_at = None;
        for i in 1..=10 {
            if task.advance(0.1) == Step::Finish {
                finished_at = Some(i);
                break;
            }
        }
        assert_eq!(finished_at, Some(10));
    }

    #[test]
    fn delay_blocks_then_carries_remainder() {
        let mut task = interp(1.0);
        task.delay = 0.5;
        assert_eq!(task.advance(0.25), Step::Idle);
        assert_eq!(task.advance(0.5), Step::Emit(0.25));
    }

    #[test]
    fn delay_has_no_early_tolerance() {
        let mut task = interp(1.0);
        task.delay = 0.5;
        assert_eq!(task.advance(0.499_995), Step::Idle);
        assert!(matches!(task.advance(0.25), Step::Emit(t) if (t - 0.25).abs() < 1e-4));
    }

    #[test]
    fn deferred_wait_absorbs_drift() {
        let mut task = Task::new(TaskKind::Deferred(Wait::new(1.0)), 0);
        let mut finished_at = None;
        for i in 1..=10 {
            if task.advance(0.1) == Step::Finish {
                finished_at = Some(i);
                break;
            }
        }
        assert_eq!(finished_at, Some(10));
    }

    #[test]
    fn zero_duration_finishes_immediately() {
        let mut task = interp(0.0);
        assert_eq!(task.advance(0.016), Step::Finish);
    }

    #[test]
    fn easing_applies_to_progress() {
        let mut task = interp(1.0);
        assert!(task.set_easing(Easing::QuadIn));
        assert_eq!(task.advance(0.5), Step::Emit(0.25));
    }

    #[test]
    fn curve_replaces_easing() {
        let mut task = interp(1.0);
        task.set_easing(Easing::QuadIn);
        assert!(task.set_easing_curve(EasingCurve::from_samples(&[0.0, 0.0])));
        assert_eq!(task.advance(0.5), Step::Emit(0.0));
    }

    #[test]
    fn condition_polls_until_true() {
        let mut calls = 0;
        let mut task = Task::new(
            TaskKind::Condition(Box::new(move || {
                calls += 1;
                calls >= 3
            })),
            0,
        );
        assert_eq!(task.advance(0.1), Step::Idle);
        assert_eq!(task.advance(0.1), Step::Idle);
        assert_eq!(task.advance(0.1), Step::Finish);
    }

    #[test]
    fn auxiliary_kinds_reject_easing() {
        let mut task = Task::new(TaskKind::Deferred(Wait::new(1.0)), 0);
        assert!(!task.set_easing(Easing::QuadIn));
        assert!(task.take_emit().is_none());
    }

    #[test]
    fn slab_handles_go_stale_on_remove() {
        let mut slab = TaskSlab::default();
        let a = slab.insert(Task::new(TaskKind::NextTick, 0));
        assert!(slab.get(a).is_some());
        assert!(slab.remove(a).is_some());
        assert!(slab.get(a).is_none());
        assert!(slab.remove(a).is_none());

        let b = slab.insert(Task::new(TaskKind::NextTick, 0));
        assert_eq!(b.index, a.index);
        assert!(slab.get(a).is_none());
        assert!(slab.get(b).is_some());
        assert_eq!(slab.len(), 1);
    }

    #[test]
    fn slab_handle_at_skips_vacant_slots() {
        let mut slab = TaskSlab::default();
        let a = slab.insert(Task::new(TaskKind::NextTick, 0));
        let b = slab.insert(Task::new(TaskKind::NextTick, 0));
        slab.remove(a);
        assert_eq!(slab.handle_at(0), None);
        assert_eq!(slab.handle_at(1), Some(b));
        assert_eq!(slab.handles(), vec![b]);
    }
}
