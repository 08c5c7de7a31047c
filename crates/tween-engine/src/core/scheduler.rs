use glam::Vec3;

use crate::api::config::SchedulerConfig;
use crate::api::error::SchedulerError;
use crate::api::types::{BatchHandle, ObjectHandle, TaskHandle, TimeDomain};
use crate::core::arena::TransformStore;
use crate::core::time::Clock;
use crate::extensions::easing::{Easing, EasingCurve, Lerp};
use crate::systems::batch::{BatchRunner, MoveRequest};
use crate::systems::tasks::{
    Emit, EmitFn, FinishFn, Interpolation, Phase, Step, Task, TaskKind, TaskSlab, Wait,
};

/// Drives every tween once per tick and owns the position batch.
///
/// Constructed explicitly by the main loop. A frame is split around the
/// batch job:
///
/// ```ignore
/// scheduler.begin_tick(dt, &mut world);  // tasks advance, batch dispatched
/// // ... other per-frame motion runs while workers evaluate the batch ...
/// scheduler.end_tick(&mut world);        // batch joined and written back
/// ```
///
/// Every callback receives the scheduler, so it can create or stop tasks.
/// Callback panics are not caught; they unwind out of the tick call.
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Clock,
    tasks: TaskSlab,
    batch: BatchRunner,
    /// Frame ticks started so far.
    frame: u64,
    /// Fixed (physics) ticks started so far.
    fixed_frame: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        let batch = BatchRunner::new(&config)?;
        log::info!(
            "tween scheduler ready: fixed_dt={}s, batch capacity {}",
            config.fixed_dt,
            batch.capacity()
        );
        Ok(Self {
            clock: Clock::new(config.time_scale),
            config,
            tasks: TaskSlab::default(),
            batch,
            frame: 0,
            fixed_frame: 0,
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // -- Creation API --

    /// Tween a value from `from` to `to` over `duration` seconds.
    ///
    /// `on_tick` receives the interpolated value every tick (unclamped, so
    /// overshooting easings overshoot the value) and exactly `to` on the
    /// final tick.
    pub fn interpolate<V, F>(&mut self, from: V, to: V, duration: f32, mut on_tick: F) -> TaskHandle
    where
        V: Lerp + 'static,
        F: FnMut(&mut Scheduler, V) + 'static,
    {
        let emit: EmitFn = Box::new(move |scheduler: &mut Scheduler, emit: Emit| match emit {
            Emit::Progress(t) => on_tick(scheduler, V::lerp(from, to, t)),
            Emit::Final => on_tick(scheduler, to),
        });
        self.spawn(TaskKind::Interpolate(Interpolation::new(duration, emit)))
    }

    /// Call `on_finish` once after `seconds` of scaled time.
    pub fn after<F>(&mut self, seconds: f32, on_finish: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.deferred(seconds, TimeDomain::Scaled, Box::new(on_finish))
    }

    /// Call `on_finish` once after `seconds` of real time, even while paused.
    pub fn after_unscaled<F>(&mut self, seconds: f32, on_finish: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.deferred(seconds, TimeDomain::Unscaled, Box::new(on_finish))
    }

    /// Poll `predicate` every tick and finish on the first `true`.
    /// Never times out; attach the follow-up with [`Scheduler::set_on_finish`].
    pub fn after_condition<P>(&mut self, predicate: P) -> TaskHandle
    where
        P: FnMut() -> bool + 'static,
    {
        self.spawn(TaskKind::Condition(Box::new(predicate)))
    }

    /// Call `on_finish` on the first frame tick after this one.
    pub fn next_tick<F>(&mut self, on_finish: F) -> TaskHandle
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        let handle = self.spawn(TaskKind::NextTick);
        self.set_on_finish(handle, on_finish);
        handle
    }

    /// Finish on the first fixed tick after this one.
    pub fn next_physics_tick(&mut self) -> TaskHandle {
        self.spawn(TaskKind::NextPhysicsTick)
    }

    /// Queue a position move for the parallel batch.
    pub fn move_position(&mut self, request: MoveRequest) -> BatchHandle {
        self.batch.enqueue(request, self.clock.now())
    }

    /// Linear, scaled-time move of `owner` onto `target`.
    pub fn move_to(&mut self, owner: ObjectHandle, target: ObjectHandle, duration: f32) -> BatchHandle {
        self.move_position(MoveRequest::to_object(owner, target, duration))
    }

    /// Linear, scaled-time move of `owner` to a fixed point.
    pub fn move_to_point(&mut self, owner: ObjectHandle, point: Vec3, duration: f32) -> BatchHandle {
        self.move_position(MoveRequest::to_point(owner, point, duration))
    }

    fn deferred(&mut self, seconds: f32, domain: TimeDomain, on_finish: FinishFn) -> TaskHandle {
        let handle = self.spawn(TaskKind::Deferred(Wait::new(seconds)));
        if let Some(task) = self.tasks.get_mut(handle) {
            task.domain = domain;
            task.on_finish = Some(on_finish);
        }
        handle
    }

    fn spawn(&mut self, kind: TaskKind) -> TaskHandle {
        let epoch = match kind {
            TaskKind::NextPhysicsTick => self.fixed_frame,
            _ => self.frame,
        };
        self.tasks.insert(Task::new(kind, epoch))
    }

    // -- Task handle operations --
    //
    // All return `false` when the handle is stale (finished or stopped).

    pub fn is_active(&self, handle: TaskHandle) -> bool {
        self.tasks.get(handle).is_some()
    }

    /// Stop a task immediately. Its finish callback never fires.
    pub fn stop(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(handle).is_some()
    }

    /// Use a table easing. Replaces any curve set earlier.
    pub fn set_easing(&mut self, handle: TaskHandle, easing: Easing) -> bool {
        self.tasks.get_mut(handle).is_some_and(|task| task.set_easing(easing))
    }

    /// Use a sampled curve. Replaces any table easing set earlier.
    pub fn set_easing_curve(&mut self, handle: TaskHandle, curve: EasingCurve) -> bool {
        self.tasks.get_mut(handle).is_some_and(|task| task.set_easing_curve(curve))
    }

    pub fn set_on_finish<F>(&mut self, handle: TaskHandle, on_finish: F) -> bool
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        match self.tasks.get_mut(handle) {
            Some(task) => {
                task.on_finish = Some(Box::new(on_finish));
                true
            }
            None => false,
        }
    }

    pub fn set_unscaled_time(&mut self, handle: TaskHandle, unscaled: bool) -> bool {
        match self.tasks.get_mut(handle) {
            Some(task) => {
                task.domain = TimeDomain::from_unscaled(unscaled);
                true
            }
            None => false,
        }
    }

    /// Hold the task for `delay` seconds before it progresses further.
    pub fn set_delay(&mut self, handle: TaskHandle, delay: f32) -> bool {
        match self.tasks.get_mut(handle) {
            Some(task) => {
                task.delay = delay.max(0.0);
                true
            }
            None => false,
        }
    }

    // -- Batch handle operations --

    pub fn is_move_active(&self, handle: BatchHandle) -> bool {
        self.batch.is_active(handle)
    }

    /// Stop a move. If its batch is in flight the job still completes, but
    /// the row is evicted at join without a write or finish callback.
    pub fn stop_move(&mut self, handle: BatchHandle) -> bool {
        self.batch.stop(handle)
    }

    pub fn set_move_on_finish<F>(&mut self, handle: BatchHandle, on_finish: F) -> bool
    where
        F: FnOnce(&mut Scheduler) + 'static,
    {
        self.batch.set_on_finish(handle, Box::new(on_finish))
    }

    /// Stop every move driving `owner`.
    pub fn stop_moves_for(&mut self, owner: ObjectHandle) -> usize {
        self.batch.stop_owner(owner)
    }

    /// Stop every task and move. No finish callbacks fire.
    pub fn stop_all(&mut self) {
        for handle in self.tasks.handles() {
            self.tasks.remove(handle);
        }
        self.batch.stop_all();
    }

    // -- Clock --

    pub fn time_scale(&self) -> f32 {
        self.clock.time_scale()
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.clock.set_time_scale(scale);
    }

    /// Freeze the scaled domain. Unscaled tasks keep running.
    pub fn pause(&mut self) {
        self.clock.set_paused(true);
    }

    pub fn resume(&mut self) {
        self.clock.set_paused(false);
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    /// Absolute time in a domain, in seconds since construction.
    pub fn now(&self, domain: TimeDomain) -> f64 {
        self.clock.now().get(domain)
    }

    // -- Driving --

    /// First half of a frame: advance the clocks and every non-batched task,
    /// then promote, refresh and dispatch the position batch.
    pub fn begin_tick<S: TransformStore + ?Sized>(&mut self, dt: f32, store: &mut S) {
        if self.batch.is_in_flight() {
            log::warn!("begin_tick with a position batch still in flight; joining it first");
            self.end_tick(store);
        }

        self.clock.advance(dt);
        self.frame += 1;
        self.advance_tasks(Phase::Frame);

        let now = self.clock.now();
        self.batch.promote(&*store, now);
        self.batch.refresh(&*store);
        self.batch.dispatch(now);
    }

    /// Second half of a frame: join the batch, write positions back, then
    /// run finish callbacks of moves that completed.
    pub fn end_tick<S: TransformStore + ?Sized>(&mut self, store: &mut S) {
        for on_finish in self.batch.join(store) {
            on_finish(self);
        }
    }

    /// A whole frame with nothing scheduled between dispatch and join.
    pub fn tick<S: TransformStore + ?Sized>(&mut self, dt: f32, store: &mut S) {
        self.begin_tick(dt, store);
        self.end_tick(store);
    }

    /// Advance next-physics-tick tasks by one fixed step.
    pub fn fixed_tick(&mut self) {
        self.fixed_frame += 1;
        self.advance_tasks(Phase::Fixed);
    }

    /// Join outstanding batch work, then drop every task and move without
    /// callbacks and release the batch columns.
    pub fn shutdown(&mut self) {
        self.batch.shutdown();
        for handle in self.tasks.handles() {
            self.tasks.remove(handle);
        }
        log::info!("tween scheduler shut down after {} frames", self.frame);
    }

    // -- Inspection --

    /// Live non-batched tasks.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Live moves, pending and active.
    pub fn move_count(&self) -> usize {
        self.batch.live_len()
    }

    pub fn batch(&self) -> &BatchRunner {
        &self.batch
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    fn advance_tasks(&mut self, phase: Phase) {
        let epoch = match phase {
            Phase::Frame => self.frame,
            Phase::Fixed => self.fixed_frame,
        };

        // Slots appended by callbacks during this pass are left for the next
        // tick; reused slots are skipped by their epoch.
        for index in 0..self.tasks.slot_count() {
            let Some(handle) = self.tasks.handle_at(index) else {
                continue;
            };
            let step = match self.tasks.get_mut(handle) {
                Some(task) if task.phase() == phase && task.epoch != epoch => {
                    let dt = match phase {
                        Phase::Frame => self.clock.delta(task.domain),
                        Phase::Fixed => self.config.fixed_dt,
                    };
                    task.advance(dt)
                }
                _ => continue,
            };

            match step {
                Step::Idle => {}
                Step::Emit(t) => self.emit(handle, Emit::Progress(t)),
                Step::Finish => self.finish(handle),
            }
        }
    }

    fn emit(&mut self, handle: TaskHandle, emit: Emit) {
        let Some(mut emit_fn) = self.tasks.get_mut(handle).and_then(Task::take_emit) else {
            return;
        };
        emit_fn(self, emit);
        // Stopped by its own callback: the emitter is dropped with it.
        if let Some(task) = self.tasks.get_mut(handle) {
            task.restore_emit(emit_fn);
        }
    }

    /// Retire the task first so callbacks see it inactive, then deliver the
    /// literal final value and the finish callback.
    fn finish(&mut self, handle: TaskHandle) {
        let Some(mut task) = self.tasks.remove(handle) else {
            return;
        };
        if let Some(mut emit_fn) = task.take_emit() {
            emit_fn(self, Emit::Final);
        }
        if let Some(on_finish) = task.on_finish.take() {
            on_finish(self);
        }
    }
}
