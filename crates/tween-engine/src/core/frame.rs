use crate::api::config::SchedulerConfig;
use crate::api::error::SchedulerError;
use crate::core::arena::TransformStore;
use crate::core::scheduler::Scheduler;
use crate::core::time::FixedTimestep;

/// Main-loop wiring around a [`Scheduler`].
///
/// Each frame runs the due fixed steps, then the frame tick split around the
/// caller's own simulation so it overlaps the position batch.
pub struct FrameLoop {
    scheduler: Scheduler,
    timestep: FixedTimestep,
}

impl FrameLoop {
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let timestep = FixedTimestep::new(config.fixed_dt, config.max_fixed_steps);
        Ok(Self {
            scheduler: Scheduler::new(config)?,
            timestep,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Run one frame of `dt` real seconds. Returns the fixed steps taken.
    ///
    /// `simulate` runs between dispatch and join. It must not read positions
    /// the batch is about to write; those land at the end of the frame.
    pub fn frame<S, F>(&mut self, dt: f32, store: &mut S, simulate: F) -> u32
    where
        S: TransformStore + ?Sized,
        F: FnOnce(&mut Scheduler, &mut S),
    {
        // Fixed steps follow game time, so they stop while paused.
        let scaled_dt = if self.scheduler.is_paused() {
            0.0
        } else {
            dt.max(0.0) * self.scheduler.time_scale()
        };
        let steps = self.timestep.accumulate(scaled_dt);
        for _ in 0..steps {
            self.scheduler.fixed_tick();
        }

        self.scheduler.begin_tick(dt, store);
        simulate(&mut self.scheduler, store);
        self.scheduler.end_tick(store);
        steps
    }

    /// Interpolation alpha between the last two fixed steps (0.0 to 1.0).
    pub fn alpha(&self) -> f32 {
        self.timestep.alpha()
    }

    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use glam::Vec3;

    use super::*;
    use crate::core::arena::TransformArena;

    fn frame_loop() -> FrameLoop {
        FrameLoop::new(SchedulerConfig {
            worker_threads: 1,
            fixed_dt: 0.1,
            max_fixed_steps: 3,
            ..SchedulerConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn fixed_steps_follow_accumulated_time() {
        let mut fl = frame_loop();
        let mut world = TransformArena::new();
        assert_eq!(fl.frame(0.05, &mut world, |_, _| {}), 0);
        assert_eq!(fl.frame(0.075, &mut world, |_, _| {}), 1);
        assert_eq!(fl.frame(1.0, &mut world, |_, _| {}), 3);
    }

    #[test]
    fn paused_frames_take_no_fixed_steps() {
        let mut fl = frame_loop();
        let mut world = TransformArena::new();
        fl.scheduler_mut().pause();
        assert_eq!(fl.frame(0.5, &mut world, |_, _| {}), 0);
    }

    #[test]
    fn simulate_runs_while_batch_in_flight() {
        let mut fl = frame_loop();
        let mut world = TransformArena::new();
        let owner = world.spawn(Vec3::ZERO);
        fl.scheduler_mut().move_to_point(owner, Vec3::X, 1.0);

        let saw_flight = Rc::new(Cell::new(false));
        let saw = saw_flight.clone();
        fl.frame(0.5, &mut world, move |s, _| saw.set(s.batch().is_in_flight()));

        assert!(saw_flight.get());
        assert!(!fl.scheduler().batch().is_in_flight());
        assert!((world.position(owner).unwrap().x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn moves_queued_during_simulate_start_next_frame() {
        let mut fl = frame_loop();
        let mut world = TransformArena::new();
        let first = world.spawn(Vec3::ZERO);
        let second = world.spawn(Vec3::ZERO);
        let old = fl.scheduler_mut().move_to_point(first, Vec3::X, 1.0);

        let queued = Rc::new(Cell::new(None));
        let q = queued.clone();
        fl.frame(0.25, &mut world, move |s, _| {
            assert!(s.batch().is_in_flight());
            assert_eq!(s.stop_moves_for(first), 1);
            q.set(Some(s.move_to_point(second, Vec3::new(0.0, 4.0, 0.0), 1.0)));
            assert!(s.batch().is_aligned());
            assert_eq!(s.batch().pending_len(), 1);
        });

        // Stopped mid-flight: evicted at join without a write.
        assert!(!fl.scheduler().is_move_active(old));
        assert_eq!(world.position(first), Some(Vec3::ZERO));
        assert_eq!(fl.scheduler().batch().active_len(), 0);
        assert!(fl.scheduler().batch().is_aligned());

        let queued = queued.get().unwrap();
        assert!(fl.scheduler().is_move_active(queued));
        fl.frame(0.5, &mut world, |_, _| {});
        assert_eq!(fl.scheduler().batch().pending_len(), 0);
        assert_eq!(fl.scheduler().batch().active_len(), 1);
        assert!(fl.scheduler().batch().is_aligned());
        assert!((world.position(second).unwrap().y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn physics_tick_fires_on_fixed_step() {
        let mut fl = frame_loop();
        let mut world = TransformArena::new();
        let fired = Rc::new(Cell::new(false));
        let f = fired.clone();
        let h = fl.scheduler_mut().next_physics_tick();
        fl.scheduler_mut().set_on_finish(h, move |_| f.set(true));

        fl.frame(0.05, &mut world, |_, _| {});
        assert!(!fired.get());
        fl.frame(0.05, &mut world, |_, _| {});
        assert!(fired.get());
    }
}
