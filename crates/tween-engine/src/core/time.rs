use crate::api::types::TimeDomain;

/// Scaled and unscaled clocks advanced once per frame.
///
/// Absolute times are kept in f64 so batch windows stay precise over long
/// sessions; per-tick deltas are f32.
#[derive(Debug, Clone)]
pub struct Clock {
    time_scale: f32,
    paused: bool,
    scaled_now: f64,
    unscaled_now: f64,
    scaled_dt: f32,
    unscaled_dt: f32,
}

/// Snapshot of both clocks, as handed to the batch workers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Now {
    pub scaled: f64,
    pub unscaled: f64,
}

impl Now {
    #[inline]
    pub fn get(self, domain: TimeDomain) -> f64 {
        match domain {
            TimeDomain::Scaled => self.scaled,
            TimeDomain::Unscaled => self.unscaled,
        }
    }
}

impl Clock {
    pub fn new(time_scale: f32) -> Self {
        Self {
            time_scale: time_scale.max(0.0),
            paused: false,
            scaled_now: 0.0,
            unscaled_now: 0.0,
            scaled_dt: 0.0,
            unscaled_dt: 0.0,
        }
    }

    /// Advance by one frame of real time. Negative deltas are treated as zero.
    pub fn advance(&mut self, real_dt: f32) {
        self.unscaled_dt = real_dt.max(0.0);
        self.scaled_dt = if self.paused { 0.0 } else { self.unscaled_dt * self.time_scale };
        self.unscaled_now += self.unscaled_dt as f64;
        self.scaled_now += self.scaled_dt as f64;
    }

    /// Delta of the most recent frame in the given domain.
    #[inline]
    pub fn delta(&self, domain: TimeDomain) -> f32 {
        match domain {
            TimeDomain::Scaled => self.scaled_dt,
            TimeDomain::Unscaled => self.unscaled_dt,
        }
    }

    pub fn now(&self) -> Now {
        Now { scaled: self.scaled_now, unscaled: self.unscaled_now }
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Fixed timestep accumulator.
/// Turns variable frame deltas into a whole number of fixed physics steps.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    /// The fixed delta time per tick.
    dt: f32,
    /// Accumulated time from variable frame deltas.
    accumulator: f32,
    /// Maximum steps returned by one `accumulate` call.
    max_steps: u32,
}

impl FixedTimestep {
    pub fn new(dt: f32, max_steps: u32) -> Self {
        Self {
            dt,
            accumulator: 0.0,
            max_steps: max_steps.max(1),
        }
    }

    /// Add frame time to the accumulator. Returns the number of fixed steps to run.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.max(0.0);
        // Cap to prevent spiral of death
        self.accumulator = self.accumulator.min(self.dt * self.max_steps as f32);
        let steps = (self.accumulator / self.dt) as u32;
        self.accumulator -= steps as f32 * self.dt;
        steps
    }

    /// Interpolation alpha for rendering between ticks (0.0 to 1.0).
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.dt
    }

    /// The fixed delta time.
    pub fn dt(&self) -> f32 {
        self.dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_step_exact() {
        let mut ts = FixedTimestep::new(1.0 / 60.0, 10);
        let steps = ts.accumulate(1.0 / 60.0);
        assert_eq!(steps, 1);
    }

    #[test]
    fn accumulates_partial() {
        let mut ts = FixedTimestep::new(1.0 / 60.0, 10);
        assert_eq!(ts.accumulate(0.008), 0);
        assert_eq!(ts.accumulate(0.010), 1);
    }

    #[test]
    fn caps_at_max_steps() {
        let mut ts = FixedTimestep::new(1.0 / 60.0, 4);
        assert_eq!(ts.accumulate(1.0), 4);
    }

    #[test]
    fn paused_clock_only_advances_unscaled() {
        let mut clock = Clock::new(1.0);
        clock.set_paused(true);
        clock.advance(0.5);
        assert_eq!(clock.delta(TimeDomain::Scaled), 0.0);
        assert_eq!(clock.delta(TimeDomain::Unscaled), 0.5);
        assert_eq!(clock.now(), Now { scaled: 0.0, unscaled: 0.5 });
    }

    #[test]
    fn time_scale_stretches_scaled_domain() {
        let mut clock = Clock::new(2.0);
        clock.advance(0.25);
        assert_eq!(clock.now().get(TimeDomain::Scaled), 0.5);
        assert_eq!(clock.now().get(TimeDomain::Unscaled), 0.25);
    }

    #[test]
    fn negative_delta_is_ignored() {
        let mut clock = Clock::default();
        clock.advance(-1.0);
        assert_eq!(clock.now(), Now::default());
    }
}
