//! Fixed timestep accumulator.
//!
//! The simulation advances in frames of a configurable length; physics runs
//! at its own fixed rate, catching up a bounded number of steps per frame.

/// Most physics steps run for a single frame.
const MAX_UPDATES: u32 = 10;

/// Largest frame delta accepted, in seconds.
const MAX_DT: f32 = 0.25;

/// Splits frame time into fixed physics steps.
#[derive(Debug, Clone)]
pub struct FixedStep {
    /// Time not yet consumed by a physics step
    accumulator: f32,
    /// Physics step length
    fixed_dt: f32,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

impl FixedStep {
    /// Creates an accumulator for steps of `fixed_dt` seconds.
    #[must_use]
    pub fn new(fixed_dt: f32) -> Self {
        Self {
            accumulator: 0.0,
            fixed_dt: fixed_dt.max(0.001),
        }
    }

    /// Physics step length.
    #[must_use]
    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    /// Adds a frame's worth of time.
    /// Returns the number of physics steps to run.
    pub fn accumulate(&mut self, dt: f32) -> u32 {
        self.accumulator += dt.clamp(0.0, MAX_DT);
        let mut count = 0;

        while self.accumulator >= self.fixed_dt && count < MAX_UPDATES {
            self.accumulator -= self.fixed_dt;
            count += 1;
        }

        // Still behind after the cap, drop the backlog
        if self.accumulator > self.fixed_dt * 2.0 {
            self.accumulator = 0.0;
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulate_whole_steps() {
        let mut step = FixedStep::new(0.1);
        assert_eq!(step.accumulate(0.25), 2);
        assert!((step.accumulator - 0.05).abs() < 1e-3);
        assert_eq!(step.accumulate(0.06), 1);
    }

    #[test]
    fn test_accumulate_short_frames() {
        let mut step = FixedStep::new(0.1);
        assert_eq!(step.accumulate(0.04), 0);
        assert_eq!(step.accumulate(0.04), 0);
        assert_eq!(step.accumulate(0.04), 1);
    }

    #[test]
    fn test_accumulate_caps_updates() {
        let mut step = FixedStep::new(0.01);
        assert_eq!(step.accumulate(5.0), MAX_UPDATES);
        // Backlog was dropped
        assert!(step.accumulator < 0.02);
    }

    #[test]
    fn test_minimum_step() {
        let step = FixedStep::new(0.0);
        assert!((step.fixed_dt() - 0.001).abs() < f32::EPSILON);
    }
}
