/// Fixed-timestep accumulator.
///
/// Variable frame deltas go in, a whole number of fixed simulation steps
/// comes out. At most `max_steps` are returned per frame; time beyond that
/// is dropped so a slow frame cannot snowball into a slower one.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FixedStep {
    step: f32,
    max_steps: u32,
    accumulator: f32,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 5)
    }
}

impl FixedStep {
    /// # Panics
    /// If `step` is not a positive finite number or `max_steps` is zero.
    pub fn new(step: f32, max_steps: u32) -> Self {
        assert!(step.is_finite() && step > 0.0, "fixed step must be positive, got {step}");
        assert!(max_steps > 0, "max_steps must be at least 1");
        Self { step, max_steps, accumulator: 0.0 }
    }

    /// Step rate in Hz.
    pub fn from_rate(hz: f32, max_steps: u32) -> Self {
        Self::new(1.0 / hz, max_steps)
    }

    #[inline]
    pub fn step(&self) -> f32 {
        self.step
    }

    /// Adds `dt` seconds and returns how many fixed steps to simulate now.
    pub fn advance(&mut self, dt: f32) -> u32 {
        if dt.is_finite() && dt > 0.0 {
            self.accumulator += dt;
        }

        let mut steps = 0;
        while self.accumulator >= self.step && steps < self.max_steps {
            self.accumulator -= self.step;
            steps += 1;
        }

        if self.accumulator >= self.step {
            log::debug!("fixed step behind by {:.3}s, dropping backlog", self.accumulator);
            self.accumulator %= self.step;
        }
        steps
    }

    /// Fraction of a step left in the accumulator, for render interpolation.
    #[inline]
    pub fn alpha(&self) -> f32 {
        self.accumulator / self.step
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_steps_are_consumed() {
        let mut fs = FixedStep::new(0.25, 8);
        assert_eq!(fs.advance(0.125), 0);
        assert_eq!(fs.advance(0.125), 1);
        assert_eq!(fs.advance(0.75), 3);
        assert_eq!(fs.alpha(), 0.0);
    }

    #[test]
    fn remainder_carries_to_next_frame() {
        let mut fs = FixedStep::new(0.25, 8);
        assert_eq!(fs.advance(0.375), 1);
        assert_eq!(fs.alpha(), 0.5);
        assert_eq!(fs.advance(0.125), 1);
    }

    #[test]
    fn catch_up_is_capped_and_backlog_dropped() {
        let mut fs = FixedStep::new(0.25, 2);
        assert_eq!(fs.advance(2.125), 2);
        assert_eq!(fs.alpha(), 0.5);
        assert_eq!(fs.advance(0.0), 0);
    }

    #[test]
    fn bogus_deltas_are_ignored() {
        let mut fs = FixedStep::default();
        assert_eq!(fs.advance(f32::NAN), 0);
        assert_eq!(fs.advance(-1.0), 0);
        assert_eq!(fs.alpha(), 0.0);
    }

    #[test]
    #[should_panic(expected = "fixed step must be positive")]
    fn zero_step_panics() {
        FixedStep::new(0.0, 1);
    }
}
