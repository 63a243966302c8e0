//! Frame Clock
//!
//! Fixed-timestep accumulator. Real elapsed time goes in (capped so a stall
//! cannot queue an unbounded burst of steps), whole simulation steps come
//! out, and the remainder is kept for the next frame.

use crate::game::config::SimConfig;

/// Converts real elapsed time into fixed simulation steps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameClock {
    tick_ms: f32,
    max_frame_ms: f32,
    accumulator_ms: f32,
    total_steps: u64,
}

impl FrameClock {
    /// Clock with `tick_ms` steps and a per-frame cap of `max_frame_ms`.
    pub fn new(tick_ms: f32, max_frame_ms: f32) -> Self {
        let tick_ms = tick_ms.max(1.0);
        Self {
            tick_ms,
            max_frame_ms: max_frame_ms.max(tick_ms),
            accumulator_ms: 0.0,
            total_steps: 0,
        }
    }

    /// Clock using the config's tick and frame cap.
    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.tick_ms, config.max_frame_ms)
    }

    /// Feed real elapsed time; returns how many steps to run now.
    pub fn advance(&mut self, elapsed_ms: f32) -> u32 {
        let elapsed = if elapsed_ms.is_finite() {
            elapsed_ms.clamp(0.0, self.max_frame_ms)
        } else {
            0.0
        };
        self.accumulator_ms += elapsed;

        let steps = (self.accumulator_ms / self.tick_ms).floor() as u32;
        self.accumulator_ms -= steps as f32 * self.tick_ms;
        self.total_steps += steps as u64;
        steps
    }

    /// Fraction of a step left over, for interpolating presentation.
    pub fn alpha(&self) -> f32 {
        (self.accumulator_ms / self.tick_ms).clamp(0.0, 1.0)
    }

    /// Step length.
    pub fn tick_ms(&self) -> f32 {
        self.tick_ms
    }

    /// Steps handed out since creation.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_and_remainder() {
        let mut clock = FrameClock::new(50.0, 100.0);
        assert_eq!(clock.advance(30.0), 0);
        assert!((clock.alpha() - 0.6).abs() < 1e-5);

        assert_eq!(clock.advance(30.0), 1);
        assert!((clock.alpha() - 0.2).abs() < 1e-5);
        assert_eq!(clock.total_steps(), 1);
    }

    #[test]
    fn test_stall_is_capped() {
        let mut clock = FrameClock::new(50.0, 100.0);
        assert_eq!(clock.advance(5_000.0), 2);
        assert_eq!(clock.alpha(), 0.0);
    }

    #[test]
    fn test_bad_elapsed_is_ignored() {
        let mut clock = FrameClock::from_config(&SimConfig::default());
        assert_eq!(clock.advance(-20.0), 0);
        assert_eq!(clock.advance(f32::NAN), 0);
        assert_eq!(clock.alpha(), 0.0);
        assert_eq!(clock.tick_ms(), 50.0);
    }
}
