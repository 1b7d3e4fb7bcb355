//! Sizes text so it fills a target width.

use thiserror::Error;

use crate::config::{LayoutConfig, MAX_FIT_ITERATIONS};

/// Bracket width below which further measuring cannot improve the result.
const SCALE_TOLERANCE: f32 = 0.01;

/// Measures rendered text. Width must not decrease as `scale` grows.
pub trait TextMeasure {
    fn measure(&self, text: &str, scale: f32) -> f32;
}

impl<F> TextMeasure for F
where
    F: Fn(&str, f32) -> f32,
{
    fn measure(&self, text: &str, scale: f32) -> f32 {
        self(text, scale)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LayoutError {
    #[error("Minimum scale must be positive and finite, got {0}")]
    InvalidMinScale(f32),

    #[error("Iteration cap must be between 1 and {max}, got {got}")]
    InvalidIterations { got: u32, max: u32 },
}

/// Finds the largest text scale whose measured width fits a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutFitter {
    config: LayoutConfig,
}

impl LayoutFitter {
    pub fn new(config: LayoutConfig) -> Result<Self, LayoutError> {
        if !(config.min_scale.is_finite() && config.min_scale > 0.0) {
            return Err(LayoutError::InvalidMinScale(config.min_scale));
        }
        if !(1..=MAX_FIT_ITERATIONS).contains(&config.max_iterations) {
            return Err(LayoutError::InvalidIterations {
                got: config.max_iterations,
                max: MAX_FIT_ITERATIONS,
            });
        }
        Ok(Self { config })
    }

    /// Returns the largest tested scale at which `text` fits `target`.
    ///
    /// Starts at `initial`. While every measurement fits, grows by
    /// extrapolating the last two widths, at least by `GROWTH_FACTOR`,
    /// until some scale overflows. Once bracketed, interpolates between
    /// the largest fitting and smallest overflowing sample, bisecting when
    /// the interpolation leaves the bracket. `measure` is called at most
    /// `max_iterations` times and never when `target` is not positive.
    /// Falls back to the minimum scale when nothing larger fits.
    pub fn fit<M>(&self, text: &str, target: f32, initial: f32, measure: &M) -> f32
    where
        M: TextMeasure + ?Sized,
    {
        let min = self.config.min_scale;
        if !(target > 0.0) {
            return min;
        }

        let mut scale = if initial.is_finite() { initial.max(min) } else { min };
        let mut fits: Option<Sample> = None;
        let mut below: Option<Sample> = None;
        let mut overflows: Option<Sample> = None;

        for _ in 0..self.config.max_iterations {
            let sample = Sample {
                scale,
                width: measure.measure(text, scale),
            };

            if sample.width <= target {
                if fits.map_or(true, |f| scale > f.scale) {
                    below = fits;
                    fits = Some(sample);
                }
                if sample.width <= 0.0 || sample.width == target {
                    break;
                }
            } else {
                if scale <= min {
                    return min;
                }
                if overflows.map_or(true, |o| scale < o.scale) {
                    overflows = Some(sample);
                }
            }

            match next_candidate(target, min, below, fits, overflows) {
                Some(next) => scale = next,
                None => break,
            }
        }

        fits.map_or(min, |f| f.scale)
    }
}

/// Smallest step up while every measurement so far fits.
const GROWTH_FACTOR: f32 = 1.25;

#[derive(Debug, Clone, Copy)]
struct Sample {
    scale: f32,
    width: f32,
}

impl Sample {
    fn proportional(self, target: f32) -> f32 {
        self.scale * target / self.width
    }

    /// Where the line through `self` and `other` reaches `target`.
    fn secant(self, other: Sample, target: f32) -> f32 {
        self.scale + (target - self.width) * (other.scale - self.scale) / (other.width - self.width)
    }
}

fn next_candidate(
    target: f32,
    min: f32,
    below: Option<Sample>,
    fits: Option<Sample>,
    overflows: Option<Sample>,
) -> Option<f32> {
    match (fits, overflows) {
        (Some(lo), None) => {
            let model = match below {
                Some(b) => b.secant(lo, target),
                None => lo.proportional(target),
            };
            let floor = lo.scale * GROWTH_FACTOR;
            Some(if model.is_finite() { model.max(floor) } else { floor })
        }
        (None, Some(hi)) => {
            if hi.scale - min <= 2.0 * SCALE_TOLERANCE {
                return Some(min);
            }
            let estimate = hi.proportional(target);
            // Nothing fits yet and the estimate says even the floor is too big.
            if !(estimate > min) {
                return Some(min);
            }
            if estimate < hi.scale {
                Some(estimate.min(hi.scale - SCALE_TOLERANCE))
            } else {
                Some((min + hi.scale) / 2.0)
            }
        }
        (Some(lo), Some(hi)) => {
            if hi.scale - lo.scale <= 2.0 * SCALE_TOLERANCE {
                return None;
            }
            let estimate = lo.secant(hi, target);
            if estimate > lo.scale && estimate < hi.scale {
                Some(estimate.clamp(lo.scale + SCALE_TOLERANCE, hi.scale - SCALE_TOLERANCE))
            } else {
                Some((lo.scale + hi.scale) / 2.0)
            }
        }
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fitter() -> LayoutFitter {
        LayoutFitter::new(LayoutConfig::default()).unwrap()
    }

    #[test]
    fn test_linear_measure_hits_target() {
        let measure = |text: &str, scale: f32| text.chars().count() as f32 * scale * 0.5;

        let scale = fitter().fit("12:45", 100.0, 20.0, &measure);

        assert_eq!(scale, 40.0);
    }

    #[test]
    fn test_step_measure_is_bounded_and_fits() {
        let calls = Cell::new(0);
        let measure = |_: &str, scale: f32| {
            calls.set(calls.get() + 1);
            scale.floor() * 3.0
        };

        let scale = fitter().fit("25°", 100.0, 20.0, &measure);

        assert!(calls.get() <= MAX_FIT_ITERATIONS as usize);
        assert!(scale >= 33.0, "got {}", scale);
        assert!(scale.floor() * 3.0 <= 100.0);
    }

    #[test]
    fn test_quadratic_measure_converges() {
        let measure = |_: &str, scale: f32| scale * scale;

        let scale = fitter().fit("x", 400.0, 10.0, &measure);

        assert!(scale * scale <= 400.0);
        assert!(scale > 19.0 && scale <= 20.0, "got {}", scale);
    }

    #[test]
    fn test_offset_measure_grows_to_largest_fit() {
        // Padding makes the proportional estimate undershoot every time.
        let measure = |_: &str, scale: f32| 90.0 + scale;

        let scale = fitter().fit("25°", 100.0, 6.0, &measure);

        assert!(measure("", scale) <= 100.0);
        assert!(scale >= 9.98, "got {}", scale);
    }

    #[test]
    fn test_offset_measure_from_far_below() {
        let calls = Cell::new(0);
        let measure = |_: &str, scale: f32| {
            calls.set(calls.get() + 1);
            50.0 + scale
        };

        let scale = fitter().fit("25°", 100.0, 6.0, &measure);

        assert!(calls.get() <= MAX_FIT_ITERATIONS as usize);
        assert!(50.0 + scale <= 100.0);
        assert!(scale >= 49.98, "got {}", scale);
    }

    #[test]
    fn test_concave_measure_keeps_growing() {
        let measure = |_: &str, scale: f32| 10.0 * scale.sqrt();

        let scale = fitter().fit("x", 100.0, 6.0, &measure);

        assert!(measure("", scale) <= 100.0);
        assert!(scale > 90.0, "got {}", scale);
    }

    #[test]
    fn test_never_fits_returns_min_scale() {
        let measure = |_: &str, _: f32| 1000.0;

        let scale = fitter().fit("wide", 100.0, 20.0, &measure);

        assert_eq!(scale, 6.0);
    }

    #[test]
    fn test_non_positive_target_never_measures() {
        let calls = Cell::new(0);
        let measure = |_: &str, scale: f32| {
            calls.set(calls.get() + 1);
            scale
        };

        assert_eq!(fitter().fit("a", 0.0, 20.0, &measure), 6.0);
        assert_eq!(fitter().fit("a", -5.0, 20.0, &measure), 6.0);
        assert_eq!(fitter().fit("a", f32::NAN, 20.0, &measure), 6.0);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_initial_below_min_starts_at_min() {
        let first = Cell::new(None);
        let measure = |_: &str, scale: f32| {
            if first.get().is_none() {
                first.set(Some(scale));
            }
            scale
        };

        fitter().fit("a", 50.0, 2.0, &measure);

        assert_eq!(first.get(), Some(6.0));
    }

    #[test]
    fn test_empty_text_stops_early() {
        let calls = Cell::new(0);
        let measure = |text: &str, scale: f32| {
            calls.set(calls.get() + 1);
            text.len() as f32 * scale
        };

        let scale = fitter().fit("", 100.0, 20.0, &measure);

        assert_eq!(scale, 20.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let measure = |text: &str, scale: f32| (text.len() as f32 * scale * 0.6).ceil();

        let a = fitter().fit("WED, JAN 07 2026", 160.0, 48.0, &measure);
        let b = fitter().fit("WED, JAN 07 2026", 160.0, 48.0, &measure);

        assert_eq!(a, b);
    }

    #[test]
    fn test_respects_lower_iteration_cap() {
        let calls = Cell::new(0);
        let measure = |_: &str, scale: f32| {
            calls.set(calls.get() + 1);
            scale * scale
        };
        let fitter = LayoutFitter::new(LayoutConfig {
            min_scale: 6.0,
            max_iterations: 2,
        })
        .unwrap();

        let scale = fitter.fit("x", 400.0, 10.0, &measure);

        assert_eq!(calls.get(), 2);
        assert_eq!(scale, 10.0);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let err = LayoutFitter::new(LayoutConfig {
            min_scale: 0.0,
            max_iterations: 6,
        })
        .unwrap_err();
        assert_eq!(err, LayoutError::InvalidMinScale(0.0));

        let err = LayoutFitter::new(LayoutConfig {
            min_scale: 6.0,
            max_iterations: 7,
        })
        .unwrap_err();
        assert_eq!(err, LayoutError::InvalidIterations { got: 7, max: 6 });

        assert!(LayoutFitter::new(LayoutConfig {
            min_scale: 6.0,
            max_iterations: 0,
        })
        .is_err());
    }
}
