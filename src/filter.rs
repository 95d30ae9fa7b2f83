//! Temporal filtering of noisy values.

/// A filter for values of type `V`.
///
/// The filter parameters live in `self`, while the accumulated history lives in a separate
/// [`Filter::State`]. That way one set of parameters can drive many independent filter states, one
/// per landmark coordinate.
pub trait Filter<V> {
    type State: Default;

    /// Adds a new value to the filter state, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}

/// An Exponential Moving Average (EMA) filter.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// Creates a new Exponential Moving Average filter.
    ///
    /// The `alpha` parameter must be between 0.0 and 1.0 and defines how quickly the weight of
    /// older values should decay. Values closer to 1.0 favor recent values over older values.
    ///
    /// # Panics
    ///
    /// This method will panic if `alpha` is not in between 0.0 and 1.0.
    pub fn new(alpha: f32) -> Self {
        assert!((0.0..=1.0).contains(&alpha), "invalid EMA alpha {alpha}");
        Self { alpha }
    }
}

/// Filter state for [`Ema`] filters.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmaState {
    last: Option<f32>,
}

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut EmaState, value: f32) -> f32 {
        let avg = match state.last {
            Some(last) => self.alpha * value + (1.0 - self.alpha) * last,
            None => value,
        };
        state.last = Some(avg);
        avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema() {
        let ema = Ema::new(0.5);
        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 1.0), 1.0);
        assert_eq!(ema.filter(&mut state, 2.0), 1.5);
        assert_eq!(ema.filter(&mut state, 2.0), 1.75);
    }

    #[test]
    fn ema_alpha_one_is_passthrough() {
        let ema = Ema::new(1.0);
        let mut state = EmaState::default();
        for _ in 0..10 {
            let v = fastrand::f32();
            assert_eq!(ema.filter(&mut state, v), v);
        }
    }

    #[test]
    #[should_panic]
    fn ema_invalid_alpha() {
        Ema::new(1.5);
    }
}
