//! Activation functions applied by the reference engine.

use serde::{Deserialize, Serialize};

/// Activation applied to a layer after a dense or explicit activation instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Activation {
    /// f(x) = max(0, x).
    Relu,
    /// f(x) = 1 / (1 + exp(-x)).
    Sigmoid,
    /// f(x) = tanh(x). The usual choice for recurrent state.
    Tanh,
    /// Numerically stable softmax over the whole layer:
    ///
    /// ```text
    /// Softmax(x_i) = exp(x_i - max(x)) / sum_j exp(x_j - max(x))
    /// ```
    Softmax,
}

impl Activation {
    pub fn apply_single(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            // Only meaningful over a vector; see apply_in_place.
            Activation::Softmax => x.exp(),
        }
    }

    pub fn apply_in_place(self, values: &mut [f32]) {
        if self != Activation::Softmax {
            values
                .iter_mut()
                .for_each(|value| *value = self.apply_single(*value));
            return;
        }

        let max_val = values.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mut sum = 0.0f32;
        for value in values.iter_mut() {
            *value = (*value - max_val).exp();
            sum += *value;
        }
        for value in values.iter_mut() {
            *value /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELTA: f32 = 0.00005;

    #[test]
    fn test_relu() {
        assert!((Activation::Relu.apply_single(1.5) - 1.5).abs() < DELTA);
        assert!(Activation::Relu.apply_single(-1.0).abs() < DELTA);
    }

    #[test]
    fn test_sigmoid() {
        assert!((Activation::Sigmoid.apply_single(0.0) - 0.5).abs() < DELTA);
        assert!((Activation::Sigmoid.apply_single(1.0) - 0.7311).abs() < DELTA);
    }

    #[test]
    fn test_tanh() {
        assert!((Activation::Tanh.apply_single(0.5) - 0.5_f32.tanh()).abs() < DELTA);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let mut values = [1.0, 2.0, 3.0];
        Activation::Softmax.apply_in_place(&mut values);

        // [0.09003057, 0.24472847, 0.66524096]
        assert!((values[0] - 0.09003057).abs() < DELTA);
        assert!((values[2] - 0.66524096).abs() < DELTA);
        assert!((values.iter().sum::<f32>() - 1.0).abs() < DELTA);
    }

    #[test]
    fn test_deserialize_uppercase() {
        let activation: Activation =
            serde_json::from_str("\"TANH\"").expect("activation should parse");
        assert_eq!(activation, Activation::Tanh);
    }
}
