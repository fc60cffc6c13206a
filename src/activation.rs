//! Activation functions for genome nodes.
//!
//! An activation lives on the node that produces a value: during the forward
//! pass it is applied to every weighted contribution a node sends along its
//! outgoing connections, and once more to the accumulated sum of each output
//! node after propagation.

use serde::{Deserialize, Serialize};

/// Activation function types supported by genome nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Identity function: f(x) = x. Input nodes always use this.
    #[default]
    Linear,
    /// Sigmoid: f(x) = 1 / (1 + e^(-x))
    Sigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x)
    Tanh,
    /// Rectified Linear Unit: f(x) = max(0, x)
    ReLU,
}

impl Activation {
    /// All available activation functions.
    pub const ALL: [Self; 4] = [Self::Linear, Self::Sigmoid, Self::Tanh, Self::ReLU];

    /// Apply this activation function to an input value.
    ///
    /// NaN propagates unchanged. Infinite inputs map to the function's limit
    /// so that bounded activations stay finite.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }

        match self {
            Self::Linear => x,
            Self::Sigmoid => {
                if x == f64::INFINITY {
                    return 1.0;
                }
                if x == f64::NEG_INFINITY {
                    return 0.0;
                }
                // exp overflows past ~709; the result is saturated long before that
                let clamped = x.clamp(-700.0, 700.0);
                1.0 / (1.0 + (-clamped).exp())
            }
            Self::Tanh => x.tanh(),
            Self::ReLU => x.max(0.0),
        }
    }
}
