use ndarray::{Array1, Array2, Axis};
use rand::Rng;

use crate::error::{HarnessError, Result};

/// A fully connected layer, `weights` is `inputs x outputs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dense {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl Dense {
    /// Uniform in `±1/sqrt(inputs)` for both weights and biases
    pub fn new<R: Rng>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let bound = 1. / (inputs as f64).sqrt();

        Self {
            weights: Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-bound..bound)),
            biases: Array1::from_shape_fn(outputs, |_| rng.gen_range(-bound..bound)),
        }
    }

    pub fn zeros(inputs: usize, outputs: usize) -> Self {
        Self {
            weights: Array2::zeros((inputs, outputs)),
            biases: Array1::zeros(outputs),
        }
    }
}

/// Weights of the value estimator. Also used for gradients and optimizer moments.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    pub layers: Vec<Dense>,
}

impl Params {
    pub fn zeros_like(&self) -> Self {
        Self {
            layers: self
                .layers
                .iter()
                .map(|layer| Dense::zeros(layer.weights.nrows(), layer.weights.ncols()))
                .collect(),
        }
    }

    pub fn input_dim(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.weights.nrows())
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.weights.ncols())
    }
}

/// One regression target: move the estimate of `action` for `input` toward `target`.
#[derive(Debug, Clone)]
pub struct TdSample {
    pub input: Array1<f64>,
    pub action: usize,
    pub target: f64,
}

/// ReLU hidden layers, linear output with one value per action.
#[derive(Debug, Clone)]
pub struct QNetwork {
    params: Params,
}

impl QNetwork {
    /// `layer_sizes` runs from the input width to the action count
    pub fn new<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Result<Self> {
        if layer_sizes.len() < 2 || layer_sizes.contains(&0) {
            return Err(HarnessError::Config(format!(
                "invalid layer sizes {layer_sizes:?}"
            )));
        }

        let layers = layer_sizes
            .windows(2)
            .map(|pair| Dense::new(pair[0], pair[1], rng))
            .collect();

        Ok(Self {
            params: Params { layers },
        })
    }

    pub fn from_params(params: Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    pub fn input_dim(&self) -> usize {
        self.params.input_dim()
    }

    pub fn output_dim(&self) -> usize {
        self.params.output_dim()
    }

    pub fn check_input(&self, input: &Array1<f64>) -> Result<()> {
        if input.len() != self.input_dim() {
            return Err(HarnessError::ObservationWidth {
                expected: self.input_dim(),
                got: input.len(),
            });
        }
        Ok(())
    }

    /// Estimated value of each action
    pub fn forward(&self, input: &Array1<f64>) -> Result<Array1<f64>> {
        self.check_input(input)?;
        let mut activations = activations(&self.params, input);
        Ok(activations.pop().unwrap_or_default())
    }
}

/// The input followed by every layer's output
fn activations(params: &Params, input: &Array1<f64>) -> Vec<Array1<f64>> {
    let last = params.layers.len().saturating_sub(1);
    let mut activations = Vec::with_capacity(params.layers.len() + 1);
    activations.push(input.clone());

    for (index, layer) in params.layers.iter().enumerate() {
        let z = activations[index].dot(&layer.weights) + &layer.biases;
        let a = if index == last { z } else { z.mapv(|x| x.max(0.)) };
        activations.push(a);
    }

    activations
}

/// Mean squared error between each sample's estimate for its action and its
/// target, with the gradient of that loss. `params` is left untouched.
pub fn td_gradients(params: &Params, batch: &[TdSample]) -> Result<(Params, f64)> {
    if batch.is_empty() {
        return Err(HarnessError::EmptyBatch);
    }

    let mut grads = params.zeros_like();
    let mut loss = 0.;
    let n = batch.len() as f64;

    for sample in batch {
        if sample.input.len() != params.input_dim() {
            return Err(HarnessError::ObservationWidth {
                expected: params.input_dim(),
                got: sample.input.len(),
            });
        }

        let activations = activations(params, &sample.input);
        let output = &activations[activations.len() - 1];

        let error = output[sample.action] - sample.target;
        loss += error * error / n;

        let mut delta = Array1::zeros(output.len());
        delta[sample.action] = 2. * error / n;

        for index in (0..params.layers.len()).rev() {
            let input = &activations[index];
            let grad = &mut grads.layers[index];

            let outer = input
                .view()
                .insert_axis(Axis(1))
                .dot(&delta.view().insert_axis(Axis(0)));
            grad.weights += &outer;
            grad.biases += &delta;

            if index > 0 {
                // ReLU passes gradient only where the previous layer fired
                let back = params.layers[index].weights.dot(&delta);
                delta = back * input.mapv(|a| if a > 0. { 1. } else { 0. });
            }
        }
    }

    Ok((grads, loss))
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn forward_has_one_value_per_action() {
        let mut rng = StdRng::seed_from_u64(1);
        let network = QNetwork::new(&[3, 16, 16, 2], &mut rng).unwrap();

        let output = network.forward(&Array1::from(vec![1., 2., 3.])).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(network.input_dim(), 3);
        assert_eq!(network.output_dim(), 2);
    }

    #[test]
    fn wrong_input_width_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let network = QNetwork::new(&[3, 8, 2], &mut rng).unwrap();

        let err = network.forward(&Array1::from(vec![1., 2.])).unwrap_err();
        assert!(matches!(err, HarnessError::ObservationWidth { expected: 3, got: 2 }));
    }

    #[test]
    fn invalid_layer_sizes_are_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(QNetwork::new(&[3], &mut rng).is_err());
        assert!(QNetwork::new(&[3, 0, 2], &mut rng).is_err());
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(11);
        let network = QNetwork::new(&[3, 5, 2], &mut rng).unwrap();
        let batch = vec![
            TdSample {
                input: Array1::from(vec![0.3, -0.7, 1.1]),
                action: 1,
                target: 0.5,
            },
            TdSample {
                input: Array1::from(vec![-0.2, 0.4, 0.9]),
                action: 0,
                target: -1.,
            },
        ];

        let (grads, _) = td_gradients(network.params(), &batch).unwrap();
        let h = 1e-6;

        for layer in 0..2 {
            let shape = network.params().layers[layer].weights.dim();
            for i in 0..shape.0 {
                for j in 0..shape.1 {
                    let mut plus = network.params().clone();
                    plus.layers[layer].weights[[i, j]] += h;
                    let mut minus = network.params().clone();
                    minus.layers[layer].weights[[i, j]] -= h;

                    let (_, loss_plus) = td_gradients(&plus, &batch).unwrap();
                    let (_, loss_minus) = td_gradients(&minus, &batch).unwrap();
                    let numeric = (loss_plus - loss_minus) / (2. * h);
                    let analytic = grads.layers[layer].weights[[i, j]];

                    assert!(
                        (numeric - analytic).abs() < 1e-5,
                        "layer {layer} weight {i},{j}: {numeric} vs {analytic}"
                    );
                }
            }

            for j in 0..network.params().layers[layer].biases.len() {
                let mut plus = network.params().clone();
                plus.layers[layer].biases[j] += h;
                let mut minus = network.params().clone();
                minus.layers[layer].biases[j] -= h;

                let (_, loss_plus) = td_gradients(&plus, &batch).unwrap();
                let (_, loss_minus) = td_gradients(&minus, &batch).unwrap();
                let numeric = (loss_plus - loss_minus) / (2. * h);

                assert!((numeric - grads.layers[layer].biases[j]).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn loss_is_mean_squared_error() {
        let params = Params {
            layers: vec![Dense {
                weights: Array2::zeros((2, 2)),
                biases: Array1::from(vec![1., 3.]),
            }],
        };
        let batch = vec![
            TdSample {
                input: Array1::zeros(2),
                action: 0,
                target: 0.,
            },
            TdSample {
                input: Array1::zeros(2),
                action: 1,
                target: 0.,
            },
        ];

        let (grads, loss) = td_gradients(&params, &batch).unwrap();
        assert!((loss - 5.).abs() < 1e-12);
        assert_eq!(grads.layers[0].biases, Array1::from(vec![1., 3.]));
        assert!(matches!(td_gradients(&params, &[]), Err(HarnessError::EmptyBatch)));
    }
}
