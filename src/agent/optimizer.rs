use ndarray::{Array, Dimension, Zip};

use crate::{
    agent::network::Params,
    constants::agent::{ADAM_BETA1, ADAM_BETA2, ADAM_EPS},
};

/// Adam with bias corrected first and second moment estimates.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    step_count: i32,
    m: Params,
    v: Params,
}

impl Adam {
    pub fn new(params: &Params, lr: f64) -> Self {
        Adam {
            lr,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            eps: ADAM_EPS,
            step_count: 0,
            m: params.zeros_like(),
            v: params.zeros_like(),
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.lr
    }

    pub fn step_count(&self) -> i32 {
        self.step_count
    }

    pub fn step(&mut self, params: &mut Params, grads: &Params) {
        self.step_count += 1;
        let moments = Moments {
            lr: self.lr,
            beta1: self.beta1,
            beta2: self.beta2,
            eps: self.eps,
            bc1: 1. - self.beta1.powi(self.step_count),
            bc2: 1. - self.beta2.powi(self.step_count),
        };

        let layers = params
            .layers
            .iter_mut()
            .zip(&grads.layers)
            .zip(self.m.layers.iter_mut().zip(self.v.layers.iter_mut()));

        for ((layer, grad), (m, v)) in layers {
            moments.apply(&mut layer.weights, &grad.weights, &mut m.weights, &mut v.weights);
            moments.apply(&mut layer.biases, &grad.biases, &mut m.biases, &mut v.biases);
        }
    }
}

struct Moments {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    bc1: f64,
    bc2: f64,
}

impl Moments {
    fn apply<D: Dimension>(
        &self,
        param: &mut Array<f64, D>,
        grad: &Array<f64, D>,
        m: &mut Array<f64, D>,
        v: &mut Array<f64, D>,
    ) {
        Zip::from(param)
            .and(grad)
            .and(m)
            .and(v)
            .for_each(|param, &grad, m, v| {
                // m = beta1 * m + (1 - beta1) * grad
                *m = self.beta1 * *m + (1. - self.beta1) * grad;
                // v = beta2 * v + (1 - beta2) * grad^2
                *v = self.beta2 * *v + (1. - self.beta2) * grad * grad;

                let m_hat = *m / self.bc1;
                let v_hat = *v / self.bc2;
                *param -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            });
    }
}
