use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Per-column mean/std fitted on the training matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Standardizer {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl Standardizer {
    /// Constant columns get a std of 1 so they map to 0.
    pub fn fit(x: &DMatrix<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mut mean = Vec::with_capacity(x.ncols());
        let mut std = Vec::with_capacity(x.ncols());
        for column in x.column_iter() {
            let m = column.sum() / n;
            let var = column.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            mean.push(m);
            std.push(if var > 1e-12 { var.sqrt() } else { 1.0 });
        }
        Self { mean, std }
    }

    pub fn transform(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - self.mean[j]) / self.std[j]
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// Fully connected layer computing `x · Wᵀ + b` over a row-major batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// Shape `(out, in)`.
    pub weights: DMatrix<f64>,
    pub bias: DVector<f64>,
}

/// Parameter gradients for one [`Dense`] layer.
pub struct DenseGrad {
    pub weights: DMatrix<f64>,
    pub bias: DVector<f64>,
}

impl Dense {
    /// He (Kaiming) uniform initialisation, bound `sqrt(6 / fan_in)`.
    pub fn he_uniform(fan_in: usize, fan_out: usize, rng: &mut StdRng) -> Self {
        let bound = (6.0 / fan_in.max(1) as f64).sqrt();
        Self {
            weights: DMatrix::from_fn(fan_out, fan_in, |_, _| rng.gen_range(-bound..bound)),
            bias: DVector::zeros(fan_out),
        }
    }

    pub fn forward(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = x * self.weights.transpose();
        for (j, b) in self.bias.iter().enumerate() {
            out.column_mut(j).add_scalar_mut(*b);
        }
        out
    }

    /// Given `dL/d(out)`, returns parameter gradients and `dL/d(input)`.
    pub fn backward(&self, input: &DMatrix<f64>, grad_out: &DMatrix<f64>) -> (DenseGrad, DMatrix<f64>) {
        let grad = DenseGrad {
            weights: grad_out.transpose() * input,
            bias: DVector::from_iterator(grad_out.ncols(), grad_out.column_iter().map(|c| c.sum())),
        };
        (grad, grad_out * &self.weights)
    }

    pub fn apply(&mut self, grad: &DenseGrad, learning_rate: f64) {
        self.weights -= &grad.weights * learning_rate;
        self.bias -= &grad.bias * learning_rate;
    }

    pub fn out_dim(&self) -> usize {
        self.weights.nrows()
    }
}

pub fn relu(z: &DMatrix<f64>) -> DMatrix<f64> {
    z.map(|v| v.max(0.0))
}

/// Row-wise softmax.
pub fn softmax_rows(logits: &DMatrix<f64>) -> DMatrix<f64> {
    let mut out = logits.clone();
    for i in 0..out.nrows() {
        let max = logits.row(i).max();
        let mut sum = 0.0;
        for j in 0..out.ncols() {
            out[(i, j)] = (logits[(i, j)] - max).exp();
            sum += out[(i, j)];
        }
        for j in 0..out.ncols() {
            out[(i, j)] /= sum;
        }
    }
    out
}

pub fn softplus(v: f64) -> f64 {
    if v > 20.0 {
        v
    } else {
        v.exp().ln_1p()
    }
}

pub fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
