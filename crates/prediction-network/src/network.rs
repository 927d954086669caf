use std::path::Path;

use analysis_core::{AnalysisError, ValuationMethod};
use feature_engineering::{ValuationFeatures, FEATURE_COUNT};
use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::labels::{OutcomeLabels, MAX_MONTHS_TO_FAIR_VALUE};
use crate::layers::{relu, sigmoid, softmax_rows, softplus, Dense, DenseGrad, Standardizer};

const N_METHODS: usize = 5;
const N_SCENARIOS: usize = 3;
const N_HORIZONS: usize = 4;
const N_TASKS: usize = 4;

/// How the four task losses are combined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LossWeighting {
    /// Method, scenario, returns and time weights.
    Fixed { weights: [f64; N_TASKS] },
    /// Homoscedastic uncertainty: `Σ exp(−s_k)·L_k + s_k` with learned `s_k`.
    Uncertainty,
}

impl Default for LossWeighting {
    fn default() -> Self {
        LossWeighting::Fixed {
            weights: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: u64,
    pub loss_weighting: LossWeighting,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 32],
            learning_rate: 0.01,
            epochs: 100,
            batch_size: 32,
            seed: 42,
            loss_weighting: LossWeighting::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    /// Feature row in `FeatureName::ALL` order.
    pub features: Vec<f64>,
    pub labels: OutcomeLabels,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskLosses {
    pub method: f64,
    pub scenario: f64,
    pub returns: f64,
    pub time: f64,
}

impl TaskLosses {
    fn to_array(self) -> [f64; N_TASKS] {
        [self.method, self.scenario, self.returns, self.time]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub epochs: usize,
    pub n_examples: usize,
    pub initial_loss: f64,
    pub final_loss: f64,
    pub final_task_losses: TaskLosses,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Indexed by [`ValuationMethod::index`].
    pub method_probabilities: [f64; N_METHODS],
    pub best_method: ValuationMethod,
    /// Bull, base, bear. Sums to 1.
    pub scenario_probabilities: [f64; N_SCENARIOS],
    /// Expected fractional returns at 1, 3, 6 and 12 months.
    pub expected_returns: [f64; N_HORIZONS],
    pub months_to_fair_value: f64,
}

struct Batch {
    x: DMatrix<f64>,
    method: DMatrix<f64>,
    scenario: DMatrix<f64>,
    returns: DMatrix<f64>,
    /// Months divided by the cap, so all targets sit on a similar scale.
    time: DMatrix<f64>,
}

impl Batch {
    fn from_examples(examples: &[&TrainingExample], standardizer: &Standardizer) -> Self {
        let n = examples.len();
        let raw = DMatrix::from_fn(n, standardizer.dim(), |i, j| examples[i].features[j]);
        Self {
            x: standardizer.transform(&raw),
            method: DMatrix::from_fn(n, N_METHODS, |i, j| {
                if examples[i].labels.best_method.index() == j {
                    1.0
                } else {
                    0.0
                }
            }),
            scenario: DMatrix::from_fn(n, N_SCENARIOS, |i, j| examples[i].labels.scenario_probabilities[j]),
            returns: DMatrix::from_fn(n, N_HORIZONS, |i, j| examples[i].labels.returns[j]),
            time: DMatrix::from_fn(n, 1, |i, _| {
                examples[i].labels.months_to_fair_value / MAX_MONTHS_TO_FAIR_VALUE
            }),
        }
    }
}

struct Forward {
    /// Trunk inputs and pre-activations per layer.
    inputs: Vec<DMatrix<f64>>,
    pre_activations: Vec<DMatrix<f64>>,
    shared: DMatrix<f64>,
    method_probs: DMatrix<f64>,
    scenario_probs: DMatrix<f64>,
    returns: DMatrix<f64>,
    time_logits: DMatrix<f64>,
}

/// Shared ReLU trunk feeding four task heads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionNetwork {
    config: NetworkConfig,
    standardizer: Standardizer,
    trunk: Vec<Dense>,
    method_head: Dense,
    scenario_head: Dense,
    returns_head: Dense,
    time_head: Dense,
    /// Learned log-variances, used only with [`LossWeighting::Uncertainty`].
    log_vars: [f64; N_TASKS],
}

impl PredictionNetwork {
    fn init(config: NetworkConfig, standardizer: Standardizer) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut fan_in = standardizer.dim();
        let mut trunk = Vec::with_capacity(config.hidden_layers.len());
        for &width in &config.hidden_layers {
            trunk.push(Dense::he_uniform(fan_in, width, &mut rng));
            fan_in = width;
        }
        Self {
            method_head: Dense::he_uniform(fan_in, N_METHODS, &mut rng),
            scenario_head: Dense::he_uniform(fan_in, N_SCENARIOS, &mut rng),
            returns_head: Dense::he_uniform(fan_in, N_HORIZONS, &mut rng),
            time_head: Dense::he_uniform(fan_in, 1, &mut rng),
            log_vars: [0.0; N_TASKS],
            config,
            standardizer,
            trunk,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn input_dim(&self) -> usize {
        self.standardizer.dim()
    }

    /// Fits a fresh network. Deterministic for a given config seed.
    pub fn train(
        examples: &[TrainingExample],
        config: NetworkConfig,
    ) -> Result<(Self, TrainingReport), AnalysisError> {
        let Some(first) = examples.first() else {
            return Err(AnalysisError::missing("*", "training examples"));
        };
        let dim = first.features.len();
        if dim == 0 || examples.iter().any(|e| e.features.len() != dim) {
            return Err(AnalysisError::invalid("training examples have inconsistent feature lengths"));
        }
        if config.batch_size == 0 || config.epochs == 0 || config.learning_rate <= 0.0 {
            return Err(AnalysisError::invalid("batch size, epochs and learning rate must be positive"));
        }

        let all: Vec<&TrainingExample> = examples.iter().collect();
        let raw = DMatrix::from_fn(all.len(), dim, |i, j| all[i].features[j]);
        let standardizer = Standardizer::fit(&raw);
        let mut network = Self::init(config, standardizer);

        let full = Batch::from_examples(&all, &network.standardizer);
        let initial_loss = network.total_loss(&network.task_losses(&full));

        let mut rng = StdRng::seed_from_u64(network.config.seed.wrapping_add(1));
        let mut order: Vec<usize> = (0..examples.len()).collect();
        for epoch in 0..network.config.epochs {
            order.shuffle(&mut rng);
            for chunk in order.chunks(network.config.batch_size) {
                let members: Vec<&TrainingExample> = chunk.iter().map(|i| &examples[*i]).collect();
                let batch = Batch::from_examples(&members, &network.standardizer);
                network.step(&batch);
            }
            if epoch % 25 == 0 {
                let loss = network.total_loss(&network.task_losses(&full));
                debug!(epoch, loss, "Prediction network epoch");
            }
        }

        let final_task_losses = network.task_losses(&full);
        let report = TrainingReport {
            epochs: network.config.epochs,
            n_examples: examples.len(),
            initial_loss,
            final_loss: network.total_loss(&final_task_losses),
            final_task_losses,
        };
        info!(
            n_examples = report.n_examples,
            initial_loss = report.initial_loss,
            final_loss = report.final_loss,
            "Prediction network trained"
        );
        Ok((network, report))
    }

    fn forward(&self, x: &DMatrix<f64>) -> Forward {
        let mut inputs = Vec::with_capacity(self.trunk.len());
        let mut pre_activations = Vec::with_capacity(self.trunk.len());
        let mut h = x.clone();
        for layer in &self.trunk {
            let z = layer.forward(&h);
            inputs.push(h);
            h = relu(&z);
            pre_activations.push(z);
        }
        Forward {
            method_probs: softmax_rows(&self.method_head.forward(&h)),
            scenario_probs: softmax_rows(&self.scenario_head.forward(&h)),
            returns: self.returns_head.forward(&h),
            time_logits: self.time_head.forward(&h),
            inputs,
            pre_activations,
            shared: h,
        }
    }

    fn task_losses(&self, batch: &Batch) -> TaskLosses {
        let f = self.forward(&batch.x);
        let n = batch.x.nrows().max(1) as f64;
        let cross_entropy = |p: &DMatrix<f64>, t: &DMatrix<f64>| {
            -p.zip_map(t, |p, t| t * p.max(1e-12).ln()).sum() / n
        };
        let time = f.time_logits.map(softplus);
        TaskLosses {
            method: cross_entropy(&f.method_probs, &batch.method),
            scenario: cross_entropy(&f.scenario_probs, &batch.scenario),
            returns: (&f.returns - &batch.returns).map(|d| d * d).sum() / (n * N_HORIZONS as f64),
            time: (&time - &batch.time).map(|d| d * d).sum() / n,
        }
    }

    fn total_loss(&self, losses: &TaskLosses) -> f64 {
        let l = losses.to_array();
        match self.config.loss_weighting {
            LossWeighting::Fixed { weights } => l.iter().zip(weights).map(|(l, w)| l * w).sum(),
            LossWeighting::Uncertainty => l
                .iter()
                .zip(self.log_vars)
                .map(|(l, s)| (-s).exp() * l + s)
                .sum(),
        }
    }

    /// Per-task multipliers on the loss gradients.
    fn task_scales(&self) -> [f64; N_TASKS] {
        match self.config.loss_weighting {
            LossWeighting::Fixed { weights } => weights,
            LossWeighting::Uncertainty => self.log_vars.map(|s| (-s).exp()),
        }
    }

    /// One SGD step on `batch`.
    fn step(&mut self, batch: &Batch) {
        let f = self.forward(&batch.x);
        let n = batch.x.nrows().max(1) as f64;
        let [w_method, w_scenario, w_returns, w_time] = self.task_scales();

        // Softmax with cross-entropy differentiates to `p − target`.
        let g_method = (&f.method_probs - &batch.method) * (w_method / n);
        let g_scenario = (&f.scenario_probs - &batch.scenario) * (w_scenario / n);
        let g_returns = (&f.returns - &batch.returns) * (2.0 * w_returns / (n * N_HORIZONS as f64));
        let g_time = f.time_logits.zip_map(&batch.time, |z, t| {
            2.0 * (softplus(z) - t) * sigmoid(z) * w_time / n
        });

        let heads: [(&Dense, &DMatrix<f64>); 4] = [
            (&self.method_head, &g_method),
            (&self.scenario_head, &g_scenario),
            (&self.returns_head, &g_returns),
            (&self.time_head, &g_time),
        ];
        let mut grad_shared: DMatrix<f64> = DMatrix::zeros(f.shared.nrows(), f.shared.ncols());
        let mut head_grads: Vec<DenseGrad> = Vec::with_capacity(4);
        for (head, g) in heads {
            let (grad, back) = head.backward(&f.shared, g);
            grad_shared += back;
            head_grads.push(grad);
        }

        let mut trunk_grads: Vec<DenseGrad> = Vec::with_capacity(self.trunk.len());
        let mut grad_h = grad_shared;
        for (i, layer) in self.trunk.iter().enumerate().rev() {
            let grad_z = grad_h.zip_map(&f.pre_activations[i], |g, z| if z > 0.0 { g } else { 0.0 });
            let (grad, back) = layer.backward(&f.inputs[i], &grad_z);
            trunk_grads.push(grad);
            grad_h = back;
        }

        let lr = self.config.learning_rate;
        let mut head_grads = head_grads.into_iter();
        for head in [
            &mut self.method_head,
            &mut self.scenario_head,
            &mut self.returns_head,
            &mut self.time_head,
        ] {
            if let Some(grad) = head_grads.next() {
                head.apply(&grad, lr);
            }
        }
        for (layer, grad) in self.trunk.iter_mut().rev().zip(&trunk_grads) {
            layer.apply(grad, lr);
        }

        if self.config.loss_weighting == LossWeighting::Uncertainty {
            let losses = self.task_losses(batch).to_array();
            for (s, l) in self.log_vars.iter_mut().zip(losses) {
                // d/ds (exp(−s)·L + s) = 1 − exp(−s)·L
                *s -= lr * (1.0 - (-*s).exp() * l);
            }
        }
    }

    /// Predicts from one raw feature row.
    pub fn predict(&self, features: &[f64]) -> Result<Prediction, AnalysisError> {
        if features.len() != self.input_dim() {
            return Err(AnalysisError::invalid(format!(
                "expected {} features, got {}",
                self.input_dim(),
                features.len()
            )));
        }
        let x = self
            .standardizer
            .transform(&DMatrix::from_row_slice(1, features.len(), features));
        let f = self.forward(&x);

        let method_probabilities: [f64; N_METHODS] = std::array::from_fn(|j| f.method_probs[(0, j)]);
        let best = (0..N_METHODS)
            .max_by(|a, b| method_probabilities[*a].total_cmp(&method_probabilities[*b]))
            .unwrap_or(0);
        let best_method = ValuationMethod::from_index(best).unwrap_or(ValuationMethod::Dcf);

        Ok(Prediction {
            method_probabilities,
            best_method,
            scenario_probabilities: std::array::from_fn(|j| f.scenario_probs[(0, j)]),
            expected_returns: std::array::from_fn(|j| f.returns[(0, j)]),
            months_to_fair_value: softplus(f.time_logits[(0, 0)]) * MAX_MONTHS_TO_FAIR_VALUE,
        })
    }

    pub fn predict_features(&self, features: &ValuationFeatures) -> Result<Prediction, AnalysisError> {
        if self.input_dim() != FEATURE_COUNT {
            return Err(AnalysisError::Model(format!(
                "network was trained on {} inputs, feature set has {FEATURE_COUNT}",
                self.input_dim()
            )));
        }
        self.predict(&features.to_vector())
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string(self).map_err(|e| AnalysisError::Model(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(json).map_err(|e| AnalysisError::Model(format!("corrupt network: {e}")))
    }

    /// Writes to a sibling temp file, then renames over `path`.
    pub async fn save(&self, path: &Path) -> Result<(), AnalysisError> {
        let json = self.to_json()?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| AnalysisError::Store(format!("{}: {e}", dir.display())))?;
        }
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| AnalysisError::Store(format!("{}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| AnalysisError::Store(format!("{}: {e}", path.display())))
    }

    /// `Ok(None)` when nothing has been saved at `path` yet.
    pub async fn load(path: &Path) -> Result<Option<Self>, AnalysisError> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => Self::from_json(&json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AnalysisError::Store(format!("{}: {e}", path.display()))),
        }
    }
}
