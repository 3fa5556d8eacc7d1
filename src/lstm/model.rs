//! LSTM binary classifier
//!
//! Single LSTM layer followed by dropout and a sigmoid unit, trained with
//! class-weighted binary cross-entropy, Adam, and early stopping on a held
//! out validation split. Weights are seeded deterministically so a given
//! request always trains the same model.

use ndarray::{s, Array1, Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub hidden: usize,
    pub dropout: f64,
    pub learning_rate: f64,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub patience: usize,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            hidden: 64,
            dropout: 0.2,
            learning_rate: 1e-3,
            batch_size: 32,
            max_epochs: 30,
            patience: 5,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub epochs_run: usize,
    pub best_val_loss: f64,
}

/// Gate layout in the fused weight matrices: input, forget, cell, output
#[derive(Debug, Clone)]
pub struct LstmClassifier {
    wx: Array2<f64>, // (input, 4H)
    wh: Array2<f64>, // (H, 4H)
    b: Array1<f64>,  // (4H)
    wd: Array1<f64>, // (H)
    bd: f64,
    hidden: usize,
}

struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    c: Array2<f64>,
}

struct ForwardCache {
    steps: Vec<StepCache>,
    h_dropped: Array2<f64>,
    mask: Array2<f64>,
    probs: Array1<f64>,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LstmClassifier {
    pub fn new(input_dim: usize, hidden: usize, rng: &mut StdRng) -> Self {
        let four_h = 4 * hidden;
        let limit_x = (6.0 / (input_dim + four_h) as f64).sqrt();
        let limit_h = (6.0 / (hidden + four_h) as f64).sqrt();
        let limit_d = (6.0 / (hidden + 1) as f64).sqrt();

        let mut init = |rows: usize, cols: usize, limit: f64| {
            Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..limit))
        };

        let wx = init(input_dim, four_h, limit_x);
        let wh = init(hidden, four_h, limit_h);
        let wd = Array1::from_shape_fn(hidden, |_| rng.gen_range(-limit_d..limit_d));

        // Forget-gate bias starts at 1 so early training does not wipe state
        let mut b = Array1::zeros(four_h);
        b.slice_mut(s![hidden..2 * hidden]).fill(1.0);

        Self {
            wx,
            wh,
            b,
            wd,
            bd: 0.0,
            hidden,
        }
    }

    /// Up-probability for each sequence in the batch, without dropout
    pub fn predict(&self, x: &Array3<f64>) -> Array1<f64> {
        let cache = self.forward(x, None);
        cache.probs
    }

    fn forward(&self, x: &Array3<f64>, mask: Option<&Array2<f64>>) -> ForwardCache {
        let (batch, time, _) = x.dim();
        let h = self.hidden;

        let mut h_prev = Array2::zeros((batch, h));
        let mut c_prev = Array2::zeros((batch, h));
        let mut steps = Vec::with_capacity(time);

        for t in 0..time {
            let x_t = x.slice(s![.., t, ..]).to_owned();
            let z = x_t.dot(&self.wx) + h_prev.dot(&self.wh) + &self.b;

            let i = z.slice(s![.., 0..h]).mapv(sigmoid);
            let f = z.slice(s![.., h..2 * h]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * h..4 * h]).mapv(sigmoid);

            let c = &f * &c_prev + &i * &g;
            let h_t = &o * &c.mapv(f64::tanh);

            steps.push(StepCache {
                x: x_t,
                h_prev: h_prev.clone(),
                c_prev: c_prev.clone(),
                i,
                f,
                g,
                o,
                c: c.clone(),
            });

            h_prev = h_t;
            c_prev = c;
        }

        let mask = match mask {
            Some(m) => m.clone(),
            None => Array2::ones((batch, h)),
        };
        let h_dropped = &h_prev * &mask;
        let logits = h_dropped.dot(&self.wd) + self.bd;
        let probs = logits.mapv(sigmoid);

        ForwardCache {
            steps,
            h_dropped,
            mask,
            probs,
        }
    }

    /// One weighted-BCE gradient step over a batch; returns the batch loss
    #[allow(clippy::too_many_arguments)]
    fn train_batch(
        &mut self,
        x: &Array3<f64>,
        y: &Array1<f64>,
        sample_weights: &Array1<f64>,
        dropout: f64,
        rng: &mut StdRng,
        adam: &mut AdamState,
    ) -> f64 {
        let (batch, time, _) = x.dim();
        let h = self.hidden;
        let keep = 1.0 - dropout;

        let mask = Array2::from_shape_fn((batch, h), |_| {
            if rng.gen::<f64>() < keep {
                1.0 / keep
            } else {
                0.0
            }
        });
        let cache = self.forward(x, Some(&mask));

        let probs = cache.probs.mapv(|p| p.clamp(1e-7, 1.0 - 1e-7));
        let loss = -(0..batch)
            .map(|i| {
                sample_weights[i]
                    * (y[i] * probs[i].ln() + (1.0 - y[i]) * (1.0 - probs[i]).ln())
            })
            .sum::<f64>()
            / batch as f64;

        // dL/dlogit for weighted BCE
        let dlogit = Array1::from_shape_fn(batch, |i| {
            sample_weights[i] * (probs[i] - y[i]) / batch as f64
        });

        let grad_wd = cache.h_dropped.t().dot(&dlogit);
        let grad_bd = dlogit.sum();

        let dlogit_col = dlogit.insert_axis(Axis(1)); // (batch, 1)
        let wd_row = self.wd.view().insert_axis(Axis(0)); // (1, H)
        let mut dh = dlogit_col.dot(&wd_row) * &cache.mask;
        let mut dc: Array2<f64> = Array2::zeros((batch, h));

        let mut grad_wx = Array2::zeros(self.wx.raw_dim());
        let mut grad_wh = Array2::zeros(self.wh.raw_dim());
        let mut grad_b = Array1::zeros(self.b.raw_dim());

        for step in cache.steps.iter().rev() {
            let tanh_c = step.c.mapv(f64::tanh);
            let d_o = &dh * &tanh_c;
            dc = dc + &dh * &step.o * &tanh_c.mapv(|v| 1.0 - v * v);

            let d_i = &dc * &step.g;
            let d_g = &dc * &step.i;
            let d_f = &dc * &step.c_prev;
            let dc_prev = &dc * &step.f;

            let dz_i = d_i * &step.i * &step.i.mapv(|v| 1.0 - v);
            let dz_f = d_f * &step.f * &step.f.mapv(|v| 1.0 - v);
            let dz_g = d_g * &step.g.mapv(|v| 1.0 - v * v);
            let dz_o = d_o * &step.o * &step.o.mapv(|v| 1.0 - v);

            let mut dz = Array2::zeros((batch, 4 * h));
            dz.slice_mut(s![.., 0..h]).assign(&dz_i);
            dz.slice_mut(s![.., h..2 * h]).assign(&dz_f);
            dz.slice_mut(s![.., 2 * h..3 * h]).assign(&dz_g);
            dz.slice_mut(s![.., 3 * h..4 * h]).assign(&dz_o);

            grad_wx = grad_wx + step.x.t().dot(&dz);
            grad_wh = grad_wh + step.h_prev.t().dot(&dz);
            grad_b = grad_b + dz.sum_axis(Axis(0));

            dh = dz.dot(&self.wh.t());
            dc = dc_prev;
        }

        adam.step(self, &grad_wx, &grad_wh, &grad_b, &grad_wd, grad_bd);
        loss
    }

    /// Unweighted BCE over a dataset, no dropout
    fn loss(&self, x: &Array3<f64>, y: &Array1<f64>) -> f64 {
        let probs = self.predict(x).mapv(|p| p.clamp(1e-7, 1.0 - 1e-7));
        let n = y.len();
        -(0..n)
            .map(|i| y[i] * probs[i].ln() + (1.0 - y[i]) * (1.0 - probs[i]).ln())
            .sum::<f64>()
            / n as f64
    }
}

struct AdamState {
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: u32,
    m_wx: Array2<f64>,
    v_wx: Array2<f64>,
    m_wh: Array2<f64>,
    v_wh: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
    m_wd: Array1<f64>,
    v_wd: Array1<f64>,
    m_bd: f64,
    v_bd: f64,
}

impl AdamState {
    fn new(model: &LstmClassifier, lr: f64) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m_wx: Array2::zeros(model.wx.raw_dim()),
            v_wx: Array2::zeros(model.wx.raw_dim()),
            m_wh: Array2::zeros(model.wh.raw_dim()),
            v_wh: Array2::zeros(model.wh.raw_dim()),
            m_b: Array1::zeros(model.b.raw_dim()),
            v_b: Array1::zeros(model.b.raw_dim()),
            m_wd: Array1::zeros(model.wd.raw_dim()),
            v_wd: Array1::zeros(model.wd.raw_dim()),
            m_bd: 0.0,
            v_bd: 0.0,
        }
    }

    fn step(
        &mut self,
        model: &mut LstmClassifier,
        grad_wx: &Array2<f64>,
        grad_wh: &Array2<f64>,
        grad_b: &Array1<f64>,
        grad_wd: &Array1<f64>,
        grad_bd: f64,
    ) {
        self.t += 1;
        let correction =
            (1.0 - self.beta2.powi(self.t as i32)).sqrt() / (1.0 - self.beta1.powi(self.t as i32));
        let lr_t = self.lr * correction;
        let (b1, b2, eps) = (self.beta1, self.beta2, self.eps);

        let mut update2 =
            |p: &mut Array2<f64>, g: &Array2<f64>, m: &mut Array2<f64>, v: &mut Array2<f64>| {
                *m = m.mapv(|x| x * b1) + &g.mapv(|x| x * (1.0 - b1));
                *v = v.mapv(|x| x * b2) + &g.mapv(|x| x * x * (1.0 - b2));
                let delta = m
                    .iter()
                    .zip(v.iter())
                    .map(|(mi, vi)| lr_t * mi / (vi.sqrt() + eps))
                    .collect::<Vec<f64>>();
                let delta = Array2::from_shape_vec(p.raw_dim(), delta).expect("shape preserved");
                *p -= &delta;
            };
        update2(&mut model.wx, grad_wx, &mut self.m_wx, &mut self.v_wx);
        update2(&mut model.wh, grad_wh, &mut self.m_wh, &mut self.v_wh);

        let mut update1 =
            |p: &mut Array1<f64>, g: &Array1<f64>, m: &mut Array1<f64>, v: &mut Array1<f64>| {
                *m = m.mapv(|x| x * b1) + &g.mapv(|x| x * (1.0 - b1));
                *v = v.mapv(|x| x * b2) + &g.mapv(|x| x * x * (1.0 - b2));
                let delta = m
                    .iter()
                    .zip(v.iter())
                    .map(|(mi, vi)| lr_t * mi / (vi.sqrt() + eps))
                    .collect::<Vec<f64>>();
                let delta = Array1::from_vec(delta);
                *p -= &delta;
            };
        update1(&mut model.b, grad_b, &mut self.m_b, &mut self.v_b);
        update1(&mut model.wd, grad_wd, &mut self.m_wd, &mut self.v_wd);

        self.m_bd = self.m_bd * b1 + grad_bd * (1.0 - b1);
        self.v_bd = self.v_bd * b2 + grad_bd * grad_bd * (1.0 - b2);
        model.bd -= lr_t * self.m_bd / (self.v_bd.sqrt() + eps);
    }
}

/// Train with early stopping on validation loss, restoring the best weights
pub fn train(
    train_x: &Array3<f64>,
    train_y: &Array1<f64>,
    val_x: &Array3<f64>,
    val_y: &Array1<f64>,
    class_weights: (f64, f64),
    config: &TrainConfig,
) -> Result<(LstmClassifier, TrainSummary)> {
    let (n, _, input_dim) = train_x.dim();
    if n == 0 || val_x.dim().0 == 0 {
        return Err(Error::Model("empty training or validation split".into()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut model = LstmClassifier::new(input_dim, config.hidden, &mut rng);
    let mut adam = AdamState::new(&model, config.learning_rate);

    let sample_weights = Array1::from_shape_fn(n, |i| {
        if train_y[i] > 0.5 {
            class_weights.1
        } else {
            class_weights.0
        }
    });

    let mut best = model.clone();
    let mut best_val_loss = f64::INFINITY;
    let mut since_best = 0usize;
    let mut epochs_run = 0usize;

    let mut order: Vec<usize> = (0..n).collect();
    for _epoch in 0..config.max_epochs {
        epochs_run += 1;

        // Fisher-Yates shuffle with the seeded rng
        for i in (1..order.len()).rev() {
            let j = rng.gen_range(0..=i);
            order.swap(i, j);
        }

        for chunk in order.chunks(config.batch_size) {
            let batch_x = train_x.select(Axis(0), chunk);
            let batch_y = train_y.select(Axis(0), chunk);
            let batch_w = sample_weights.select(Axis(0), chunk);
            model.train_batch(&batch_x, &batch_y, &batch_w, config.dropout, &mut rng, &mut adam);
        }

        let val_loss = model.loss(val_x, val_y);
        if val_loss < best_val_loss {
            best_val_loss = val_loss;
            best = model.clone();
            since_best = 0;
        } else {
            since_best += 1;
            if since_best >= config.patience {
                break;
            }
        }
    }

    if !best_val_loss.is_finite() {
        return Err(Error::Model("training diverged: non-finite validation loss".into()));
    }

    Ok((
        best,
        TrainSummary {
            epochs_run,
            best_val_loss,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dataset(n: usize, time: usize, features: usize) -> (Array3<f64>, Array1<f64>) {
        // Label is 1 when the first feature trends up across the window
        let x = Array3::from_shape_fn((n, time, features), |(i, t, f)| {
            let slope = if i % 2 == 0 { 1.0 } else { -1.0 };
            if f == 0 {
                0.5 + slope * t as f64 / (2.0 * time as f64)
            } else {
                ((i + t + f) % 5) as f64 / 5.0
            }
        });
        let y = Array1::from_shape_fn(n, |i| if i % 2 == 0 { 1.0 } else { 0.0 });
        (x, y)
    }

    fn tiny_config() -> TrainConfig {
        TrainConfig {
            hidden: 8,
            max_epochs: 5,
            batch_size: 8,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_predictions_are_probabilities() {
        let (x, y) = toy_dataset(16, 10, 3);
        let (model, _) = train(
            &x.slice(s![..12, .., ..]).to_owned(),
            &y.slice(s![..12]).to_owned(),
            &x.slice(s![12.., .., ..]).to_owned(),
            &y.slice(s![12..]).to_owned(),
            (1.0, 1.0),
            &tiny_config(),
        )
        .unwrap();

        let probs = model.predict(&x);
        assert_eq!(probs.len(), 16);
        for p in probs.iter() {
            assert!(*p > 0.0 && *p < 1.0);
        }
    }

    #[test]
    fn test_training_is_deterministic() {
        let (x, y) = toy_dataset(16, 10, 3);
        let run = || {
            let (model, summary) = train(
                &x.slice(s![..12, .., ..]).to_owned(),
                &y.slice(s![..12]).to_owned(),
                &x.slice(s![12.., .., ..]).to_owned(),
                &y.slice(s![12..]).to_owned(),
                (1.0, 1.0),
                &tiny_config(),
            )
            .unwrap();
            (model.predict(&x), summary.best_val_loss)
        };
        let (probs_a, loss_a) = run();
        let (probs_b, loss_b) = run();
        assert_eq!(loss_a, loss_b);
        for (a, b) in probs_a.iter().zip(probs_b.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_training_reduces_validation_loss() {
        let (x, y) = toy_dataset(32, 12, 3);
        let train_x = x.slice(s![..24, .., ..]).to_owned();
        let train_y = y.slice(s![..24]).to_owned();
        let val_x = x.slice(s![24.., .., ..]).to_owned();
        let val_y = y.slice(s![24..]).to_owned();

        let mut rng = StdRng::seed_from_u64(7);
        let untrained = LstmClassifier::new(3, 8, &mut rng);
        let initial_loss = untrained.loss(&val_x, &val_y);

        let config = TrainConfig {
            hidden: 8,
            max_epochs: 30,
            batch_size: 8,
            ..TrainConfig::default()
        };
        let (_, summary) = train(&train_x, &train_y, &val_x, &val_y, (1.0, 1.0), &config).unwrap();
        assert!(summary.best_val_loss <= initial_loss * 1.05);
    }

    #[test]
    fn test_empty_split_rejected() {
        let (x, y) = toy_dataset(4, 5, 2);
        let empty_x = Array3::zeros((0, 5, 2));
        let empty_y = Array1::zeros(0);
        assert!(train(&x, &y, &empty_x, &empty_y, (1.0, 1.0), &tiny_config()).is_err());
    }
}
