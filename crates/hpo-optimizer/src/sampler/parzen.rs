//! Parzen (kernel density) estimator over a mixed numeric/categorical space.
//!
//! Numeric coordinates live on the unit interval and use Gaussian kernels
//! truncated to `[0, 1]`. Categorical coordinates are choice indices and use a
//! kernel that keeps the observed choice with probability `1 - lambda` and
//! otherwise draws uniformly. A prior component (wide Gaussian at 0.5, uniform
//! categorical) is always included so the density is positive everywhere.

use rand::Rng;
use std::f64::consts::{PI, SQRT_2};

const PRIOR_MU: f64 = 0.5;
const PRIOR_SIGMA: f64 = 1.0;
const MIN_SIGMA: f64 = 0.01;

/// Kind of one estimator dimension.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Dimension {
    /// Unit-interval coordinate; `grid` is the number of grid intervals.
    Numeric { grid: i64 },
    Categorical { n_choices: usize },
}

#[derive(Debug, Clone, Copy)]
enum Kernel {
    Gaussian { mu: f64, sigma: f64 },
    Categorical { center: Option<usize>, n_choices: usize, lambda: f64 },
}

impl Kernel {
    fn log_pdf(&self, x: f64) -> f64 {
        match *self {
            Self::Gaussian { mu, sigma } => {
                let z = (x - mu) / sigma;
                let mass = normal_cdf((1.0 - mu) / sigma) - normal_cdf(-mu / sigma);
                -0.5 * z * z - (sigma * (2.0 * PI).sqrt()).ln() - mass.max(f64::MIN_POSITIVE).ln()
            }
            Self::Categorical {
                center,
                n_choices,
                lambda,
            } => {
                let uniform = 1.0 / n_choices as f64;
                let p = match center {
                    None => uniform,
                    Some(c) if c == x.round() as usize => 1.0 - lambda + lambda * uniform,
                    Some(_) => lambda * uniform,
                };
                p.ln()
            }
        }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Self::Gaussian { mu, sigma } => {
                for _ in 0..64 {
                    let x = mu + sigma * standard_normal(rng);
                    if (0.0..=1.0).contains(&x) {
                        return x;
                    }
                }
                mu.clamp(0.0, 1.0)
            }
            Self::Categorical {
                center,
                n_choices,
                lambda,
            } => match center {
                Some(c) if rng.random::<f64>() >= lambda => c as f64,
                _ => rng.random_range(0..n_choices) as f64,
            },
        }
    }
}

/// Mixture of product kernels, one component per observation plus the prior.
#[derive(Debug, Clone)]
pub(crate) struct ParzenEstimator {
    components: Vec<Vec<Kernel>>,
}

impl ParzenEstimator {
    /// Fit an estimator to `observations`, each holding one coordinate per dimension.
    pub(crate) fn fit(dimensions: &[Dimension], observations: &[Vec<f64>]) -> Self {
        let n = observations.len();
        let sigmas: Vec<f64> = dimensions
            .iter()
            .enumerate()
            .map(|(d, dim)| match dim {
                Dimension::Numeric { grid } => {
                    let column: Vec<f64> = observations.iter().map(|obs| obs[d]).collect();
                    scott_bandwidth(&column, dimensions.len(), *grid)
                }
                Dimension::Categorical { .. } => 0.0,
            })
            .collect();
        let lambda = 1.0 / (1.0 + n as f64);

        let mut components: Vec<Vec<Kernel>> = observations
            .iter()
            .map(|obs| {
                dimensions
                    .iter()
                    .enumerate()
                    .map(|(d, dim)| match dim {
                        Dimension::Numeric { .. } => Kernel::Gaussian {
                            mu: obs[d],
                            sigma: sigmas[d],
                        },
                        Dimension::Categorical { n_choices } => Kernel::Categorical {
                            center: Some(obs[d].round() as usize),
                            n_choices: *n_choices,
                            lambda,
                        },
                    })
                    .collect()
            })
            .collect();

        components.push(
            dimensions
                .iter()
                .map(|dim| match dim {
                    Dimension::Numeric { .. } => Kernel::Gaussian {
                        mu: PRIOR_MU,
                        sigma: PRIOR_SIGMA,
                    },
                    Dimension::Categorical { n_choices } => Kernel::Categorical {
                        center: None,
                        n_choices: *n_choices,
                        lambda: 1.0,
                    },
                })
                .collect(),
        );

        Self { components }
    }

    /// Log density of the mixture at `point`.
    pub(crate) fn log_pdf(&self, point: &[f64]) -> f64 {
        let logs: Vec<f64> = self
            .components
            .iter()
            .map(|kernels| {
                kernels
                    .iter()
                    .zip(point)
                    .map(|(kernel, x)| kernel.log_pdf(*x))
                    .sum::<f64>()
            })
            .collect();
        log_sum_exp(&logs) - (self.components.len() as f64).ln()
    }

    /// Draw one point: pick a component uniformly, then sample each kernel.
    pub(crate) fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        let component = &self.components[rng.random_range(0..self.components.len())];
        component.iter().map(|kernel| kernel.sample(rng)).collect()
    }
}

/// Scott's rule on the unit interval, floored so neighbouring grid points
/// stay distinguishable and capped at the prior width.
fn scott_bandwidth(column: &[f64], n_dims: usize, grid: i64) -> f64 {
    let floor = if grid > 0 {
        (0.5 / grid as f64).max(MIN_SIGMA)
    } else {
        PRIOR_SIGMA
    };
    if column.len() < 2 {
        return floor.max(0.25).min(PRIOR_SIGMA);
    }
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let std = (column.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    let scott = std * n.powf(-1.0 / (n_dims as f64 + 4.0));
    scott.clamp(floor.min(PRIOR_SIGMA), PRIOR_SIGMA)
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

// Box-Muller transform.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Abramowitz & Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t
        * (0.254_829_592
            + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    sign * (1.0 - poly * (-x * x).exp())
}
