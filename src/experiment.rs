//! End-to-end experiments
//!
//! Runs the full estimation pipeline on a trajectory and collects the
//! diagnostics printed by the command-line tool and the demos.

use crate::control::{romberg, CartpoleReward, RombergOptions};
use crate::data::Trajectory;
use crate::error::Result;
use crate::features::{Dictionary, Monomials};
use crate::koopman::diagnostics::{check_symmetric, frobenius, relative_error, spectral_distance};
use crate::koopman::{
    estimate_generator, generator_to_transition, DriftDiffusion, GeneratorData,
    GeneratorEstimate, KramersMoyal, RecursiveGenerator, RegressionMethod, SpectralDecomposition,
    Truncation, EDMD,
};
use crate::utils::Config;
use ndarray::{Array1, Array2, ArrayView2};
use num_complex::Complex64;
use tracing::info;

/// Drift and diffusion readout at one sample
#[derive(Debug, Clone)]
pub struct SampleReport {
    /// Sample index
    pub index: usize,
    /// State at the sample
    pub state: Array1<f64>,
    /// Drift from the full generator
    pub drift: Array1<f64>,
    /// Drift from the truncated eigen-expansion
    pub drift_reduced: Array1<f64>,
    /// Diffusion matrix, when second-order monomials are available
    pub diffusion: Option<Array2<f64>>,
    /// Diffusion matrix using the truncated drift
    pub diffusion_reduced: Option<Array2<f64>>,
    /// Whether the diffusion estimate passed the symmetry check
    pub symmetric: Option<bool>,
    /// Kramers–Moyal drift at the same sample
    pub km_drift: Option<Array1<f64>>,
    /// Kramers–Moyal diffusion at the same sample
    pub km_diffusion: Option<Array2<f64>>,
}

/// Results of a generator experiment
#[derive(Debug, Clone)]
pub struct GeneratorReport {
    /// Trajectory label
    pub name: String,
    /// State dimension
    pub dims: usize,
    /// Number of samples
    pub samples: usize,
    /// Dictionary size
    pub basis: usize,
    /// Fitted generator
    pub estimate: GeneratorEstimate,
    /// `‖dPsi − M Psi‖_F / ‖dPsi‖_F` over all samples
    pub relative_residual: f64,
    /// Generator eigenvalues, descending real part
    pub eigenvalues: Vec<Complex64>,
    /// Truncation used for reduced drift estimates
    pub truncation: Option<Truncation>,
    /// Mean Euclidean norm of the drift over all samples
    pub mean_drift_norm: Option<f64>,
    /// Mean diffusion matrix over all samples
    pub mean_diffusion: Option<Array2<f64>>,
    /// Readouts at evenly spaced samples
    pub sample_reports: Vec<SampleReport>,
    /// `‖exp(τL) − K_τ‖ / ‖K_τ‖` against a one-step EDMD fit
    pub transition_error: Option<f64>,
    /// Distance between `L`'s eigenvalues and EDMD's `ln(μ)/τ`
    pub edmd_spectral_distance: Option<f64>,
    /// Relative one-step EDMD prediction error of `ψ(x_{l+1})` over all pairs
    pub edmd_prediction_error: Option<f64>,
    /// Relative gap between recursive and batch Gram estimates
    pub recursive_error: Option<f64>,
    /// Mean Kramers–Moyal diffusion matrix
    pub km_mean_diffusion: Option<Array2<f64>>,
}

/// Generator estimation experiment driven by a [`Config`]
#[derive(Debug)]
pub struct GeneratorExperiment<'a> {
    config: &'a Config,
}

impl<'a> GeneratorExperiment<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Run the full pipeline on a trajectory
    pub fn run(&self, trajectory: &Trajectory) -> Result<GeneratorReport> {
        let config = self.config;
        let d = trajectory.dim();
        let dictionary = config.dictionary.build(d)?;
        let time_step = config.estimator.time_step.unwrap_or_else(|| trajectory.dt());

        info!(
            name = trajectory.name(),
            dims = d,
            samples = trajectory.len(),
            dictionary = dictionary.name(),
            "starting generator experiment"
        );

        let data = GeneratorData::build(dictionary.as_ref(), trajectory.states(), time_step)?;
        let estimate = GeneratorEstimate::fit(
            &data,
            &config.estimator.method,
            config.estimator.train_fraction,
        )?;
        let dpsi_norm = frobenius(data.dpsi.view());
        let relative_residual = if dpsi_norm > 0.0 {
            estimate.residual(data.psi.view(), data.dpsi.view()) / dpsi_norm
        } else {
            0.0
        };

        let km = if config.analysis.kramers_moyal {
            Some(KramersMoyal::from_lifted(
                data.evaluation.values.clone(),
                trajectory.states(),
                time_step,
            )?)
        } else {
            None
        };

        let indices = report_indices(trajectory.len(), config.analysis.report_samples);
        let mut truncation = None;
        let mut mean_drift_norm = None;
        let mut mean_diffusion = None;
        let mut sample_reports = Vec::with_capacity(indices.len());

        let eigenvalues = if dictionary.exponents(d).is_some() {
            let analysis =
                DriftDiffusion::new(estimate.generator.view(), dictionary.as_ref(), &data.evaluation)?;
            let chosen = config.analysis.truncation_for(data.size());
            truncation = Some(chosen);

            let mut total = 0.0;
            for l in 0..trajectory.len() {
                total += analysis.drift(l)?.iter().map(|v| v * v).sum::<f64>().sqrt();
            }
            mean_drift_norm = Some(total / trajectory.len() as f64);
            mean_diffusion = analysis.mean_diffusion_matrix().ok();

            for &l in &indices {
                let diffusion = analysis.diffusion_matrix(l).ok();
                let symmetric = diffusion.as_ref().map(|a| {
                    check_symmetric(
                        a.view(),
                        config.analysis.symmetry_rtol,
                        config.analysis.symmetry_atol,
                    )
                });
                sample_reports.push(SampleReport {
                    index: l,
                    state: trajectory.states().column(l).to_owned(),
                    drift: analysis.drift(l)?,
                    drift_reduced: analysis.drift_reduced(l, chosen)?,
                    diffusion,
                    diffusion_reduced: analysis.diffusion_matrix_reduced(l, chosen).ok(),
                    symmetric,
                    km_drift: km.as_ref().map(|km| km.drift(l)).transpose()?,
                    km_diffusion: km.as_ref().map(|km| km.diffusion_matrix(l)).transpose()?,
                });
            }
            analysis.spectral().eigenvalues.clone()
        } else {
            SpectralDecomposition::new(estimate.generator.view())?.eigenvalues
        };

        let (transition_error, edmd_spectral_distance, edmd_prediction_error) =
            if config.analysis.edmd_check {
                let (x, z) = trajectory.snapshot_pairs()?;
                let edmd = EDMD::fit(dictionary.as_ref(), x.view(), z.view(), time_step)?;
                let transition = generator_to_transition(estimate.generator.view(), time_step)?;
                (
                    Some(relative_error(transition.view(), edmd.koopman_matrix.view())),
                    Some(spectral_distance(&eigenvalues, &edmd.continuous_eigenvalues())),
                    Some(one_step_error(&edmd, data.evaluation.values.view())?),
                )
            } else {
                (None, None, None)
            };

        let recursive_error = match config.analysis.recursive_regularization {
            Some(delta) => {
                let (psi, dpsi) = data.training_split(config.estimator.train_fraction)?;
                let batch = estimate_generator(
                    psi.view(),
                    dpsi.view(),
                    &RegressionMethod::GramPseudoinverse,
                )?;
                let mut online = RecursiveGenerator::new(data.size(), delta)?;
                online.update_batch(psi.view(), dpsi.view())?;
                Some(relative_error(online.estimate().view(), batch.view()))
            }
            None => None,
        };

        let km_mean_diffusion = match &km {
            Some(km) => {
                let mut total = Array2::zeros((d, d));
                for l in 0..km.samples() {
                    total += &km.diffusion_matrix(l)?;
                }
                Some(total / km.samples() as f64)
            }
            None => None,
        };

        info!(
            residual = relative_residual,
            leading_eigenvalue = eigenvalues.first().map(|ev| ev.re).unwrap_or(0.0),
            "generator experiment finished"
        );

        Ok(GeneratorReport {
            name: trajectory.name().to_string(),
            dims: d,
            samples: trajectory.len(),
            basis: data.size(),
            estimate,
            relative_residual,
            eigenvalues,
            truncation,
            mean_drift_norm,
            mean_diffusion,
            sample_reports,
            transition_error,
            edmd_spectral_distance,
            edmd_prediction_error,
            recursive_error,
            km_mean_diffusion,
        })
    }
}

/// `‖Ψ_{+1} − K̂ Ψ‖_F / ‖Ψ_{+1}‖_F` for consecutive columns of `psi` (k × m)
fn one_step_error(edmd: &EDMD, psi: ArrayView2<f64>) -> Result<f64> {
    let mut error = 0.0;
    let mut norm = 0.0;
    for l in 0..psi.ncols().saturating_sub(1) {
        let actual = psi.column(l + 1);
        for (p, a) in edmd.predict(psi.column(l), 1)?[0].iter().zip(actual.iter()) {
            error += (p - a).powi(2);
        }
        norm += actual.iter().map(|v| v * v).sum::<f64>();
    }
    if norm < f64::EPSILON {
        return Ok(error.sqrt());
    }
    Ok((error / norm).sqrt())
}

/// `count` evenly spaced indices in `0..m`
fn report_indices(m: usize, count: usize) -> Vec<usize> {
    if m == 0 || count == 0 {
        return Vec::new();
    }
    let count = count.min(m);
    let step = m / count;
    (0..count).map(|i| i * step).collect()
}

/// Results of the CartPole control experiment
#[derive(Debug, Clone)]
pub struct ControlReport {
    /// Number of state indices
    pub samples: usize,
    /// Dictionary size over extended states
    pub basis: usize,
    /// Generator eigenvalues, descending real part
    pub eigenvalues: Vec<Complex64>,
    /// Final soft values per state index
    pub values: Array1<f64>,
    /// `(index, π(low|l), π(high|l), ∫π du)` at evenly spaced indices
    pub policy_checks: Vec<(usize, f64, f64, f64)>,
}

/// Fit the extended-state generator and run soft value iteration
pub fn run_control(config: &Config, trajectory: &Trajectory) -> Result<ControlReport> {
    let control = &config.control;
    let dictionary = Monomials::new(control.order);
    let extended = trajectory.extended_states();

    let data = GeneratorData::build(&dictionary, extended.view(), control.dt)?;
    let estimate = GeneratorEstimate::fit(&data, &control.method, 1.0)?;
    let eigenvalues = SpectralDecomposition::new(estimate.generator.view())?.eigenvalues;

    let solver = control.solver();
    let reward = CartpoleReward::default();
    let (values, policy) = solver.run(estimate.generator.view(), &dictionary, trajectory, &reward)?;

    let (low, high) = policy.bounds();
    let quadrature = RombergOptions {
        divmax: control.divmax,
        ..RombergOptions::default()
    };
    let mut policy_checks = Vec::new();
    for l in report_indices(trajectory.len(), config.analysis.report_samples) {
        let mut failure = None;
        let total = romberg(
            |u| {
                policy.density(u, l).unwrap_or_else(|e| {
                    failure.get_or_insert(e);
                    f64::NAN
                })
            },
            low,
            high,
            &quadrature,
        );
        if let Some(e) = failure {
            return Err(e);
        }
        policy_checks.push((l, policy.density(low, l)?, policy.density(high, l)?, total));
    }

    Ok(ControlReport {
        samples: trajectory.len(),
        basis: data.size(),
        eigenvalues,
        values,
        policy_checks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{simulate, Process};

    #[test]
    fn test_report_indices() {
        assert_eq!(report_indices(10, 5), vec![0, 2, 4, 6, 8]);
        assert_eq!(report_indices(3, 5), vec![0, 1, 2]);
        assert!(report_indices(0, 5).is_empty());
    }

    #[test]
    fn test_ou_experiment() {
        let mut config = Config::default();
        config.simulation.process = Process::OrnsteinUhlenbeck {
            theta: 1.0,
            mu: 0.0,
            sigma: 1.0,
        };
        config.simulation.dims = 1;
        config.simulation.x0 = 0.0;
        config.simulation.n_steps = 20_000;
        config.analysis.report_samples = 3;

        let trajectory = simulate(&config.simulation).unwrap();
        let report = GeneratorExperiment::new(&config).run(&trajectory).unwrap();

        assert_eq!(report.basis, 3);
        assert_eq!(report.sample_reports.len(), 3);
        assert!(report.mean_diffusion.is_some());
        assert!(report.transition_error.unwrap() < 0.1);
        assert!(report.edmd_prediction_error.unwrap() < 0.3);
        assert!(report.recursive_error.unwrap() < 1e-3);
        assert!(report.eigenvalues[0].norm() < 0.1);
    }
}
