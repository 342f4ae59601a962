use crate::behav::BehaviorProfile;
use crate::error::{Error, Result};
use crate::funcmin::*;
use crate::game_tree::*;
use crate::support::BehaviorSupport;
use std::ops::Range;

/// Knobs for a single fixed-λ solve.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    pub lambda: f64,
    pub step_size: f64,
    /// Stop once the gradient norm falls below this.
    pub tolerance: f64,
    pub max_iterations: usize,
    pub max_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            lambda: 1.0,
            step_size: 0.03,
            tolerance: 1e-10,
            max_iterations: 1000,
            max_step: 10.0,
        }
    }
}

/// Squared residual of the logit equations at a fixed λ.
///
/// The point `x` holds log-probabilities in support order. Each non-first active
/// action `a` at infoset `I` with first action `a0` contributes
/// `x_a - x_a0 - λ (u(a) - u(a0))`, and each infoset contributes `Σ exp(x_a) - 1`.
/// The value is half the sum of squares.
pub struct LogitResidual<'a, G: GameTree> {
    support: &'a BehaviorSupport<'a, G>,
    lambda: f64,
    blocks: Vec<Range<usize>>,
}

impl<'a, G: GameTree> LogitResidual<'a, G> {
    pub fn new(support: &'a BehaviorSupport<'a, G>, lambda: f64) -> Self {
        let mut blocks = Vec::with_capacity(support.infosets().len());
        let mut start = 0;
        for &iset in support.infosets() {
            let end = start + support.num_active(iset);
            blocks.push(start..end);
            start = end;
        }
        Self {
            support,
            lambda,
            blocks,
        }
    }

    fn profile(&self, x: &[f64]) -> Option<BehaviorProfile<'a, G>> {
        let mut profile = BehaviorProfile::new(self.support);
        profile.set_log_probs(x).ok()?;
        Some(profile)
    }

    #[inline]
    fn logit_residual(&self, profile: &BehaviorProfile<G>, x: &[f64], first: usize, i: usize) -> f64 {
        let layout = self.support.layout();
        let gap = profile.action_value(layout[i]) - profile.action_value(layout[first]);
        x[i] - x[first] - self.lambda * gap
    }

    /// Writes every residual at `x`, infoset by infoset.
    pub fn residuals(&self, x: &[f64]) -> Result<Vec<f64>> {
        let mut profile = BehaviorProfile::new(self.support);
        profile.set_log_probs(x)?;
        let mut out = Vec::with_capacity(x.len());
        for block in &self.blocks {
            for i in block.start + 1..block.end {
                out.push(self.logit_residual(&profile, x, block.start, i));
            }
            out.push(x[block.clone()].iter().map(|l| l.exp()).sum::<f64>() - 1.0);
        }
        Ok(out)
    }
}

impl<'a, G: GameTree> Function for LogitResidual<'a, G> {
    fn value(&self, x: &[f64]) -> f64 {
        match self.residuals(x) {
            Ok(residuals) => 0.5 * residuals.iter().map(|r| r * r).sum::<f64>(),
            Err(_) => f64::NAN,
        }
    }
}

impl<'a, G: GameTree> C1Function for LogitResidual<'a, G> {
    fn gradient(&self, x: &[f64], gradient: &mut [f64]) -> bool {
        let profile = match self.profile(x) {
            Some(profile) => profile,
            None => return false,
        };
        let layout = self.support.layout();
        gradient.iter_mut().for_each(|g| *g = 0.0);

        for block in &self.blocks {
            let first = block.start;
            for i in first + 1..block.end {
                let r = self.logit_residual(&profile, x, first, i);
                gradient[i] += r;
                gradient[first] -= r;
                if self.lambda == 0.0 {
                    continue;
                }
                // entries at the same infoset vanish under perfect recall
                for (j, &other) in layout.iter().enumerate() {
                    let d = profile.diff_action_value(layout[i], other)
                        - profile.diff_action_value(layout[first], other);
                    gradient[j] -= r * self.lambda * d;
                }
            }

            let simplex = x[block.clone()].iter().map(|l| l.exp()).sum::<f64>() - 1.0;
            for j in block.clone() {
                gradient[j] += simplex * x[j].exp();
            }
        }

        gradient.iter().all(|g| g.is_finite())
    }
}

/// Result of a fixed-λ solve.
#[derive(Clone, Debug)]
pub struct LogitSolution {
    pub lambda: f64,
    pub probs: Vec<f64>,
    pub log_probs: Vec<f64>,
    /// Objective value at the returned point.
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Corrects a profile onto the logit equations at a fixed λ.
#[derive(Clone, Debug, Default)]
pub struct LogitSolver {
    config: SolverConfig,
}

impl LogitSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Minimizes the logit residual from `start` (log-probabilities in support
    /// order), or from the centroid when no start is given.
    ///
    /// A step that makes no progress triggers a restart; a second one in a row
    /// ends the solve with `converged` unset.
    pub fn solve<G: GameTree>(
        &self,
        support: &BehaviorSupport<G>,
        start: Option<&[f64]>,
    ) -> Result<LogitSolution> {
        if !support.game().is_perfect_recall() {
            return Err(Error::ImperfectRecall);
        }
        let config = &self.config;
        let residual = LogitResidual::new(support, config.lambda);

        let mut x = match start {
            Some(start) if start.len() != support.len() => {
                return Err(Error::LengthMismatch {
                    expected: support.len(),
                    found: start.len(),
                });
            }
            Some(start) => start.to_vec(),
            None => BehaviorProfile::new(support).log_probs().to_vec(),
        };
        let n = x.len();
        let mut f = 0.0;
        let mut gradient = vec![0.0; n];
        let mut dx = vec![0.0; n];

        let mut minimizer = ConjugatePR::new(n).with_max_step(config.max_step);
        minimizer.set(
            &residual,
            &x,
            &mut f,
            &mut gradient,
            config.step_size,
            config.tolerance,
        )?;

        let mut iterations = 0;
        let mut stalled = false;
        let mut converged = minimizer.converged(&gradient);
        while !converged && iterations < config.max_iterations {
            iterations += 1;
            if minimizer.iterate(&residual, &mut x, &mut f, &mut gradient, &mut dx)? {
                stalled = false;
            } else if stalled {
                break;
            } else {
                stalled = true;
                minimizer.restart();
            }
            converged = minimizer.converged(&gradient);
            log::debug!(
                "lambda = {}, iteration {}: f = {:.3e}, |g| = {:.3e}, |dx| = {:.3e}",
                config.lambda,
                iterations,
                f,
                gradient_norm(&gradient),
                gradient_norm(&dx),
            );
        }

        if converged {
            log::info!(
                "lambda = {}: converged after {} iterations (f = {:.3e})",
                config.lambda,
                iterations,
                f
            );
        } else {
            log::warn!(
                "lambda = {}: stopped after {} iterations without convergence (|g| = {:.3e})",
                config.lambda,
                iterations,
                gradient_norm(&gradient)
            );
        }

        Ok(LogitSolution {
            lambda: config.lambda,
            probs: x.iter().map(|l| l.exp()).collect(),
            log_probs: x,
            value: f,
            iterations,
            converged,
        })
    }
}
