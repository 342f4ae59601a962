use crate::error::{Error, Result};

/// Scalar function of a real vector.
pub trait Function {
    /// Returns the value at `x`.
    fn value(&self, x: &[f64]) -> f64;
}

/// Continuously differentiable scalar function.
pub trait C1Function: Function {
    /// Writes the gradient at `x` into `gradient`.
    /// Returns `false` where the gradient is unavailable or undefined.
    fn gradient(&self, x: &[f64], gradient: &mut [f64]) -> bool;
}

/// Iterative descent over a [`C1Function`].
///
/// `set` starts a new search, `iterate` takes exactly one descent step, and
/// `restart` drops the accumulated direction so the next step is steepest descent.
pub trait FunctionMinimizer {
    /// Initializes a search at `x`, writing the value and gradient there.
    fn set(
        &mut self,
        fdf: &dyn C1Function,
        x: &[f64],
        f: &mut f64,
        gradient: &mut [f64],
        step_size: f64,
        tol: f64,
    ) -> Result<()>;

    /// Discards direction history without moving the current point.
    fn restart(&mut self);

    /// Takes one step from `x`, updating `x`, `f` and `gradient` in place and
    /// writing the displacement into `dx`. Returns `false` if no progress was made.
    fn iterate(
        &mut self,
        fdf: &dyn C1Function,
        x: &mut [f64],
        f: &mut f64,
        gradient: &mut [f64],
        dx: &mut [f64],
    ) -> Result<bool>;
}

/// Attempts to shrink the trial step before the line search gives up.
const MAX_BRACKET_TRIALS: usize = 64;

/// Iterations of parabolic refinement inside one line search.
const MAX_REFINEMENTS: usize = 10;

/// Default upper bound on the length of one step.
pub const DEFAULT_MAX_STEP: f64 = 100.0;

/// Dot product.
#[inline]
fn dot(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(l, r)| l * r).sum()
}

/// Euclidean norm of a gradient.
#[inline]
pub fn gradient_norm(gradient: &[f64]) -> f64 {
    dot(gradient, gradient).sqrt()
}

/// Writes `dx = -step * lambda * p` and `x1 = x + dx`.
#[inline]
fn take_step(x: &[f64], p: &[f64], step: f64, lambda: f64, x1: &mut [f64], dx: &mut [f64]) {
    for i in 0..x.len() {
        dx[i] = -step * lambda * p[i];
        x1[i] = x[i] + dx[i];
    }
}

fn eval_f(fdf: &dyn C1Function, x: &[f64]) -> Result<f64> {
    let f = fdf.value(x);
    if !f.is_finite() {
        return Err(Error::NonFinite);
    }
    Ok(f)
}

fn eval_df(fdf: &dyn C1Function, x: &[f64], gradient: &mut [f64]) -> Result<()> {
    if !fdf.gradient(x, gradient) {
        return Err(Error::GradientUnavailable);
    }
    if gradient.iter().any(|g| !g.is_finite()) {
        return Err(Error::NonFinite);
    }
    Ok(())
}

/// Polak-Ribiere conjugate gradient descent.
///
/// The search direction `p` is kept pointing uphill; steps go along `-p`.
/// Directions are reset to the gradient every `n` updates, and whenever the
/// Polak-Ribiere coefficient would turn negative.
#[derive(Clone, Debug)]
pub struct ConjugatePR {
    iter: usize,
    step: f64,
    initial_step: f64,
    max_step: f64,
    tol: f64,
    x1: Vec<f64>,
    dx1: Vec<f64>,
    x2: Vec<f64>,
    pnorm: f64,
    p: Vec<f64>,
    g0norm: f64,
    g0: Vec<f64>,
    restart_pending: bool,
}

impl ConjugatePR {
    /// Creates a minimizer for functions of `n` variables.
    pub fn new(n: usize) -> Self {
        Self {
            iter: 0,
            step: 0.0,
            initial_step: 0.0,
            max_step: DEFAULT_MAX_STEP,
            tol: 0.0,
            x1: vec![0.0; n],
            dx1: vec![0.0; n],
            x2: vec![0.0; n],
            pnorm: 0.0,
            p: vec![0.0; n],
            g0norm: 0.0,
            g0: vec![0.0; n],
            restart_pending: false,
        }
    }

    /// Bounds the length of any single step.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }

    /// Returns whether `gradient` is small enough to stop.
    #[inline]
    pub fn converged(&self, gradient: &[f64]) -> bool {
        gradient_norm(gradient) < self.tol
    }

    fn check_len(&self, lens: &[usize]) -> Result<()> {
        let expected = self.p.len();
        match lens.iter().find(|&&found| found != expected) {
            Some(&found) => Err(Error::LengthMismatch { expected, found }),
            None => Ok(()),
        }
    }

    fn reset_direction(&mut self, gradient: &[f64]) {
        let norm = gradient_norm(gradient);
        self.p.copy_from_slice(gradient);
        self.g0.copy_from_slice(gradient);
        self.pnorm = norm;
        self.g0norm = norm;
        self.iter = 0;
        self.step = self.initial_step;
        self.restart_pending = false;
    }

    /// Shrinks the trial step from `stepc` until it improves on `fa`, leaving
    /// the trial point in `x1` and its gradient in `gradient`.
    /// Returns `(stepb, fb)`; a zero step means the point could not move.
    #[allow(clippy::too_many_arguments)]
    fn intermediate_point(
        &mut self,
        fdf: &dyn C1Function,
        x: &[f64],
        lambda: f64,
        pg: f64,
        mut stepc: f64,
        fa: f64,
        mut fc: f64,
        gradient: &mut [f64],
    ) -> Result<(f64, f64)> {
        for _ in 0..MAX_BRACKET_TRIALS {
            let u = (pg * lambda * stepc).abs();
            let denom = (fc - fa) + u;
            let stepb = if denom > 0.0 {
                0.5 * stepc * u / denom
            } else {
                0.0
            };

            take_step(x, &self.p, stepb, lambda, &mut self.x1, &mut self.dx1);
            if x == &self.x1[..] {
                eval_df(fdf, &self.x1, gradient)?;
                return Ok((0.0, fa));
            }

            let fb = eval_f(fdf, &self.x1)?;
            if fb >= fa && stepb > 0.0 {
                fc = fb;
                stepc = stepb;
                continue;
            }

            eval_df(fdf, &self.x1, gradient)?;
            return Ok((stepb, fb));
        }
        log::trace!("line search failed to bracket a decrease");
        Err(Error::LineSearch)
    }

    /// Parabolic and golden-section refinement on `[stepa, stepc]` around `stepb`.
    /// Leaves the best point in `x2`, its displacement in `dx`, and returns the
    /// gradient norm there.
    #[allow(clippy::too_many_arguments)]
    fn minimize(
        &mut self,
        fdf: &dyn C1Function,
        x: &[f64],
        lambda: f64,
        (mut stepa, mut stepb, mut stepc): (f64, f64, f64),
        (fa, mut fb, fc): (f64, f64, f64),
        dx: &mut [f64],
        gradient: &mut [f64],
        f: &mut f64,
    ) -> Result<f64> {
        let (mut u, mut v, mut w) = (stepb, stepa, stepc);
        let (mut fu, mut fv, mut fw) = (fb, fa, fc);
        let mut old2 = (w - v).abs();
        let mut old1 = (v - u).abs();

        self.x2.copy_from_slice(&self.x1);
        dx.copy_from_slice(&self.dx1);
        *f = fb;
        self.step = stepb;
        let mut gnorm = gradient_norm(gradient);

        for _ in 0..MAX_REFINEMENTS {
            let dw = w - u;
            let dv = v - u;
            let e1 = (fv - fu) * dw * dw + (fu - fw) * dv * dv;
            let e2 = 2.0 * ((fv - fu) * dw + (fu - fw) * dv);
            let du = if e2 != 0.0 { e1 / e2 } else { 0.0 };

            let stepm = if du > 0.0 && du < stepc - stepb && du.abs() < 0.5 * old2 {
                u + du
            } else if du < 0.0 && du > stepa - stepb && du.abs() < 0.5 * old2 {
                u + du
            } else if stepc - stepb > stepb - stepa {
                0.38 * (stepc - stepb) + stepb
            } else {
                stepb - 0.38 * (stepb - stepa)
            };

            take_step(x, &self.p, stepm, lambda, &mut self.x1, &mut self.dx1);
            let fm = eval_f(fdf, &self.x1)?;

            if fm > fb {
                if fm < fv {
                    w = v;
                    v = stepm;
                    fw = fv;
                    fv = fm;
                } else if fm < fw {
                    w = stepm;
                    fw = fm;
                }
                if stepm < stepb {
                    stepa = stepm;
                } else {
                    stepc = stepm;
                }
                continue;
            }

            old2 = old1;
            old1 = (u - stepm).abs();
            w = v;
            v = u;
            u = stepm;
            fw = fv;
            fv = fu;
            fu = fm;

            self.x2.copy_from_slice(&self.x1);
            dx.copy_from_slice(&self.dx1);
            eval_df(fdf, &self.x1, gradient)?;
            let pg = dot(&self.p, gradient);
            gnorm = gradient_norm(gradient);
            *f = fm;
            self.step = stepm;

            if gnorm == 0.0 || (pg * lambda / gnorm).abs() < self.tol {
                break;
            }

            if stepm < stepb {
                stepc = stepb;
            } else {
                stepa = stepb;
            }
            stepb = stepm;
            fb = fm;
        }

        Ok(gnorm)
    }
}

impl FunctionMinimizer for ConjugatePR {
    fn set(
        &mut self,
        fdf: &dyn C1Function,
        x: &[f64],
        f: &mut f64,
        gradient: &mut [f64],
        step_size: f64,
        tol: f64,
    ) -> Result<()> {
        self.check_len(&[x.len(), gradient.len()])?;
        self.initial_step = step_size.min(self.max_step);
        self.tol = tol;
        *f = eval_f(fdf, x)?;
        eval_df(fdf, x, gradient)?;
        self.reset_direction(gradient);
        Ok(())
    }

    fn restart(&mut self) {
        self.restart_pending = true;
    }

    fn iterate(
        &mut self,
        fdf: &dyn C1Function,
        x: &mut [f64],
        f: &mut f64,
        gradient: &mut [f64],
        dx: &mut [f64],
    ) -> Result<bool> {
        self.check_len(&[x.len(), gradient.len(), dx.len()])?;
        if self.restart_pending {
            self.reset_direction(gradient);
        }
        if self.pnorm == 0.0 || self.g0norm == 0.0 {
            dx.iter_mut().for_each(|d| *d = 0.0);
            return Ok(false);
        }

        // step along -p or +p, whichever is downhill
        let pg = dot(&self.p, gradient);
        let dir = if pg >= 0.0 { 1.0 } else { -1.0 };
        let lambda = dir / self.pnorm;
        let fa = *f;
        let stepc = self.step;

        take_step(x, &self.p, stepc, lambda, &mut self.x1, dx);
        let fc = eval_f(fdf, &self.x1)?;
        if fc < fa {
            self.step = (stepc * 2.0).min(self.max_step);
            *f = fc;
            x.copy_from_slice(&self.x1);
            eval_df(fdf, x, gradient)?;
            return Ok(true);
        }

        let (stepb, fb) = self.intermediate_point(fdf, x, lambda, pg, stepc, fa, fc, gradient)?;
        if stepb == 0.0 {
            dx.iter_mut().for_each(|d| *d = 0.0);
            return Ok(false);
        }

        let g1norm = self.minimize(
            fdf,
            x,
            lambda,
            (0.0, stepb, stepc),
            (fa, fb, fc),
            dx,
            gradient,
            f,
        )?;
        x.copy_from_slice(&self.x2);

        self.iter = (self.iter + 1) % x.len();
        if self.iter == 0 {
            self.p.copy_from_slice(gradient);
            self.pnorm = g1norm;
        } else {
            // beta = max(0, g1.(g1 - g0) / |g0|^2); p stays uphill
            let beta = ((dot(gradient, gradient) - dot(gradient, &self.g0))
                / (self.g0norm * self.g0norm))
                .max(0.0);
            for (p, g) in self.p.iter_mut().zip(gradient.iter()) {
                *p = g + beta * *p;
            }
            self.pnorm = gradient_norm(&self.p);
        }
        self.g0norm = g1norm;
        self.g0.copy_from_slice(gradient);

        Ok(true)
    }
}
