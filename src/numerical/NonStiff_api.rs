//! Explicit (non-stiff) IVP solvers: Runge-Kutta-Fehlberg 4(5) and Dormand-Prince 5(4) with
//! adaptive step size control, and the fixed-step Adams-Bashforth 4 multistep method.
//! Epidemic compartment models are non-stiff for realistic rates, so these are all the sweep needs.
use crate::error::SolverError;
use enum_dispatch::enum_dispatch;
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::rc::Rc;
use std::time::Instant;
use strum_macros::{Display, EnumIter, EnumString};

/// right hand side of the system y' = f(t, y)
pub type RhsFn = Rc<dyn Fn(f64, &DVector<f64>) -> DVector<f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum SolverMethod {
    RK45,
    DOPRI,
    AB4,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverSettings {
    pub method: SolverMethod,
    /// first step for adaptive methods, the constant step for AB4
    pub h_step: Option<f64>,
    pub max_step: f64,
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            method: SolverMethod::DOPRI,
            h_step: None,
            max_step: f64::INFINITY,
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 1_000_000,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), SolverError> {
        if let Some(h) = self.h_step {
            if !(h.is_finite() && h > 0.0) {
                return Err(SolverError::InvalidSettings(format!(
                    "step must be positive, got {}",
                    h
                )));
            }
        }
        if !(self.max_step > 0.0) {
            return Err(SolverError::InvalidSettings(format!(
                "max_step must be positive, got {}",
                self.max_step
            )));
        }
        if !(self.rtol > 0.0 && self.atol >= 0.0) {
            return Err(SolverError::InvalidSettings(format!(
                "tolerances must satisfy rtol > 0, atol >= 0 (rtol = {}, atol = {})",
                self.rtol, self.atol
            )));
        }
        if self.max_steps == 0 {
            return Err(SolverError::InvalidSettings(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// accepted steps of an integration; row i of `y` is the state at `t[i]`
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub t: DVector<f64>,
    pub y: DMatrix<f64>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn final_state(&self) -> DVector<f64> {
        self.y.row(self.y.nrows() - 1).transpose()
    }

    pub fn column(&self, index: usize) -> Vec<f64> {
        self.y.column(index).iter().copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Finished,
}

#[enum_dispatch]
pub trait Solver {
    /// advance by one accepted step, never beyond t_bound
    fn step(&mut self, t_bound: f64) -> Result<StepStatus, SolverError>;
    fn t(&self) -> f64;
    fn y(&self) -> &DVector<f64>;
}

#[enum_dispatch(Solver)]
pub enum Solvers {
    RK45(RK45),
    DOPRI(DormandPrince),
    AB4(AdamsBashforth4),
}

pub struct nonstiffODE {
    f: RhsFn,
    t0: f64,
    y0: DVector<f64>,
    t_bound: f64,
    settings: SolverSettings,
    t_result: DVector<f64>,
    y_result: DMatrix<f64>,
}

impl nonstiffODE {
    pub fn new(
        f: RhsFn,
        // start point
        t0: f64,
        // initial condition
        y0: DVector<f64>,
        t_bound: f64,
        settings: SolverSettings,
    ) -> Self {
        nonstiffODE {
            f,
            t0,
            y0,
            t_bound,
            settings,
            t_result: DVector::zeros(0),
            y_result: DMatrix::zeros(0, 0),
        }
    }

    fn generate(&self) -> Result<Solvers, SolverError> {
        self.settings.validate()?;
        if !(self.t_bound > self.t0) {
            return Err(SolverError::InvalidInterval {
                t0: self.t0,
                t_bound: self.t_bound,
            });
        }
        let span = self.t_bound - self.t0;
        let f = Rc::clone(&self.f);
        let solver = match self.settings.method {
            SolverMethod::RK45 => {
                let h = self.settings.h_step.unwrap_or(0.01 * span);
                Solvers::RK45(RK45::new(f, self.y0.clone(), self.t0, h, &self.settings))
            }
            SolverMethod::DOPRI => {
                let h = self.settings.h_step.unwrap_or(0.01 * span);
                Solvers::DOPRI(DormandPrince::new(
                    f,
                    self.y0.clone(),
                    self.t0,
                    h,
                    &self.settings,
                ))
            }
            SolverMethod::AB4 => {
                let h = self
                    .settings
                    .h_step
                    .unwrap_or(span / 1000.0)
                    .min(self.settings.max_step);
                Solvers::AB4(AdamsBashforth4::new(f, self.y0.clone(), self.t0, h))
            }
        };
        Ok(solver)
    }

    pub fn main_loop(&mut self, mut solver: Solvers) -> Result<(), SolverError> {
        let start = Instant::now();
        let mut t: Vec<f64> = vec![self.t0];
        let mut y: Vec<DVector<f64>> = vec![self.y0.clone()];
        let mut n_steps = 0usize;
        loop {
            if n_steps >= self.settings.max_steps {
                return Err(SolverError::MaxStepsExceeded {
                    max_steps: self.settings.max_steps,
                    t: solver.t(),
                });
            }
            let status = solver.step(self.t_bound)?;
            n_steps += 1;
            t.push(solver.t());
            y.push(solver.y().clone());
            if status == StepStatus::Finished {
                break;
            }
        }
        let rows = y.len();
        let cols = self.y0.len();
        self.y_result = DMatrix::from_fn(rows, cols, |r, c| y[r][c]);
        self.t_result = DVector::from_vec(t);
        debug!(
            "{} finished: {} steps in {} ms",
            self.settings.method,
            n_steps,
            start.elapsed().as_millis()
        );
        Ok(())
    }

    pub fn solve(&mut self) -> Result<Trajectory, SolverError> {
        let solver = self.generate()?;
        self.main_loop(solver)?;
        Ok(Trajectory {
            t: self.t_result.clone(),
            y: self.y_result.clone(),
        })
    }
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                 STEP SIZE CONTROL
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
struct StepControl {
    h: f64,
    max_step: f64,
    rtol: f64,
    atol: f64,
}

impl StepControl {
    fn new(h: f64, settings: &SolverSettings) -> Self {
        StepControl {
            h: h.min(settings.max_step),
            max_step: settings.max_step,
            rtol: settings.rtol,
            atol: settings.atol,
        }
    }

    /// RMS of the local error weighted by atol + rtol*|y|
    fn error_norm(&self, err: &DVector<f64>, y: &DVector<f64>, y_new: &DVector<f64>) -> f64 {
        let n = err.len().max(1) as f64;
        let sum: f64 = err
            .iter()
            .zip(y.iter().zip(y_new.iter()))
            .map(|(e, (a, b))| {
                let scale = self.atol + self.rtol * a.abs().max(b.abs());
                (e / scale).powi(2)
            })
            .sum();
        (sum / n).sqrt()
    }

    fn factor(norm: f64) -> f64 {
        if norm == 0.0 {
            5.0
        } else {
            (0.9 * norm.powf(-0.2)).clamp(0.2, 5.0)
        }
    }

    /// step for the next attempt, never past t_bound
    fn trial_step(&self, t: f64, t_bound: f64) -> Result<(f64, bool), SolverError> {
        let remaining = t_bound - t;
        if self.h < 1e-12 * t.abs().max(1.0) {
            return Err(SolverError::StepSizeTooSmall { h: self.h, t });
        }
        if self.h >= remaining {
            Ok((remaining, true))
        } else {
            Ok((self.h, false))
        }
    }

    fn accept(&mut self, h: f64, norm: f64) {
        self.h = (h * Self::factor(norm)).min(self.max_step);
    }

    fn reject(&mut self, h: f64, norm: f64) {
        self.h = h * Self::factor(norm).min(1.0);
    }
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                 RUNGE-KUTTA-FEHLBERG 4(5)
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
const RKF_C: [f64; 6] = [0.0, 1.0 / 4.0, 3.0 / 8.0, 12.0 / 13.0, 1.0, 1.0 / 2.0];
const RKF_A: [[f64; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 4.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 32.0, 9.0 / 32.0, 0.0, 0.0, 0.0],
    [1932.0 / 2197.0, -7200.0 / 2197.0, 7296.0 / 2197.0, 0.0, 0.0],
    [439.0 / 216.0, -8.0, 3680.0 / 513.0, -845.0 / 4104.0, 0.0],
    [-8.0 / 27.0, 2.0, -3544.0 / 2565.0, 1859.0 / 4104.0, -11.0 / 40.0],
];
// 5th order weights (propagated) and 4th order weights (error estimate)
const RKF_B5: [f64; 6] = [
    16.0 / 135.0,
    0.0,
    6656.0 / 12825.0,
    28561.0 / 56430.0,
    -9.0 / 50.0,
    2.0 / 55.0,
];
const RKF_B4: [f64; 6] = [
    25.0 / 216.0,
    0.0,
    1408.0 / 2565.0,
    2197.0 / 4104.0,
    -1.0 / 5.0,
    0.0,
];

pub struct RK45 {
    f: RhsFn,
    pub t: f64,
    pub y: DVector<f64>,
    control: StepControl,
}

impl RK45 {
    pub fn new(f: RhsFn, y0: DVector<f64>, t0: f64, h: f64, settings: &SolverSettings) -> RK45 {
        RK45 {
            f,
            t: t0,
            y: y0,
            control: StepControl::new(h, settings),
        }
    }

    fn _step_impl(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        loop {
            let (h, last) = self.control.trial_step(self.t, t_bound)?;
            let mut k: Vec<DVector<f64>> = Vec::with_capacity(6);
            k.push((self.f)(self.t, &self.y));
            if !all_finite(&k[0]) {
                return Err(SolverError::NonFinite { t: self.t });
            }
            for i in 1..6 {
                let mut y_temp = self.y.clone();
                for j in 0..i {
                    y_temp += (h * RKF_A[i][j]) * &k[j];
                }
                k.push((self.f)(self.t + RKF_C[i] * h, &y_temp));
            }
            let mut y_next = self.y.clone();
            let mut err = DVector::zeros(self.y.len());
            for i in 0..6 {
                y_next += (h * RKF_B5[i]) * &k[i];
                err += (h * (RKF_B5[i] - RKF_B4[i])) * &k[i];
            }
            let norm = self.control.error_norm(&err, &self.y, &y_next);
            if !all_finite(&y_next) || !norm.is_finite() {
                return Err(SolverError::NonFinite { t: self.t });
            }
            if norm <= 1.0 {
                self.t = if last { t_bound } else { self.t + h };
                self.y = y_next;
                self.control.accept(h, norm);
                return Ok(if last {
                    StepStatus::Finished
                } else {
                    StepStatus::Running
                });
            }
            self.control.reject(h, norm);
        }
    }
}

impl Solver for RK45 {
    fn step(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        self._step_impl(t_bound)
    }
    fn t(&self) -> f64 {
        self.t
    }
    fn y(&self) -> &DVector<f64> {
        &self.y
    }
}
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                 DORMAND-PRINCE 5(4)
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
const DP_C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const DP_A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];
const DP_B5: [f64; 7] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
    0.0,
];
const DP_B4: [f64; 7] = [
    5179.0 / 57600.0,
    0.0,
    7571.0 / 16695.0,
    393.0 / 640.0,
    -92097.0 / 339200.0,
    187.0 / 2100.0,
    1.0 / 40.0,
];

pub struct DormandPrince {
    f: RhsFn,
    pub t: f64,
    pub y: DVector<f64>,
    control: StepControl,
    // derivative at (t, y), reused as the first stage (FSAL)
    f_current: Option<DVector<f64>>,
}

impl DormandPrince {
    pub fn new(
        f: RhsFn,
        y0: DVector<f64>,
        t0: f64,
        h: f64,
        settings: &SolverSettings,
    ) -> DormandPrince {
        DormandPrince {
            f,
            t: t0,
            y: y0,
            control: StepControl::new(h, settings),
            f_current: None,
        }
    }

    fn _step_impl(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        let f0 = match self.f_current.take() {
            Some(f0) => f0,
            None => (self.f)(self.t, &self.y),
        };
        if !all_finite(&f0) {
            return Err(SolverError::NonFinite { t: self.t });
        }
        loop {
            let (h, last) = self.control.trial_step(self.t, t_bound)?;
            let mut k: Vec<DVector<f64>> = Vec::with_capacity(7);
            k.push(f0.clone());
            for i in 1..6 {
                let mut y_temp = self.y.clone();
                for j in 0..i {
                    y_temp += (h * DP_A[i][j]) * &k[j];
                }
                k.push((self.f)(self.t + DP_C[i] * h, &y_temp));
            }
            let mut y_next = self.y.clone();
            for i in 0..6 {
                y_next += (h * DP_B5[i]) * &k[i];
            }
            let t_next = if last { t_bound } else { self.t + h };
            k.push((self.f)(t_next, &y_next));
            let mut err = DVector::zeros(self.y.len());
            for i in 0..7 {
                err += (h * (DP_B5[i] - DP_B4[i])) * &k[i];
            }
            let norm = self.control.error_norm(&err, &self.y, &y_next);
            if !all_finite(&y_next) || !norm.is_finite() {
                return Err(SolverError::NonFinite { t: self.t });
            }
            if norm <= 1.0 {
                self.t = t_next;
                self.y = y_next;
                self.f_current = k.pop();
                self.control.accept(h, norm);
                return Ok(if last {
                    StepStatus::Finished
                } else {
                    StepStatus::Running
                });
            }
            self.control.reject(h, norm);
        }
    }
}

impl Solver for DormandPrince {
    fn step(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        self._step_impl(t_bound)
    }
    fn t(&self) -> f64 {
        self.t
    }
    fn y(&self) -> &DVector<f64> {
        &self.y
    }
}
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
//                 ADAMS-BASHFORTH 4
///////////////////////////////////////////////////////////////////////////////////////////////////////////////
pub struct AdamsBashforth4 {
    f: RhsFn,
    pub t: f64,
    pub y: DVector<f64>,
    h: f64,
    f_history: Vec<DVector<f64>>,
    step_count: usize,
}

impl AdamsBashforth4 {
    pub fn new(f: RhsFn, y0: DVector<f64>, t0: f64, h: f64) -> AdamsBashforth4 {
        AdamsBashforth4 {
            f,
            t: t0,
            y: y0,
            h,
            f_history: Vec::new(),
            step_count: 0,
        }
    }

    fn _step_impl(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        let remaining = t_bound - self.t;
        // accumulated rounding in t must not add a sliver step at the end
        let last = self.h >= remaining - 1e-9 * self.h;
        if self.f_history.is_empty() {
            let f0 = (self.f)(self.t, &self.y);
            if !all_finite(&self.y) || !all_finite(&f0) {
                return Err(SolverError::NonFinite { t: self.t });
            }
            self.f_history.push(f0);
        }
        if last {
            // partial closing step breaks the uniform history, fall back to RK4
            self._rk4_step(remaining);
            self.t = t_bound;
        } else if self.step_count < 3 {
            self._rk4_step(self.h);
        } else {
            let n = self.f_history.len();
            let f_n = &self.f_history[n - 1];
            let f_n1 = &self.f_history[n - 2];
            let f_n2 = &self.f_history[n - 3];
            let f_n3 = &self.f_history[n - 4];
            let y_next = &self.y
                + self.h
                    * (55.0 / 24.0 * f_n - 59.0 / 24.0 * f_n1 + 37.0 / 24.0 * f_n2
                        - 9.0 / 24.0 * f_n3);
            self.t += self.h;
            self.y = y_next;
        }
        if !all_finite(&self.y) {
            return Err(SolverError::NonFinite { t: self.t });
        }
        let f_current = (self.f)(self.t, &self.y);
        if self.f_history.len() >= 4 {
            self.f_history.remove(0);
        }
        self.f_history.push(f_current);
        self.step_count += 1;
        Ok(if last {
            StepStatus::Finished
        } else {
            StepStatus::Running
        })
    }

    fn _rk4_step(&mut self, h: f64) {
        let t = self.t;
        let y = &self.y;
        let f = &self.f;

        let k1 = h * f(t, y);
        let k2 = h * f(t + h / 2.0, &(y + &k1 / 2.0));
        let k3 = h * f(t + h / 2.0, &(y + &k2 / 2.0));
        let k4 = h * f(t + h, &(y + &k3));

        self.y = y + (&k1 + 2.0 * &k2 + 2.0 * &k3 + &k4) / 6.0;
        self.t += h;
    }
}

impl Solver for AdamsBashforth4 {
    fn step(&mut self, t_bound: f64) -> Result<StepStatus, SolverError> {
        self._step_impl(t_bound)
    }
    fn t(&self) -> f64 {
        self.t
    }
    fn y(&self) -> &DVector<f64> {
        &self.y
    }
}

////////////////////////////////////////////////////////////////////////////////////////
//          TESTS
///////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests_nonstiff_api {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn solve_with(
        method: SolverMethod,
        f: RhsFn,
        y0: Vec<f64>,
        t_bound: f64,
        h_step: Option<f64>,
    ) -> Trajectory {
        let settings = SolverSettings {
            method,
            h_step,
            ..SolverSettings::default()
        };
        let mut solver = nonstiffODE::new(f, 0.0, DVector::from_vec(y0), t_bound, settings);
        solver.solve().unwrap()
    }

    #[test]
    fn test_simple_linear_ode_all_methods() {
        // y' = -y, y(0) = 1, exact y(t) = exp(-t)
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
            let res = solve_with(method, f, vec![1.0], 1.0, None);
            assert!(res.len() > 1);
            let final_y = res.y[(res.y.nrows() - 1, 0)];
            assert_relative_eq!(final_y, (-1.0_f64).exp(), epsilon = 1e-5);
            for (t, y_row) in res.t.iter().zip(res.y.row_iter()) {
                assert_relative_eq!(y_row[0], (-t).exp(), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_trajectory_starts_at_initial_point_and_ends_at_bound() {
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| y.clone());
            let res = solve_with(method, f, vec![1.0], 0.73, Some(0.05));
            assert_eq!(res.t[0], 0.0);
            assert_eq!(res.y[(0, 0)], 1.0);
            assert_eq!(res.t[res.len() - 1], 0.73);
            // time is strictly increasing
            for w in res.t.as_slice().windows(2) {
                assert!(w[1] > w[0]);
            }
        }
    }

    #[test]
    fn test_linear_system_2x2() {
        // y1' = -2*y1 + y2, y2' = y1 - 2*y2
        let f_y1 = |t: f64| 0.5 * f64::exp(-3.0 * t) * (f64::exp(2.0 * t) + 1.0);
        let f_y2 = |t: f64| 0.5 * f64::exp(-3.0 * t) * (-1.0 + f64::exp(2.0 * t));
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| {
                DVector::from_vec(vec![-2.0 * y[0] + y[1], y[0] - 2.0 * y[1]])
            });
            let res = solve_with(method, f, vec![1.0, 0.0], 1.0, None);
            assert_eq!(res.y.ncols(), 2);
            for (t, y_row) in res.t.iter().zip(res.y.row_iter()) {
                assert_relative_eq!(y_row[0], f_y1(*t), epsilon = 1e-5);
                assert_relative_eq!(y_row[1], f_y2(*t), epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_harmonic_oscillator() {
        for method in SolverMethod::iter() {
            let f: RhsFn =
                Rc::new(|_t, y: &DVector<f64>| DVector::from_vec(vec![y[1], -y[0]]));
            let res = solve_with(method, f, vec![1.0, 0.0], std::f64::consts::PI / 2.0, None);
            let last = res.final_state();
            assert_relative_eq!(last[0], 0.0, epsilon = 1e-5);
            assert_relative_eq!(last[1], -1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_nonlinear_ode() {
        // y' = y^2, y(0) = 1, exact y(t) = 1/(1-t)
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| y.component_mul(y));
            let res = solve_with(method, f, vec![1.0], 0.5, None);
            for (t, y_row) in res.t.iter().zip(res.y.row_iter()) {
                assert_relative_eq!(y_row[0], 1.0 / (1.0 - t), epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_adaptive_methods_take_fewer_steps_on_smooth_problem() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let adaptive = solve_with(SolverMethod::DOPRI, f.clone(), vec![1.0], 10.0, None);
        let fixed = solve_with(SolverMethod::AB4, f, vec![1.0], 10.0, None);
        assert!(adaptive.len() < fixed.len());
    }

    #[test]
    fn test_max_step_is_respected() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let settings = SolverSettings {
            max_step: 0.1,
            ..SolverSettings::default()
        };
        let mut solver = nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 2.0, settings);
        let res = solver.solve().unwrap();
        for w in res.t.as_slice().windows(2) {
            assert!(w[1] - w[0] <= 0.1 + 1e-12);
        }
    }

    #[test]
    fn test_invalid_interval() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let mut solver = nonstiffODE::new(
            f,
            1.0,
            DVector::from_vec(vec![1.0]),
            1.0,
            SolverSettings::default(),
        );
        assert_eq!(
            solver.solve().unwrap_err(),
            SolverError::InvalidInterval {
                t0: 1.0,
                t_bound: 1.0
            }
        );
    }

    #[test]
    fn test_invalid_settings() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let settings = SolverSettings {
            rtol: 0.0,
            ..SolverSettings::default()
        };
        let mut solver = nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 1.0, settings);
        assert!(matches!(
            solver.solve(),
            Err(SolverError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_max_steps_exceeded() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let settings = SolverSettings {
            method: SolverMethod::AB4,
            h_step: Some(0.01),
            max_steps: 3,
            ..SolverSettings::default()
        };
        let mut solver = nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 1.0, settings);
        assert!(matches!(
            solver.solve(),
            Err(SolverError::MaxStepsExceeded { max_steps: 3, .. })
        ));
    }

    #[test]
    fn test_blow_up_is_reported() {
        // y' = y^2 from y(0) = 1 blows up at t = 1
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| y.component_mul(y));
            let settings = SolverSettings {
                method,
                max_steps: 100_000,
                ..SolverSettings::default()
            };
            let mut solver =
                nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 2.0, settings);
            let err = solver.solve().unwrap_err();
            assert!(
                matches!(
                    err,
                    SolverError::NonFinite { .. } | SolverError::StepSizeTooSmall { .. }
                ),
                "{}: {:?}",
                method,
                err
            );
        }
    }

    #[test]
    fn test_nan_from_rhs_is_non_finite_for_all_methods() {
        // y' = 1 from y(0) = 1 while the right hand side turns NaN for y > 1.5
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| {
                if y[0] > 1.5 {
                    DVector::from_element(1, f64::NAN)
                } else {
                    DVector::from_element(1, 1.0)
                }
            });
            let settings = SolverSettings {
                method,
                h_step: Some(0.01),
                ..SolverSettings::default()
            };
            let mut solver =
                nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 2.0, settings);
            match solver.solve() {
                // y = 1.5 is reached at t = 0.5, AB4 may take one more step
                Err(SolverError::NonFinite { t }) => assert!(t <= 0.53, "{}: t = {}", method, t),
                other => panic!("{}: expected NonFinite, got {:?}", method, other.err()),
            }
        }
    }

    #[test]
    fn test_non_finite_initial_state() {
        for method in SolverMethod::iter() {
            let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
            let settings = SolverSettings {
                method,
                ..SolverSettings::default()
            };
            let mut solver = nonstiffODE::new(
                f,
                0.0,
                DVector::from_vec(vec![f64::NAN]),
                1.0,
                settings,
            );
            assert_eq!(solver.solve().unwrap_err(), SolverError::NonFinite { t: 0.0 });
        }
    }

    #[test]
    fn test_step_size_too_small_at_jump() {
        // the derivative jumps by 1e12 at t = 0.5, no step across the jump meets the tolerance
        for method in [SolverMethod::RK45, SolverMethod::DOPRI] {
            let f: RhsFn = Rc::new(|t: f64, _y: &DVector<f64>| {
                DVector::from_element(1, if t < 0.5 { 0.0 } else { 1e12 })
            });
            let settings = SolverSettings {
                method,
                ..SolverSettings::default()
            };
            let mut solver =
                nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 1.0, settings);
            match solver.solve() {
                Err(SolverError::StepSizeTooSmall { h, t }) => {
                    assert!(h < 1e-12);
                    assert_relative_eq!(t, 0.5, epsilon = 1e-9);
                }
                other => panic!("{}: expected StepSizeTooSmall, got {:?}", method, other.err()),
            }
        }
    }

    #[test]
    fn test_ab4_default_step_is_thousandth_of_span() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let res = solve_with(SolverMethod::AB4, f, vec![1.0], 2.0, None);
        assert_eq!(res.len(), 1001);
        assert_relative_eq!(res.t[1] - res.t[0], 0.002, epsilon = 1e-15);
        assert_relative_eq!(res.t[500] - res.t[499], 0.002, epsilon = 1e-12);
        assert_eq!(res.t[1000], 2.0);
    }

    #[test]
    fn test_ab4_step_capped_by_max_step() {
        let f: RhsFn = Rc::new(|_t, y: &DVector<f64>| -y);
        let settings = SolverSettings {
            method: SolverMethod::AB4,
            max_step: 0.0005,
            ..SolverSettings::default()
        };
        let mut solver = nonstiffODE::new(f, 0.0, DVector::from_vec(vec![1.0]), 1.0, settings);
        let res = solver.solve().unwrap();
        assert_eq!(res.len(), 2001);
    }

    #[test]
    fn test_solver_method_names() {
        assert_eq!("DOPRI".parse::<SolverMethod>().unwrap(), SolverMethod::DOPRI);
        assert_eq!(SolverMethod::RK45.to_string(), "RK45");
        assert!("Euler".parse::<SolverMethod>().is_err());
    }
}
