//! # EM Control Parameters
//!
//! Knobs for the outer MCEM loop: iteration budget, averaging window,
//! convergence tolerance and the rate clamp.

use crate::error::{HcbnError, Result};

/// Control parameters for the MCEM driver.
///
/// Parameters are averaged over windows of `update_step_size` iterations;
/// convergence compares consecutive window averages against `tol`.
#[derive(Debug, Clone)]
pub struct ControlEm {
    /// Maximum number of EM iterations. Default: 100
    pub max_iter: usize,
    /// Length of the averaging window used for the convergence test. Default: 20
    pub update_step_size: usize,
    /// Convergence tolerance on window-averaged parameters. Default: 1e-3
    pub tol: f64,
    /// Upper clamp for rate parameters after each M-step. Default: 1e6
    pub max_lambda: f64,
}

impl Default for ControlEm {
    fn default() -> Self {
        ControlEm {
            max_iter: 100,
            update_step_size: 20,
            tol: 1e-3,
            max_lambda: 1e6,
        }
    }
}

impl ControlEm {
    /// Validate control parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(HcbnError::out_of_range("max_iter must be positive"));
        }
        if self.update_step_size == 0 {
            return Err(HcbnError::out_of_range("update_step_size must be positive"));
        }
        if !(self.tol > 0.0) || !self.tol.is_finite() {
            return Err(HcbnError::out_of_range(format!(
                "tol must be positive and finite, got {}",
                self.tol
            )));
        }
        if !(self.max_lambda > 0.0) || !self.max_lambda.is_finite() {
            return Err(HcbnError::out_of_range(format!(
                "max_lambda must be positive and finite, got {}",
                self.max_lambda
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let control = ControlEm::default();
        assert!(control.validate().is_ok());
        assert_eq!(control.max_iter, 100);
        assert_eq!(control.update_step_size, 20);
    }

    #[test]
    fn test_rejects_zero_window() {
        let control = ControlEm {
            update_step_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            control.validate(),
            Err(HcbnError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_rejects_nonpositive_tol() {
        let control = ControlEm {
            tol: 0.0,
            ..Default::default()
        };
        assert!(control.validate().is_err());

        let control = ControlEm {
            tol: f64::NAN,
            ..Default::default()
        };
        assert!(control.validate().is_err());
    }
}
