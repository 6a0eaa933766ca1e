//! Shared numeric helpers.
//!
//! Every dead-zone check in the engine goes through [`double_is_close`], so
//! the ALPHA and betting drivers agree on what "numerically zero" means.

/// Machine epsilon for `f64`, used to keep estimates strictly below `u`.
pub const EPS: f64 = 2.220446049250313e-16;

/// Relative tolerance for [`double_is_close`].
pub const CLOSE_RTOL: f64 = 1.0e-5;

/// Absolute tolerance for [`double_is_close`].
pub const CLOSE_ATOL: f64 = 1.0e-8;

/// `|a - b| <= atol + rtol * |b|`, the asymmetric closeness test numpy uses.
#[must_use]
pub fn double_is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= CLOSE_ATOL + CLOSE_RTOL * b.abs()
}

/// Convert a diluted margin to the corresponding assorter mean.
#[must_use]
pub fn margin_to_mean(margin: f64) -> f64 {
    (margin + 1.0) / 2.0
}

/// Convert an assorter mean to the corresponding diluted margin.
#[must_use]
pub fn mean_to_margin(mean: f64) -> f64 {
    2.0 * mean - 1.0
}

/// Expected number of draws to reach `1/risk` when every draw multiplies the
/// test statistic by `payoff`.
#[must_use]
pub fn sample_size(risk: f64, payoff: f64) -> f64 {
    -risk.ln() / payoff.ln()
}

/// Betting fraction equivalent to an ALPHA estimate: `(η/µ - 1) / (u - µ)`.
#[must_use]
pub fn eta_to_lam(eta: f64, mu: f64, upper: f64) -> f64 {
    (eta / mu - 1.0) / (upper - mu)
}

/// ALPHA estimate equivalent to a betting fraction: `µ (1 + λ (u - µ))`.
#[must_use]
pub fn lam_to_eta(lam: f64, mu: f64, upper: f64) -> f64 {
    mu * (1.0 + lam * (upper - mu))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closeness_is_relative_to_second_argument() {
        assert!(double_is_close(1.0, 1.0 + 1.0e-6));
        assert!(!double_is_close(1.0, 1.001));
        assert!(double_is_close(0.0, 5.0e-9));
        assert!(!double_is_close(0.0, 1.0e-7));
    }

    #[test]
    fn margin_mean_inverse() {
        for m in [-0.4, 0.0, 0.02, 0.5, 1.0] {
            let back = mean_to_margin(margin_to_mean(m));
            assert!((back - m).abs() < 1e-15, "m={m} back={back}");
        }
        assert_eq!(margin_to_mean(0.1), 0.55);
    }

    #[test]
    fn eta_and_lambda_convert_both_ways() {
        let (mu, upper) = (0.5, 1.2);
        for eta in [0.51, 0.6, 0.9] {
            let lam = eta_to_lam(eta, mu, upper);
            let back = lam_to_eta(lam, mu, upper);
            assert!((back - eta).abs() < 1e-12, "eta={eta} back={back}");
        }
    }

    #[test]
    fn sample_size_matches_log_ratio() {
        // doubling every draw: 2^n >= 20 after ~4.32 draws
        let n = sample_size(0.05, 2.0);
        assert!((n - 4.321928094887363).abs() < 1e-12, "n={n}");
    }
}
