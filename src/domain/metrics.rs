//! Statistical helpers for the backtest summary.
//!
//! Sharpe and Sortino are computed over per-bar equity returns with no
//! annualization; drawdowns are fractions of the running peak and keep their
//! negative sign. Zero denominators yield 0 (Omega yields +inf when gains
//! exist against zero losses).

/// Sharpe ratio: mean excess return / population standard deviation.
pub fn sharpe(returns: &[f64], risk_free: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean_excess = returns.iter().map(|r| r - risk_free).sum::<f64>() / n;
    let variance = returns
        .iter()
        .map(|r| {
            let d = (r - risk_free) - mean_excess;
            d * d
        })
        .sum::<f64>()
        / n;
    let std = variance.sqrt();
    if std == 0.0 {
        0.0
    } else {
        mean_excess / std
    }
}

/// Sortino ratio: mean excess return / downside deviation.
pub fn sortino(returns: &[f64], risk_free: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mut excess_sum = 0.0;
    let mut downside_var = 0.0;
    for r in returns {
        let excess = r - risk_free;
        excess_sum += excess;
        if excess < 0.0 {
            downside_var += excess * excess;
        }
    }
    if downside_var == 0.0 {
        return 0.0;
    }
    let mean_excess = excess_sum / n;
    mean_excess / (downside_var / n).sqrt()
}

/// Calmar ratio: CAGR over absolute max drawdown.
pub fn calmar(cagr: f64, max_dd: f64) -> f64 {
    if max_dd == 0.0 {
        0.0
    } else {
        cagr / max_dd.abs()
    }
}

/// Omega ratio at `threshold`: gains above over losses below.
pub fn omega(returns: &[f64], threshold: f64) -> f64 {
    let mut gains = 0.0;
    let mut losses = 0.0;
    for r in returns {
        let excess = r - threshold;
        if excess > 0.0 {
            gains += excess;
        } else {
            losses += -excess;
        }
    }
    if losses == 0.0 {
        if gains == 0.0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        gains / losses
    }
}

/// Max drawdown, average drawdown and ulcer index over the running peak.
/// Drawdowns are negative fractions; the ulcer index is their RMS.
pub fn drawdowns(equity: &[f64]) -> (f64, f64, f64) {
    if equity.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut peak = equity[0];
    let mut max_dd = 0.0_f64;
    let mut dd_sum = 0.0;
    let mut dd_sq_sum = 0.0;
    let mut dd_count = 0usize;
    for &v in equity {
        if v > peak {
            peak = v;
        }
        let dd = (v - peak) / peak;
        if dd < 0.0 {
            dd_sum += dd;
            dd_sq_sum += dd * dd;
            dd_count += 1;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    if dd_count == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let n = dd_count as f64;
        (max_dd, dd_sum / n, (dd_sq_sum / n).sqrt())
    }
}

/// Compound annual growth rate from start to end equity over `years`.
pub fn cagr(start: f64, end: f64, years: f64) -> f64 {
    if start <= 0.0 || end <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    (end / start).powf(1.0 / years) - 1.0
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    variance.sqrt()
}

/// Biased sample skewness: m3 / m2^1.5.
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (m2, m3, _m4) = central_moments(values);
    if m2 == 0.0 {
        0.0
    } else {
        m3 / m2.powf(1.5)
    }
}

/// Biased sample kurtosis: m4 / m2^2 (not excess).
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (m2, _m3, m4) = central_moments(values);
    if m2 == 0.0 {
        0.0
    } else {
        m4 / (m2 * m2)
    }
}

fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let mut m2 = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for v in values {
        let d = v - mean;
        m2 += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
    }
    (m2 / n, m3 / n, m4 / n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharpe_zero_variance_is_zero() {
        assert_eq!(sharpe(&[0.01, 0.01, 0.01], 0.0), 0.0);
    }

    #[test]
    fn sharpe_positive_for_uptrend() {
        let s = sharpe(&[0.01, 0.02, 0.01, 0.03], 0.0);
        assert!(s > 0.0);
    }

    #[test]
    fn sharpe_not_annualized() {
        // mean 0.01, population std 0.01 -> exactly 1.0 without scaling
        let s = sharpe(&[0.0, 0.02, 0.0, 0.02], 0.0);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn sortino_ignores_upside_volatility() {
        // no negative excess returns -> 0 by the zero-denominator rule
        assert_eq!(sortino(&[0.01, 0.05, 0.02], 0.0), 0.0);
        let s = sortino(&[0.02, -0.01, 0.02, -0.01], 0.0);
        assert!(s > 0.0);
    }

    #[test]
    fn calmar_zero_drawdown_is_zero() {
        assert_eq!(calmar(0.3, 0.0), 0.0);
        assert!((calmar(0.3, -0.1) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn omega_cases() {
        assert_eq!(omega(&[], 0.0), 0.0);
        assert_eq!(omega(&[0.0, 0.0], 0.0), 0.0);
        assert!(omega(&[0.1, 0.2], 0.0).is_infinite());
        // gains 0.3 vs losses 0.1
        assert!((omega(&[0.1, 0.2, -0.1], 0.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn drawdowns_known_curve() {
        let equity = [100.0, 110.0, 90.0, 95.0, 80.0, 100.0];
        let (max_dd, avg_dd, ulcer) = drawdowns(&equity);
        assert!((max_dd - (80.0 - 110.0) / 110.0).abs() < 1e-12);
        assert!(max_dd < 0.0);
        assert!(avg_dd < 0.0 && avg_dd > max_dd);
        assert!(ulcer > 0.0);
    }

    #[test]
    fn drawdowns_monotone_rise_is_zero() {
        let (max_dd, avg_dd, ulcer) = drawdowns(&[1.0, 2.0, 3.0]);
        assert_eq!((max_dd, avg_dd, ulcer), (0.0, 0.0, 0.0));
    }

    #[test]
    fn cagr_doubles_in_two_years() {
        let g = cagr(100.0, 400.0, 2.0);
        assert!((g - 1.0).abs() < 1e-12);
        assert_eq!(cagr(0.0, 400.0, 2.0), 0.0);
        assert_eq!(cagr(100.0, 400.0, 0.0), 0.0);
    }

    #[test]
    fn std_dev_population() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-12);
    }

    #[test]
    fn skewness_symmetric_is_zero() {
        assert!((skewness(&[-1.0, 0.0, 1.0])).abs() < 1e-12);
        assert!(skewness(&[0.0, 0.0, 0.0, 10.0]) > 0.0);
        assert_eq!(skewness(&[1.0]), 0.0);
    }

    #[test]
    fn kurtosis_flat_is_zero() {
        assert_eq!(kurtosis(&[3.0, 3.0, 3.0]), 0.0);
        // uniform two-point distribution has kurtosis 1
        assert!((kurtosis(&[-1.0, 1.0, -1.0, 1.0]) - 1.0).abs() < 1e-12);
    }
}
