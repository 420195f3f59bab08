//! Sample summaries and the two-sample significance tests used for deltas.

use std::f64::consts::SQRT_2;
use thiserror::Error;

/// Multiple of the interquartile range beyond which a value counts as an outlier
const OUTLIER_IQR_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TestError {
    #[error("all equal")]
    AllEqual,
    #[error("too few samples")]
    TooFewSamples,
}

/// Summary of one benchmark's measurements for one metric
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Every measured value, in input order
    pub values: Vec<f64>,
    /// Values left after outlier rejection
    pub kept: Vec<f64>,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl Summary {
    /// Summarize `values`, dropping outliers. Returns `None` for an empty sample.
    pub fn new(values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.clone();
        sorted.sort_by(f64::total_cmp);
        let q1 = percentile(&sorted, 0.25);
        let q3 = percentile(&sorted, 0.75);
        let iqr = q3 - q1;
        let lo = q1 - OUTLIER_IQR_FACTOR * iqr;
        let hi = q3 + OUTLIER_IQR_FACTOR * iqr;

        let kept: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| *v >= lo && *v <= hi)
            .collect();

        Some(Self::from_kept(values, kept))
    }

    /// A single-valued summary, used for aggregate rows
    pub fn point(value: f64) -> Self {
        Self::from_kept(vec![value], vec![value])
    }

    fn from_kept(values: Vec<f64>, kept: Vec<f64>) -> Self {
        let min = kept.iter().copied().fold(f64::INFINITY, f64::min);
        let max = kept.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = kept.iter().sum::<f64>() / kept.len() as f64;
        Self {
            values,
            kept,
            min,
            mean,
            max,
        }
    }

    /// Largest relative distance of min or max from the mean (0.13 means ±13%)
    pub fn spread(&self) -> f64 {
        if self.mean == 0.0 {
            return f64::NAN;
        }
        let below = 1.0 - self.min / self.mean;
        let above = self.max / self.mean - 1.0;
        below.max(above).abs()
    }

    pub fn n(&self) -> usize {
        self.kept.len()
    }
}

/// Linear-interpolated percentile of a sorted, non-empty slice
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Geometric mean of the positive values, `None` if there are none
pub fn geomean(values: &[f64]) -> Option<f64> {
    let logs: Vec<f64> = values.iter().filter(|v| **v > 0.0).map(|v| v.ln()).collect();
    if logs.is_empty() {
        return None;
    }
    Some((logs.iter().sum::<f64>() / logs.len() as f64).exp())
}

/// Two-sided Mann-Whitney U-test p-value, normal approximation with tie and continuity correction
pub fn u_test(xs: &[f64], ys: &[f64]) -> Result<f64, TestError> {
    if xs.is_empty() || ys.is_empty() {
        return Err(TestError::TooFewSamples);
    }

    let n1 = xs.len() as f64;
    let n2 = ys.len() as f64;
    let n = n1 + n2;

    let mut pooled: Vec<(f64, bool)> = xs
        .iter()
        .map(|v| (*v, true))
        .chain(ys.iter().map(|v| (*v, false)))
        .collect();
    pooled.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum_x = 0.0;
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < pooled.len() {
        let mut j = i;
        while j + 1 < pooled.len() && pooled[j + 1].0 == pooled[i].0 {
            j += 1;
        }
        // ranks are 1-based; ties share the average rank
        let rank = (i + j) as f64 / 2.0 + 1.0;
        let ties = (j - i + 1) as f64;
        tie_term += ties * ties * ties - ties;
        rank_sum_x += rank * pooled[i..=j].iter().filter(|(_, from_x)| *from_x).count() as f64;
        i = j + 1;
    }

    let u = rank_sum_x - n1 * (n1 + 1.0) / 2.0;
    let mu = n1 * n2 / 2.0;
    let variance = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if variance <= 0.0 || !variance.is_finite() {
        return Err(TestError::AllEqual);
    }

    let z = ((u - mu).abs() - 0.5).max(0.0) / variance.sqrt();
    Ok(erfc(z / SQRT_2).min(1.0))
}

/// Two-sided Welch's t-test p-value
pub fn t_test(xs: &[f64], ys: &[f64]) -> Result<f64, TestError> {
    if xs.len() < 2 || ys.len() < 2 {
        return Err(TestError::TooFewSamples);
    }

    let (m1, v1) = mean_variance(xs);
    let (m2, v2) = mean_variance(ys);
    let n1 = xs.len() as f64;
    let n2 = ys.len() as f64;

    let se1 = v1 / n1;
    let se2 = v2 / n2;
    let se = se1 + se2;
    if se == 0.0 {
        return if m1 == m2 {
            Err(TestError::AllEqual)
        } else {
            Ok(0.0)
        };
    }

    let t = (m1 - m2) / se.sqrt();
    let df = se * se / (se1 * se1 / (n1 - 1.0) + se2 * se2 / (n2 - 1.0));
    Ok(incomplete_beta(df / 2.0, 0.5, df / (df + t * t)).clamp(0.0, 1.0))
}

fn mean_variance(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var)
}

/// Complementary error function, fractional error below 1.2e-7
pub fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let ans = t * poly.exp();
    if x >= 0.0 {
        ans
    } else {
        2.0 - ans
    }
}

fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.180_091_729_471_46,
        -86.505_320_329_416_77,
        24.014_098_240_830_91,
        -1.231_739_572_450_155,
        0.120_865_097_386_617_9e-2,
        -0.539_523_938_495_3e-5,
    ];
    let mut y = x;
    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let mut series = 1.000_000_000_190_015;
    for c in COEFFS {
        y += 1.0;
        series += c / y;
    }
    -tmp + (2.506_628_274_631_000_5 * series / x).ln()
}

/// Regularized incomplete beta function I_x(a, b)
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front =
        (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta function (modified Lentz)
fn beta_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_summary_drops_outliers() {
        let summary = Summary::new(vec![10.0, 11.0, 10.5, 10.2, 100.0]).unwrap();
        assert_eq!(summary.values.len(), 5);
        assert_eq!(summary.n(), 4);
        assert_eq!(summary.max, 11.0);
        assert_eq!(summary.min, 10.0);
        assert!(close(summary.mean, 10.425, 1e-9));
    }

    #[test]
    fn test_summary_empty() {
        assert!(Summary::new(Vec::new()).is_none());
    }

    #[test]
    fn test_spread() {
        let summary = Summary::new(vec![90.0, 100.0, 110.0]).unwrap();
        assert!(close(summary.spread(), 0.1, 1e-9));
        assert!(Summary::point(0.0).spread().is_nan());
    }

    #[test]
    fn test_percentile() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 1.0), 4.0);
        assert!(close(percentile(&sorted, 0.5), 2.5, 1e-12));
        assert_eq!(percentile(&[7.0], 0.25), 7.0);
    }

    #[test]
    fn test_geomean() {
        assert!(close(geomean(&[1.0, 100.0]).unwrap(), 10.0, 1e-9));
        assert!(geomean(&[0.0, -1.0]).is_none());
    }

    #[test]
    fn test_u_test_separated_samples() {
        let xs: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        let ys: Vec<f64> = (0..10).map(|i| 2.0 + i as f64 * 0.01).collect();
        let p = u_test(&xs, &ys).unwrap();
        assert!(p < 0.001, "p = {p}");
    }

    #[test]
    fn test_u_test_same_distribution() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [1.5, 2.5, 3.5, 4.5, 5.5];
        let p = u_test(&xs, &ys).unwrap();
        assert!(p > 0.5, "p = {p}");
    }

    #[test]
    fn test_u_test_all_equal() {
        assert_eq!(u_test(&[0.0, 0.0], &[0.0, 0.0]), Err(TestError::AllEqual));
        assert_eq!(u_test(&[], &[1.0]), Err(TestError::TooFewSamples));
    }

    #[test]
    fn test_t_test() {
        let xs = [10.0, 10.1, 9.9, 10.05, 9.95];
        let ys = [12.0, 12.1, 11.9, 12.05, 11.95];
        assert!(t_test(&xs, &ys).unwrap() < 0.001);

        let p = t_test(&xs, &xs).unwrap();
        assert!(close(p, 1.0, 1e-9), "p = {p}");

        assert_eq!(t_test(&[1.0], &[1.0, 2.0]), Err(TestError::TooFewSamples));
        assert_eq!(t_test(&[1.0, 1.0], &[1.0, 1.0]), Err(TestError::AllEqual));
    }

    #[test]
    fn test_erfc() {
        assert!(close(erfc(0.0), 1.0, 1e-6));
        assert!(close(erfc(1.0), 0.157_299_2, 1e-6));
        assert!(close(erfc(-1.0), 1.842_700_8, 1e-6));
    }
}
