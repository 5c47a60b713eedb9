use std::cmp::Ordering;

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{is_categorical, numeric_values, text_values};
use crate::error::DataError;

/// Largest sample size for which the exact null distribution is computed.
/// Beyond it the asymptotic Kolmogorov distribution is used.
pub const MAX_EXACT_SAMPLE: usize = 10_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct KsResult {
    pub statistic: f64,
    pub pvalue: f64,
}

/// Two-sided two-sample Kolmogorov-Smirnov test. Returns `None` when either
/// sample is empty.
pub fn ks_2samp(base: &[f64], current: &[f64]) -> Option<KsResult> {
    ks_2samp_by(base.to_vec(), current.to_vec(), f64::total_cmp)
}

/// KS test between two frame columns over their observed cells. Numeric
/// pairs compare by value; a pair involving text compares lexicographically.
pub fn column_drift(base: &Column, current: &Column) -> Result<Option<KsResult>, DataError> {
    if is_categorical(base) || is_categorical(current) {
        return Ok(ks_2samp_by(
            text_values(base)?,
            text_values(current)?,
            Ord::cmp,
        ));
    }
    let observed = |column: &Column| -> Result<Vec<f64>, DataError> {
        Ok(numeric_values(column)?.into_iter().flatten().collect())
    };
    Ok(ks_2samp(&observed(base)?, &observed(current)?))
}

fn ks_2samp_by<T>(
    mut a: Vec<T>,
    mut b: Vec<T>,
    cmp: impl Fn(&T, &T) -> Ordering,
) -> Option<KsResult> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    a.sort_by(&cmp);
    b.sort_by(&cmp);
    let statistic = ks_statistic(&a, &b, &cmp);
    Some(KsResult {
        statistic,
        pvalue: two_sided_pvalue(statistic, a.len(), b.len()),
    })
}

fn ks_statistic<T>(a: &[T], b: &[T], cmp: impl Fn(&T, &T) -> Ordering) -> f64 {
    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let pivot = match cmp(&a[i], &b[j]) {
            Ordering::Greater => &b[j],
            _ => &a[i],
        };
        while i < n && cmp(&a[i], pivot) == Ordering::Equal {
            i += 1;
        }
        while j < m && cmp(&b[j], pivot) == Ordering::Equal {
            j += 1;
        }
        let gap = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        d = d.max(gap);
    }
    d
}

pub fn two_sided_pvalue(statistic: f64, n: usize, m: usize) -> f64 {
    if n.max(m) <= MAX_EXACT_SAMPLE {
        return exact_pvalue(statistic, n, m);
    }
    let (nf, mf) = (n as f64, m as f64);
    let effective = (nf * mf / (nf + mf)).sqrt();
    kolmogorov_survival((effective + 0.12 + 0.11 / effective) * statistic)
}

/// Exact two-sided p-value: the share of merge orders of the two samples
/// whose ECDF gap reaches `statistic`.
///
/// Walks the lattice from (0, 0) to (n, m), one step per merged element,
/// carrying the probability of having stayed strictly inside
/// `|i/n - j/m| < statistic`. Steps are weighted by the remaining counts,
/// so every cell holds a probability and nothing overflows.
pub fn exact_pvalue(statistic: f64, n: usize, m: usize) -> f64 {
    if n == 0 || m == 0 {
        return 1.0;
    }
    let g = gcd(n, m);
    let lcm = (n / g) * m;
    let h = (statistic * lcm as f64).round() as i64;
    if h <= 0 {
        return 1.0;
    }
    // |i/n - j/m| >= h/lcm  <=>  |i*m - j*n| >= h*g
    let bound = h * g as i64;
    let (ni, mi) = (n as i64, m as i64);

    let mut inside = vec![0.0f64; m + 1];
    for i in 0..=n {
        for j in 0..=m {
            if i == 0 && j == 0 {
                inside[0] = 1.0;
                continue;
            }
            if (i as i64 * mi - j as i64 * ni).abs() >= bound {
                inside[j] = 0.0;
                continue;
            }
            let mut p = 0.0;
            if i > 0 {
                let left = (n - i + 1) as f64;
                p += inside[j] * left / (left + (m - j) as f64);
            }
            if j > 0 {
                let left = (m - j + 1) as f64;
                p += inside[j - 1] * left / (left + (n - i) as f64);
            }
            inside[j] = p;
        }
    }
    (1.0 - inside[m]).clamp(0.0, 1.0)
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Survival function of the Kolmogorov distribution, Q(lambda).
pub fn kolmogorov_survival(lambda: f64) -> f64 {
    const EPS_TERM: f64 = 1e-6;
    const EPS_SUM: f64 = 1e-16;
    if !lambda.is_finite() || lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;
    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS_TERM * previous || term.abs() <= EPS_SUM * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // series did not converge, which only happens for lambda close to zero
    1.0
}
