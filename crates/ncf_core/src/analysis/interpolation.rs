//! Cubic B-spline interpolation of uniformly sampled traces.

/// Pole of the cubic B-spline prefilter.
const POLE: f64 = -0.267_949_192_431_122_7; // sqrt(3) - 2

/// Truncation tolerance for the causal initialisation sum.
const TOLERANCE: f64 = 1e-12;

/// A trace prepared for cubic B-spline evaluation at arbitrary coordinates.
///
/// Coefficients are computed with mirror-symmetric boundaries. Coordinates
/// outside `[0, n - 1]` evaluate to 0.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    coefficients: Vec<f64>,
}

impl CubicSpline {
    pub fn new(samples: &[f64]) -> Self {
        Self {
            coefficients: prefilter(samples),
        }
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Interpolated value at fractional sample coordinate `x`.
    pub fn eval(&self, x: f64) -> f64 {
        let n = self.coefficients.len();
        if n == 0 || !x.is_finite() || x < 0.0 || x > (n - 1) as f64 {
            return 0.0;
        }
        let base = x.floor();
        let t = x - base;
        let i = base as isize;

        let t2 = t * t;
        let t3 = t2 * t;
        let weights = [
            (1.0 - t).powi(3) / 6.0,
            (4.0 - 6.0 * t2 + 3.0 * t3) / 6.0,
            (1.0 + 3.0 * t + 3.0 * t2 - 3.0 * t3) / 6.0,
            t3 / 6.0,
        ];
        weights
            .iter()
            .enumerate()
            .map(|(k, w)| w * self.coefficients[mirror(i + k as isize - 1, n)])
            .sum()
    }
}

/// Whole-sample symmetric reflection onto `0..n`.
fn mirror(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let j = i.rem_euclid(period);
    if j >= n as isize {
        (period - j) as usize
    } else {
        j as usize
    }
}

/// Convert samples to cubic B-spline coefficients (recursive IIR filter).
fn prefilter(samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    let mut c: Vec<f64> = samples.to_vec();
    if n < 2 {
        return c;
    }

    let z = POLE;
    let gain = (1.0 - z) * (1.0 - 1.0 / z);
    c.iter_mut().for_each(|v| *v *= gain);

    c[0] = causal_init(&c, z);
    for k in 1..n {
        c[k] += z * c[k - 1];
    }
    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }
    c
}

fn causal_init(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (TOLERANCE.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = z;
        let mut sum = c[0];
        for v in c.iter().take(horizon).skip(1) {
            sum += zn * v;
            zn *= z;
        }
        return sum;
    }

    let iz = 1.0 / z;
    let mut zn = z;
    let mut z2n = z.powi(n as i32 - 1);
    let mut sum = c[0] + z2n * c[n - 1];
    z2n *= z2n * iz;
    for v in c.iter().take(n - 1).skip(1) {
        sum += (zn + z2n) * v;
        zn *= z;
        z2n *= iz;
    }
    sum / (1.0 - zn * zn)
}
