//! Orthogonal transformations and small dense helpers for the filter hot loop.
//!
//! The diffuse collapse rotates the constraint basis `B` on the right by an
//! orthogonal matrix `Q` chosen so that the projected loading `z = Z·B`
//! becomes `z·Q = (ρ, 0, …, 0)`. Since `Z·(B·Q) = z·Q`, only the first column
//! of the rotated basis still sees the observation, and `B·Qᵗ·Q·Bᵗ = B·Bᵗ`
//! keeps the diffuse covariance unchanged until that column is dropped.

use ndarray::{Array1, Array2, ArrayView1, ArrayViewMut1, ArrayViewMut2};

/// An orthogonal transformation strategy for the diffuse collapse.
///
/// Receives the projected loading `z` (length `k`) and the constraint basis
/// `B` (`r × k`). On return `z[0]` carries the full (signed) norm of the input
/// `z`, `z[1..]` is zero, and `B` has been multiplied on the right by the
/// same orthogonal matrix.
pub type Transformation = fn(ArrayViewMut1<'_, f64>, ArrayViewMut2<'_, f64>);

/// Selects one of the built-in [`Transformation`] strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransformationKind {
    /// A sweep of Givens rotations from the last column to the first.
    #[default]
    Givens,
    /// A single Householder reflection.
    Householder,
}

impl TransformationKind {
    /// Returns the function implementing this strategy.
    pub fn function(self) -> Transformation {
        match self {
            TransformationKind::Givens => givens,
            TransformationKind::Householder => householder,
        }
    }
}

/// Collapses `z` onto its first coordinate with Givens rotations.
///
/// Rotations sweep from the last pair of columns to the first, so `z[0]`
/// ends up non-negative.
pub fn givens(mut z: ArrayViewMut1<'_, f64>, mut b: ArrayViewMut2<'_, f64>) {
    let k = z.len();
    for j in (1..k).rev() {
        let (x, y) = (z[j - 1], z[j]);
        if y == 0.0 {
            continue;
        }
        let rho = x.hypot(y);
        let (c, s) = (x / rho, y / rho);
        z[j - 1] = rho;
        z[j] = 0.0;
        for i in 0..b.nrows() {
            let (bx, by) = (b[[i, j - 1]], b[[i, j]]);
            b[[i, j - 1]] = c * bx + s * by;
            b[[i, j]] = c * by - s * bx;
        }
    }
}

/// Collapses `z` onto its first coordinate with one Householder reflection.
///
/// `z[0]` takes the sign opposite to its input sign, which avoids
/// cancellation when forming the reflection vector.
pub fn householder(mut z: ArrayViewMut1<'_, f64>, mut b: ArrayViewMut2<'_, f64>) {
    let k = z.len();
    if k < 2 {
        return;
    }
    let tail: f64 = z.iter().skip(1).map(|v| v * v).sum();
    if tail == 0.0 {
        return;
    }
    let norm = (z[0] * z[0] + tail).sqrt();
    let alpha = if z[0] >= 0.0 { -norm } else { norm };

    // v = z - alpha * e1, H = I - 2 v vᵗ / (vᵗ v)
    let mut v = z.to_owned();
    v[0] -= alpha;
    let vtv = v[0] * v[0] + tail;

    // B ← B·H, row by row: row ← row - (2 (row·v) / vᵗv) vᵗ
    for mut row in b.rows_mut() {
        let w = 2.0 * row.dot(&v) / vtv;
        row.scaled_add(-w, &v);
    }
    z.fill(0.0);
    z[0] = alpha;
}

/// Replaces `m` by `(m + mᵗ) / 2`.
pub fn symmetrize(m: &mut Array2<f64>) {
    let n = m.nrows();
    for i in 0..n {
        for j in 0..i {
            let v = 0.5 * (m[[i, j]] + m[[j, i]]);
            m[[i, j]] = v;
            m[[j, i]] = v;
        }
    }
}

/// Rank-one update `m ← m + alpha·x·yᵗ`.
pub fn add_outer(m: &mut Array2<f64>, alpha: f64, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) {
    if alpha == 0.0 {
        return;
    }
    for (i, mut row) in m.rows_mut().into_iter().enumerate() {
        let xi = alpha * x[i];
        if xi != 0.0 {
            row.scaled_add(xi, &y);
        }
    }
}

/// Removes the first column of `b`, returning the shrunk matrix.
pub fn drop_first_column(b: &Array2<f64>) -> Array2<f64> {
    b.slice(ndarray::s![.., 1..]).to_owned()
}

/// Returns `x·y`, or 0 when either vector is empty.
pub(crate) fn dot(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    if x.is_empty() { 0.0 } else { x.dot(y) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn check_collapse(f: Transformation) {
        let loading = array![1.0, 0.5, -2.0];
        let mut b = array![[1.0, 0.0, 0.2], [0.0, 1.0, 0.0], [0.3, 0.0, 1.0]];
        let pinf = b.dot(&b.t());
        let mut z = loading.dot(&b);
        let norm2 = z.dot(&z);

        f(z.view_mut(), b.view_mut());

        assert_abs_diff_eq!(z[0] * z[0], norm2, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[2], 0.0, epsilon = 1e-12);

        // The rotated basis reproduces the rotated projection ...
        let z_after = loading.dot(&b);
        for j in 0..3 {
            assert_abs_diff_eq!(z_after[j], z[j], epsilon = 1e-12);
        }
        // ... and spans the same diffuse covariance.
        let pinf_after = b.dot(&b.t());
        for i in 0..3 {
            for j in 0..3 {
                assert_abs_diff_eq!(pinf_after[[i, j]], pinf[[i, j]], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn givens_collapses_projection() {
        check_collapse(givens);
    }

    #[test]
    fn householder_collapses_projection() {
        check_collapse(householder);
    }

    #[test]
    fn givens_first_coordinate_non_negative() {
        let mut z = array![-3.0, 4.0];
        let mut b = Array2::<f64>::eye(2);
        givens(z.view_mut(), b.view_mut());
        assert_abs_diff_eq!(z[0], 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn single_column_is_untouched() {
        for f in [givens as Transformation, householder] {
            let mut z = array![2.0];
            let mut b = array![[1.5], [0.5]];
            f(z.view_mut(), b.view_mut());
            assert_eq!(z, array![2.0]);
            assert_eq!(b, array![[1.5], [0.5]]);
        }
    }

    #[test]
    fn kind_maps_to_function() {
        assert_eq!(TransformationKind::default(), TransformationKind::Givens);
        let mut z = array![0.0, 1.0];
        let mut b = Array2::<f64>::eye(2);
        (TransformationKind::Householder.function())(z.view_mut(), b.view_mut());
        assert_abs_diff_eq!(z[0].abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn symmetrize_averages_off_diagonal() {
        let mut m = array![[1.0, 2.0], [4.0, 3.0]];
        symmetrize(&mut m);
        assert_eq!(m, array![[1.0, 3.0], [3.0, 3.0]]);
    }

    #[test]
    fn add_outer_rank_one() {
        let mut m = Array2::<f64>::zeros((2, 2));
        add_outer(&mut m, 2.0, array![1.0, 2.0].view(), array![3.0, 4.0].view());
        assert_eq!(m, array![[6.0, 8.0], [12.0, 16.0]]);
    }

    #[test]
    fn drop_first_column_shrinks() {
        let b = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        assert_eq!(drop_first_column(&b), array![[2.0, 3.0], [5.0, 6.0]]);
    }
}
