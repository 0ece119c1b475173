//! Diffusion kurtosis signal model.
//!
//! The log signal is linear in the model parameters:
//!
//! ```text
//! ln S(b, g) = ln S0 - b Σ D_ij g_i g_j + b²/6 Σ (MD² W_ijkl) g_i g_j g_k g_l
//! ```
//!
//! so each gradient entry contributes one design row with 22 columns:
//!
//! - 6 unique diffusion tensor elements `xx, xy, yy, xz, yz, zz`
//! - 15 unique kurtosis tensor elements (scaled by `MD²`), in `KT_ELEMENTS` order
//! - the intercept `ln S0`

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::domain::GradientTable;

/// Number of unknowns per voxel.
pub const N_PARAMS: usize = 22;

/// Unique elements of the fully symmetric kurtosis tensor as axis counts
/// `(n_x, n_y, n_z)`, with the number of index permutations each one stands for.
///
/// Order: `xxxx, yyyy, zzzz, xxxy, xxxz, xyyy, yyyz, xzzz, yzzz, xxyy, xxzz,
/// yyzz, xxyz, xyyz, xyzz`.
pub const KT_ELEMENTS: [([u8; 3], f64); 15] = [
    ([4, 0, 0], 1.0),
    ([0, 4, 0], 1.0),
    ([0, 0, 4], 1.0),
    ([3, 1, 0], 4.0),
    ([3, 0, 1], 4.0),
    ([1, 3, 0], 4.0),
    ([0, 3, 1], 4.0),
    ([1, 0, 3], 4.0),
    ([0, 1, 3], 4.0),
    ([2, 2, 0], 6.0),
    ([2, 0, 2], 6.0),
    ([0, 2, 2], 6.0),
    ([2, 1, 1], 12.0),
    ([1, 2, 1], 12.0),
    ([1, 1, 2], 12.0),
];

/// Position in `KT_ELEMENTS` of the element `W_ijkl` (indices in `0..3`).
pub fn kt_index(i: usize, j: usize, k: usize, l: usize) -> usize {
    let mut counts = [0u8; 3];
    for axis in [i, j, k, l] {
        counts[axis] += 1;
    }
    match counts {
        [4, 0, 0] => 0,
        [0, 4, 0] => 1,
        [0, 0, 4] => 2,
        [3, 1, 0] => 3,
        [3, 0, 1] => 4,
        [1, 3, 0] => 5,
        [0, 3, 1] => 6,
        [1, 0, 3] => 7,
        [0, 1, 3] => 8,
        [2, 2, 0] => 9,
        [2, 0, 2] => 10,
        [0, 2, 2] => 11,
        [2, 1, 1] => 12,
        [1, 2, 1] => 13,
        _ => 14,
    }
}

/// Fill one design row for b-value `b` and direction `g`.
///
/// # Panics
/// Panics if `out` is shorter than `N_PARAMS`.
pub fn fill_design_row(b: f64, g: &[f64; 3], out: &mut [f64]) {
    let [x, y, z] = *g;

    out[0] = -b * x * x;
    out[1] = -2.0 * b * x * y;
    out[2] = -b * y * y;
    out[3] = -2.0 * b * x * z;
    out[4] = -2.0 * b * y * z;
    out[5] = -b * z * z;

    let scale = b * b / 6.0;
    for (slot, (counts, mult)) in KT_ELEMENTS.iter().enumerate() {
        let monomial = x.powi(counts[0] as i32) * y.powi(counts[1] as i32) * z.powi(counts[2] as i32);
        out[6 + slot] = scale * mult * monomial;
    }

    out[21] = 1.0;
}

/// Full design matrix (`n_volumes × N_PARAMS`) for a gradient table.
pub fn design_matrix(gtab: &GradientTable) -> DMatrix<f64> {
    let n = gtab.len();
    let mut x = DMatrix::<f64>::zeros(n, N_PARAMS);
    let mut row = [0.0; N_PARAMS];
    for (i, (b, g)) in gtab.bvals().iter().zip(gtab.bvecs()).enumerate() {
        fill_design_row(*b, g, &mut row);
        for (j, v) in row.iter().enumerate() {
            x[(i, j)] = *v;
        }
    }
    x
}

/// Fitted DKI parameters for one voxel.
///
/// The diffusion tensor is stored decomposed; the kurtosis tensor is stored in
/// the lab frame as its 15 unique elements (already divided by `MD²`).
#[derive(Debug, Clone, PartialEq)]
pub struct DkiParams {
    /// Eigenvalues sorted in descending order, clipped at zero.
    pub evals: [f64; 3],
    /// Eigenvectors as columns, matching `evals`.
    pub evecs: Matrix3<f64>,
    /// Unique kurtosis tensor elements in `KT_ELEMENTS` order.
    pub kt: [f64; 15],
}

impl DkiParams {
    /// Build parameters from a solved coefficient vector (design column order).
    ///
    /// Returns `None` if any derived quantity is non-finite.
    pub fn from_coefficients(beta: &DVector<f64>) -> Option<Self> {
        if beta.len() < N_PARAMS || beta.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let tensor = Matrix3::new(
            beta[0], beta[1], beta[3], //
            beta[1], beta[2], beta[4], //
            beta[3], beta[4], beta[5],
        );
        let mut params = Self::from_tensor(&tensor, [0.0; 15])?;

        // Normalise with the MD of the clipped eigenvalues.
        let md = params.evals.iter().sum::<f64>() / 3.0;
        if md > 0.0 {
            let md2 = md * md;
            for (slot, v) in params.kt.iter_mut().enumerate() {
                *v = beta[6 + slot] / md2;
            }
            if params.kt.iter().any(|v| !v.is_finite()) {
                return None;
            }
        }

        Some(params)
    }

    /// Decompose a symmetric diffusion tensor and attach kurtosis elements.
    pub fn from_tensor(tensor: &Matrix3<f64>, kt: [f64; 15]) -> Option<Self> {
        let eig = tensor.symmetric_eigen();

        let mut order = [0usize, 1, 2];
        order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

        let mut evals = [0.0; 3];
        let mut evecs = Matrix3::<f64>::zeros();
        for (dst, &src) in order.iter().enumerate() {
            evals[dst] = eig.eigenvalues[src].max(0.0);
            evecs.set_column(dst, &eig.eigenvectors.column(src));
        }

        if evals.iter().chain(evecs.iter()).chain(kt.iter()).any(|v| !v.is_finite()) {
            return None;
        }

        Some(Self { evals, evecs, kt })
    }

    /// Diffusion tensor reconstructed from the (clipped) eigen-decomposition.
    pub fn tensor(&self) -> Matrix3<f64> {
        self.evecs * Matrix3::from_diagonal(&Vector3::from(self.evals)) * self.evecs.transpose()
    }

    /// Predicted signal for `(b, g)` given `S0`.
    pub fn predict_signal(&self, s0: f64, b: f64, g: &[f64; 3]) -> f64 {
        let adc = apparent_diffusion(&self.tensor(), g);
        let md = (self.evals[0] + self.evals[1] + self.evals[2]) / 3.0;
        let akc = apparent_kurtosis_term(&self.kt, g);
        s0 * (-b * adc + b * b / 6.0 * md * md * akc).exp()
    }
}

/// `gᵀ D g`.
pub fn apparent_diffusion(tensor: &Matrix3<f64>, g: &[f64; 3]) -> f64 {
    let v = Vector3::new(g[0], g[1], g[2]);
    v.dot(&(tensor * v))
}

/// `Σ W_ijkl g_i g_j g_k g_l`, expanded over the unique elements.
pub fn apparent_kurtosis_term(kt: &[f64; 15], g: &[f64; 3]) -> f64 {
    KT_ELEMENTS
        .iter()
        .zip(kt)
        .map(|((counts, mult), w)| {
            mult * w * g[0].powi(counts[0] as i32) * g[1].powi(counts[1] as i32) * g[2].powi(counts[2] as i32)
        })
        .sum()
}
