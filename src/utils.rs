// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! contains useful type definitions and conversion functions.
use nalgebra::{SMatrix, SVector};

/// A Vector with 6 entries
pub type Vector6 = SVector<f64, 6>;
/// A Vector with 7 entries
pub type Vector7 = SVector<f64, 7>;
/// A Matrix with 6 rows and 7 columns
pub type Matrix6x7 = SMatrix<f64, 6, 7>;
/// A Matrix with 7 rows and 6 columns
pub type Matrix7x6 = SMatrix<f64, 7, 6>;

/// converts a 6x7 column-major Jacobian as returned by the robot model to a Matrix
pub fn array_to_jacobian(array: &[f64; 42]) -> Matrix6x7 {
    Matrix6x7::from_column_slice(array)
}

/// copies a Vector7 into a plain array
pub fn vector7_to_array(vector: &Vector7) -> [f64; 7] {
    let mut out = [0.; 7];
    out.copy_from_slice(vector.as_slice());
    out
}

#[cfg(test)]
pub(crate) mod test_utils {
    pub fn slice_compare(a: &[f64], b: &[f64], thresh: f64) {
        assert_eq!(a.len(), b.len());
        for i in 0..a.len() {
            float_compare(a[i], b[i], thresh);
        }
    }

    pub fn float_compare(a: f64, b: f64, thresh: f64) {
        assert!((a - b).abs() < thresh, "{} != {}", a, b);
    }
}

#[cfg(test)]
mod test {
    use crate::utils::{array_to_jacobian, vector7_to_array, Vector7};

    #[test]
    fn jacobian_is_column_major() {
        let mut array = [0.; 42];
        for (i, x) in array.iter_mut().enumerate() {
            *x = i as f64;
        }
        let jacobian = array_to_jacobian(&array);
        assert_eq!(jacobian[(0, 0)], 0.);
        assert_eq!(jacobian[(1, 0)], 1.);
        assert_eq!(jacobian[(0, 1)], 6.);
        assert_eq!(jacobian[(5, 6)], 41.);
    }

    #[test]
    fn vector_to_array() {
        let vector = Vector7::from_column_slice(&[1., 2., 3., 4., 5., 6., 7.]);
        assert_eq!(vector7_to_array(&vector), [1., 2., 3., 4., 5., 6., 7.]);
    }
}
