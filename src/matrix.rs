//! 4×4 matrix helpers for transforming intercepted vertex positions.
//!
//! Matrices are column-major, the layout GL uploads them in: the 16 floats are
//! four contiguous columns, and vectors multiply as columns on the right.
//! Storage and arithmetic come from [`vectormatrix`].

use vectormatrix::matrix::Matrix;
use vectormatrix::vector::Vector;

pub type Vec4 = Vector<f32, 4>;

/// Column-major 4×4 matrix.
pub type Mat4 = Matrix<f32, 4, 4>;

/**
Reads a matrix from 16 column-major floats.

# Panics

If `values` holds fewer than 16 floats.
*/
pub fn from_columns_slice(values: &[f32]) -> Mat4 {
    assert!(values.len() >= 16, "matrix needs 16 floats, got {}", values.len());
    let column = |c: usize| Vector::new([values[c * 4], values[c * 4 + 1], values[c * 4 + 2], values[c * 4 + 3]]);
    Matrix::new_columns([column(0), column(1), column(2), column(3)])
}

/// The 16 floats of `matrix`, column after column.
pub fn to_columns_array(matrix: &Mat4) -> [f32; 16] {
    let mut out = [0.0; 16];
    for (c, column) in matrix.columns().iter().enumerate() {
        out[c * 4..c * 4 + 4].copy_from_slice(&column.into_inner());
    }
    out
}

/// `matrix * vector`.
pub fn multiply(vector: Vec4, matrix: &Mat4) -> Vec4 {
    Vector::from_col(*matrix * vector)
}

/// Transforms `(x, y, z, w)` by 16 column-major floats.
///
/// # Panics
///
/// If `matrix` holds fewer than 16 floats.
pub fn transform_point(x: f32, y: f32, z: f32, w: f32, matrix: &[f32]) -> [f32; 4] {
    multiply(Vector::new([x, y, z, w]), &from_columns_slice(matrix)).into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_neutral() {
        let v = Vector::new([1.0, -2.0, 3.0, 1.0]);
        assert_eq!(multiply(v, &Mat4::IDENTITY), v);
        assert_eq!(Mat4::IDENTITY * Mat4::IDENTITY, Mat4::IDENTITY);
    }

    #[test]
    fn translation_lives_in_last_column() {
        let mut m = to_columns_array(&Mat4::IDENTITY);
        m[12] = 10.0;
        m[13] = 20.0;
        m[14] = 30.0;
        assert_eq!(transform_point(1.0, 2.0, 3.0, 1.0, &m), [11.0, 22.0, 33.0, 1.0]);
        //directions ignore translation
        assert_eq!(transform_point(1.0, 2.0, 3.0, 0.0, &m), [1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn slice_round_trips_through_columns() {
        let values: [f32; 16] = std::array::from_fn(|i| i as f32);
        let m = from_columns_slice(&values);
        //values[4..8] is the second column
        assert_eq!(*m.element_at(0, 1), 4.0);
        assert_eq!(*m.element_at(3, 1), 7.0);
        assert_eq!(to_columns_array(&m), values);
    }

    #[test]
    fn composition_order() {
        let scale = Matrix::new_columns([
            Vector::new([2.0, 0.0, 0.0, 0.0]),
            Vector::new([0.0, 2.0, 0.0, 0.0]),
            Vector::new([0.0, 0.0, 2.0, 0.0]),
            Vector::new([0.0, 0.0, 0.0, 1.0]),
        ]);
        let mut translate = Mat4::IDENTITY;
        translate.columns_mut()[3] = Vector::new([1.0, 0.0, 0.0, 1.0]);
        let p = Vector::new([1.0, 1.0, 1.0, 1.0]);
        assert_eq!(multiply(p, &(translate * scale)).into_inner(), [3.0, 2.0, 2.0, 1.0]);
        assert_eq!(multiply(p, &(scale * translate)).into_inner(), [4.0, 2.0, 2.0, 1.0]);
    }

    #[test]
    #[should_panic]
    fn short_slice_panics() {
        transform_point(0.0, 0.0, 0.0, 1.0, &[0.0; 15]);
    }
}
