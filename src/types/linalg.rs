//! Linear algebra aliases for the step pipeline
//!
//! Sensor vectors and the device→world rotation are fixed-size, so the
//! pipeline works on nalgebra static types throughout.

use nalgebra::{Matrix3, Vector3};

pub type Vec3 = Vector3<f64>;
pub type RotationMatrix = Matrix3<f64>;

/// Row-major flattening used by the snapshot format.
pub fn matrix_to_rows(m: &RotationMatrix) -> [f64; 9] {
    [
        m[(0, 0)], m[(0, 1)], m[(0, 2)],
        m[(1, 0)], m[(1, 1)], m[(1, 2)],
        m[(2, 0)], m[(2, 1)], m[(2, 2)],
    ]
}

pub fn matrix_from_rows(rows: &[f64; 9]) -> RotationMatrix {
    RotationMatrix::from_row_slice(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_round_trip() {
        let rows = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let m = matrix_from_rows(&rows);
        assert_eq!(m[(0, 2)], 3.0);
        assert_eq!(m[(2, 0)], 7.0);
        assert_eq!(matrix_to_rows(&m), rows);
    }
}
