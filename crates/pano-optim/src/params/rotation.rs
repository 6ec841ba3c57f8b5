use pano_core::{retract, Mat3, Vec3};

/// Rotation parameter block: a fixed base rotation captured when the
/// problem is built, plus a 3-vector tangent segment owned by the
/// solver.
///
/// The solver only ever sees the tangent; the rotation matrix is
/// rebuilt as `Exp(delta) * base` at every evaluation, so it stays
/// orthonormal regardless of how the solver moves the tangent.
#[derive(Debug, Clone, Copy)]
pub struct RotationBlock {
    base: Mat3,
}

impl RotationBlock {
    pub fn new(base: Mat3) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Mat3 {
        &self.base
    }

    /// Current rotation for the given tangent segment.
    pub fn value(&self, delta: &Vec3) -> Mat3 {
        retract(&self.base, delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Rotation3;

    #[test]
    fn zero_tangent_returns_the_base() {
        let base = *Rotation3::new(Vec3::new(0.1, 0.7, -0.2)).matrix();
        let block = RotationBlock::new(base);
        assert_eq!(block.value(&Vec3::zeros()), base);
    }

    #[test]
    fn value_stays_orthonormal_for_large_tangents() {
        use approx::assert_relative_eq;
        let base = *Rotation3::new(Vec3::new(0.0, 1.2, 0.0)).matrix();
        let block = RotationBlock::new(base);
        let r = block.value(&Vec3::new(2.0, -1.5, 0.8));
        assert_relative_eq!(r.transpose() * r, Mat3::identity(), epsilon = 1e-12);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }
}
