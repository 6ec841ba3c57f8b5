use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{EquidistantFisheye, RadialK3};
use crate::math::{Mat3, Real, Vec2};

/// Errors produced while building runtime models from scene parameters.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("camera field of view must be in (0, 2*pi), got {0}")]
    InvalidFov(Real),
    #[error("camera sensor radius must be positive, got {0}")]
    InvalidRadius(Real),
    #[error("camera image size must be positive, got {0}x{1}")]
    InvalidImageSize(Real, Real),
    #[error("view {0} rotation is not orthonormal (|R^T R - I| = {1:.3e})")]
    NotARotation(usize, Real),
}

/// Serializable camera model parameters.
///
/// Closed set of variants; an unsupported `type` tag fails at parse
/// time, and invalid geometry is rejected by [`CameraModelParams::build`].
/// This replaces runtime downcasting of a polymorphic intrinsics handle.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CameraModelParams {
    /// Equidistant fisheye with K3 radial distortion.
    Equidistant {
        width: Real,
        height: Real,
        /// Full field of view in radians.
        fov: Real,
        cx: Real,
        cy: Real,
        /// Sensor circle radius in pixels.
        radius: Real,
        #[serde(flatten)]
        disto: RadialK3,
    },
}

impl CameraModelParams {
    /// Build the runtime camera model, validating geometry.
    pub fn build(&self) -> Result<EquidistantFisheye, SceneError> {
        match *self {
            CameraModelParams::Equidistant {
                width,
                height,
                fov,
                cx,
                cy,
                radius,
                disto,
            } => {
                if !(fov > 0.0 && fov < 2.0 * std::f64::consts::PI) {
                    return Err(SceneError::InvalidFov(fov));
                }
                if radius <= 0.0 {
                    return Err(SceneError::InvalidRadius(radius));
                }
                if width <= 0.0 || height <= 0.0 {
                    return Err(SceneError::InvalidImageSize(width, height));
                }
                Ok(EquidistantFisheye {
                    width,
                    height,
                    fov,
                    pp: Vec2::new(cx, cy),
                    radius,
                    disto,
                })
            }
        }
    }

    /// Parameters describing an already-built model.
    pub fn from_camera(cam: &EquidistantFisheye) -> Self {
        CameraModelParams::Equidistant {
            width: cam.width,
            height: cam.height,
            fov: cam.fov,
            cx: cam.pp.x,
            cy: cam.pp.y,
            radius: cam.radius,
            disto: cam.disto,
        }
    }
}

/// One view of the rig: camera parameters plus the rotation from the
/// rig frame to the view frame, row-major.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewParams {
    pub camera: CameraModelParams,
    pub rotation: [[Real; 3]; 3],
}

/// Scene-loader payload: the full rig.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RigParams {
    pub views: Vec<ViewParams>,
}

const ORTHONORMALITY_TOL: Real = 1e-6;

impl RigParams {
    /// Build runtime cameras and rotations, validating each rotation is
    /// orthonormal with determinant +1.
    pub fn build(&self) -> Result<Vec<(EquidistantFisheye, Mat3)>, SceneError> {
        let mut out = Vec::with_capacity(self.views.len());
        for (idx, view) in self.views.iter().enumerate() {
            let cam = view.camera.build()?;
            let r = Mat3::from_row_slice(&[
                view.rotation[0][0],
                view.rotation[0][1],
                view.rotation[0][2],
                view.rotation[1][0],
                view.rotation[1][1],
                view.rotation[1][2],
                view.rotation[2][0],
                view.rotation[2][1],
                view.rotation[2][2],
            ]);
            let defect = (r.transpose() * r - Mat3::identity()).norm();
            if defect > ORTHONORMALITY_TOL || (r.determinant() - 1.0).abs() > ORTHONORMALITY_TOL {
                return Err(SceneError::NotARotation(idx, defect));
            }
            out.push((cam, r));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equidistant_params_serde_shape() {
        let json = r#"{
            "type": "equidistant",
            "width": 3840.0,
            "height": 5760.0,
            "fov": 3.07,
            "cx": 1952.0,
            "cy": 2824.0,
            "radius": 1980.0,
            "k1": 0.004,
            "k2": 0.0,
            "k3": 0.0
        }"#;
        let params: CameraModelParams = serde_json::from_str(json).expect("serde should succeed");
        let cam = params.build().expect("valid camera");
        assert!((cam.disto.k1 - 0.004).abs() < 1e-12);
        assert!((cam.pp.x - 1952.0).abs() < 1e-12);
    }

    #[test]
    fn unknown_model_tag_is_rejected_at_parse() {
        let json = r#"{ "type": "pinhole", "fx": 800.0 }"#;
        assert!(serde_json::from_str::<CameraModelParams>(json).is_err());
    }

    #[test]
    fn invalid_fov_is_rejected() {
        let params = CameraModelParams::Equidistant {
            width: 100.0,
            height: 100.0,
            fov: -1.0,
            cx: 50.0,
            cy: 50.0,
            radius: 40.0,
            disto: RadialK3::default(),
        };
        assert!(matches!(params.build(), Err(SceneError::InvalidFov(_))));
    }

    #[test]
    fn rig_rejects_non_orthonormal_rotation() {
        let camera = CameraModelParams::Equidistant {
            width: 100.0,
            height: 100.0,
            fov: 2.0,
            cx: 50.0,
            cy: 50.0,
            radius: 40.0,
            disto: RadialK3::default(),
        };
        let rig = RigParams {
            views: vec![ViewParams {
                camera,
                rotation: [[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 1.0]],
            }],
        };
        assert!(matches!(rig.build(), Err(SceneError::NotARotation(0, _))));
    }
}
