//! Camera calibration models and their YAML loaders.
//!
//! Two distortion models are supported, each in its own submodule:
//! - [`brown`]: pinhole intrinsics `K` plus five radial/tangential coefficients `D`.
//! - [`omnidirectional`]: the OCamCalib wide field of view polynomial model.
//!
//! [`DistortionModel`] is the tagged union handed to the perception pipeline.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod brown;
pub mod omnidirectional;

pub use crate::error::PerceptionIoError;
pub use brown::{
    load_brown_camera_intrinsic, load_brown_camera_intrinsic_into, BrownCameraDistortionModel,
};
pub use omnidirectional::{
    load_omnidirectional_camera_intrinsics, load_omnidirectional_camera_intrinsics_into,
    OmnidirectionalCameraDistortionModel, OmnidirectionalIntrinsics,
};

/// Trait implemented by every calibration model that can be read from and
/// written to a YAML document.
pub trait CalibrationModel {
    /// Short lowercase model name, e.g. `"brown"`.
    fn name(&self) -> &'static str;

    /// Load the model from a YAML calibration document.
    fn load_from_yaml(path: &Path) -> Result<Self, PerceptionIoError>
    where
        Self: Sized;

    /// Save the model as a YAML document readable by [`CalibrationModel::load_from_yaml`].
    fn save_to_yaml(&self, path: &Path) -> Result<(), PerceptionIoError>;
}

/// A loaded camera distortion model, tagged by variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DistortionModel {
    Brown(BrownCameraDistortionModel),
    Omnidirectional(OmnidirectionalCameraDistortionModel),
}

impl DistortionModel {
    /// Loads the model named by `kind` from `path`.
    ///
    /// Accepted names are `brown` (alias `radtan`, `rad_tan`) and
    /// `omnidirectional` (alias `omni`, `ocam`), case insensitive.
    pub fn load_from_yaml(kind: &str, path: impl AsRef<Path>) -> Result<Self, PerceptionIoError> {
        match kind.to_lowercase().as_str() {
            "brown" | "radtan" | "rad_tan" => {
                Ok(DistortionModel::Brown(load_brown_camera_intrinsic(path)?))
            }
            "omnidirectional" | "omni" | "ocam" => Ok(DistortionModel::Omnidirectional(
                load_omnidirectional_camera_intrinsics(path)?,
            )),
            _ => Err(PerceptionIoError::InvalidArgument(format!(
                "Unsupported camera model: {kind}. Supported models: brown, omnidirectional"
            ))),
        }
    }

    pub fn save_to_yaml(&self, path: impl AsRef<Path>) -> Result<(), PerceptionIoError> {
        match self {
            DistortionModel::Brown(model) => model.save_to_yaml(path.as_ref()),
            DistortionModel::Omnidirectional(model) => model.save_to_yaml(path.as_ref()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistortionModel::Brown(model) => model.name(),
            DistortionModel::Omnidirectional(model) => model.name(),
        }
    }

    pub fn width(&self) -> f64 {
        match self {
            DistortionModel::Brown(model) => model.width(),
            DistortionModel::Omnidirectional(model) => f64::from(model.width()),
        }
    }

    pub fn height(&self) -> f64 {
        match self {
            DistortionModel::Brown(model) => model.height(),
            DistortionModel::Omnidirectional(model) => f64::from(model.height()),
        }
    }

    /// The flat parameter buffer; its layout depends on the variant.
    pub fn params(&self) -> &DVector<f64> {
        match self {
            DistortionModel::Brown(model) => model.params(),
            DistortionModel::Omnidirectional(model) => model.params(),
        }
    }
}

impl From<BrownCameraDistortionModel> for DistortionModel {
    fn from(model: BrownCameraDistortionModel) -> Self {
        DistortionModel::Brown(model)
    }
}

impl From<OmnidirectionalCameraDistortionModel> for DistortionModel {
    fn from(model: OmnidirectionalCameraDistortionModel) -> Self {
        DistortionModel::Omnidirectional(model)
    }
}
