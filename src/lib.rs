//! Perception IO Library
//!
//! Loaders that turn calibration and pose files into validated in-memory
//! models for a perception pipeline:
//! - Brown camera intrinsics (`K` + radial/tangential `D`) from YAML
//! - Omnidirectional (OCamCalib) camera intrinsics from YAML
//! - Timestamped rigid poses from single-record text files
//!
//! Every loader is a plain function returning `Result`; failures are logged
//! with the offending path through the `log` facade and returned as
//! [`PerceptionIoError`].

pub mod camera;
pub mod error;
pub mod pose;
pub mod util;

// Re-export commonly used types
pub use camera::{
    load_brown_camera_intrinsic, load_brown_camera_intrinsic_into,
    load_omnidirectional_camera_intrinsics, load_omnidirectional_camera_intrinsics_into,
    BrownCameraDistortionModel, CalibrationModel, DistortionModel,
    OmnidirectionalCameraDistortionModel, OmnidirectionalIntrinsics,
};
pub use error::PerceptionIoError;
pub use pose::{read_pose_file, read_pose_file_into, write_pose_file, Pose};
