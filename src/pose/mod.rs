//! Reader for single-record pose files.
//!
//! A pose file holds nine whitespace separated numbers:
//!
//! ```text
//! frame_id timestamp tx ty tz qx qy qz qw
//! ```
//!
//! The transform is built by rotating first and translating second, i.e.
//! `T = Translate(t) * Rotate(q)`.

use crate::error::PerceptionIoError;
use crate::util;
use log::{error, info};
use nalgebra::{Isometry3, Matrix4, Quaternion, Translation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of tokens in a pose record.
pub const POSE_TOKENS: usize = 9;

/// A timestamped rigid transform read from a pose file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub frame_id: i32,
    pub timestamp: f64,
    pub transform: Isometry3<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Pose {
            frame_id: 0,
            timestamp: 0.0,
            transform: Isometry3::identity(),
        }
    }
}

impl Pose {
    pub fn new(
        frame_id: i32,
        timestamp: f64,
        translation: Vector3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Pose {
            frame_id,
            timestamp,
            transform: Isometry3::from_parts(Translation3::from(translation), rotation),
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.transform.translation.vector
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.transform.rotation
    }

    /// The 4x4 homogeneous matrix of the transform.
    pub fn to_affine(&self) -> Matrix4<f64> {
        self.transform.to_homogeneous()
    }
}

/// Reads a pose record from `path`.
///
/// Tokens after the ninth are ignored. The quaternion is normalized, not
/// checked for unit norm.
///
/// # Errors
///
/// * [`PerceptionIoError::InvalidArgument`] if `path` is empty.
/// * [`PerceptionIoError::NotFound`] if the file cannot be opened or is a directory.
/// * [`PerceptionIoError::Truncated`] if fewer than nine tokens are present.
/// * [`PerceptionIoError::ParseError`] if a token is not a number of the
///   expected type or the quaternion has zero norm.
pub fn read_pose_file(path: impl AsRef<Path>) -> Result<Pose, PerceptionIoError> {
    let path = path.as_ref();
    let pose = util::require_path(path)
        .and_then(|()| read_record(path))
        .and_then(|contents| parse_pose(path, &contents))
        .inspect_err(|e| error!("Failed to read pose file {}: {}", path.display(), e))?;

    info!(
        "Read pose for frame {} at {} from {}",
        pose.frame_id,
        pose.timestamp,
        path.display()
    );
    Ok(pose)
}

/// Like [`read_pose_file`], but fills a caller-owned pose.
///
/// `None` fails with [`PerceptionIoError::InvalidArgument`] without opening
/// the file; `pose` is only written on success.
pub fn read_pose_file_into(
    path: impl AsRef<Path>,
    pose: Option<&mut Pose>,
) -> Result<(), PerceptionIoError> {
    let pose = pose.ok_or_else(|| {
        error!("Nullptr error: output pose must not be None");
        PerceptionIoError::InvalidArgument("output pose must not be None".to_string())
    })?;
    *pose = read_pose_file(path)?;
    Ok(())
}

/// Writes `pose` as a single record that [`read_pose_file`] reads back.
pub fn write_pose_file(path: impl AsRef<Path>, pose: &Pose) -> Result<(), PerceptionIoError> {
    let path = path.as_ref();
    util::require_path(path)?;

    let t = pose.translation();
    let q = pose.rotation();
    let record = format!(
        "{} {} {} {} {} {} {} {} {}\n",
        pose.frame_id, pose.timestamp, t.x, t.y, t.z, q.i, q.j, q.k, q.w
    );
    util::write_text_file(path, &record)
}

fn read_record(path: &Path) -> Result<String, PerceptionIoError> {
    // No existence check up front: an open failure is the not-found signal.
    let mut file = File::open(path).map_err(|_| PerceptionIoError::NotFound(path.to_path_buf()))?;
    // Directories open fine on Unix but hold no record.
    if file.metadata()?.is_dir() {
        return Err(PerceptionIoError::NotFound(path.to_path_buf()));
    }
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

fn parse_pose(path: &Path, contents: &str) -> Result<Pose, PerceptionIoError> {
    let tokens: Vec<&str> = contents.split_whitespace().take(POSE_TOKENS).collect();
    if tokens.len() < POSE_TOKENS {
        return Err(PerceptionIoError::Truncated {
            path: path.to_path_buf(),
            expected: POSE_TOKENS,
            found: tokens.len(),
        });
    }

    let frame_id = tokens[0].parse::<i32>().map_err(|e| {
        PerceptionIoError::parse(path, format!("frame id `{}`: {e}", tokens[0]))
    })?;

    let mut values = [0.0; POSE_TOKENS - 1];
    for (value, (name, token)) in values.iter_mut().zip(FIELD_NAMES.iter().zip(&tokens[1..])) {
        *value = token
            .parse::<f64>()
            .map_err(|e| PerceptionIoError::parse(path, format!("{name} `{token}`: {e}")))?;
    }
    let [timestamp, tx, ty, tz, qx, qy, qz, qw] = values;

    let rotation = Unit::try_new(Quaternion::new(qw, qx, qy, qz), f64::EPSILON)
        .ok_or_else(|| PerceptionIoError::parse(path, "quaternion has zero norm"))?;

    Ok(Pose::new(
        frame_id,
        timestamp,
        Vector3::new(tx, ty, tz),
        rotation,
    ))
}

const FIELD_NAMES: [&str; POSE_TOKENS - 1] = [
    "timestamp",
    "translation.x",
    "translation.y",
    "translation.z",
    "quaternion.x",
    "quaternion.y",
    "quaternion.z",
    "quaternion.w",
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_text_file;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn write_sample(name: &str, contents: &str) -> PathBuf {
        let path = PathBuf::from("output").join(name);
        write_text_file(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_read_identity_rotation() {
        let path = write_sample("pose_identity.txt", "3 12.5 1.0 2.0 3.0 0.0 0.0 0.0 1.0");
        let pose = read_pose_file(&path).unwrap();

        assert_eq!(pose.frame_id, 3);
        assert_eq!(pose.timestamp, 12.5);
        assert_relative_eq!(pose.rotation(), UnitQuaternion::identity());
        assert_eq!(pose.translation(), Vector3::new(1.0, 2.0, 3.0));

        let mut expected = Matrix4::identity();
        expected[(0, 3)] = 1.0;
        expected[(1, 3)] = 2.0;
        expected[(2, 3)] = 3.0;
        assert_relative_eq!(pose.to_affine(), expected);
    }

    #[test]
    fn test_rotation_applied_before_translation() {
        let pose = read_pose_file("samples/pose.txt").unwrap();

        assert_eq!(pose.frame_id, 42);
        assert_eq!(pose.timestamp, 1546300800.125);

        // 90 degrees about z: x axis maps to y, then the translation is added.
        let p = pose.transform * nalgebra::Point3::new(1.0, 0.0, 0.0);
        assert_relative_eq!(p, nalgebra::Point3::new(10.5, -1.25, 1.75), epsilon = 1e-12);
    }

    #[test]
    fn test_multi_line_record_and_extra_tokens() {
        let path = write_sample(
            "pose_multiline.txt",
            "7\n0.25\n  0 0 0\n0 0 0 1\ntrailing 99\n",
        );
        let pose = read_pose_file(&path).unwrap();
        assert_eq!(pose.frame_id, 7);
        assert_eq!(pose.timestamp, 0.25);
    }

    #[test]
    fn test_non_unit_quaternion_is_normalized() {
        let path = write_sample("pose_scaled_quat.txt", "1 0.0 0 0 0 0 0 0 2.0");
        let pose = read_pose_file(&path).unwrap();
        assert_relative_eq!(pose.rotation(), UnitQuaternion::identity());

        let path = write_sample("pose_zero_quat.txt", "1 0.0 0 0 0 0 0 0 0");
        assert!(matches!(
            read_pose_file(&path),
            Err(PerceptionIoError::ParseError { .. })
        ));
    }

    #[test]
    fn test_short_record_is_truncated() {
        let path = write_sample("pose_short.txt", "3 12.5 1.0 2.0");
        match read_pose_file(&path) {
            Err(PerceptionIoError::Truncated {
                expected, found, ..
            }) => {
                assert_eq!(expected, 9);
                assert_eq!(found, 4);
            }
            other => panic!("expected Truncated, got {other:?}"),
        }

        let empty = write_sample("pose_empty.txt", "");
        assert!(matches!(
            read_pose_file(&empty),
            Err(PerceptionIoError::Truncated { found: 0, .. })
        ));
    }

    #[test]
    fn test_malformed_tokens_are_parse_errors() {
        for (name, contents) in [
            ("pose_float_frame.txt", "3.5 12.5 1 2 3 0 0 0 1"),
            ("pose_text_timestamp.txt", "3 noon 1 2 3 0 0 0 1"),
            ("pose_text_quat.txt", "3 12.5 1 2 3 0 0 zero 1"),
        ] {
            let path = write_sample(name, contents);
            let result = read_pose_file(&path);
            assert!(
                matches!(result, Err(PerceptionIoError::ParseError { .. })),
                "{name}: {result:?}"
            );
        }
    }

    #[test]
    fn test_missing_file_and_none_destination() {
        let mut pose = Pose::default();
        let result = read_pose_file_into("samples/no_such_pose.txt", Some(&mut pose));
        assert!(matches!(result, Err(PerceptionIoError::NotFound(_))));
        assert_eq!(pose, Pose::default());

        let result = read_pose_file_into("samples", Some(&mut pose));
        assert!(matches!(result, Err(PerceptionIoError::NotFound(_))));
        assert_eq!(pose, Pose::default());

        let result = read_pose_file_into("samples/no_such_pose.txt", None);
        assert!(matches!(result, Err(PerceptionIoError::InvalidArgument(_))));
    }

    #[test]
    fn test_write_then_read() {
        let original = Pose::new(
            11,
            98.75,
            Vector3::new(-4.0, 0.5, 2.25),
            UnitQuaternion::from_euler_angles(0.1, -0.2, 0.3),
        );
        let path = PathBuf::from("output/pose_written.txt");
        write_pose_file(&path, &original).unwrap();

        let mut pose = Pose::default();
        read_pose_file_into(&path, Some(&mut pose)).unwrap();
        assert_eq!(pose.frame_id, 11);
        assert_eq!(pose.timestamp, 98.75);
        assert_relative_eq!(pose.transform, original.transform, epsilon = 1e-12);
    }
}
