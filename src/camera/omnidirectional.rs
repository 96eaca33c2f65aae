//! Omnidirectional (wide field of view, polynomial) camera distortion model.
//!
//! The calibration document follows the OCamCalib layout:
//!
//! ```yaml
//! width: 1920
//! height: 1080
//! center: { x: 959.5, y: 539.5 }
//! affine: { c: 1.0, d: 0.0, e: 0.0 }
//! cam2world: [-545.1, 0.0, 6.5e-4]
//! world2cam: [812.2, 512.4, -21.7]
//! focallength: 545.1
//! principalpoint: { x: 960.0, y: 540.0 }
//! ```
//!
//! Both polynomials have a variable number of coefficients, so the flat
//! parameter buffer stores each one as a count followed by its entries.

use crate::camera::{CalibrationModel, PerceptionIoError};
use crate::util::{self, YamlDocument};
use log::{error, info};
use nalgebra::{DVector, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Keys that must all be present before any value is extracted.
pub const REQUIRED_FIELDS: [&str; 8] = [
    "width",
    "height",
    "center",
    "affine",
    "cam2world",
    "world2cam",
    "focallength",
    "principalpoint",
];

/// Number of fixed leading entries: center(2), affine(3), focal length(1),
/// principal point(2).
pub const FIXED_LEN: usize = 8;

const CAM2WORLD_COUNT_INDEX: usize = FIXED_LEN;

/// Decoded view of the omnidirectional intrinsics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OmnidirectionalIntrinsics {
    pub center: Vector2<f64>,
    /// Affine stretch coefficients `(c, d, e)`.
    pub affine: Vector3<f64>,
    pub focal_length: f64,
    pub principal_point: Vector2<f64>,
    pub cam2world: Vec<f64>,
    pub world2cam: Vec<f64>,
}

/// Represents an omnidirectional camera distortion model.
///
/// `params` is self-describing:
///
/// ```text
/// center.x center.y c d e focal_length pp.x pp.y
/// n cam2world[0..n] m world2cam[0..m]
/// ```
///
/// so that `params.len() == 8 + 1 + n + 1 + m` always holds.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawOmnidirectionalModel")]
pub struct OmnidirectionalCameraDistortionModel {
    width: i32,
    height: i32,
    params: DVector<f64>,
}

/// Unchecked serde form; converted through [`OmnidirectionalCameraDistortionModel::new`].
#[derive(Deserialize)]
struct RawOmnidirectionalModel {
    width: i32,
    height: i32,
    params: DVector<f64>,
}

impl TryFrom<RawOmnidirectionalModel> for OmnidirectionalCameraDistortionModel {
    type Error = PerceptionIoError;

    fn try_from(raw: RawOmnidirectionalModel) -> Result<Self, Self::Error> {
        OmnidirectionalCameraDistortionModel::new(raw.width, raw.height, raw.params)
    }
}

/// On-disk shape of an omnidirectional calibration document, used when saving.
#[derive(Serialize)]
struct OmnidirectionalDocument {
    width: i32,
    height: i32,
    center: PointXY,
    affine: AffineCDE,
    cam2world: Vec<f64>,
    world2cam: Vec<f64>,
    focallength: f64,
    principalpoint: PointXY,
}

#[derive(Serialize)]
struct PointXY {
    x: f64,
    y: f64,
}

#[derive(Serialize)]
struct AffineCDE {
    c: f64,
    d: f64,
    e: f64,
}

impl Default for OmnidirectionalCameraDistortionModel {
    fn default() -> Self {
        // Both polynomials empty: eight fixed values and two zero counts.
        OmnidirectionalCameraDistortionModel {
            width: 0,
            height: 0,
            params: DVector::zeros(FIXED_LEN + 2),
        }
    }
}

impl OmnidirectionalCameraDistortionModel {
    /// Creates a model from the image size and an already encoded buffer.
    ///
    /// # Errors
    ///
    /// [`PerceptionIoError::InvalidArgument`] if the embedded counts do not
    /// match the buffer length.
    pub fn new(width: i32, height: i32, params: DVector<f64>) -> Result<Self, PerceptionIoError> {
        let mut model = OmnidirectionalCameraDistortionModel::default();
        model.set_params(width, height, params)?;
        Ok(model)
    }

    /// Encodes `intrinsics` into the flat buffer layout.
    pub fn from_intrinsics(width: i32, height: i32, intrinsics: &OmnidirectionalIntrinsics) -> Self {
        let mut params = Vec::with_capacity(
            FIXED_LEN + 2 + intrinsics.cam2world.len() + intrinsics.world2cam.len(),
        );
        params.extend_from_slice(&[
            intrinsics.center.x,
            intrinsics.center.y,
            intrinsics.affine.x,
            intrinsics.affine.y,
            intrinsics.affine.z,
            intrinsics.focal_length,
            intrinsics.principal_point.x,
            intrinsics.principal_point.y,
        ]);
        params.push(intrinsics.cam2world.len() as f64);
        params.extend_from_slice(&intrinsics.cam2world);
        params.push(intrinsics.world2cam.len() as f64);
        params.extend_from_slice(&intrinsics.world2cam);

        OmnidirectionalCameraDistortionModel {
            width,
            height,
            params: DVector::from_vec(params),
        }
    }

    /// Replaces the image size and parameter buffer after checking the
    /// count-then-elements layout. The model is unchanged on error.
    pub fn set_params(
        &mut self,
        width: i32,
        height: i32,
        params: DVector<f64>,
    ) -> Result<(), PerceptionIoError> {
        validate_layout(params.as_slice()).map_err(PerceptionIoError::InvalidArgument)?;
        self.width = width;
        self.height = height;
        self.params = params;
        Ok(())
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn params(&self) -> &DVector<f64> {
        &self.params
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.params[0], self.params[1])
    }

    /// Affine coefficients `(c, d, e)`.
    pub fn affine(&self) -> Vector3<f64> {
        Vector3::new(self.params[2], self.params[3], self.params[4])
    }

    pub fn focal_length(&self) -> f64 {
        self.params[5]
    }

    pub fn principal_point(&self) -> Vector2<f64> {
        Vector2::new(self.params[6], self.params[7])
    }

    pub fn cam2world(&self) -> &[f64] {
        let count = self.cam2world_count();
        let start = CAM2WORLD_COUNT_INDEX + 1;
        &self.params.as_slice()[start..start + count]
    }

    pub fn world2cam(&self) -> &[f64] {
        let count_index = self.world2cam_count_index();
        &self.params.as_slice()[count_index + 1..]
    }

    /// Decodes the whole buffer.
    pub fn intrinsics(&self) -> OmnidirectionalIntrinsics {
        OmnidirectionalIntrinsics {
            center: self.center(),
            affine: self.affine(),
            focal_length: self.focal_length(),
            principal_point: self.principal_point(),
            cam2world: self.cam2world().to_vec(),
            world2cam: self.world2cam().to_vec(),
        }
    }

    fn cam2world_count(&self) -> usize {
        self.params[CAM2WORLD_COUNT_INDEX] as usize
    }

    fn world2cam_count_index(&self) -> usize {
        CAM2WORLD_COUNT_INDEX + 1 + self.cam2world_count()
    }
}

/// Checks `len == 8 + 1 + n + 1 + m` and that both counts are integral.
fn validate_layout(params: &[f64]) -> Result<(), String> {
    let cam2world_count = read_count(params, CAM2WORLD_COUNT_INDEX, "cam2world")?;
    let world2cam_index = (CAM2WORLD_COUNT_INDEX + 1)
        .checked_add(cam2world_count)
        .ok_or_else(|| format!("cam2world count {cam2world_count} overflows the layout"))?;
    let world2cam_count = read_count(params, world2cam_index, "world2cam")?;

    let expected = (world2cam_index + 1)
        .checked_add(world2cam_count)
        .ok_or_else(|| format!("world2cam count {world2cam_count} overflows the layout"))?;
    if params.len() != expected {
        return Err(format!(
            "omnidirectional buffer holds {} values, layout requires {expected}",
            params.len()
        ));
    }
    Ok(())
}

fn read_count(params: &[f64], index: usize, name: &str) -> Result<usize, String> {
    let value = params.get(index).copied().ok_or_else(|| {
        format!(
            "omnidirectional buffer of {} values has no {name} count at index {index}",
            params.len()
        )
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(format!("{name} count {value} is not a non-negative integer"));
    }
    // A count can never exceed the buffer it describes.
    if value > params.len() as f64 {
        return Err(format!(
            "{name} count {value} exceeds the buffer length {}",
            params.len()
        ));
    }
    Ok(value as usize)
}

impl fmt::Debug for OmnidirectionalCameraDistortionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OmnidirectionalCameraDistortionModel [width: {} height: {} center: ({}, {}) \
             affine: ({}, {}, {}) f: {} pp: ({}, {}) cam2world: {:?} world2cam: {:?}]",
            self.width,
            self.height,
            self.params[0],
            self.params[1],
            self.params[2],
            self.params[3],
            self.params[4],
            self.params[5],
            self.params[6],
            self.params[7],
            self.cam2world(),
            self.world2cam(),
        )
    }
}

impl CalibrationModel for OmnidirectionalCameraDistortionModel {
    fn name(&self) -> &'static str {
        "omnidirectional"
    }

    fn load_from_yaml(path: &Path) -> Result<Self, PerceptionIoError> {
        load_omnidirectional_camera_intrinsics(path)
    }

    fn save_to_yaml(&self, path: &Path) -> Result<(), PerceptionIoError> {
        let center = self.center();
        let affine = self.affine();
        let principal_point = self.principal_point();
        let document = OmnidirectionalDocument {
            width: self.width,
            height: self.height,
            center: PointXY {
                x: center.x,
                y: center.y,
            },
            affine: AffineCDE {
                c: affine.x,
                d: affine.y,
                e: affine.z,
            },
            cam2world: self.cam2world().to_vec(),
            world2cam: self.world2cam().to_vec(),
            focallength: self.focal_length(),
            principalpoint: PointXY {
                x: principal_point.x,
                y: principal_point.y,
            },
        };
        util::write_yaml_file(path, &document)
    }
}

/// Loads an omnidirectional camera model from the YAML document at `path`.
///
/// # Errors
///
/// * [`PerceptionIoError::InvalidArgument`] if `path` is empty.
/// * [`PerceptionIoError::NotFound`] if `path` does not exist.
/// * [`PerceptionIoError::InvalidFormat`] if the document is malformed or empty.
/// * [`PerceptionIoError::MissingField`] if any of [`REQUIRED_FIELDS`] is
///   absent; no value is read in that case.
/// * [`PerceptionIoError::ParseError`] if a field holds the wrong type or a
///   nested key (`center.x`, `affine.e`, ...) is missing.
pub fn load_omnidirectional_camera_intrinsics(
    path: impl AsRef<Path>,
) -> Result<OmnidirectionalCameraDistortionModel, PerceptionIoError> {
    let path = path.as_ref();
    let model = util::require_path(path)
        .and_then(|()| YamlDocument::load(path))
        .and_then(|doc| {
            check_required_fields(&doc)?;
            parse_omnidirectional(&doc)
        })
        .inspect_err(|e| {
            error!(
                "load camera intrinsic file {} with error: {}",
                path.display(),
                e
            );
        })?;

    info!(
        "Loaded omnidirectional camera intrinsics from {} ({} cam2world, {} world2cam terms)",
        path.display(),
        model.cam2world().len(),
        model.world2cam().len()
    );
    Ok(model)
}

/// Like [`load_omnidirectional_camera_intrinsics`], but fills a caller-owned
/// model. `None` fails with [`PerceptionIoError::InvalidArgument`] before any
/// file access; `model` is only written on success.
pub fn load_omnidirectional_camera_intrinsics_into(
    path: impl AsRef<Path>,
    model: Option<&mut OmnidirectionalCameraDistortionModel>,
) -> Result<(), PerceptionIoError> {
    let model = model.ok_or_else(|| {
        PerceptionIoError::InvalidArgument("output model must not be None".to_string())
    })?;
    *model = load_omnidirectional_camera_intrinsics(path)?;
    Ok(())
}

fn check_required_fields(doc: &YamlDocument) -> Result<(), PerceptionIoError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|key| !doc.get(key).is_defined())
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    Err(PerceptionIoError::MissingField {
        path: doc.path().to_path_buf(),
        fields: missing,
    })
}

fn parse_omnidirectional(
    doc: &YamlDocument,
) -> Result<OmnidirectionalCameraDistortionModel, PerceptionIoError> {
    let width = doc.get("width").as_i32()?;
    let height = doc.get("height").as_i32()?;

    let center = doc.get("center");
    let affine = doc.get("affine");
    let principal_point = doc.get("principalpoint");

    let intrinsics = OmnidirectionalIntrinsics {
        center: Vector2::new(center.get("x").as_f64()?, center.get("y").as_f64()?),
        affine: Vector3::new(
            affine.get("c").as_f64()?,
            affine.get("d").as_f64()?,
            affine.get("e").as_f64()?,
        ),
        focal_length: doc.get("focallength").as_f64()?,
        principal_point: Vector2::new(
            principal_point.get("x").as_f64()?,
            principal_point.get("y").as_f64()?,
        ),
        cam2world: doc.get("cam2world").as_f64_vec()?,
        world2cam: doc.get("world2cam").as_f64_vec()?,
    };

    Ok(OmnidirectionalCameraDistortionModel::from_intrinsics(
        width,
        height,
        &intrinsics,
    ))
}
