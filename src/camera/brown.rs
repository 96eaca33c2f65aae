//! Brown camera distortion model (pinhole intrinsics plus radial/tangential
//! distortion).
//!
//! This module provides [`BrownCameraDistortionModel`] and the
//! [`load_brown_camera_intrinsic`] loader that populates it from a YAML
//! calibration document of the form:
//!
//! ```yaml
//! width: 1920
//! height: 1080
//! K: [fx, 0, cx, 0, fy, cy, 0, 0, 1]
//! D: [k1, k2, p1, p2, k3]
//! ```

use crate::camera::{CalibrationModel, PerceptionIoError};
use crate::util::{self, YamlDocument};
use log::{error, info};
use nalgebra::{DVector, Matrix3, Vector5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Number of entries in the row-major intrinsic matrix `K`.
pub const INTRINSIC_LEN: usize = 9;
/// Number of distortion coefficients `D` (`k1, k2, p1, p2, k3`).
pub const DISTORTION_LEN: usize = 5;
/// Length of the flat parameter buffer: `K` followed by `D`.
pub const PARAMS_LEN: usize = INTRINSIC_LEN + DISTORTION_LEN;

/// Represents a Brown camera distortion model.
///
/// The parameters are kept as one flat buffer of [`PARAMS_LEN`] values, the
/// layout the perception pipeline indexes directly:
///
/// * `params[0..9]`: the 3x3 intrinsic matrix `K` in row-major order.
/// * `params[9..14]`: the distortion coefficients `[k1, k2, p1, p2, k3]`.
///
/// # Examples
///
/// ```rust
/// use nalgebra::DVector;
/// use perception_io::camera::brown::BrownCameraDistortionModel;
///
/// let params = DVector::from_vec(vec![
///     500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0, // K
///     -0.28, 0.07, 0.0002, 0.00002, 0.0, // D
/// ]);
/// let model = BrownCameraDistortionModel::new(640.0, 480.0, params).unwrap();
///
/// assert_eq!(model.intrinsic_matrix()[(0, 2)], 320.0);
/// assert_eq!(model.distortion()[0], -0.28);
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBrownModel")]
pub struct BrownCameraDistortionModel {
    width: f64,
    height: f64,
    params: DVector<f64>,
}

/// Unchecked serde form; converted through [`BrownCameraDistortionModel::new`].
#[derive(Deserialize)]
struct RawBrownModel {
    width: f64,
    height: f64,
    params: DVector<f64>,
}

impl TryFrom<RawBrownModel> for BrownCameraDistortionModel {
    type Error = PerceptionIoError;

    fn try_from(raw: RawBrownModel) -> Result<Self, Self::Error> {
        BrownCameraDistortionModel::new(raw.width, raw.height, raw.params)
    }
}

/// On-disk shape of a Brown calibration document, used when saving.
#[derive(Serialize)]
struct BrownDocument {
    width: f64,
    height: f64,
    #[serde(rename = "K")]
    k: Vec<f64>,
    #[serde(rename = "D")]
    d: Vec<f64>,
}

impl Default for BrownCameraDistortionModel {
    fn default() -> Self {
        BrownCameraDistortionModel {
            width: 0.0,
            height: 0.0,
            params: DVector::zeros(PARAMS_LEN),
        }
    }
}

impl BrownCameraDistortionModel {
    /// Creates a model from the image size and a flat `K + D` buffer.
    ///
    /// # Errors
    ///
    /// [`PerceptionIoError::InvalidArgument`] if `params` does not hold
    /// exactly [`PARAMS_LEN`] values.
    pub fn new(width: f64, height: f64, params: DVector<f64>) -> Result<Self, PerceptionIoError> {
        let mut model = BrownCameraDistortionModel::default();
        model.set_params(width, height, params)?;
        Ok(model)
    }

    /// Replaces the image size and parameter buffer.
    ///
    /// The model is left unchanged when `params` has the wrong length.
    pub fn set_params(
        &mut self,
        width: f64,
        height: f64,
        params: DVector<f64>,
    ) -> Result<(), PerceptionIoError> {
        if params.len() != PARAMS_LEN {
            return Err(PerceptionIoError::InvalidArgument(format!(
                "Brown model requires {PARAMS_LEN} parameters, got {}",
                params.len()
            )));
        }
        self.width = width;
        self.height = height;
        self.params = params;
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn params(&self) -> &DVector<f64> {
        &self.params
    }

    /// The intrinsic matrix `K` rebuilt from `params[0..9]`.
    pub fn intrinsic_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_row_slice(&self.params.as_slice()[..INTRINSIC_LEN])
    }

    /// The distortion coefficients `[k1, k2, p1, p2, k3]`.
    pub fn distortion(&self) -> Vector5<f64> {
        Vector5::from_column_slice(&self.params.as_slice()[INTRINSIC_LEN..])
    }
}

impl fmt::Debug for BrownCameraDistortionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BrownCameraDistortionModel [width: {} height: {} K: {:?} D: {:?}]",
            self.width,
            self.height,
            &self.params.as_slice()[..INTRINSIC_LEN],
            &self.params.as_slice()[INTRINSIC_LEN..],
        )
    }
}

impl CalibrationModel for BrownCameraDistortionModel {
    fn name(&self) -> &'static str {
        "brown"
    }

    fn load_from_yaml(path: &Path) -> Result<Self, PerceptionIoError> {
        load_brown_camera_intrinsic(path)
    }

    /// Writes `width`, `height`, `K` and `D` so that
    /// [`load_brown_camera_intrinsic`] reads back an equal model.
    fn save_to_yaml(&self, path: &Path) -> Result<(), PerceptionIoError> {
        let document = BrownDocument {
            width: self.width,
            height: self.height,
            k: self.params.as_slice()[..INTRINSIC_LEN].to_vec(),
            d: self.params.as_slice()[INTRINSIC_LEN..].to_vec(),
        };
        util::write_yaml_file(path, &document)
    }
}

/// Loads a Brown camera model from the YAML calibration document at `path`.
///
/// # Errors
///
/// * [`PerceptionIoError::InvalidArgument`] if `path` is empty.
/// * [`PerceptionIoError::NotFound`] if `path` does not exist.
/// * [`PerceptionIoError::InvalidFormat`] if the document is malformed or empty.
/// * [`PerceptionIoError::ParseError`] if `width`, `height`, `K` or `D` is
///   missing, not numeric, or `K`/`D` do not hold 9/5 entries.
pub fn load_brown_camera_intrinsic(
    path: impl AsRef<Path>,
) -> Result<BrownCameraDistortionModel, PerceptionIoError> {
    let path = path.as_ref();
    let model = util::require_path(path)
        .and_then(|()| YamlDocument::load(path))
        .and_then(|doc| parse_brown(&doc))
        .inspect_err(|e| {
            error!(
                "load camera intrinsic file {} with error: {}",
                path.display(),
                e
            );
        })?;

    info!("Loaded Brown camera intrinsics from {}", path.display());
    Ok(model)
}

/// Like [`load_brown_camera_intrinsic`], but fills a caller-owned model.
///
/// `None` is rejected with [`PerceptionIoError::InvalidArgument`] before the
/// filesystem is touched, and `model` is only written on success.
pub fn load_brown_camera_intrinsic_into(
    path: impl AsRef<Path>,
    model: Option<&mut BrownCameraDistortionModel>,
) -> Result<(), PerceptionIoError> {
    let model = model.ok_or_else(|| {
        PerceptionIoError::InvalidArgument("output model must not be None".to_string())
    })?;
    *model = load_brown_camera_intrinsic(path)?;
    Ok(())
}

fn parse_brown(doc: &YamlDocument) -> Result<BrownCameraDistortionModel, PerceptionIoError> {
    let width = doc.get("width").as_f64()?;
    let height = doc.get("height").as_f64()?;

    let k = read_fixed(doc, "K", INTRINSIC_LEN)?;
    let d = read_fixed(doc, "D", DISTORTION_LEN)?;

    let params = DVector::from_iterator(PARAMS_LEN, k.into_iter().chain(d));
    BrownCameraDistortionModel::new(width, height, params)
}

fn read_fixed(doc: &YamlDocument, key: &str, len: usize) -> Result<Vec<f64>, PerceptionIoError> {
    let values = doc.get(key).as_f64_vec()?;
    if values.len() != len {
        return Err(PerceptionIoError::parse(
            doc.path(),
            format!(
                "field `{key}` must hold {len} entries, found {}",
                values.len()
            ),
        ));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::write_text_file;
    use std::path::PathBuf;

    fn write_sample(name: &str, contents: &str) -> PathBuf {
        let path = PathBuf::from("output").join(name);
        write_text_file(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_brown_load_from_yaml() {
        let model = load_brown_camera_intrinsic("samples/brown.yaml").unwrap();

        assert_eq!(model.width(), 1920.0);
        assert_eq!(model.height(), 1080.0);
        assert_eq!(model.params().len(), PARAMS_LEN);

        let k = [
            1998.5, 0.0, 960.25, 0.0, 1997.75, 540.5, 0.0, 0.0, 1.0,
        ];
        let d = [-0.5635, 0.2841, 0.00031, -0.00072, 0.0];
        assert_eq!(&model.params().as_slice()[..9], &k);
        assert_eq!(&model.params().as_slice()[9..], &d);

        assert_eq!(model.intrinsic_matrix()[(0, 0)], 1998.5);
        assert_eq!(model.intrinsic_matrix()[(1, 2)], 540.5);
        assert_eq!(model.distortion()[1], 0.2841);
    }

    #[test]
    fn test_brown_round_trip_reproduces_k_and_d() {
        let k = [1000.0, 0.0, 959.5, 0.0, 1001.0, 539.5, 0.0, 0.0, 1.0];
        let d = [-0.1, 0.01, 0.001, -0.002, 0.0005];
        let original = BrownCameraDistortionModel::new(
            1920.0,
            1080.0,
            DVector::from_iterator(PARAMS_LEN, k.iter().chain(d.iter()).copied()),
        )
        .unwrap();

        let path = PathBuf::from("output/brown_saved.yaml");
        original.save_to_yaml(&path).unwrap();
        let loaded = load_brown_camera_intrinsic(&path).unwrap();

        assert_eq!(loaded, original);
        assert_eq!(&loaded.params().as_slice()[..9], &k);
        assert_eq!(&loaded.params().as_slice()[9..], &d);
    }

    #[test]
    fn test_brown_non_numeric_entry_is_parse_error() {
        let path = write_sample(
            "brown_non_numeric.yaml",
            "width: 640\nheight: 480\nK: [500, 0, 320, 0, fx, 240, 0, 0, 1]\nD: [0, 0, 0, 0, 0]\n",
        );
        let result = load_brown_camera_intrinsic(&path);
        assert!(
            matches!(result, Err(PerceptionIoError::ParseError { .. })),
            "{result:?}"
        );
    }

    #[test]
    fn test_brown_wrong_lengths_are_parse_errors() {
        let short_k = write_sample(
            "brown_short_k.yaml",
            "width: 640\nheight: 480\nK: [500, 0, 320, 0, 500, 240, 0, 0]\nD: [0, 0, 0, 0, 0]\n",
        );
        let long_d = write_sample(
            "brown_long_d.yaml",
            "width: 640\nheight: 480\nK: [500, 0, 320, 0, 500, 240, 0, 0, 1]\nD: [0, 0, 0, 0, 0, 0]\n",
        );
        let missing_height = write_sample(
            "brown_missing_height.yaml",
            "width: 640\nK: [500, 0, 320, 0, 500, 240, 0, 0, 1]\nD: [0, 0, 0, 0, 0]\n",
        );

        for path in [short_k, long_d, missing_height] {
            let result = load_brown_camera_intrinsic(&path);
            assert!(
                matches!(result, Err(PerceptionIoError::ParseError { .. })),
                "{}: {result:?}",
                path.display()
            );
        }
    }

    #[test]
    fn test_brown_missing_file_and_empty_document() {
        assert!(matches!(
            load_brown_camera_intrinsic("samples/no_such_brown.yaml"),
            Err(PerceptionIoError::NotFound(_))
        ));

        let empty = write_sample("brown_empty.yaml", "");
        assert!(matches!(
            load_brown_camera_intrinsic(&empty),
            Err(PerceptionIoError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_brown_into_leaves_destination_untouched_on_failure() {
        let mut model = BrownCameraDistortionModel::default();

        let result = load_brown_camera_intrinsic_into("samples/no_such_brown.yaml", Some(&mut model));
        assert!(matches!(result, Err(PerceptionIoError::NotFound(_))));
        assert_eq!(model, BrownCameraDistortionModel::default());

        load_brown_camera_intrinsic_into("samples/brown.yaml", Some(&mut model)).unwrap();
        assert_eq!(model.width(), 1920.0);
    }

    #[test]
    fn test_brown_into_none_fails_before_io() {
        // The path does not exist; InvalidArgument (not NotFound) proves the
        // filesystem was never consulted.
        let result = load_brown_camera_intrinsic_into("samples/no_such_brown.yaml", None);
        assert!(matches!(result, Err(PerceptionIoError::InvalidArgument(_))));
    }

    #[test]
    fn test_brown_set_params_rejects_wrong_length() {
        let mut model = BrownCameraDistortionModel::default();
        let result = model.set_params(640.0, 480.0, DVector::zeros(13));
        assert!(matches!(result, Err(PerceptionIoError::InvalidArgument(_))));
        assert_eq!(model.width(), 0.0);
    }

    #[test]
    fn test_deserialize_checks_params_length() {
        let model = load_brown_camera_intrinsic("samples/brown.yaml").unwrap();
        let mut value = serde_json::to_value(&model).unwrap();
        let decoded: BrownCameraDistortionModel = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(decoded, model);

        value["params"] = serde_json::json!([[1.0, 2.0, 3.0], 3, null]);
        let result = serde_json::from_value::<BrownCameraDistortionModel>(value);
        assert!(result.is_err());
    }
}
