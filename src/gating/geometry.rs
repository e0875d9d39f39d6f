//! Geometry records attached to child populations.
//!
//! Geometry is always bound to a coordinate space: the axis channels (`x`, `y`) and the
//! transforms applied to them (`transform_x`, `transform_y`) when the shape was computed.

use crate::error::{AppResult, CytoError};
use crate::validation::is_finite;
use serde::{Deserialize, Serialize};

/// Threshold cut-points for one or two axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdGeom {
    /// Primary axis channel.
    #[serde(default)]
    pub x: Option<String>,
    /// Secondary axis channel, for two-dimensional gates.
    #[serde(default)]
    pub y: Option<String>,
    /// Transform applied to `x`.
    #[serde(default)]
    pub transform_x: Option<String>,
    /// Transform applied to `y`.
    #[serde(default)]
    pub transform_y: Option<String>,
    /// Cut-point on `x`.
    #[serde(default)]
    pub x_threshold: Option<f64>,
    /// Cut-point on `y`.
    #[serde(default)]
    pub y_threshold: Option<f64>,
}

impl ThresholdGeom {
    /// Geometry with the given cut-points; axes are stamped in when added to a gate.
    pub fn new(x_threshold: f64, y_threshold: Option<f64>) -> Self {
        Self {
            x_threshold: Some(x_threshold),
            y_threshold,
            ..Default::default()
        }
    }
}

/// Closed shape of a polygon or ellipse child.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Shape {
    /// Polygon given by its vertex coordinates.
    Vertices {
        /// Vertex x coordinates.
        x_values: Vec<f64>,
        /// Vertex y coordinates.
        y_values: Vec<f64>,
    },
    /// Ellipse given by a center and a 2x2 covariance matrix.
    Ellipse {
        /// Center `(x, y)`.
        center: [f64; 2],
        /// Row-major covariance.
        covariance: [[f64; 2]; 2],
    },
}

/// Polygon or ellipse geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonGeom {
    /// Primary axis channel.
    #[serde(default)]
    pub x: Option<String>,
    /// Secondary axis channel.
    #[serde(default)]
    pub y: Option<String>,
    /// Transform applied to `x`.
    #[serde(default)]
    pub transform_x: Option<String>,
    /// Transform applied to `y`.
    #[serde(default)]
    pub transform_y: Option<String>,
    /// The boundary.
    #[serde(flatten)]
    pub shape: Shape,
}

impl PolygonGeom {
    /// Polygon from vertex coordinates.
    pub fn polygon(x: &str, y: &str, x_values: Vec<f64>, y_values: Vec<f64>) -> Self {
        Self {
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            transform_x: None,
            transform_y: None,
            shape: Shape::Vertices { x_values, y_values },
        }
    }

    /// Ellipse from a center and covariance.
    pub fn ellipse(x: &str, y: &str, center: [f64; 2], covariance: [[f64; 2]; 2]) -> Self {
        Self {
            x: Some(x.to_string()),
            y: Some(y.to_string()),
            transform_x: None,
            transform_y: None,
            shape: Shape::Ellipse { center, covariance },
        }
    }

    /// Set the transforms the shape was computed under.
    pub fn with_transforms(mut self, transform_x: Option<&str>, transform_y: Option<&str>) -> Self {
        self.transform_x = transform_x.map(str::to_string);
        self.transform_y = transform_y.map(str::to_string);
        self
    }

    /// Check the shape is well formed.
    pub fn validate(&self) -> AppResult<()> {
        match &self.shape {
            Shape::Vertices { x_values, y_values } => {
                if x_values.len() != y_values.len() {
                    return Err(CytoError::InvalidGeometry(format!(
                        "polygon has {} x values but {} y values",
                        x_values.len(),
                        y_values.len()
                    )));
                }
                if x_values.len() < 3 {
                    return Err(CytoError::InvalidGeometry(format!(
                        "polygon needs at least 3 vertices, found {}",
                        x_values.len()
                    )));
                }
                is_finite(x_values)
                    .and_then(|_| is_finite(y_values))
                    .map_err(|e| CytoError::InvalidGeometry(e.to_string()))
            }
            Shape::Ellipse { center, covariance } => {
                let flat = [
                    center[0],
                    center[1],
                    covariance[0][0],
                    covariance[0][1],
                    covariance[1][0],
                    covariance[1][1],
                ];
                is_finite(&flat).map_err(|e| CytoError::InvalidGeometry(e.to_string()))
            }
        }
    }
}
