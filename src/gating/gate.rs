//! Gate definitions and their child populations.
//!
//! A [`Gate`] subdivides its `parent` population into named children. The variant decides
//! the child record type and its rules:
//!
//! - **Threshold**: straight cuts parallel to the axes. Children carry a quadrant
//!   `definition` (`+`/`-` in 1-D mode, `++`/`+-`/`-+`/`--` in 2-D mode).
//! - **Polygon**: arbitrary closed shapes, typically produced by clustering.
//! - **Ellipse**: centroid/covariance shapes, typically produced by mixture models.
//!
//! Whether a gate is 1-D or 2-D is decided by the presence of `y`.
//!
//! Children are snapshots: when a threshold child is added the gate's axes and transforms are
//! copied into its geometry, so later edits to the gate never rewrite existing children.

use super::geometry::{PolygonGeom, ThresholdGeom};
use crate::error::{AppResult, CytoError};
use crate::validation::{is_not_empty, is_valid_definition};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Pre/post-processing options.
///
/// Only `transform_x` and `transform_y` are read here; every other key is passed through
/// untouched to the gating method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOptions {
    /// Transform applied to the x axis before gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_x: Option<String>,
    /// Transform applied to the y axis before gating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_y: Option<String>,
    /// Opaque options for the gating method.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessingOptions {
    /// Options with the given axis transforms.
    pub fn with_transforms(transform_x: Option<&str>, transform_y: Option<&str>) -> Self {
        Self {
            transform_x: transform_x.map(str::to_string),
            transform_y: transform_y.map(str::to_string),
            extra: Map::new(),
        }
    }

    /// Add an opaque option.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Child population of a threshold gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildThreshold {
    /// Population name.
    pub name: String,
    /// Quadrant membership relative to the cut(s), e.g. `"+"` or `"-+"`.
    pub definition: String,
    /// Cut geometry.
    pub geom: ThresholdGeom,
}

impl ChildThreshold {
    /// New child record.
    pub fn new(name: &str, definition: &str, geom: ThresholdGeom) -> Self {
        Self {
            name: name.to_string(),
            definition: definition.to_string(),
            geom,
        }
    }
}

/// Child population of a polygon or ellipse gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildPolygon {
    /// Population name.
    pub name: String,
    /// Boundary geometry.
    pub geom: PolygonGeom,
}

impl ChildPolygon {
    /// New child record.
    pub fn new(name: &str, geom: PolygonGeom) -> Self {
        Self {
            name: name.to_string(),
            geom,
        }
    }
}

/// Variant payload of a gate, tagged by `gate_type` in stored documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "gate_type", rename_all = "snake_case")]
pub enum GateKind {
    /// Axis-parallel threshold gate.
    Threshold {
        /// Ordered child populations.
        #[serde(default)]
        children: Vec<ChildThreshold>,
    },
    /// Polygon gate.
    Polygon {
        /// Ordered child populations.
        #[serde(default)]
        children: Vec<ChildPolygon>,
    },
    /// Ellipse gate.
    Ellipse {
        /// Ordered child populations.
        #[serde(default)]
        children: Vec<ChildPolygon>,
    },
}

impl GateKind {
    /// Variant tag as stored.
    pub fn tag(&self) -> &'static str {
        match self {
            GateKind::Threshold { .. } => "threshold",
            GateKind::Polygon { .. } => "polygon",
            GateKind::Ellipse { .. } => "ellipse",
        }
    }
}

/// Gating dimensionality, decided by the presence of `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatingMode {
    /// Only `x` is set.
    OneDimensional,
    /// Both `x` and `y` are set.
    TwoDimensional,
}

/// A gate in a gating scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// Unique name within the gating scheme; document key in storage.
    pub gate_name: String,
    /// Population this gate subdivides.
    pub parent: String,
    /// Primary axis channel.
    pub x: String,
    /// Secondary axis channel; its presence makes the gate two-dimensional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// Options applied before the gating method runs.
    #[serde(default)]
    pub preprocessing: ProcessingOptions,
    /// Options applied after the gating method runs.
    #[serde(default)]
    pub postprocessing: ProcessingOptions,
    /// Name of the method that populates children.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Keyword arguments for `method`.
    #[serde(default)]
    pub method_kwargs: Map<String, Value>,
    /// Variant and child list.
    #[serde(flatten)]
    pub kind: GateKind,
}

impl Gate {
    /// Start building a gate.
    pub fn builder(gate_name: &str, parent: &str, x: &str) -> GateBuilder {
        GateBuilder::new(gate_name, parent, x)
    }

    /// 1-D or 2-D mode.
    pub fn mode(&self) -> GatingMode {
        if self.y.is_some() {
            GatingMode::TwoDimensional
        } else {
            GatingMode::OneDimensional
        }
    }

    /// Variant tag.
    pub fn gate_type(&self) -> &'static str {
        self.kind.tag()
    }

    /// Names of the child populations, in insertion order.
    pub fn child_names(&self) -> Vec<&str> {
        match &self.kind {
            GateKind::Threshold { children } => children.iter().map(|c| c.name.as_str()).collect(),
            GateKind::Polygon { children } | GateKind::Ellipse { children } => {
                children.iter().map(|c| c.name.as_str()).collect()
            }
        }
    }

    /// Number of child populations.
    pub fn child_count(&self) -> usize {
        match &self.kind {
            GateKind::Threshold { children } => children.len(),
            GateKind::Polygon { children } | GateKind::Ellipse { children } => children.len(),
        }
    }

    /// Threshold children, if this is a threshold gate.
    pub fn threshold_children(&self) -> Option<&[ChildThreshold]> {
        match &self.kind {
            GateKind::Threshold { children } => Some(children),
            _ => None,
        }
    }

    /// Polygon children, if this is a polygon or ellipse gate.
    pub fn polygon_children(&self) -> Option<&[ChildPolygon]> {
        match &self.kind {
            GateKind::Polygon { children } | GateKind::Ellipse { children } => Some(children),
            GateKind::Threshold { .. } => None,
        }
    }

    /// Add a child to a threshold gate.
    ///
    /// The definition must match the gate's mode. On success the child's geometry is
    /// stamped with this gate's axes and preprocessing transforms and the child is appended.
    /// On failure nothing is appended.
    pub fn add_threshold_child(&mut self, mut child: ChildThreshold) -> AppResult<()> {
        let two_dimensional = self.mode() == GatingMode::TwoDimensional;
        let kind = self.kind.tag();
        let GateKind::Threshold { children } = &mut self.kind else {
            return Err(CytoError::GateType {
                gate: self.gate_name.clone(),
                kind,
                child: "threshold",
            });
        };

        is_valid_definition(&child.definition, two_dimensional).map_err(|expected| {
            CytoError::InvalidChildDefinition {
                definition: child.definition.clone(),
                expected: expected.to_string(),
            }
        })?;

        child.geom.x = Some(self.x.clone());
        child.geom.y = self.y.clone();
        child.geom.transform_x = self.preprocessing.transform_x.clone();
        child.geom.transform_y = self.preprocessing.transform_y.clone();

        debug!(gate = %self.gate_name, child = %child.name, definition = %child.definition, "Adding threshold child");
        children.push(child);
        Ok(())
    }

    /// Add a child to a polygon or ellipse gate.
    ///
    /// The geometry is taken as produced by the gating method; it only has to be well formed.
    pub fn add_polygon_child(&mut self, child: ChildPolygon) -> AppResult<()> {
        let children = match &mut self.kind {
            GateKind::Polygon { children } | GateKind::Ellipse { children } => children,
            GateKind::Threshold { .. } => {
                return Err(CytoError::GateType {
                    gate: self.gate_name.clone(),
                    kind: "threshold",
                    child: "polygon",
                })
            }
        };
        child.geom.validate()?;
        debug!(gate = %self.gate_name, child = %child.name, "Adding polygon child");
        children.push(child);
        Ok(())
    }
}

/// A builder for constructing [`Gate`] instances.
#[derive(Debug, Clone)]
pub struct GateBuilder {
    gate_name: String,
    parent: String,
    x: String,
    y: Option<String>,
    preprocessing: ProcessingOptions,
    postprocessing: ProcessingOptions,
    method: Option<String>,
    method_kwargs: Map<String, Value>,
}

impl GateBuilder {
    /// Required identity and primary axis.
    pub fn new(gate_name: &str, parent: &str, x: &str) -> Self {
        Self {
            gate_name: gate_name.to_string(),
            parent: parent.to_string(),
            x: x.to_string(),
            y: None,
            preprocessing: ProcessingOptions::default(),
            postprocessing: ProcessingOptions::default(),
            method: None,
            method_kwargs: Map::new(),
        }
    }

    /// Secondary axis, switching the gate to 2-D mode.
    pub fn y(mut self, y: &str) -> Self {
        self.y = Some(y.to_string());
        self
    }

    /// Preprocessing options.
    pub fn preprocessing(mut self, options: ProcessingOptions) -> Self {
        self.preprocessing = options;
        self
    }

    /// Postprocessing options.
    pub fn postprocessing(mut self, options: ProcessingOptions) -> Self {
        self.postprocessing = options;
        self
    }

    /// Gating method name.
    pub fn method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    /// One keyword argument for the method.
    pub fn method_kwarg(mut self, key: &str, value: Value) -> Self {
        self.method_kwargs.insert(key.to_string(), value);
        self
    }

    /// Build a threshold gate.
    pub fn threshold(self) -> AppResult<Gate> {
        self.build(GateKind::Threshold {
            children: Vec::new(),
        })
    }

    /// Build a polygon gate.
    pub fn polygon(self) -> AppResult<Gate> {
        self.build(GateKind::Polygon {
            children: Vec::new(),
        })
    }

    /// Build an ellipse gate.
    pub fn ellipse(self) -> AppResult<Gate> {
        self.build(GateKind::Ellipse {
            children: Vec::new(),
        })
    }

    fn build(self, kind: GateKind) -> AppResult<Gate> {
        for (field, value) in [
            ("gate_name", &self.gate_name),
            ("parent", &self.parent),
            ("x", &self.x),
        ] {
            is_not_empty(value)
                .map_err(|e| CytoError::Validation(format!("{field}: {e}")))?;
        }
        if let Some(y) = &self.y {
            is_not_empty(y).map_err(|e| CytoError::Validation(format!("y: {e}")))?;
        }

        Ok(Gate {
            gate_name: self.gate_name,
            parent: self.parent,
            x: self.x,
            y: self.y,
            preprocessing: self.preprocessing,
            postprocessing: self.postprocessing,
            method: self.method,
            method_kwargs: self.method_kwargs,
            kind,
        })
    }
}
