//! Hierarchical gate model.
//!
//! Gates are built with [`GateBuilder`], populated by external gating methods through
//! [`Gate::add_threshold_child`] / [`Gate::add_polygon_child`], grouped in a
//! [`GatingScheme`] and persisted through a [`GateStore`].

pub mod gate;
pub mod geometry;
pub mod scheme;
pub mod store;

pub use gate::{
    ChildPolygon, ChildThreshold, Gate, GateBuilder, GateKind, GatingMode, ProcessingOptions,
};
pub use geometry::{PolygonGeom, Shape, ThresholdGeom};
pub use scheme::{GatingScheme, ROOT_POPULATION};
pub use store::{GateStore, JsonGateStore, GATE_COLLECTION};
