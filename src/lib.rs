//! # cytogate
//!
//! Flow-cytometry (FCS) file loading, spillover compensation and hierarchical gate modelling.
//! The crate is a library first; the `cytogate` binary is a thin command-line front end.
//!
//! ## Crate Structure
//!
//! - **`fcs`**: The FCS reader. Parses the HEADER, TEXT and DATA segments into an
//!   [`fcs::FcsFile`] holding metadata, channel/marker mappings and the event matrix; recovers
//!   the spillover matrix and applies compensation.
//! - **`gating`**: The gate model. Threshold, polygon and ellipse gates, their child
//!   populations and geometry, the [`gating::GatingScheme`] collection and the document store
//!   boundary.
//! - **`discovery`**: Concurrent discovery of the distinct channel/marker mappings across a
//!   batch of files.
//! - **`config`**: Figment-based configuration (TOML file + environment variables).
//! - **`error`**: The crate-wide `CytoError` enum and `AppResult` alias.
//! - **`logging`**: `tracing-subscriber` initialisation.
//! - **`validation`**: Small shared validation helpers.
//!
//! Data flows from the reader to the compensation engine and out as an
//! [`fcs::EventTable`]. The gate model is independent of the reader at runtime and only
//! shares channel names with it.

pub mod config;
pub mod discovery;
pub mod error;
pub mod fcs;
pub mod gating;
pub mod logging;
pub mod validation;

pub use error::{AppResult, CytoError};
pub use fcs::FcsFile;
pub use gating::{Gate, GatingScheme};
