//! Ordered collection of gates for one analysis.

use super::gate::Gate;
use crate::error::{AppResult, CytoError};
use serde::{Deserialize, Serialize};

/// Name of the population every scheme starts from.
pub const ROOT_POPULATION: &str = "root";

/// Gates of one analysis, keyed by `gate_name`.
///
/// Each gate's `parent` must be the root population or a child population produced by a
/// gate already in the scheme, so gates are added top-down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatingScheme {
    gates: Vec<Gate>,
}

impl GatingScheme {
    /// Empty scheme.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a gate, enforcing unique names and an existing parent population.
    pub fn add_gate(&mut self, gate: Gate) -> AppResult<()> {
        if self.get(&gate.gate_name).is_some() {
            return Err(CytoError::DuplicateGate(gate.gate_name));
        }
        if !self.has_population(&gate.parent) {
            return Err(CytoError::UnknownParent {
                gate: gate.gate_name,
                parent: gate.parent,
            });
        }
        self.gates.push(gate);
        Ok(())
    }

    /// Gate by name.
    pub fn get(&self, gate_name: &str) -> Option<&Gate> {
        self.gates.iter().find(|g| g.gate_name == gate_name)
    }

    /// Mutable gate by name, e.g. to add children once the method has run.
    pub fn get_mut(&mut self, gate_name: &str) -> Option<&mut Gate> {
        self.gates.iter_mut().find(|g| g.gate_name == gate_name)
    }

    /// Whether a population exists: the root or any child of any gate.
    pub fn has_population(&self, name: &str) -> bool {
        name == ROOT_POPULATION
            || self
                .gates
                .iter()
                .any(|g| g.child_names().contains(&name))
    }

    /// Gates whose parent is `population`.
    pub fn gates_on(&self, population: &str) -> Vec<&Gate> {
        self.gates.iter().filter(|g| g.parent == population).collect()
    }

    /// Gates in insertion order.
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Number of gates.
    pub fn len(&self) -> usize {
        self.gates.len()
    }

    /// Whether the scheme is empty.
    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }
}
