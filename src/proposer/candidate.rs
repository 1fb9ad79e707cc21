//! Instruction candidate: the current instruction of every pipeline component.
//!
//! Persisted as JSON with one key per component, each an object holding at
//! least an `instruction` string. Other keys on a component object (demos,
//! signature metadata, whatever the pipeline stores) are carried through
//! load, merge and save untouched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DealscoreError, Result};

/// Proposed instruction text keyed by component name.
pub type Proposals = BTreeMap<String, String>;

/// One component's stored state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstruction {
    pub instruction: String,

    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Component name -> current instruction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstructionCandidate {
    components: BTreeMap<String, ComponentInstruction>,
}

impl InstructionCandidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a component's instruction.
    pub fn with_instruction(mut self, component: impl Into<String>, instruction: impl Into<String>) -> Self {
        self.components
            .entry(component.into())
            .or_default()
            .instruction = instruction.into();
        self
    }

    /// Current instruction text for a component.
    pub fn instruction(&self, component: &str) -> Option<&str> {
        self.components.get(component).map(|c| c.instruction.as_str())
    }

    pub fn get(&self, component: &str) -> Option<&ComponentInstruction> {
        self.components.get(component)
    }

    pub fn contains(&self, component: &str) -> bool {
        self.components.contains_key(component)
    }

    /// Component names, sorted.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Apply proposals to known components, whole instructions at a time.
    ///
    /// Proposals for components the candidate does not have are ignored.
    /// Returns the number of instructions replaced.
    pub fn merge(&mut self, proposals: &Proposals) -> usize {
        let mut updated = 0;
        for (component, instruction) in proposals {
            match self.components.get_mut(component) {
                Some(entry) => {
                    entry.instruction = instruction.clone();
                    updated += 1;
                }
                None => log::warn!("Ignoring proposal for unknown component '{}'", component),
            }
        }
        updated
    }

    /// Load a candidate from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| DealscoreError::Candidate(format!("{} is not a valid candidate: {}", path.display(), e)))
    }

    /// Write the candidate as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
