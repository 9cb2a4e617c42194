use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One ABI entry of the signature file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignatureEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub name: String,
    /// `0x`-prefixed 4-byte selector
    pub signature: String,
    #[serde(default)]
    pub inputs: serde_json::Value,
    #[serde(default)]
    pub outputs: serde_json::Value,
    #[serde(rename = "stateMutability", default)]
    pub state_mutability: String,
}

/// Static selector table, loaded once before any worker starts and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct SignatureTable {
    entries: HashMap<String, SignatureEntry>,
}

impl SignatureTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signatures file {:?}", path))?;
        let entries: Vec<SignatureEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid signatures file {:?}", path))?;
        Ok(Self::from_entries(entries))
    }

    /// Later entries win on duplicate selectors
    pub fn from_entries<I: IntoIterator<Item = SignatureEntry>>(entries: I) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| (entry.signature.to_ascii_lowercase(), entry))
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, selector: &str) -> Option<&SignatureEntry> {
        self.entries.get(&selector.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
