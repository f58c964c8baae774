//! Environment bindings exported to the provisioned worker.
//!
//! Scalars are set once. Search paths only grow at the front, and keep
//! whatever value the variable had before the pipeline touched it.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::ProvisionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BindingValue {
    Scalar(String),
    SearchPath {
        /// Entries ahead of the inherited value, highest priority first.
        entries: Vec<String>,
        /// Whether the variable's prior value is kept after `entries`.
        inherit: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: BindingValue,
}

/// How a search path's inherited tail is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Dockerfile `ENV` (`/opt/bin${PATH:+:${PATH}}`)
    Dockerfile,
    /// POSIX shell (`/opt/bin${PATH:+:$PATH}`)
    Shell,
}

/// Ordered set of bindings, in first-definition order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentBindings {
    bindings: Vec<Binding>,
}

impl EnvironmentBindings {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&BindingValue> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    /// Set a scalar. Re-setting the same value is a no-op.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ProvisionError> {
        match self.find_mut(name) {
            Some(existing) => match &existing.value {
                BindingValue::Scalar(v) if v == value => Ok(()),
                other => Err(ProvisionError::BindingConflict {
                    name: name.to_string(),
                    existing: describe(other),
                    attempted: value.to_string(),
                }),
            },
            None => {
                self.bindings.push(Binding {
                    name: name.to_string(),
                    value: BindingValue::Scalar(value.to_string()),
                });
                Ok(())
            }
        }
    }

    /// Declare a search path that keeps the variable's prior value.
    pub fn inherit(&mut self, name: &str) -> Result<(), ProvisionError> {
        match self.find_mut(name) {
            Some(existing) => match &mut existing.value {
                BindingValue::SearchPath { inherit, .. } => {
                    *inherit = true;
                    Ok(())
                }
                other => Err(ProvisionError::BindingConflict {
                    name: name.to_string(),
                    existing: describe(other),
                    attempted: format!("${}", name),
                }),
            },
            None => {
                self.bindings.push(Binding {
                    name: name.to_string(),
                    value: BindingValue::SearchPath {
                        entries: Vec::new(),
                        inherit: true,
                    },
                });
                Ok(())
            }
        }
    }

    /// Prepend entries to a search path, preserving every earlier entry.
    ///
    /// `entries` keep their given order at the front. An entry already on
    /// the path is left where it is.
    pub fn prepend(&mut self, name: &str, entries: &[&str]) -> Result<(), ProvisionError> {
        if self.get(name).is_none() {
            self.bindings.push(Binding {
                name: name.to_string(),
                value: BindingValue::SearchPath {
                    entries: Vec::new(),
                    inherit: false,
                },
            });
        }

        let binding = self
            .find_mut(name)
            .ok_or_else(|| ProvisionError::BindingConflict {
                name: name.to_string(),
                existing: String::new(),
                attempted: entries.join(":"),
            })?;

        match &mut binding.value {
            BindingValue::SearchPath { entries: current, .. } => {
                let mut merged: Vec<String> = entries
                    .iter()
                    .filter(|e| !current.iter().any(|c| c == *e))
                    .map(|e| e.to_string())
                    .collect();
                merged.append(current);
                *current = merged;
                Ok(())
            }
            other => Err(ProvisionError::BindingConflict {
                name: name.to_string(),
                existing: describe(other),
                attempted: entries.join(":"),
            }),
        }
    }

    /// Search-path entries, empty for unknown or scalar bindings.
    pub fn entries(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            Some(BindingValue::SearchPath { entries, .. }) => entries.clone(),
            _ => Vec::new(),
        }
    }

    /// Concrete value given the variable's prior value.
    pub fn resolve(&self, name: &str, prior: Option<&str>) -> Option<String> {
        self.get(name).map(|value| match value {
            BindingValue::Scalar(v) => v.clone(),
            BindingValue::SearchPath { entries, inherit } => {
                let mut parts = entries.clone();
                if *inherit {
                    if let Some(prior) = prior.filter(|p| !p.is_empty()) {
                        parts.push(prior.to_string());
                    }
                }
                parts.join(":")
            }
        })
    }

    /// Value as written into a Dockerfile or a shell profile.
    pub fn render_value(&self, binding: &Binding, syntax: Syntax) -> String {
        match &binding.value {
            BindingValue::Scalar(v) => v.clone(),
            BindingValue::SearchPath { entries, inherit } => {
                let name = &binding.name;
                let prior = match syntax {
                    Syntax::Dockerfile => format!("${{{}}}", name),
                    Syntax::Shell => format!("${}", name),
                };
                match (entries.is_empty(), *inherit) {
                    (true, true) => prior,
                    (_, false) => entries.join(":"),
                    // The separator only appears when the prior value is non-empty
                    (false, true) => format!("{}${{{}:+:{}}}", entries.join(":"), name, prior),
                }
            }
        }
    }

    /// `/etc/profile.d` script exporting every binding.
    pub fn render_profile(&self) -> String {
        let mut out = String::from("# Generated by workerimg provision\n");
        for binding in &self.bindings {
            out.push_str(&format!(
                "export {}=\"{}\"\n",
                binding.name,
                self.render_value(binding, Syntax::Shell)
            ));
        }
        out
    }

    /// Plain map for the build manifest.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.bindings
            .iter()
            .map(|b| (b.name.clone(), self.render_value(b, Syntax::Shell)))
            .collect()
    }
}

fn describe(value: &BindingValue) -> String {
    match value {
        BindingValue::Scalar(v) => v.clone(),
        BindingValue::SearchPath { entries, .. } => entries.join(":"),
    }
}
