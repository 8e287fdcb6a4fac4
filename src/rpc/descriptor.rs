//! Service descriptors
//!
//! Describes a service the way an IDL does: a package, a service name and
//! its methods with their request and response message types. A descriptor
//! is the input for binding a registry against a live service.
//!
//! A manifest may name the `.proto` file declaring the service; relative
//! paths are resolved against the manifest's directory.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::common::{Error, Result};
use crate::testing::compare::Comparison;

/// A service and its methods
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ServiceDescriptor {
    /// IDL package (e.g. "pb")
    pub package: String,
    /// Service name (e.g. "Sample")
    pub service: String,
    /// Proto file declaring the service and its message shapes
    #[serde(default)]
    pub proto: Option<PathBuf>,
    /// Methods exposed by the service
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
}

/// One method of a service
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub request_type: String,
    pub response_type: String,
    /// Optional comparison override for this method's responses
    #[serde(default)]
    pub compare: Option<CompareSpec>,
}

/// Declarative comparison override
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CompareSpec {
    /// Dotted field paths that must match; all other fields are ignored
    #[serde(default)]
    pub fields: Vec<String>,
}

impl MethodDescriptor {
    /// Comparison strategy selected by this descriptor
    pub fn comparison(&self) -> Comparison {
        match &self.compare {
            Some(compare) if !compare.fields.is_empty() => Comparison::Fields(compare.fields.clone()),
            _ => Comparison::Structural,
        }
    }
}

impl ServiceDescriptor {
    /// Parse a descriptor manifest from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::InvalidDescriptor(e.to_string()))
    }

    /// Load a descriptor manifest from a TOML file
    pub fn load_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidDescriptor(format!(
                "Failed to read service manifest '{}': {}",
                path.display(),
                e
            ))
        })?;
        let mut descriptor = Self::parse(&content)?;

        if let (Some(proto), Some(dir)) = (descriptor.proto.as_mut(), path.parent()) {
            if proto.is_relative() {
                *proto = dir.join(&*proto);
            }
        }

        Ok(descriptor)
    }

    /// Fully qualified service name (`package.Service`)
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }

    /// Check that no field is empty and method names are unique
    pub fn validate(&self) -> Result<()> {
        if self.package.is_empty() {
            return Err(Error::InvalidDescriptor("package must not be empty".to_string()));
        }
        if self.service.is_empty() {
            return Err(Error::InvalidDescriptor("service must not be empty".to_string()));
        }
        if self.methods.is_empty() {
            return Err(Error::InvalidDescriptor(format!(
                "service '{}' declares no methods",
                self.full_name()
            )));
        }

        let mut seen = HashSet::new();
        for (i, method) in self.methods.iter().enumerate() {
            if method.name.is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "method #{} has an empty name",
                    i
                )));
            }
            if method.request_type.is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "method '{}' has an empty request type",
                    method.name
                )));
            }
            if method.response_type.is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "method '{}' has an empty response type",
                    method.name
                )));
            }
            if !seen.insert(method.name.as_str()) {
                return Err(Error::InvalidDescriptor(format!(
                    "method '{}' is declared twice",
                    method.name
                )));
            }
        }

        Ok(())
    }
}
