//! Shader Manifest Parser
//!
//! This module parses the YAML manifest that lists the compute shaders of the
//! Kuwahara pipeline together with the interface expectations the host side
//! relies on (entry points, workgroup size and uniform struct layouts).

use serde::Deserialize;

/// Expected byte layout of a uniform struct shared with the host
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayoutExpectation {
    /// WGSL struct name
    #[serde(rename = "struct")]
    pub struct_name: String,
    /// Expected total size in bytes
    pub size: u32,
    /// Expected member offsets in declaration order
    pub offsets: Vec<u32>,
}

/// A single compute shader listed in the manifest
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderEntry {
    /// Identifier used for the generated Rust constant
    pub id: String,
    /// Shader file path relative to the manifest
    pub file: String,
    /// Compute entry points the host creates pipelines for
    pub entry_points: Vec<String>,
    /// Whether the shared prelude is prepended to this shader
    #[serde(default)]
    pub uses_prelude: bool,
}

/// Shader manifest as parsed from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct ShaderManifest {
    /// Optional prelude file prepended to shaders that request it
    #[serde(default)]
    pub prelude: Option<String>,
    /// Workgroup size every compute entry point must declare
    pub workgroup_size: [u32; 3],
    /// Uniform struct layouts that must hold in every shader declaring them
    #[serde(default)]
    pub layouts: Vec<LayoutExpectation>,
    /// Shaders in pipeline order
    pub shaders: Vec<ShaderEntry>,
}

impl ShaderManifest {
    /// Parses a shader manifest from YAML content
    ///
    /// # Arguments
    /// * `yaml_content` - YAML string containing the manifest
    pub fn from_yaml(yaml_content: &str) -> Result<Self, serde_norway::Error> {
        serde_norway::from_str(yaml_content)
    }
}
