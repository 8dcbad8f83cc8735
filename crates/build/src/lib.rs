//! Kuwahara-wgpu build utilities
//!
//! This crate provides the build-time tooling for the WGSL compute shaders of the
//! anisotropic Kuwahara pipeline. Shaders are composed with a shared prelude,
//! validated with naga, checked against the host-side interface (entry points,
//! workgroup size, uniform struct layouts) and optionally minified before they are
//! embedded into the core crate.

mod minify;

pub mod layout;
pub mod manifest;

pub use minify::minify_module;

use std::fmt;

/// A shader that passed validation and interface checks
#[derive(Debug, Clone)]
pub struct CompiledShader {
    /// Identifier from the manifest
    pub id: String,
    /// Final WGSL source (minified if requested)
    pub source: String,
    /// Compute entry points found in the shader
    pub entry_points: Vec<String>,
    /// Resource bindings declared by the shader
    pub bindings: Vec<layout::ResourceBindingInfo>,
}

/// Errors raised while turning a shader source into an embeddable shader
#[derive(Debug, Clone)]
pub enum ShaderBuildError {
    /// The WGSL source failed to parse
    Parse(String, String),
    /// The module failed naga validation
    Validation(String, String),
    /// A required compute entry point is missing
    MissingEntryPoint(String, String),
    /// An entry point declares an unexpected workgroup size
    WorkgroupSizeMismatch(String, String, [u32; 3], [u32; 3]),
    /// A uniform struct does not have the expected byte layout
    LayoutMismatch(String, layout::StructLayout, manifest::LayoutExpectation),
    /// Minification failed
    Minify(String, String),
    /// A manifest or shader file could not be read
    Io(String, String),
}

impl fmt::Display for ShaderBuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(shader, message) => write!(f, "Shader '{shader}' failed to parse: {message}"),
            Self::Validation(shader, message) => write!(f, "Shader '{shader}' failed validation: {message}"),
            Self::MissingEntryPoint(shader, entry_point) => write!(f, "Shader '{shader}' has no compute entry point '{entry_point}'"),
            Self::WorkgroupSizeMismatch(shader, entry_point, actual, expected) => {
                write!(f, "Entry point '{entry_point}' in shader '{shader}' uses workgroup size {actual:?}, expected {expected:?}")
            }
            Self::LayoutMismatch(shader, actual, expected) => write!(
                f,
                "Struct '{}' in shader '{shader}' has size {} and offsets {:?}, expected size {} and offsets {:?}",
                actual.name,
                actual.size,
                actual.offsets(),
                expected.size,
                expected.offsets
            ),
            Self::Minify(shader, message) => write!(f, "Shader '{shader}' failed to minify: {message}"),
            Self::Io(path, message) => write!(f, "Failed to read '{path}': {message}"),
        }
    }
}

impl std::error::Error for ShaderBuildError {}

/// Prepends a shared prelude to a shader body
///
/// # Arguments
/// * `prelude` - Shared declarations (uniform structs, constants, helpers)
/// * `body` - The pass-specific shader source
pub fn compose_shader(prelude: &str, body: &str) -> String {
    format!("{prelude}\n{body}")
}

/// Validates a shader against the interface expected by the host and prepares it for embedding
///
/// # Arguments
/// * `id` - Identifier used in error messages
/// * `source` - Complete WGSL source (prelude already composed)
/// * `entry_points` - Compute entry points that must exist
/// * `workgroup_size` - Workgroup size every listed entry point must declare
/// * `layouts` - Uniform struct layouts to enforce when the struct is declared
/// * `minify` - Whether to minify the WGSL code
///
/// # Returns
/// The compiled shader, or the first interface violation found
pub fn compile_shader(
    id: &str,
    source: &str,
    entry_points: &[String],
    workgroup_size: [u32; 3],
    layouts: &[manifest::LayoutExpectation],
    minify: bool,
) -> Result<CompiledShader, ShaderBuildError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderBuildError::Parse(id.to_string(), e.emit_to_string(source)))?;

    let mut validator = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
    validator.validate(&module).map_err(|e| ShaderBuildError::Validation(id.to_string(), e.to_string()))?;

    let declared_entry_points = layout::compute_entry_points(&module);
    for required in entry_points {
        let (_, declared_size) = declared_entry_points
            .iter()
            .find(|(name, _)| name == required)
            .ok_or_else(|| ShaderBuildError::MissingEntryPoint(id.to_string(), required.clone()))?;
        if *declared_size != workgroup_size {
            return Err(ShaderBuildError::WorkgroupSizeMismatch(id.to_string(), required.clone(), *declared_size, workgroup_size));
        }
    }

    // Layouts are checked on the unminified module, where struct names are still intact
    for expected in layouts {
        if let Some(actual) = layout::struct_layout(&module, &expected.struct_name) {
            if actual.size != expected.size || actual.offsets() != expected.offsets {
                return Err(ShaderBuildError::LayoutMismatch(id.to_string(), actual, expected.clone()));
            }
        }
    }

    let bindings = layout::resource_bindings(&module);
    let source = if minify {
        minify_module(&module).map_err(|e| ShaderBuildError::Minify(id.to_string(), e))?
    } else {
        source.to_string()
    };

    Ok(CompiledShader {
        id: id.to_string(),
        source,
        entry_points: declared_entry_points.into_iter().map(|(name, _)| name).collect(),
        bindings,
    })
}

/// Compiles every shader listed in a manifest file
///
/// Shader and prelude paths are resolved relative to the manifest.
///
/// # Arguments
/// * `manifest_path` - Path to the YAML shader manifest
/// * `minify` - Whether to minify the WGSL code
///
/// # Returns
/// The compiled shaders in manifest order
pub fn compile_manifest(manifest_path: &std::path::Path, minify: bool) -> Result<Vec<CompiledShader>, ShaderBuildError> {
    let read = |path: &std::path::Path| std::fs::read_to_string(path).map_err(|e| ShaderBuildError::Io(path.display().to_string(), e.to_string()));

    let manifest = manifest::ShaderManifest::from_yaml(&read(manifest_path)?).map_err(|e| ShaderBuildError::Io(manifest_path.display().to_string(), e.to_string()))?;
    let dir = manifest_path.parent().unwrap_or(std::path::Path::new("."));

    let prelude = match &manifest.prelude {
        Some(file) => read(&dir.join(file))?,
        None => String::new(),
    };

    manifest
        .shaders
        .iter()
        .map(|entry| {
            let body = read(&dir.join(&entry.file))?;
            let source = if entry.uses_prelude { compose_shader(&prelude, &body) } else { body };
            compile_shader(&entry.id, &source, &entry.entry_points, manifest.workgroup_size, &manifest.layouts, minify)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRELUDE: &str = r#"
struct KuwaharaParams {
    kernel_size: i32,
    sharpness: f32,
    hardness: f32,
    alpha: f32,
    zero_crossing: f32,
    zeta: f32,
    sigma: f32,
    _padding: f32,
}
"#;

    const BODY: &str = r#"
@group(0) @binding(0) var output_texture: texture_storage_2d<rgba32float, write>;
@group(0) @binding(1) var<uniform> params: KuwaharaParams;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    textureStore(output_texture, vec2<i32>(global_id.xy), vec4<f32>(params.sigma));
}
"#;

    fn params_layout() -> manifest::LayoutExpectation {
        manifest::LayoutExpectation {
            struct_name: "KuwaharaParams".to_string(),
            size: 32,
            offsets: vec![0, 4, 8, 12, 16, 20, 24, 28],
        }
    }

    #[test]
    fn test_compile_composed_shader() {
        let source = compose_shader(PRELUDE, BODY);
        let compiled = compile_shader("TEST", &source, &["main".to_string()], [8, 8, 1], &[params_layout()], false).unwrap();

        assert_eq!(compiled.entry_points, vec!["main"]);
        assert_eq!(compiled.bindings.len(), 2);
        assert_eq!(compiled.source, source);
    }

    #[test]
    fn test_body_without_prelude_fails_to_parse() {
        let result = compile_shader("TEST", BODY, &["main".to_string()], [8, 8, 1], &[], false);
        assert!(matches!(result, Err(ShaderBuildError::Parse(..))));
    }

    #[test]
    fn test_missing_entry_point() {
        let source = compose_shader(PRELUDE, BODY);
        let result = compile_shader("TEST", &source, &["main_vertical".to_string()], [8, 8, 1], &[], false);
        assert!(matches!(result, Err(ShaderBuildError::MissingEntryPoint(_, name)) if name == "main_vertical"));
    }

    #[test]
    fn test_workgroup_size_mismatch() {
        let source = compose_shader(PRELUDE, BODY);
        let result = compile_shader("TEST", &source, &["main".to_string()], [16, 8, 1], &[], false);
        assert!(matches!(result, Err(ShaderBuildError::WorkgroupSizeMismatch(..))));
    }

    #[test]
    fn test_layout_mismatch_is_reported() {
        // Dropping the trailing padding member leaves a 28-byte struct
        let prelude = PRELUDE.replace("    _padding: f32,\n", "");
        let source = compose_shader(&prelude, BODY);
        let result = compile_shader("TEST", &source, &["main".to_string()], [8, 8, 1], &[params_layout()], false);

        match result {
            Err(ShaderBuildError::LayoutMismatch(_, actual, _)) => {
                assert_eq!(actual.size, 28);
                assert_eq!(actual.offsets().len(), 7);
            }
            other => panic!("expected layout mismatch, got {other:?}"),
        }
    }
}
