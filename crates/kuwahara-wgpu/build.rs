//! Build script for kuwahara-wgpu crate
//!
//! This build script validates the WGSL compute shaders of the Kuwahara pipeline against
//! the interface the host relies on (entry points, 8x8 workgroups and the 32-byte
//! `KuwaharaParams` uniform layout) and embeds them into the compiled binary.
//! Any mismatch fails the build instead of surfacing as a GPU validation error at runtime.

use kuwahara_wgpu_build::{CompiledShader, compile_manifest};
use std::path::PathBuf;

/// Converts WGSL shader source into a Rust string literal
fn dump_shader_string_literal(shader: &str) -> String {
    // Escape special characters for Rust string literal
    let escaped_shader = shader.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
    format!("\"{}\"", escaped_shader)
}

/// Generates Rust declarations for a compiled shader
///
/// Emits the shader source constant and the sorted list of binding indices it declares,
/// which the pass descriptors are checked against in tests.
fn dump_shader_decl(shader: &CompiledShader) -> String {
    let bindings = shader.bindings.iter().map(|b| b.binding.to_string()).collect::<Vec<_>>().join(", ");

    let mut output = String::new();
    output.push_str(&format!("pub const {}: &str = {};\n", shader.id, dump_shader_string_literal(&shader.source)));
    output.push_str(&format!("pub const {}_BINDINGS: &[u32] = &[{bindings}];\n\n", shader.id));
    output
}

/// Build script main function
///
/// Compiles every shader listed in `shaders/manifest.yaml` and writes `shaders.rs`
/// into the build output directory.
fn main() {
    let crate_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let shader_dir = crate_dir.join("shaders");
    let manifest_path = shader_dir.join("manifest.yaml");

    println!("cargo::rerun-if-changed={}", shader_dir.display());

    // Debug builds keep readable shader sources for GPU debuggers
    let minify = std::env::var("PROFILE").is_ok_and(|profile| profile == "release");

    let shaders = compile_manifest(&manifest_path, minify).unwrap_or_else(|e| panic!("{e}"));

    let mut code = String::new();
    code.push_str("// This file is generated by the build script.\n\n");
    for shader in &shaders {
        println!("Embedding shader: {} (entry points: {:?})", shader.id, shader.entry_points);
        code.push_str(&dump_shader_decl(shader));
    }
    code.push_str("// END OF GENERATED CODE\n");

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let output_path = PathBuf::from(out_dir).join("shaders.rs");
    std::fs::write(output_path, code).expect("Failed to write shaders.rs");
}
