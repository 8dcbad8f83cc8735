//! WGSL shader minification utilities.
//!
//! Shrinks the compute shaders embedded into the core crate. Minification works on the
//! naga module that [`crate::compile_shader`] already parsed and checked, so the interface
//! checks always see the original identifiers.

use naga::back::wgsl::WriterFlags;
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Writes a validated module back out as compact WGSL.
///
/// Local identifiers and non-entry-point functions are renamed by `wgsl_minifier`; compute
/// entry point names are kept so pipelines can still look them up.
///
/// # Arguments
///
/// * `module` - A module that already passed validation.
///
/// # Returns
///
/// The minified source, or the validator or writer message if the renamed module is rejected.
pub fn minify_module(module: &naga::Module) -> Result<String, String> {
    let mut renamed = module.clone();
    wgsl_minifier::minify_module(&mut renamed);

    // The WGSL writer needs the type info of the renamed module
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&renamed)
        .map_err(|e| format!("renamed module is invalid: {e}"))?;
    let written = naga::back::wgsl::write_string(&renamed, &info, WriterFlags::empty()).map_err(|e| e.to_string())?;

    Ok(wgsl_minifier::minify_wgsl_source(&written))
}
