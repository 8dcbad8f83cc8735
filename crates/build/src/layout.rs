//! Shader interface reflection
//!
//! Reads the parts of a parsed naga module that the host side has to agree with:
//! uniform struct layouts, resource bindings and compute entry points.

use std::fmt;

/// Byte layout of a single struct member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLayout {
    /// Member name as declared in WGSL
    pub name: String,
    /// Byte offset of the member inside the struct
    pub offset: u32,
}

/// Byte layout of a WGSL struct as computed by naga
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    /// Struct name as declared in WGSL
    pub name: String,
    /// Total size of the struct in bytes, including trailing padding
    pub size: u32,
    /// Members in declaration order
    pub members: Vec<MemberLayout>,
}

impl StructLayout {
    /// Returns the member offsets in declaration order
    pub fn offsets(&self) -> Vec<u32> {
        self.members.iter().map(|member| member.offset).collect()
    }
}

impl fmt::Display for StructLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "struct {} ({} bytes)", self.name, self.size)?;
        for member in &self.members {
            writeln!(f, "  +{:<3} {}", member.offset, member.name)?;
        }
        Ok(())
    }
}

/// Kind of resource bound at a binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `var<uniform>` buffer
    Uniform,
    /// `var<storage>` buffer
    StorageBuffer,
    /// Sampled texture
    Texture,
    /// Storage texture
    StorageTexture,
    /// Texture sampler
    Sampler,
}

/// A global resource declared with `@group`/`@binding`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBindingInfo {
    /// Variable name as declared in WGSL
    pub name: String,
    /// Bind group index
    pub group: u32,
    /// Binding index within the group
    pub binding: u32,
    /// Resource kind
    pub kind: BindingKind,
}

/// Looks up the layout of a named struct in a parsed module
///
/// # Arguments
/// * `module` - The parsed naga module
/// * `name` - The WGSL struct name
///
/// # Returns
/// The struct layout, or `None` if the module declares no struct of that name
pub fn struct_layout(module: &naga::Module, name: &str) -> Option<StructLayout> {
    module.types.iter().find_map(|(_, ty)| match &ty.inner {
        naga::TypeInner::Struct { members, span } if ty.name.as_deref() == Some(name) => Some(StructLayout {
            name: name.to_string(),
            size: *span,
            members: members
                .iter()
                .map(|member| MemberLayout {
                    name: member.name.clone().unwrap_or_default(),
                    offset: member.offset,
                })
                .collect(),
        }),
        _ => None,
    })
}

/// Collects the layouts of all named structs in a parsed module
pub fn struct_layouts(module: &naga::Module) -> Vec<StructLayout> {
    module
        .types
        .iter()
        .filter_map(|(_, ty)| match (&ty.inner, ty.name.as_deref()) {
            (naga::TypeInner::Struct { .. }, Some(name)) => struct_layout(module, name),
            _ => None,
        })
        .collect()
}

/// Collects all bound global resources of a parsed module, sorted by group and binding
pub fn resource_bindings(module: &naga::Module) -> Vec<ResourceBindingInfo> {
    let mut bindings: Vec<_> = module
        .global_variables
        .iter()
        .filter_map(|(_, variable)| {
            let binding = variable.binding.as_ref()?;
            let kind = match variable.space {
                naga::AddressSpace::Uniform => BindingKind::Uniform,
                naga::AddressSpace::Storage { .. } => BindingKind::StorageBuffer,
                naga::AddressSpace::Handle => match &module.types[variable.ty].inner {
                    naga::TypeInner::Image {
                        class: naga::ImageClass::Storage { .. },
                        ..
                    } => BindingKind::StorageTexture,
                    naga::TypeInner::Image { .. } => BindingKind::Texture,
                    naga::TypeInner::Sampler { .. } => BindingKind::Sampler,
                    _ => return None,
                },
                _ => return None,
            };
            Some(ResourceBindingInfo {
                name: variable.name.clone().unwrap_or_default(),
                group: binding.group,
                binding: binding.binding,
                kind,
            })
        })
        .collect();

    bindings.sort_by_key(|info| (info.group, info.binding));
    bindings
}

/// Returns `(name, workgroup_size)` for every compute entry point of a parsed module
pub fn compute_entry_points(module: &naga::Module) -> Vec<(String, [u32; 3])> {
    module
        .entry_points
        .iter()
        .filter(|entry_point| entry_point.stage == naga::ShaderStage::Compute)
        .map(|entry_point| (entry_point.name.clone(), entry_point.workgroup_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS_SHADER: &str = r#"
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

@group(0) @binding(0) var input_texture: texture_2d<f32>;
@group(0) @binding(2) var<uniform> params: KuwaharaParams;
@group(0) @binding(1) var output_texture: texture_storage_2d<rgba8unorm, write>;

@compute @workgroup_size(8, 8, 1)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let color = textureLoad(input_texture, vec2<i32>(global_id.xy), 0);
    textureStore(output_texture, vec2<i32>(global_id.xy), color * params.sharpness);
}
"#;

    #[test]
    fn test_struct_layout_matches_uniform_rules() {
        let module = naga::front::wgsl::parse_str(PARAMS_SHADER).unwrap();
        let layout = struct_layout(&module, "KuwaharaParams").unwrap();

        assert_eq!(layout.size, 32);
        assert_eq!(layout.offsets(), vec![0, 4, 8, 12, 16, 20, 24, 28]);
        assert_eq!(layout.members[0].name, "kernel_size");
        assert_eq!(layout.members[6].name, "sigma");
    }

    #[test]
    fn test_vec3_member_is_aligned_to_16_bytes() {
        let module = naga::front::wgsl::parse_str("struct Padded { a: f32, b: vec3<f32>, }").unwrap();
        let layout = struct_layout(&module, "Padded").unwrap();

        assert_eq!(layout.offsets(), vec![0, 16]);
        assert_eq!(layout.size, 32);
    }

    #[test]
    fn test_missing_struct() {
        let module = naga::front::wgsl::parse_str(PARAMS_SHADER).unwrap();
        assert!(struct_layout(&module, "DoesNotExist").is_none());
        assert_eq!(struct_layouts(&module).len(), 1);
    }

    #[test]
    fn test_resource_bindings_are_sorted_and_classified() {
        let module = naga::front::wgsl::parse_str(PARAMS_SHADER).unwrap();
        let bindings = resource_bindings(&module);

        let summary: Vec<_> = bindings.iter().map(|b| (b.binding, b.kind, b.name.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (0, BindingKind::Texture, "input_texture"),
                (1, BindingKind::StorageTexture, "output_texture"),
                (2, BindingKind::Uniform, "params"),
            ]
        );
    }

    #[test]
    fn test_compute_entry_points() {
        let module = naga::front::wgsl::parse_str(PARAMS_SHADER).unwrap();
        assert_eq!(compute_entry_points(&module), vec![("main".to_string(), [8, 8, 1])]);
    }
}
