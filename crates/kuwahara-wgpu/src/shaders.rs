//! WGSL sources of the compute passes
//!
//! Generated by the build script from `shaders/manifest.yaml`. Each shader is composed with
//! `common.wgsl`, validated by naga and checked against the host-side uniform layout before
//! being embedded. `<ID>_BINDINGS` lists the binding indices the shader declares.

include!(concat!(env!("OUT_DIR"), "/shaders.rs"));
