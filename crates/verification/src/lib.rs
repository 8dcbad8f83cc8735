//! Verification utilities for kuwahara-wgpu
//!
//! This crate provides a CPU reference implementation of the Kuwahara passes and tools for
//! comparing the GPU pipeline output against it.

pub mod compare;
pub mod reference_engine;
pub mod wgpu_helpers;
