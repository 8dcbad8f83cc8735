//! Shader interface analysis tool
//!
//! This binary parses a WGSL file (optionally composed with a prelude) and prints the
//! interface the host side has to agree with: compute entry points, resource bindings
//! and the byte layout of every named struct.

use kuwahara_wgpu_build::{compose_shader, layout};
use std::env;
use std::fs;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 && args.len() != 3 {
        eprintln!("Usage: {} <shader.wgsl> [prelude.wgsl]", args[0]);
        eprintln!("Prints entry points, bindings and struct layouts of a WGSL shader");
        process::exit(1);
    }

    let read = |path: &str| {
        fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("Error: failed to read '{path}': {e}");
            process::exit(1);
        })
    };

    let body = read(&args[1]);
    let source = match args.get(2) {
        Some(prelude_path) => compose_shader(&read(prelude_path), &body),
        None => body,
    };

    let module = match naga::front::wgsl::parse_str(&source) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("{}", e.emit_to_string(&source));
            process::exit(1);
        }
    };

    println!("Entry points:");
    for (name, workgroup_size) in layout::compute_entry_points(&module) {
        println!("  {name} @workgroup_size{workgroup_size:?}");
    }

    println!("Bindings:");
    for binding in layout::resource_bindings(&module) {
        println!("  @group({}) @binding({}) {} ({:?})", binding.group, binding.binding, binding.name, binding.kind);
    }

    println!("Structs:");
    for struct_layout in layout::struct_layouts(&module) {
        print!("{struct_layout}");
    }
}
