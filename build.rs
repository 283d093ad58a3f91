use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=device.x");

    // Host builds (unit tests) need no linker scripts
    let target = env::var("TARGET").unwrap_or_default();
    if !target.starts_with("thumb") {
        return;
    }

    // Copy memory.x and device.x into OUT_DIR so the linker can find them
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    fs::copy("device.x", out_dir.join("device.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());
}
