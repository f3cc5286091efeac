use std::env;
use std::path::PathBuf;

fn main() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();

    if target_os == "android" {
        let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

        // Emit the C header for the llmb_* surface next to the crate
        cbindgen::Builder::new()
            .with_crate(&crate_dir)
            .with_language(cbindgen::Language::C)
            .with_pragma_once(true)
            .with_include_guard("LLMB_A_H")
            .with_documentation(true)
            .generate()
            .expect("Unable to generate bindings")
            .write_to_file("llmb_a.h");

        // The inference engine ships as a prebuilt static library per ABI,
        // staged under target/lmrt-android-ndk by the engine build scripts
        let manifest_path = PathBuf::from(&crate_dir);
        let workspace_root = manifest_path.parent().unwrap();
        let engine_lib_dir = workspace_root.join("target").join("lmrt-android-ndk");

        if engine_lib_dir.exists() {
            println!(
                "cargo:rustc-link-search=native={}",
                engine_lib_dir.display()
            );
        } else {
            println!(
                "cargo:warning=lmrt engine library not found at: {} (stage the prebuilt engine before linking)",
                engine_lib_dir.display()
            );
        }

        // System libraries first, then the engine archive
        println!("cargo:rustc-link-lib=log");
        println!("cargo:rustc-link-lib=dl");
        println!("cargo:rustc-link-lib=m");
        println!("cargo:rustc-link-lib=c++_shared");
        println!("cargo:rustc-link-lib=static=lmrt");
    }

    println!("cargo:rerun-if-changed=src/capi.rs");
    println!("cargo:rerun-if-changed=src/jni_bridge.rs");
    println!("cargo:rerun-if-changed=build.rs");
}
