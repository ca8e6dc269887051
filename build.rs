fn main() {
    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    if let Ok(bindings) = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        std::fs::create_dir_all(format!("{}/include", crate_dir)).ok();
        bindings.write_to_file(format!("{}/include/depthplane.h", crate_dir));
    }
}
