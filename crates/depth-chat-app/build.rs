use std::path::Path;

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("manifest dir");
    let version_file = Path::new(&manifest_dir)
        .ancestors()
        .nth(2)
        .expect("workspace root above crates/")
        .join("VERSION");
    println!("cargo:rerun-if-changed={}", version_file.display());

    let version = std::fs::read_to_string(&version_file)
        .unwrap_or_else(|error| panic!("read {}: {error}", version_file.display()));
    let version = version.trim();
    assert!(!version.is_empty(), "VERSION must not be empty");

    println!("cargo:rustc-env=DEPTH_CHAT_VERSION={version}");
}
