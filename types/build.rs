fn main() {
    println!("cargo:rerun-if-changed=proto/cases.proto");
    tonic_prost_build::configure()
        .compile_protos(&["proto/cases.proto"], &["proto/"])
        .expect("Failed to compile proto/cases.proto");
}
