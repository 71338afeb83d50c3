use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc so builds do not depend on a system install
    let protoc = protoc_bin_vendored::protoc_bin_path()?;
    std::env::set_var("PROTOC", protoc);

    let includes = [PathBuf::from("proto"), protoc_bin_vendored::include_path()?];

    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(&[PathBuf::from("proto/gobgp.proto")], &includes)?;

    println!("cargo:rerun-if-changed=proto/gobgp.proto");
    Ok(())
}
