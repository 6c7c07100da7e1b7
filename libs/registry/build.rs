fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Descriptors are compiled with protox, no system protoc needed
    let descriptors = protox::compile(["api.proto"], ["proto"])?;

    tonic_prost_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_fds(descriptors)?;

    println!("cargo:rerun-if-changed=proto/api.proto");
    Ok(())
}
