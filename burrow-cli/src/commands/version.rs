//! Version subcommand implementation

pub fn run() {
    println!("burrow {}", env!("CARGO_PKG_VERSION"));
    println!("rust-version {}", env!("CARGO_PKG_RUST_VERSION"));
    println!("target: {}-{}", std::env::consts::ARCH, std::env::consts::OS);
}
