use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

fn main() {
    println!("cargo:rerun-if-env-changed=BBL_TERRAFORM_BINARY");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").unwrap_or_else(|_| ".".to_string()));
    let target = out_dir.join("terraform.gz");

    let source = std::env::var("BBL_TERRAFORM_BINARY")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);

    // An empty file means no embedded binary; the driver falls back to PATH.
    let (compressed, mtime) = match source {
        Some(path) => {
            println!("cargo:rerun-if-changed={}", path.display());
            let bytes = std::fs::read(&path)
                .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()));
            let mtime = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
            if let Err(e) = encoder.write_all(&bytes) {
                panic!("compressing terraform: {e}");
            }
            let gz = encoder
                .finish()
                .unwrap_or_else(|e| panic!("compressing terraform: {e}"));
            (gz, mtime)
        }
        None => (Vec::new(), 0),
    };

    std::fs::write(&target, compressed)
        .unwrap_or_else(|e| panic!("writing {}: {e}", target.display()));
    println!("cargo:rustc-env=BBL_TERRAFORM_MTIME={mtime}");
}
