use std::env;
use std::process::Command;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");

    add_build_metadata()?;

    Ok(())
}

fn add_build_metadata() -> Result<(), Box<dyn std::error::Error>> {
    let build_timestamp = chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string();
    println!("cargo:rustc-env=HEALTH_ETL_BUILD_TIMESTAMP={build_timestamp}");

    let git_sha = get_git_sha().unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=HEALTH_ETL_GIT_SHA={git_sha}");

    let target = env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=HEALTH_ETL_TARGET_TRIPLE={target}");

    Ok(())
}

fn get_git_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}
