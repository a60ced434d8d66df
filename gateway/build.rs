//! Stamps build-time metadata (`version.rs`'s `build_env!` macro) the way
//! upstream sglang/smg builds do: git state via `git2`-free shell-outs,
//! timestamp and toolchain version via `chrono`/`rustc`.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=../.git/index");

    set_env("SMG_PROJECT_NAME", env_or("CARGO_PKG_NAME", "smg"));
    set_env("SMG_VERSION", env_or("CARGO_PKG_VERSION", "0.0.0"));
    set_env("SMG_BUILD_TIME", chrono::Utc::now().to_rfc3339());
    set_env("SMG_GIT_BRANCH", git_output(&["rev-parse", "--abbrev-ref", "HEAD"]));
    set_env("SMG_GIT_COMMIT", git_output(&["rev-parse", "--short", "HEAD"]));
    set_env("SMG_GIT_STATUS", git_status());
    set_env("SMG_RUSTC_VERSION", rustc_output(&["--version"]));
    set_env("SMG_CARGO_VERSION", cargo_output(&["--version"]));
    set_env("SMG_TARGET_TRIPLE", env_or("TARGET", "unknown"));
    set_env("SMG_BUILD_MODE", env_or("PROFILE", "debug"));
}

fn set_env(key: &str, value: String) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn git_output(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn git_status() -> String {
    Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| if o.stdout.is_empty() { "clean".to_string() } else { "dirty".to_string() })
        .unwrap_or_else(|| "unknown".to_string())
}

fn rustc_output(args: &[&str]) -> String {
    let rustc = env_or("RUSTC", "rustc");
    Command::new(rustc)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn cargo_output(args: &[&str]) -> String {
    let cargo = env_or("CARGO", "cargo");
    Command::new(cargo)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
