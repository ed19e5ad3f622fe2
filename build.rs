//! Build-script metadata injection for the `--version` surface.
//!
//! Falls back to "unknown" markers when git tooling is unavailable.

use std::env;
use std::fs;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    emit_head_ref_watch();
    println!("cargo:rerun-if-env-changed=MSFTP_BUILD_GIT_HASH");

    let git_hash = env::var("MSFTP_BUILD_GIT_HASH").unwrap_or_else(|_| git_short_hash());
    println!("cargo:rustc-env=MSFTP_BUILD_GIT_HASH={git_hash}");
}

fn emit_head_ref_watch() {
    let Ok(head) = fs::read_to_string(".git/HEAD") else {
        return;
    };
    let Some(reference) = head.trim().strip_prefix("ref: ") else {
        return;
    };
    println!("cargo:rerun-if-changed=.git/{reference}");
}

fn git_short_hash() -> String {
    let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
    else {
        return "unknown".to_string();
    };
    if !output.status.success() {
        return "unknown".to_string();
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if text.is_empty() {
        "unknown".to_string()
    } else {
        text
    }
}
