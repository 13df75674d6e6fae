fn main() {
    // Re-run when HEAD moves so the version string tracks the checkout.
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");

    let hash = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    let dirty = std::process::Command::new("git")
        .args(["status", "--porcelain", "--untracked-files=no"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .is_some_and(|o| !o.stdout.is_empty());

    let build = match (hash.is_empty(), dirty) {
        (true, _) => String::new(),
        (false, false) => hash,
        (false, true) => format!("{hash}-dirty"),
    };
    println!("cargo:rustc-env=GIT_BUILD={build}");
}
