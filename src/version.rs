use std::sync::LazyLock;

/// Version of the software: the package version, followed by the git commit
/// when the build environment provides one in `PKGQ_GIT_HASH`.
pub static VERSION: LazyLock<String> = LazyLock::new(|| match option_env!("PKGQ_GIT_HASH") {
    Some(hash) if !hash.is_empty() => format!("{}-{hash}", env!("CARGO_PKG_VERSION")),
    _ => env!("CARGO_PKG_VERSION").to_string(),
});
