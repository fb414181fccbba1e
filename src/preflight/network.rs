//! Network connectivity check.
//!
//! Verifies that the hosts sources are fetched from are reachable.

use tokio::task::JoinSet;

use super::CheckResult;

/// Hosts probed with a HEAD request, in report order.
const SOURCE_HOSTS: &[(&str, &str)] = &[
    ("cmake.org", "https://cmake.org/files/"),
    ("libsdl.org", "https://www.libsdl.org/release/"),
    ("ffmpeg.org", "http://ffmpeg.org/releases/"),
    ("openssl.org", "https://www.openssl.org/source/"),
    ("github.com", "https://github.com/fastogt/common"),
];

/// Probe every source host concurrently.
pub async fn check_network() -> Vec<CheckResult> {
    let mut probes = JoinSet::new();
    for (index, (host, url)) in SOURCE_HOSTS.iter().enumerate() {
        probes.spawn(async move { (index, probe(host, url).await) });
    }

    let mut results: Vec<(usize, CheckResult)> = Vec::with_capacity(SOURCE_HOSTS.len());
    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => log::warn!("network probe task failed: {}", e),
        }
    }
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

async fn probe(host: &str, url: &str) -> CheckResult {
    let name = format!("Network ({})", host);
    let result = tokio::process::Command::new("curl")
        .args([
            "--head",
            "--silent",
            "--location",
            "--fail",
            "--max-time",
            "10",
            "--output",
            "/dev/null",
            url,
        ])
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            CheckResult::pass(name, format!("{} reachable", host))
        }
        Ok(_) => CheckResult::fail(
            name,
            format!("{} unreachable", host),
            "Check your internet connection or try again later",
        ),
        Err(e) => CheckResult::fail(
            name,
            format!("Failed to check network: {}", e),
            "Ensure curl is installed and you have network access",
        ),
    }
}
