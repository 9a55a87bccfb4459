//! Short-hostname resolution.

/// Resolve the machine's short hostname: everything before the first `.`,
/// so `host1.example.com` reports as `host1`.
///
/// A leading dot is not treated as a domain separator. Falls back to
/// `"unknown"` when the OS lookup fails. Callers are expected to memoize the
/// result; the hostname is not re-read during the process lifetime.
pub(crate) fn resolve_short_hostname() -> String {
    let host = match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to resolve hostname");
            return "unknown".to_string();
        }
    };

    match host.find('.') {
        Some(index) if index > 0 => host[..index].to_string(),
        _ => host,
    }
}
