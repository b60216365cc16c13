//! Open-file budget, for sizing the scanner's admission gate.

/// Permit count used when the real limit cannot be read (or off Unix).
const FALLBACK: usize = 1024;

/// The soft `RLIMIT_NOFILE` of this process, clamped to a range that makes
/// sense as a probe-concurrency ceiling. Every in-flight TCP probe costs one
/// descriptor, so scans gated on this cannot exhaust the process's files.
#[must_use]
pub fn max_open_files() -> usize {
    #[cfg(unix)]
    {
        use nix::sys::resource::{Resource, getrlimit};

        if let Ok((soft, _hard)) = getrlimit(Resource::RLIMIT_NOFILE) {
            // RLIM_INFINITY saturates and gets clamped like any other value.
            return usize::try_from(soft).unwrap_or(usize::MAX).clamp(64, 65_536);
        }
    }
    FALLBACK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_a_usable_probe_budget() {
        let budget = max_open_files();
        assert!((64..=65_536).contains(&budget));
    }
}
