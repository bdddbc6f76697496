//! CLI utilities for binaries
//!
//! Flag parsing for the settlement binaries. Everything else (keys,
//! endpoints) comes from the environment, so flags only tune behavior.

/// Flags accepted by the settle binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettleArgs {
    /// Plan and log, submit nothing
    pub dry_run: bool,
    /// Skip the relay and send signed transactions straight away
    pub direct: bool,
    /// Debug-level logging
    pub verbose: bool,
}

impl SettleArgs {
    /// Parse from raw arguments (program name excluded)
    pub fn parse(args: &[String]) -> Self {
        Self {
            dry_run: has_flag(args, "--dry-run"),
            direct: has_flag(args, "--direct"),
            verbose: has_flag(args, "--verbose") || has_flag(args, "-v"),
        }
    }

    /// Parse from the process arguments
    pub fn from_env() -> Self {
        Self::parse(&parse_args())
    }

    /// Default tracing level implied by the flags
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_flags() {
        let parsed = SettleArgs::parse(&args(&[]));
        assert_eq!(parsed, SettleArgs::default());
        assert_eq!(parsed.log_level(), "info");
    }

    #[test]
    fn test_all_flags() {
        let parsed = SettleArgs::parse(&args(&["--dry-run", "--direct", "--verbose"]));
        assert!(parsed.dry_run);
        assert!(parsed.direct);
        assert!(parsed.verbose);
        assert_eq!(parsed.log_level(), "debug");
    }

    #[test]
    fn test_verbose_short_flag() {
        let parsed = SettleArgs::parse(&args(&["-v"]));
        assert!(parsed.verbose);
    }

    #[test]
    fn test_unknown_flags_ignored() {
        let parsed = SettleArgs::parse(&args(&["--frobnicate"]));
        assert_eq!(parsed, SettleArgs::default());
    }
}
