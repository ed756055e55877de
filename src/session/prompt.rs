//! Cisco IOS prompt patterns and failure markers.
//!
//! Prompt patterns follow scrapli's IOS-XE conventions: `(?mi)` so `^`
//! matches at line starts and hostnames match case-insensitively.
//!
//! ```text
//! router>            exec mode
//! router#            privileged exec mode
//! router(config)#    configuration mode (never expected during collection)
//! ```

use regex::bytes::Regex;

use crate::error::{Result, SessionError};

/// Output substrings that indicate IOS rejected a command.
pub const FAILURE_MARKERS: &[&str] = &[
    "% Ambiguous command",
    "% Incomplete command",
    "% Invalid input",
    "% Unknown command",
    "% Authorization failed",
];

/// Compiled prompt patterns for an IOS collection session.
#[derive(Debug, Clone)]
pub struct PromptSet {
    /// Exec mode prompt (`>`).
    pub exec: Regex,

    /// Privileged exec prompt (`#`). The raw pattern also matches config
    /// mode; use [`PromptSet::is_privileged`] which filters `(config`.
    pub privileged: Regex,

    /// Enable password prompt.
    pub password: Regex,

    /// Combined pattern matching either exec or privileged prompts.
    pub any: Regex,
}

impl PromptSet {
    /// Build the IOS prompt set.
    pub fn ios() -> Result<Self> {
        let exec = r"(?mi)^[\w.\-@()/:]{1,63}>\s?$";
        let privileged = r"(?mi)^[\w.\-@()/:]{1,63}#\s?$";

        Ok(Self {
            exec: Regex::new(exec).map_err(SessionError::from)?,
            privileged: Regex::new(privileged).map_err(SessionError::from)?,
            password: Regex::new(r"(?mi)^password:\s?$").map_err(SessionError::from)?,
            any: Regex::new(&format!("(?:{exec})|(?:{privileged})"))
                .map_err(SessionError::from)?,
        })
    }

    /// Check if a prompt line is the privileged exec prompt.
    ///
    /// `#` also terminates config-mode prompts, so `(config` is excluded
    /// the same way scrapli-style drivers disambiguate.
    pub fn is_privileged(&self, prompt: &str) -> bool {
        !prompt.contains("(config") && self.privileged.is_match(prompt.as_bytes())
    }

    /// Check if a prompt line is the unprivileged exec prompt.
    pub fn is_exec(&self, prompt: &str) -> bool {
        self.exec.is_match(prompt.as_bytes())
    }
}

/// Find a failure marker in command output, if any.
pub fn find_failure(output: &str) -> Option<&'static str> {
    FAILURE_MARKERS
        .iter()
        .find(|marker| output.contains(*marker))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_prompt_match() {
        let prompts = PromptSet::ios().unwrap();
        assert!(prompts.is_exec("router>"));
        assert!(prompts.is_exec("edge-rtr-01> "));
        assert!(!prompts.is_exec("router#"));
    }

    #[test]
    fn test_privileged_prompt_match() {
        let prompts = PromptSet::ios().unwrap();
        assert!(prompts.is_privileged("router#"));
        assert!(prompts.is_privileged("WAN-EDGE-2# "));

        // Config mode ends in '#' too but must not count as privileged exec
        assert!(!prompts.is_privileged("router(config)#"));
        assert!(!prompts.is_privileged("router(config-if)#"));
        assert!(!prompts.is_privileged("router>"));
    }

    #[test]
    fn test_combined_pattern() {
        let prompts = PromptSet::ios().unwrap();
        assert!(prompts.any.is_match(b"some output\nrouter#"));
        assert!(prompts.any.is_match(b"some output\nrouter>"));
        assert!(!prompts.any.is_match(b"still printing"));
    }

    #[test]
    fn test_password_prompt() {
        let prompts = PromptSet::ios().unwrap();
        assert!(prompts.password.is_match(b"Password: "));
        assert!(prompts.password.is_match(b"password:"));
    }

    #[test]
    fn test_find_failure() {
        assert_eq!(
            find_failure("show vrrf\n% Invalid input detected at '^' marker."),
            Some("% Invalid input")
        );
        assert_eq!(find_failure("Tunnel0 is up, line protocol is up"), None);
    }
}
