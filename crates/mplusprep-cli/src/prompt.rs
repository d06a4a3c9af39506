//! Interactive yes/no prompts on the terminal.

use std::io::{self, BufRead, Write};

use colored::Colorize;
use mplusprep::{ConfirmProvider, Question};

/// Asks on stderr and reads the answer from stdin. Anything but `y`/`yes` declines.
pub struct TerminalConfirm;

impl ConfirmProvider for TerminalConfirm {
    fn confirm(&self, question: &Question) -> bool {
        let mut stderr = io::stderr().lock();
        if let Question::SanitizeNames { illegal } = question {
            let _ = writeln!(stderr, "\n{}", "Illegal Mplus variable names:".yellow().bold());
            for name in illegal {
                let _ = writeln!(stderr, "  - {name}");
            }
        }
        let _ = write!(stderr, "{} [y/N]: ", question);
        let _ = stderr.flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_consent(&answer),
            Err(e) => {
                tracing::debug!(error = %e, "failed to read answer");
                false
            }
        }
    }
}

/// Whether a typed answer counts as consent.
pub fn is_consent(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_consent() {
        assert!(is_consent("y\n"));
        assert!(is_consent(" YES "));
        assert!(is_consent("Yes"));
        assert!(!is_consent(""));
        assert!(!is_consent("n"));
        assert!(!is_consent("yep"));
    }
}
