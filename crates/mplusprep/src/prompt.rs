//! Yes/no decisions delegated to the caller.
//!
//! Two steps of a conversion need consent before they change the data:
//! decoding an unrecognized text file as latin1, and renaming variables
//! that Mplus cannot accept. The [`Converter`](crate::Converter) asks a
//! [`ConfirmProvider`] and never talks to a terminal itself.

use std::fmt;
use std::path::PathBuf;

/// A question put to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Question {
    /// No candidate encoding decoded the file; decode it as latin1 anyway?
    EncodingFallback {
        /// File being read.
        path: PathBuf,
        /// Encodings that were tried.
        tried: Vec<String>,
    },
    /// Some column names are illegal in Mplus; rename them automatically?
    SanitizeNames {
        /// Offending names, in column order.
        illegal: Vec<String>,
    },
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EncodingFallback { path, tried } => write!(
                f,
                "Could not detect the encoding of {} (tried {}). Force latin1 decoding?",
                path.display(),
                tried.join(", ")
            ),
            Self::SanitizeNames { illegal } => write!(
                f,
                "{} variable name(s) are illegal in Mplus. Rename them automatically?",
                illegal.len()
            ),
        }
    }
}

/// Answers yes/no questions on behalf of the user.
pub trait ConfirmProvider {
    /// Return `true` to consent.
    fn confirm(&self, question: &Question) -> bool;
}

/// Gives the same answer to every question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoConfirm(pub bool);

impl AutoConfirm {
    /// Consent to everything.
    pub fn yes() -> Self {
        Self(true)
    }

    /// Refuse everything.
    pub fn no() -> Self {
        Self(false)
    }
}

impl ConfirmProvider for AutoConfirm {
    fn confirm(&self, question: &Question) -> bool {
        tracing::debug!(%question, answer = self.0, "auto-answered");
        self.0
    }
}

impl<T: ConfirmProvider + ?Sized> ConfirmProvider for &T {
    fn confirm(&self, question: &Question) -> bool {
        (**self).confirm(question)
    }
}
