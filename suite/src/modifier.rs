//! Modifier kinds, the argument shapes the authoring surface passes to
//! them, and the annotation records that accumulate per application.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The declarative modifiers a test or suite can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKind {
    Skip,
    Fixme,
    Slow,
    Flaky,
    Fail,
}

impl fmt::Display for ModifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModifierKind::Skip => "skip",
            ModifierKind::Fixme => "fixme",
            ModifierKind::Slow => "slow",
            ModifierKind::Flaky => "flaky",
            ModifierKind::Fail => "fail",
        };
        write!(f, "{}", name)
    }
}

/// Argument accepted by every modifier method.
///
/// Mirrors the authoring surface: no argument means "always", a bare string
/// means "always, and here is why", a boolean gates the application. `From`
/// conversions let call sites stay close to how tests are written:
/// `skip(())`, `skip(true)`, `skip("reason")`, `skip((on_mobile, "bug #12"))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifierArg {
    NoArgs,
    Condition {
        value: bool,
        description: Option<String>,
    },
    Reason(String),
}

impl ModifierArg {
    /// Decide whether this application is live.
    ///
    /// Returns `Some(description)` when live; `None` means the whole call is
    /// a no-op and must leave the node untouched.
    pub fn interpret(self) -> Option<Option<String>> {
        match self {
            ModifierArg::NoArgs => Some(None),
            ModifierArg::Reason(description) => Some(Some(description)),
            ModifierArg::Condition {
                value: true,
                description,
            } => Some(description),
            ModifierArg::Condition { value: false, .. } => None,
        }
    }
}

impl From<()> for ModifierArg {
    fn from(_: ()) -> Self {
        ModifierArg::NoArgs
    }
}

impl From<bool> for ModifierArg {
    fn from(value: bool) -> Self {
        ModifierArg::Condition {
            value,
            description: None,
        }
    }
}

impl From<&str> for ModifierArg {
    fn from(reason: &str) -> Self {
        ModifierArg::Reason(reason.to_string())
    }
}

impl From<String> for ModifierArg {
    fn from(reason: String) -> Self {
        ModifierArg::Reason(reason)
    }
}

impl From<(bool, &str)> for ModifierArg {
    fn from((value, description): (bool, &str)) -> Self {
        ModifierArg::Condition {
            value,
            description: Some(description.to_string()),
        }
    }
}

impl From<(bool, String)> for ModifierArg {
    fn from((value, description): (bool, String)) -> Self {
        ModifierArg::Condition {
            value,
            description: Some(description),
        }
    }
}

/// One recorded modifier application.
///
/// Annotations accumulate on the node in application order and are reported
/// alongside results; the `kind` field serializes as `type` to match the
/// shape reporters consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
