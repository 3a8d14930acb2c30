//! Exception kinds raised inside the sandbox.

use serde::{Deserialize, Serialize};

/// Closed set of exception kinds sandboxed code can raise or observe.
///
/// `Exception` is the root: an `except Exception:` handler catches every kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionKind {
    Exception,
    ValueError,
    TypeError,
    NameError,
    KeyError,
    IndexError,
    ZeroDivisionError,
    AttributeError,
    RuntimeError,
    RecursionError,
    OverflowError,
    AssertionError,
    /// A binding was refused by the context guard while code was running.
    SafetyError,
    /// A host capability failed.
    OSError,
}

impl ExceptionKind {
    pub const ALL: [ExceptionKind; 14] = [
        ExceptionKind::Exception,
        ExceptionKind::ValueError,
        ExceptionKind::TypeError,
        ExceptionKind::NameError,
        ExceptionKind::KeyError,
        ExceptionKind::IndexError,
        ExceptionKind::ZeroDivisionError,
        ExceptionKind::AttributeError,
        ExceptionKind::RuntimeError,
        ExceptionKind::RecursionError,
        ExceptionKind::OverflowError,
        ExceptionKind::AssertionError,
        ExceptionKind::SafetyError,
        ExceptionKind::OSError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExceptionKind::Exception => "Exception",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::ZeroDivisionError => "ZeroDivisionError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::RuntimeError => "RuntimeError",
            ExceptionKind::RecursionError => "RecursionError",
            ExceptionKind::OverflowError => "OverflowError",
            ExceptionKind::AssertionError => "AssertionError",
            ExceptionKind::SafetyError => "SafetyError",
            ExceptionKind::OSError => "OSError",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Whether a handler naming `self` catches an exception of `raised` kind.
    pub fn catches(self, raised: ExceptionKind) -> bool {
        self == ExceptionKind::Exception || self == raised
    }
}

impl std::fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::ExceptionKind;

    #[test]
    fn names_round_trip_for_every_kind() {
        for kind in ExceptionKind::ALL {
            assert_eq!(ExceptionKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(ExceptionKind::from_name("SystemExit"), None);
    }

    #[test]
    fn exception_root_catches_everything() {
        assert!(ExceptionKind::Exception.catches(ExceptionKind::KeyError));
        assert!(ExceptionKind::KeyError.catches(ExceptionKind::KeyError));
        assert!(!ExceptionKind::KeyError.catches(ExceptionKind::IndexError));
    }
}
