//! Macro for implementing Display and FromStr for wire-label enums
//!
//! The canonical finding schema spells enum values in upper case
//! (`FAILED`, `ARCHIVED`, `HIGH`). This macro keeps the label table for an
//! enum in one place and derives `as_str`, `Display` and a case-insensitive
//! `FromStr` from it.
//!
//! # Example
//!
//! ```rust
//! use sentinel_domain::impl_wire_label_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum ScanMode {
//!     Full,
//!     Delta,
//! }
//!
//! impl_wire_label_conversions!(ScanMode {
//!     Full => "FULL",
//!     Delta => "DELTA",
//! });
//!
//! assert_eq!(ScanMode::Delta.to_string(), "DELTA");
//! assert_eq!("full".parse::<ScanMode>().unwrap(), ScanMode::Full);
//! ```

/// Implements `as_str`, Display and FromStr for label enums
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their wire labels
///
/// Parsing ignores ASCII case; output always uses the label as written.
#[macro_export]
macro_rules! impl_wire_label_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire label for this value.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(if s.eq_ignore_ascii_case($str) {
                    return Ok(Self::$variant);
                })+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Verdict {
        Pass,
        Fail,
    }

    impl_wire_label_conversions!(Verdict {
        Pass => "PASS",
        Fail => "FAIL",
    });

    #[test]
    fn test_display_uses_label() {
        assert_eq!(Verdict::Pass.to_string(), "PASS");
        assert_eq!(Verdict::Fail.as_str(), "FAIL");
    }

    #[test]
    fn test_fromstr_ignores_case() {
        assert_eq!(Verdict::from_str("fail").unwrap(), Verdict::Fail);
        assert_eq!(Verdict::from_str("Pass").unwrap(), Verdict::Pass);
    }

    #[test]
    fn test_fromstr_invalid() {
        let err = Verdict::from_str("maybe").unwrap_err();
        assert!(err.contains("Invalid Verdict: maybe"));
        assert!(Verdict::from_str("").is_err());
    }
}
