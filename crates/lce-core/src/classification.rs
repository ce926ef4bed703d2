//! # Severity and Priority
//!
//! The two four-point ordinal scales shared by rules, events, escalations
//! and AML verdicts. Both order `Low < Medium < High < Critical` and map to
//! the weights `{0.25, 0.5, 0.75, 1.0}` used by the weighted risk scores.

use serde::{Deserialize, Serialize};

use crate::error::LceError;

macro_rules! ordinal_scale {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            /// Lowest point on the scale.
            Low,
            /// Default point on the scale.
            #[default]
            Medium,
            /// Elevated.
            High,
            /// Highest point on the scale.
            Critical,
        }

        impl $name {
            /// All values in ascending order.
            pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

            /// Ordinal weight: Critical 1.0, High 0.75, Medium 0.5, Low 0.25.
            pub fn weight(&self) -> f64 {
                match self {
                    Self::Critical => 1.0,
                    Self::High => 0.75,
                    Self::Medium => 0.5,
                    Self::Low => 0.25,
                }
            }

            /// The canonical string name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    Self::Low => "Low",
                    Self::Medium => "Medium",
                    Self::High => "High",
                    Self::Critical => "Critical",
                }
            }

            /// The next value up the scale, saturating at `Critical`.
            pub fn raised(&self) -> Self {
                match self {
                    Self::Low => Self::Medium,
                    Self::Medium => Self::High,
                    Self::High | Self::Critical => Self::Critical,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = LceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
                    .ok_or_else(|| {
                        LceError::validation(format!(
                            "unknown {} \"{s}\" (expected Low, Medium, High or Critical)",
                            $kind
                        ))
                    })
            }
        }
    };
}

ordinal_scale!(
    /// How serious a finding or violation is.
    Severity,
    "severity"
);

ordinal_scale!(
    /// How urgently a rule or escalation must be handled.
    Priority,
    "priority"
);

impl From<Priority> for Severity {
    fn from(p: Priority) -> Self {
        match p {
            Priority::Low => Severity::Low,
            Priority::Medium => Severity::Medium,
            Priority::High => Severity::High,
            Priority::Critical => Severity::Critical,
        }
    }
}

impl From<Severity> for Priority {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Low => Priority::Low,
            Severity::Medium => Priority::Medium,
            Severity::High => Priority::High,
            Severity::Critical => Priority::Critical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_ordered() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
        assert!(Priority::Medium < Priority::High);
    }

    #[test]
    fn weights_follow_scale() {
        assert_eq!(Severity::Critical.weight(), 1.0);
        assert_eq!(Severity::High.weight(), 0.75);
        assert_eq!(Priority::Medium.weight(), 0.5);
        assert_eq!(Priority::Low.weight(), 0.25);
    }

    #[test]
    fn raised_saturates() {
        assert_eq!(Priority::Medium.raised(), Priority::High);
        assert_eq!(Priority::Critical.raised(), Priority::Critical);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("critical".parse::<Severity>().unwrap(), Severity::Critical);
        assert_eq!(" High ".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn serde_uses_variant_names() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"High\"");
        let s: Severity = serde_json::from_str("\"Low\"").unwrap();
        assert_eq!(s, Severity::Low);
        assert!(serde_json::from_str::<Severity>("\"Urgent\"").is_err());
    }
}
