use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Admin => "admin",
    Staff => "staff",
});

str_enum!(RunTrigger {
    Scheduled => "scheduled",
    Manual => "manual",
    Cli => "cli",
});

str_enum!(RunStatus {
    Succeeded => "succeeded",
    Failed => "failed",
});

str_enum!(SortOrder {
    Asc => "asc",
    Desc => "desc",
});

/// Appointment status.
///
/// `Scheduled`, `Completed` and `Cancelled` are canonical. Anything else is
/// kept verbatim in `Other` so new statuses survive a round trip through
/// the store without a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScheduleStatus {
    Scheduled,
    Completed,
    Cancelled,
    Other(String),
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Completed and cancelled sessions close a patient's recurrence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Lenient parse: canonical names are case-insensitive and the
    /// `canceled` spelling maps to `Cancelled`. Empty input is rejected.
    pub fn parse(s: &str) -> Result<Self, DatabaseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DatabaseError::InvalidEnum {
                field: "ScheduleStatus".into(),
                value: s.into(),
            });
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "scheduled" => Self::Scheduled,
            "completed" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            _ => Self::Other(trimmed.to_string()),
        })
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<String> for ScheduleStatus {
    fn from(s: String) -> Self {
        Self::parse(&s).unwrap_or(Self::Other(s))
    }
}

impl From<ScheduleStatus> for String {
    fn from(status: ScheduleStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored values of the terminal statuses, for SQL filters.
pub const TERMINAL_STATUSES: [&str; 2] = ["completed", "cancelled"];

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
        assert_eq!(Role::Staff.as_str(), "staff");
        assert!(Role::from_str("patient").is_err());
    }

    #[test]
    fn status_parse_is_lenient() {
        assert_eq!(ScheduleStatus::parse("Scheduled").unwrap(), ScheduleStatus::Scheduled);
        assert_eq!(ScheduleStatus::parse("COMPLETED").unwrap(), ScheduleStatus::Completed);
        assert_eq!(ScheduleStatus::parse("Canceled").unwrap(), ScheduleStatus::Cancelled);
        assert_eq!(
            ScheduleStatus::parse("Rescheduled").unwrap(),
            ScheduleStatus::Other("Rescheduled".into())
        );
        assert!(ScheduleStatus::parse("  ").is_err());
    }

    #[test]
    fn only_completed_and_cancelled_are_terminal() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Cancelled.is_terminal());
        assert!(!ScheduleStatus::Scheduled.is_terminal());
        assert!(!ScheduleStatus::Other("no_show".into()).is_terminal());
    }

    #[test]
    fn terminal_constants_match_as_str() {
        assert_eq!(TERMINAL_STATUSES[0], ScheduleStatus::Completed.as_str());
        assert_eq!(TERMINAL_STATUSES[1], ScheduleStatus::Cancelled.as_str());
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_string(&ScheduleStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: ScheduleStatus = serde_json::from_str("\"Canceled\"").unwrap();
        assert_eq!(back, ScheduleStatus::Cancelled);
    }
}
