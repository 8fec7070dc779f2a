use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! api_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {}: '{}' (expected one of: {})",
                        stringify!($name),
                        other,
                        [$($wire),+].join(", ")
                    )),
                }
            }
        }
    };
}

api_enum!(TaskPriority {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Urgent => "URGENT",
});

api_enum!(ServerStatus {
    Online => "ONLINE",
    Offline => "OFFLINE",
    Degraded => "DEGRADED",
    Unknown => "UNKNOWN",
});

api_enum!(CheckType {
    Ping => "PING",
    Tcp => "TCP",
    Http => "HTTP",
});

api_enum!(LogLevel {
    Debug => "DEBUG",
    Info => "INFO",
    Warn => "WARN",
    Error => "ERROR",
    Fatal => "FATAL",
});

api_enum!(PaymentStatus {
    Pending => "PENDING",
    Paid => "PAID",
    Overdue => "OVERDUE",
    Cancelled => "CANCELLED",
});

api_enum!(BillingCycle {
    Monthly => "MONTHLY",
    Quarterly => "QUARTERLY",
    Yearly => "YEARLY",
});

api_enum!(TeamRole {
    Owner => "OWNER",
    Admin => "ADMIN",
    Member => "MEMBER",
    Viewer => "VIEWER",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert_eq!("HTTP".parse::<CheckType>().unwrap(), CheckType::Http);
        assert!("sometimes".parse::<ServerStatus>().is_err());
    }

    #[test]
    fn serializes_to_wire_names() {
        let json = serde_json::to_string(&PaymentStatus::Overdue).unwrap();
        assert_eq!(json, "\"OVERDUE\"");
        let cycle: BillingCycle = serde_json::from_str("\"QUARTERLY\"").unwrap();
        assert_eq!(cycle, BillingCycle::Quarterly);
    }
}
