use crate::error::HavenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of capability roles a principal may hold.
///
/// Grants are monotonic; revocation is out of scope for the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    User,
    Volunteer,
    #[serde(rename = "NGO")]
    Ngo,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Volunteer, Role::Ngo];

    /// The canonical label used on the wire and in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Volunteer => "Volunteer",
            Role::Ngo => "NGO",
        }
    }
}

impl FromStr for Role {
    type Err = HavenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        for role in Role::ALL {
            if trimmed.eq_ignore_ascii_case(role.label()) {
                return Ok(role);
            }
        }
        Err(HavenError::Validation(format!(
            "unknown role label '{}'",
            trimmed
        )))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
