// src/models/role.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Global role carried by every user
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    TeamLeader,
    Member,
    Viewer,
}

/// Role inside an organization
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrgRole {
    Owner,
    Admin,
    Member,
    Guest,
}

/// Role inside a team
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    Owner,
    Leader,
    Member,
    Viewer,
}

impl UserRole {
    /// Higher is stronger
    pub fn rank(self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::TeamLeader => 2,
            UserRole::Member => 1,
            UserRole::Viewer => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::TeamLeader => "TEAM_LEADER",
            UserRole::Member => "MEMBER",
            UserRole::Viewer => "VIEWER",
        }
    }
}

impl OrgRole {
    pub fn rank(self) -> u8 {
        match self {
            OrgRole::Owner => 3,
            OrgRole::Admin => 2,
            OrgRole::Member => 1,
            OrgRole::Guest => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrgRole::Owner => "OWNER",
            OrgRole::Admin => "ADMIN",
            OrgRole::Member => "MEMBER",
            OrgRole::Guest => "GUEST",
        }
    }
}

impl TeamRole {
    pub fn rank(self) -> u8 {
        match self {
            TeamRole::Owner => 3,
            TeamRole::Leader => 2,
            TeamRole::Member => 1,
            TeamRole::Viewer => 0,
        }
    }

    /// OWNER and LEADER count as leadership for the global role
    pub fn is_leadership(self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Leader)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TeamRole::Owner => "OWNER",
            TeamRole::Leader => "LEADER",
            TeamRole::Member => "MEMBER",
            TeamRole::Viewer => "VIEWER",
        }
    }
}

macro_rules! role_text {
    ($ty:ty, $($text:literal => $variant:expr),+ $(,)?) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($variant),)+
                    other => Err(format!("unknown role: {}", other)),
                }
            }
        }
    };
}

role_text!(UserRole,
    "ADMIN" => UserRole::Admin,
    "TEAM_LEADER" => UserRole::TeamLeader,
    "MEMBER" => UserRole::Member,
    "VIEWER" => UserRole::Viewer,
);

role_text!(OrgRole,
    "OWNER" => OrgRole::Owner,
    "ADMIN" => OrgRole::Admin,
    "MEMBER" => OrgRole::Member,
    "GUEST" => OrgRole::Guest,
);

role_text!(TeamRole,
    "OWNER" => TeamRole::Owner,
    "LEADER" => TeamRole::Leader,
    "MEMBER" => TeamRole::Member,
    "VIEWER" => TeamRole::Viewer,
);
