// src/models/mod.rs

pub mod role;
pub mod user;
pub mod organization;
pub mod team;
pub mod sharing;
pub mod contact;
pub mod document;
pub mod facility;
pub mod password;

// Re-exports

pub use role::{OrgRole, TeamRole, UserRole};
pub use user::User;
pub use organization::{Organization, OrganizationMember};
pub use team::{Team, TeamMember};
pub use sharing::{Sharing, Visibility};
pub use contact::Contact;
pub use document::{generate_share_token, Attachment, Document};
pub use facility::Facility;
pub use password::{check_policy, hash_token, PasswordError, PasswordHash, PasswordResetToken};
