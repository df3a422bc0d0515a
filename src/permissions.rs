// src/permissions.rs

//! Role/permission evaluation for every scope.
//!
//! Each scope maps a role to a set of [`Capabilities`] and then applies the
//! target rules of the requested action (self-modification, the single
//! OWNER, admin-on-admin). Evaluation is pure: handlers fetch the current
//! role state from the store and pass it in on every request.

use bitflags::bitflags;
use thiserror::Error;

use crate::models::{OrgRole, TeamRole, UserRole};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const VIEW              = 1 << 0;
        const UPDATE_SETTINGS   = 1 << 1;
        const ADD_MEMBERS       = 1 << 2;
        /// Change roles of, or remove, plain members
        const MANAGE_MEMBERS    = 1 << 3;
        /// Touch admins/leaders and grant those roles
        const MANAGE_PRIVILEGED = 1 << 4;
        const DELETE            = 1 << 5;
        const TRANSFER          = 1 << 6;
        const CREATE_TEAMS      = 1 << 7;
        const MANAGE_USERS      = 1 << 8;
        const MANAGE_FACILITIES = 1 << 9;
        const CREATE_CONTENT    = 1 << 10;
    }
}

/// Why a request was refused. `Forbidden` maps to 403, `Invalid` to 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denied {
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Invalid(&'static str),
}

pub type Decision = Result<(), Denied>;

/// One authorization scope: a role table plus action rules.
/// `role` is `None` when the requester holds no role in the scope.
pub trait Scope {
    type Role: Copy;
    type Action;

    fn capabilities(role: Self::Role) -> Capabilities;

    fn evaluate(role: Option<Self::Role>, action: &Self::Action) -> Decision;
}

pub fn authorize<S: Scope>(role: Option<S::Role>, action: &S::Action) -> Decision {
    S::evaluate(role, action)
}

fn require(caps: Capabilities, needed: Capabilities, message: &'static str) -> Decision {
    if caps.contains(needed) {
        Ok(())
    } else {
        Err(Denied::Forbidden(message))
    }
}

fn refuse_if(condition: bool, denial: Denied) -> Decision {
    if condition { Err(denial) } else { Ok(()) }
}

// === GLOBAL ===

pub struct GlobalScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalAction {
    ListUsers,
    ViewUser { is_self: bool },
    EditProfile { is_self: bool },
    ChangeRole { is_self: bool },
    SetActive { is_self: bool },
    DeleteUser { is_self: bool },
    ViewAllTeams,
    ManageFacilities,
    ImportFacilities,
    CreateContent,
}


impl Scope for GlobalScope {
    type Role = UserRole;
    type Action = GlobalAction;

    fn capabilities(role: UserRole) -> Capabilities {
        match role {
            UserRole::Admin => {
                Capabilities::VIEW
                    | Capabilities::MANAGE_USERS
                    | Capabilities::MANAGE_FACILITIES
                    | Capabilities::CREATE_CONTENT
            }
            UserRole::TeamLeader | UserRole::Member => {
                Capabilities::VIEW | Capabilities::CREATE_CONTENT
            }
            UserRole::Viewer => Capabilities::VIEW,
        }
    }

    fn evaluate(role: Option<UserRole>, action: &GlobalAction) -> Decision {
        let role = role.ok_or(Denied::Forbidden("Authentication required"))?;
        let caps = Self::capabilities(role);
        let admin = caps.contains(Capabilities::MANAGE_USERS);

        match *action {
            GlobalAction::ListUsers => {
                require(caps, Capabilities::MANAGE_USERS, "Only administrators can list users")
            }
            GlobalAction::ViewUser { is_self } => refuse_if(
                !is_self && !admin,
                Denied::Forbidden("You can only view your own profile"),
            ),
            GlobalAction::EditProfile { is_self } => refuse_if(
                !is_self && !admin,
                Denied::Forbidden("You can only edit your own profile"),
            ),
            GlobalAction::ChangeRole { is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_USERS,
                    "Only administrators can change user roles",
                )?;
                refuse_if(is_self, Denied::Invalid("You cannot change your own role"))
            }
            GlobalAction::SetActive { is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_USERS,
                    "Only administrators can change account status",
                )?;
                refuse_if(is_self, Denied::Invalid("You cannot deactivate your own account"))
            }
            GlobalAction::DeleteUser { is_self } => {
                require(caps, Capabilities::MANAGE_USERS, "Only administrators can delete users")?;
                refuse_if(is_self, Denied::Invalid("You cannot delete your own account"))
            }
            GlobalAction::ViewAllTeams => require(
                caps,
                Capabilities::MANAGE_USERS,
                "Only administrators can list all teams",
            ),
            GlobalAction::ManageFacilities => require(
                caps,
                Capabilities::MANAGE_FACILITIES,
                "Only administrators can manage facilities",
            ),
            GlobalAction::ImportFacilities => require(
                caps,
                Capabilities::MANAGE_FACILITIES,
                "Only administrators can import facilities",
            ),
            GlobalAction::CreateContent => {
                require(caps, Capabilities::CREATE_CONTENT, "Viewers have read-only access")
            }
        }
    }
}

// === ORGANIZATION ===

pub struct OrgScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrgAction {
    View,
    UpdateSettings,
    AddMember { grant: OrgRole },
    ChangeMemberRole { target: OrgRole, new_role: OrgRole, is_self: bool },
    RemoveMember { target: OrgRole, is_self: bool },
    Leave,
    TransferOwnership { is_self: bool },
    CreateTeam,
    Delete { other_members: usize, teams: usize },
}

impl Scope for OrgScope {
    type Role = OrgRole;
    type Action = OrgAction;

    fn capabilities(role: OrgRole) -> Capabilities {
        match role {
            OrgRole::Owner => {
                Capabilities::VIEW
                    | Capabilities::UPDATE_SETTINGS
                    | Capabilities::ADD_MEMBERS
                    | Capabilities::MANAGE_MEMBERS
                    | Capabilities::MANAGE_PRIVILEGED
                    | Capabilities::DELETE
                    | Capabilities::TRANSFER
                    | Capabilities::CREATE_TEAMS
            }
            OrgRole::Admin => {
                Capabilities::VIEW
                    | Capabilities::UPDATE_SETTINGS
                    | Capabilities::ADD_MEMBERS
                    | Capabilities::MANAGE_MEMBERS
                    | Capabilities::CREATE_TEAMS
            }
            OrgRole::Member | OrgRole::Guest => Capabilities::VIEW,
        }
    }

    fn evaluate(role: Option<OrgRole>, action: &OrgAction) -> Decision {
        let role = role.ok_or(Denied::Forbidden("You are not a member of this organization"))?;
        let caps = Self::capabilities(role);
        let privileged = caps.contains(Capabilities::MANAGE_PRIVILEGED);

        match *action {
            OrgAction::View => {
                require(caps, Capabilities::VIEW, "You are not a member of this organization")
            }
            OrgAction::UpdateSettings => require(
                caps,
                Capabilities::UPDATE_SETTINGS,
                "Only the owner or an admin can update the organization",
            ),
            OrgAction::AddMember { grant } => {
                require(
                    caps,
                    Capabilities::ADD_MEMBERS,
                    "Only the owner or an admin can add members",
                )?;
                refuse_if(
                    grant == OrgRole::Owner,
                    Denied::Invalid("Cannot add a member as owner"),
                )?;
                refuse_if(
                    grant == OrgRole::Admin && !privileged,
                    Denied::Forbidden("Only the owner can add admins"),
                )
            }
            OrgAction::ChangeMemberRole { target, new_role, is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_MEMBERS,
                    "Only the owner or an admin can change member roles",
                )?;
                refuse_if(is_self, Denied::Invalid("You cannot change your own role"))?;
                refuse_if(
                    target == OrgRole::Owner,
                    Denied::Invalid("Cannot change the owner's role"),
                )?;
                refuse_if(
                    new_role == OrgRole::Owner,
                    Denied::Invalid("Use ownership transfer to assign a new owner"),
                )?;
                refuse_if(
                    target == OrgRole::Admin && !privileged,
                    Denied::Forbidden("Only the owner can change an admin's role"),
                )?;
                refuse_if(
                    new_role == OrgRole::Admin && !privileged,
                    Denied::Forbidden("Only the owner can promote members to admin"),
                )
            }
            OrgAction::RemoveMember { target, is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_MEMBERS,
                    "Only the owner or an admin can remove members",
                )?;
                refuse_if(
                    target == OrgRole::Owner,
                    Denied::Invalid("Cannot remove the organization owner"),
                )?;
                refuse_if(is_self, Denied::Invalid("Use leave to exit the organization"))?;
                refuse_if(
                    target == OrgRole::Admin && !privileged,
                    Denied::Forbidden("Only the owner can remove an admin"),
                )
            }
            OrgAction::Leave => refuse_if(
                role == OrgRole::Owner,
                Denied::Invalid(
                    "The owner cannot leave the organization; transfer ownership first",
                ),
            ),
            OrgAction::TransferOwnership { is_self } => {
                require(caps, Capabilities::TRANSFER, "Only the owner can transfer ownership")?;
                refuse_if(is_self, Denied::Invalid("You already own this organization"))
            }
            OrgAction::CreateTeam => require(
                caps,
                Capabilities::CREATE_TEAMS,
                "Only the owner or an admin can create teams in this organization",
            ),
            OrgAction::Delete { other_members, teams } => {
                require(caps, Capabilities::DELETE, "Only the owner can delete the organization")?;
                refuse_if(
                    other_members > 0 || teams > 0,
                    Denied::Invalid(
                        "Remove all other members and teams before deleting the organization",
                    ),
                )
            }
        }
    }
}

// === TEAM ===

pub struct TeamScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamAction {
    View,
    Update,
    AddMember { grant: TeamRole },
    ChangeMemberRole { target: TeamRole, new_role: TeamRole, is_self: bool },
    RemoveMember { target: TeamRole, is_self: bool },
    Leave,
    TransferOwnership { is_self: bool },
    Delete,
}

impl Scope for TeamScope {
    type Role = TeamRole;
    type Action = TeamAction;

    fn capabilities(role: TeamRole) -> Capabilities {
        match role {
            TeamRole::Owner => {
                Capabilities::VIEW
                    | Capabilities::UPDATE_SETTINGS
                    | Capabilities::ADD_MEMBERS
                    | Capabilities::MANAGE_MEMBERS
                    | Capabilities::MANAGE_PRIVILEGED
                    | Capabilities::DELETE
                    | Capabilities::TRANSFER
            }
            TeamRole::Leader => {
                Capabilities::VIEW
                    | Capabilities::UPDATE_SETTINGS
                    | Capabilities::ADD_MEMBERS
                    | Capabilities::MANAGE_MEMBERS
            }
            TeamRole::Member | TeamRole::Viewer => Capabilities::VIEW,
        }
    }

    fn evaluate(role: Option<TeamRole>, action: &TeamAction) -> Decision {
        let role = role.ok_or(Denied::Forbidden("You are not a member of this team"))?;
        let caps = Self::capabilities(role);
        let privileged = caps.contains(Capabilities::MANAGE_PRIVILEGED);

        match *action {
            TeamAction::View => {
                require(caps, Capabilities::VIEW, "You are not a member of this team")
            }
            TeamAction::Update => require(
                caps,
                Capabilities::UPDATE_SETTINGS,
                "Only the owner or a leader can update the team",
            ),
            TeamAction::AddMember { grant } => {
                require(
                    caps,
                    Capabilities::ADD_MEMBERS,
                    "Only the owner or a leader can invite members",
                )?;
                refuse_if(
                    grant == TeamRole::Owner,
                    Denied::Invalid("Cannot add a member as owner"),
                )?;
                refuse_if(
                    grant == TeamRole::Leader && !privileged,
                    Denied::Forbidden("Only the owner can add leaders"),
                )
            }
            TeamAction::ChangeMemberRole { target, new_role, is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_MEMBERS,
                    "Only the owner or a leader can change member roles",
                )?;
                refuse_if(is_self, Denied::Invalid("You cannot change your own role"))?;
                refuse_if(
                    target == TeamRole::Owner,
                    Denied::Invalid("Cannot change the owner's role"),
                )?;
                refuse_if(
                    new_role == TeamRole::Owner,
                    Denied::Invalid("Use ownership transfer to assign a new owner"),
                )?;
                refuse_if(
                    target == TeamRole::Leader && !privileged,
                    Denied::Forbidden("Only the owner can change a leader's role"),
                )?;
                refuse_if(
                    new_role == TeamRole::Leader && !privileged,
                    Denied::Forbidden("Only the owner can promote members to leader"),
                )
            }
            TeamAction::RemoveMember { target, is_self } => {
                require(
                    caps,
                    Capabilities::MANAGE_MEMBERS,
                    "Only the owner or a leader can remove members",
                )?;
                refuse_if(
                    target == TeamRole::Owner,
                    Denied::Invalid("Cannot remove the team owner"),
                )?;
                refuse_if(is_self, Denied::Invalid("Use leave to exit the team"))?;
                refuse_if(
                    target == TeamRole::Leader && !privileged,
                    Denied::Forbidden("Only the owner can remove a leader"),
                )
            }
            TeamAction::Leave => refuse_if(
                role == TeamRole::Owner,
                Denied::Invalid("The owner cannot leave the team; transfer ownership first"),
            ),
            TeamAction::TransferOwnership { is_self } => {
                require(caps, Capabilities::TRANSFER, "Only the owner can transfer ownership")?;
                refuse_if(is_self, Denied::Invalid("You already own this team"))
            }
            TeamAction::Delete => {
                require(caps, Capabilities::DELETE, "Only the owner can delete the team")
            }
        }
    }
}

// === CONTACTS / DOCUMENTS ===

pub struct ResourceScope;

/// Requester's relation to a contact or document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAccess {
    Owner,
    /// Sees it through team or organization sharing
    Reader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    View,
    Edit,
    Delete,
    Share,
    ManageLink,
}

impl Scope for ResourceScope {
    type Role = ResourceAccess;
    type Action = ResourceAction;

    fn capabilities(role: ResourceAccess) -> Capabilities {
        match role {
            ResourceAccess::Owner => {
                Capabilities::VIEW | Capabilities::UPDATE_SETTINGS | Capabilities::DELETE
            }
            ResourceAccess::Reader => Capabilities::VIEW,
        }
    }

    fn evaluate(role: Option<ResourceAccess>, action: &ResourceAction) -> Decision {
        let role = role.ok_or(Denied::Forbidden("You do not have access to this resource"))?;
        let caps = Self::capabilities(role);

        match action {
            ResourceAction::View => {
                require(caps, Capabilities::VIEW, "You do not have access to this resource")
            }
            ResourceAction::Edit => require(
                caps,
                Capabilities::UPDATE_SETTINGS,
                "Only the owner can edit this resource",
            ),
            ResourceAction::Delete => {
                require(caps, Capabilities::DELETE, "Only the owner can delete this resource")
            }
            ResourceAction::Share => require(
                caps,
                Capabilities::UPDATE_SETTINGS,
                "Only the owner can change sharing",
            ),
            ResourceAction::ManageLink => require(
                caps,
                Capabilities::UPDATE_SETTINGS,
                "Only the owner can manage share links",
            ),
        }
    }
}

// === LEADERSHIP ↔ GLOBAL ROLE ===

/// New global role for a user who just gained a team leadership role
pub fn global_role_after_leadership_gain(current: UserRole) -> Option<UserRole> {
    match current {
        UserRole::Member | UserRole::Viewer => Some(UserRole::TeamLeader),
        UserRole::Admin | UserRole::TeamLeader => None,
    }
}

/// New global role for a user who just lost a team leadership role.
/// Users still leading another team, global admins and plain members keep
/// their role; everyone else falls back to MEMBER.
pub fn global_role_after_leadership_loss(current: UserRole, still_leads: bool) -> Option<UserRole> {
    if still_leads {
        return None;
    }
    match current {
        UserRole::Admin | UserRole::Member => None,
        UserRole::TeamLeader | UserRole::Viewer => Some(UserRole::Member),
    }
}
