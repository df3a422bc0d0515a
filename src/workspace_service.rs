// src/workspace_service.rs

use crate::models::*;
use crate::permissions::{global_role_after_leadership_gain, global_role_after_leadership_loss};
use crate::raddb::{MasterKey, RadDB, RadDbError};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Workspace store errors
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("DB error: {0}")]
    Db(#[from] RadDbError),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("{0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

fn not_found(what: &str) -> WorkspaceError {
    WorkspaceError::NotFound(format!("{} not found", what))
}

/// Outcome of a facility import batch
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub created: Vec<Facility>,
    /// Row numbers dropped as duplicates
    pub skipped: Vec<usize>,
}

/// Organization settings a PATCH may change; `None` leaves a field alone
#[derive(Debug, Default)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub max_teams: Option<u32>,
    pub max_members: Option<u32>,
}

#[derive(Debug, Default)]
pub struct TeamChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct ContactChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default)]
pub struct FacilityChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub kind: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

fn replace_if_some<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

fn replace_optional(field: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *field = value;
    }
}

/// Persistence for users, organizations, teams and their content.
///
/// Every mutation reads the current record, changes the requested fields and
/// writes it back under the write lock, so concurrent requests never revert
/// each other's fields and the secondary indexes stay consistent with the
/// records. Nothing here checks permissions; the HTTP layer does that before
/// calling in.
pub struct WorkspaceService {
    db: RwLock<RadDB>,
}

// === Low level record access ===

fn load<T: DeserializeOwned>(db: &RadDB, key: &str) -> Result<Option<T>> {
    match db.get(key)? {
        Some(data) => bincode::deserialize(&data)
            .map(Some)
            .map_err(|e| WorkspaceError::Serialization(e.to_string())),
        None => Ok(None),
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| WorkspaceError::Serialization(e.to_string()))
}

fn store<T: Serialize>(db: &RadDB, key: String, value: &T) -> Result<()> {
    db.set(key, encode(value)?)?;
    Ok(())
}

fn load_index(db: &RadDB, key: &str) -> Result<Vec<Uuid>> {
    Ok(load(db, key)?.unwrap_or_default())
}

fn index_insert(db: &RadDB, key: &str, id: Uuid) -> Result<()> {
    let mut ids = load_index(db, key)?;
    if !ids.contains(&id) {
        ids.push(id);
        store(db, key.to_string(), &ids)?;
    }
    Ok(())
}

fn index_remove(db: &RadDB, key: &str, id: Uuid) -> Result<()> {
    let mut ids = load_index(db, key)?;
    let before = ids.len();
    ids.retain(|x| *x != id);
    if ids.len() != before {
        store(db, key.to_string(), &ids)?;
    }
    Ok(())
}

fn load_all<T: DeserializeOwned>(db: &RadDB, index_key: &str, prefix: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    for id in load_index(db, index_key)? {
        if let Some(item) = load(db, &format!("{}:{}", prefix, id))? {
            items.push(item);
        }
    }
    Ok(items)
}

// === Keys ===

const ALL_USERS: &str = "all_users_index";
const ALL_TEAMS: &str = "all_teams_index";
const ALL_CONTACTS: &str = "all_contacts_index";
const ALL_DOCUMENTS: &str = "all_documents_index";
const ALL_FACILITIES: &str = "all_facilities_index";

fn user_key(id: Uuid) -> String {
    format!("user:{}", id)
}

fn email_key(email: &str) -> String {
    format!("email_index:{}", email)
}

fn org_key(id: Uuid) -> String {
    format!("org:{}", id)
}

fn org_member_key(org: Uuid, user: Uuid) -> String {
    format!("org_member:{}:{}", org, user)
}

fn org_members_index(org: Uuid) -> String {
    format!("org_members_index:{}", org)
}

fn org_teams_index(org: Uuid) -> String {
    format!("org_teams_index:{}", org)
}

fn team_key(id: Uuid) -> String {
    format!("team:{}", id)
}

fn team_member_key(team: Uuid, user: Uuid) -> String {
    format!("team_member:{}:{}", team, user)
}

fn team_members_index(team: Uuid) -> String {
    format!("team_members_index:{}", team)
}

fn user_teams_index(user: Uuid) -> String {
    format!("user_teams_index:{}", user)
}

fn contact_key(id: Uuid) -> String {
    format!("contact:{}", id)
}

fn document_key(id: Uuid) -> String {
    format!("document:{}", id)
}

fn share_token_key(token: &str) -> String {
    format!("share_token_index:{}", token)
}

fn facility_key(id: Uuid) -> String {
    format!("facility:{}", id)
}

fn reset_token_key(hash: &str) -> String {
    format!("reset_token:{}", hash)
}

fn user_reset_key(user: Uuid) -> String {
    format!("user_reset_index:{}", user)
}

// === Consistency helpers (caller holds the write lock) ===

fn require_user(db: &RadDB, id: Uuid) -> Result<User> {
    load(db, &user_key(id))?.ok_or_else(|| not_found("User"))
}

fn put_user(db: &RadDB, user: &mut User) -> Result<()> {
    user.touch();
    store(db, user_key(user.id), user)
}

fn user_team_ids(db: &RadDB, user_id: Uuid) -> Result<Vec<Uuid>> {
    load_index(db, &user_teams_index(user_id))
}

fn still_leads(db: &RadDB, user_id: Uuid) -> Result<bool> {
    for team_id in user_team_ids(db, user_id)? {
        let member: Option<TeamMember> = load(db, &team_member_key(team_id, user_id))?;
        if member.map_or(false, |m| m.role.is_leadership()) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn on_leadership_gained(db: &RadDB, user_id: Uuid) -> Result<()> {
    let mut user = require_user(db, user_id)?;
    if let Some(role) = global_role_after_leadership_gain(user.role) {
        tracing::info!(user_id = %user_id, from = %user.role, to = %role, "Promoting global role");
        user.role = role;
        put_user(db, &mut user)?;
    }
    Ok(())
}

fn on_leadership_lost(db: &RadDB, user_id: Uuid) -> Result<()> {
    let mut user = require_user(db, user_id)?;
    if let Some(role) = global_role_after_leadership_loss(user.role, still_leads(db, user_id)?) {
        tracing::info!(user_id = %user_id, from = %user.role, to = %role, "Demoting global role");
        user.role = role;
        put_user(db, &mut user)?;
    }
    Ok(())
}

/// Drop a team membership row and fix the user's primary team and global role
fn detach_team_member(db: &RadDB, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamMember>> {
    let member: Option<TeamMember> = load(db, &team_member_key(team_id, user_id))?;
    let Some(member) = member else {
        return Ok(None);
    };

    db.remove(&team_member_key(team_id, user_id))?;
    index_remove(db, &team_members_index(team_id), user_id)?;
    index_remove(db, &user_teams_index(user_id), team_id)?;

    let mut user = require_user(db, user_id)?;
    if user.team_id == Some(team_id) {
        user.team_id = user_team_ids(db, user_id)?.first().copied();
        put_user(db, &mut user)?;
    }

    if member.role.is_leadership() {
        on_leadership_lost(db, user_id)?;
    }
    Ok(Some(member))
}

/// Revert contacts and documents matching `unshare` to PRIVATE
fn unshare_where<F>(db: &RadDB, unshare: F) -> Result<usize>
where
    F: Fn(Uuid, &Sharing) -> bool,
{
    let mut count = 0;
    for mut contact in load_all::<Contact>(db, ALL_CONTACTS, "contact")? {
        if unshare(contact.owner_id, &contact.sharing) {
            contact.sharing = Sharing::private();
            contact.updated_at = chrono::Utc::now();
            store(db, contact_key(contact.id), &contact)?;
            count += 1;
        }
    }
    for mut document in load_all::<Document>(db, ALL_DOCUMENTS, "document")? {
        if unshare(document.owner_id, &document.sharing) {
            document.sharing = Sharing::private();
            document.updated_at = chrono::Utc::now();
            store(db, document_key(document.id), &document)?;
            count += 1;
        }
    }
    Ok(count)
}

/// The owner must still belong to the team or organization being shared with
fn check_sharing(db: &RadDB, owner_id: Uuid, sharing: &Sharing) -> Result<()> {
    if let Some(team_id) = sharing.team_id() {
        if !db.contains_key(&team_member_key(team_id, owner_id))? {
            return Err(WorkspaceError::InvalidInput(
                "You can only share with a team you belong to".into(),
            ));
        }
    }
    if let Some(org_id) = sharing.organization_id() {
        if require_user(db, owner_id)?.organization_id != Some(org_id) {
            return Err(WorkspaceError::InvalidInput(
                "You are not a member of an organization".into(),
            ));
        }
    }
    Ok(())
}

fn facility_conflict() -> WorkspaceError {
    WorkspaceError::AlreadyExists("A facility with this name and address already exists".into())
}

impl WorkspaceService {
    /// Open the encrypted store at `path`
    pub fn open<P: AsRef<Path>>(path: P, key: &MasterKey) -> Result<Self> {
        let db = RadDB::open(path, key)?;
        Ok(Self { db: RwLock::new(db) })
    }

    pub fn in_memory() -> Self {
        Self {
            db: RwLock::new(RadDB::in_memory()),
        }
    }

    // === USER ===

    pub async fn create_user(&self, user: &User) -> Result<()> {
        let db = self.db.write().await;
        if db.contains_key(&email_key(&user.email))? {
            return Err(WorkspaceError::AlreadyExists(format!(
                "User with email {} already exists",
                user.email
            )));
        }
        store(&db, user_key(user.id), user)?;
        store(&db, email_key(&user.email), &user.id)?;
        index_insert(&db, ALL_USERS, user.id)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let db = self.db.read().await;
        load(&db, &user_key(id))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let db = self.db.read().await;
        let key = email_key(&crate::models::user::normalize_email(email));
        match load::<Uuid>(&db, &key)? {
            Some(id) => load(&db, &user_key(id)),
            None => Ok(None),
        }
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let db = self.db.read().await;
        load_all(&db, ALL_USERS, "user")
    }

    pub async fn count_users(&self) -> Result<usize> {
        let db = self.db.read().await;
        Ok(load_index(&db, ALL_USERS)?.len())
    }

    async fn modify_user<F>(&self, id: Uuid, change: F) -> Result<User>
    where
        F: FnOnce(&mut User),
    {
        let db = self.db.write().await;
        let mut user = require_user(&db, id)?;
        change(&mut user);
        put_user(&db, &mut user)?;
        Ok(user)
    }

    pub async fn rename_user(&self, id: Uuid, name: &str) -> Result<User> {
        let name = name.trim().to_string();
        self.modify_user(id, |user| user.name = name).await
    }

    /// Returns the previous role together with the updated user
    pub async fn set_user_role(&self, id: Uuid, role: UserRole) -> Result<(UserRole, User)> {
        let mut previous = role;
        let user = self
            .modify_user(id, |user| {
                previous = user.role;
                user.role = role;
            })
            .await?;
        Ok((previous, user))
    }

    pub async fn set_user_active(&self, id: Uuid, active: bool) -> Result<User> {
        self.modify_user(id, |user| user.is_active = active).await
    }

    pub async fn set_user_password(&self, id: Uuid, hash: PasswordHash) -> Result<User> {
        self.modify_user(id, |user| user.password_hash = hash).await
    }

    /// Stamp `last_login` on an active account. An account deactivated since
    /// the caller last read it comes back untouched with `is_active == false`.
    pub async fn record_login(&self, id: Uuid) -> Result<User> {
        let db = self.db.write().await;
        let mut user = require_user(&db, id)?;
        if user.is_active {
            user.last_login = Some(chrono::Utc::now());
            put_user(&db, &mut user)?;
        }
        Ok(user)
    }

    /// Delete a user together with the content they own. Returns the object
    /// store keys of their attachments so the caller can clean them up.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<Vec<String>> {
        let db = self.db.write().await;
        let user = require_user(&db, user_id)?;

        for team_id in user_team_ids(&db, user_id)? {
            let team: Option<Team> = load(&db, &team_key(team_id))?;
            if team.map_or(false, |t| t.owner_id == user_id) {
                return Err(WorkspaceError::InvalidInput("User still owns a team".into()));
            }
        }
        if let Some(org_id) = user.organization_id {
            let org: Option<Organization> = load(&db, &org_key(org_id))?;
            if org.map_or(false, |o| o.owner_id == user_id) {
                return Err(WorkspaceError::InvalidInput(
                    "User still owns an organization".into(),
                ));
            }
            db.remove(&org_member_key(org_id, user_id))?;
            index_remove(&db, &org_members_index(org_id), user_id)?;
        }
        for team_id in user_team_ids(&db, user_id)? {
            db.remove(&team_member_key(team_id, user_id))?;
            index_remove(&db, &team_members_index(team_id), user_id)?;
        }
        db.remove(&user_teams_index(user_id))?;

        for contact in load_all::<Contact>(&db, ALL_CONTACTS, "contact")? {
            if contact.owner_id == user_id {
                db.remove(&contact_key(contact.id))?;
                index_remove(&db, ALL_CONTACTS, contact.id)?;
            }
        }
        let mut keys = Vec::new();
        for document in load_all::<Document>(&db, ALL_DOCUMENTS, "document")? {
            if document.owner_id == user_id {
                if let Some(token) = &document.share_token {
                    db.remove(&share_token_key(token))?;
                }
                if let Some(attachment) = document.attachment {
                    keys.push(attachment.key);
                }
                db.remove(&document_key(document.id))?;
                index_remove(&db, ALL_DOCUMENTS, document.id)?;
            }
        }

        if let Some(hash) = load::<String>(&db, &user_reset_key(user_id))? {
            db.remove(&reset_token_key(&hash))?;
            db.remove(&user_reset_key(user_id))?;
        }
        db.remove(&email_key(&user.email))?;
        db.remove(&user_key(user_id))?;
        index_remove(&db, ALL_USERS, user_id)?;
        Ok(keys)
    }

    // === PASSWORD RESET ===

    /// Store a reset token, replacing any earlier one for the same user
    pub async fn store_reset_token(&self, token: &PasswordResetToken) -> Result<()> {
        let db = self.db.write().await;
        if let Some(previous) = load::<String>(&db, &user_reset_key(token.user_id))? {
            db.remove(&reset_token_key(&previous))?;
        }
        store(&db, reset_token_key(&token.token_hash), token)?;
        store(&db, user_reset_key(token.user_id), &token.token_hash)
    }

    /// Remove and return the token; single use whether or not it is still valid
    pub async fn take_reset_token(&self, token_hash: &str) -> Result<Option<PasswordResetToken>> {
        let db = self.db.write().await;
        let token: Option<PasswordResetToken> = load(&db, &reset_token_key(token_hash))?;
        if let Some(token) = &token {
            db.remove(&reset_token_key(token_hash))?;
            db.remove(&user_reset_key(token.user_id))?;
        }
        Ok(token)
    }

    // === ORGANIZATION ===

    /// Create the organization with `org.owner_id` as its OWNER member
    pub async fn create_organization(&self, org: &Organization) -> Result<()> {
        let db = self.db.write().await;
        let mut owner = require_user(&db, org.owner_id)?;
        if owner.organization_id.is_some() {
            return Err(WorkspaceError::AlreadyExists(
                "You already belong to an organization".into(),
            ));
        }

        store(&db, org_key(org.id), org)?;
        let member = OrganizationMember::new(org.id, owner.id, OrgRole::Owner);
        store(&db, org_member_key(org.id, owner.id), &member)?;
        index_insert(&db, &org_members_index(org.id), owner.id)?;

        owner.organization_id = Some(org.id);
        put_user(&db, &mut owner)
    }

    pub async fn get_organization(&self, id: Uuid) -> Result<Option<Organization>> {
        let db = self.db.read().await;
        load(&db, &org_key(id))
    }

    /// Apply settings changes. Quotas may not drop below the current counts.
    pub async fn update_organization(
        &self,
        id: Uuid,
        changes: OrganizationChanges,
    ) -> Result<Organization> {
        let db = self.db.write().await;
        let mut org: Organization =
            load(&db, &org_key(id))?.ok_or_else(|| not_found("Organization"))?;

        if let Some(max_members) = changes.max_members {
            let current = load_index(&db, &org_members_index(id))?.len();
            if (max_members as usize) < current {
                return Err(WorkspaceError::InvalidInput(format!(
                    "maxMembers cannot be lower than the current member count ({})",
                    current
                )));
            }
        }
        if let Some(max_teams) = changes.max_teams {
            let current = load_index(&db, &org_teams_index(id))?.len();
            if (max_teams as usize) < current {
                return Err(WorkspaceError::InvalidInput(format!(
                    "maxTeams cannot be lower than the current team count ({})",
                    current
                )));
            }
        }

        replace_if_some(&mut org.name, changes.name.map(|n| n.trim().to_string()));
        replace_optional(&mut org.description, changes.description);
        replace_if_some(&mut org.max_members, changes.max_members);
        replace_if_some(&mut org.max_teams, changes.max_teams);
        org.updated_at = chrono::Utc::now();
        store(&db, org_key(id), &org)?;
        Ok(org)
    }

    /// Remove an organization that only has its owner left and no teams
    pub async fn delete_organization(&self, id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        let org: Organization =
            load(&db, &org_key(id))?.ok_or_else(|| not_found("Organization"))?;

        let members = load_index(&db, &org_members_index(id))?;
        let has_teams = !load_index(&db, &org_teams_index(id))?.is_empty();
        if members.iter().any(|m| *m != org.owner_id) || has_teams {
            return Err(WorkspaceError::InvalidInput(
                "Organization still has members or teams".into(),
            ));
        }

        unshare_where(&db, |_, sharing| sharing.organization_id() == Some(id))?;

        db.remove(&org_member_key(id, org.owner_id))?;
        db.remove(&org_members_index(id))?;
        db.remove(&org_teams_index(id))?;
        db.remove(&org_key(id))?;

        let mut owner = require_user(&db, org.owner_id)?;
        if owner.organization_id == Some(id) {
            owner.organization_id = None;
            put_user(&db, &mut owner)?;
        }
        Ok(())
    }

    pub async fn get_org_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<OrganizationMember>> {
        let db = self.db.read().await;
        load(&db, &org_member_key(org_id, user_id))
    }

    pub async fn list_org_members(&self, org_id: Uuid) -> Result<Vec<OrganizationMember>> {
        let db = self.db.read().await;
        let mut members = Vec::new();
        for user_id in load_index(&db, &org_members_index(org_id))? {
            if let Some(member) = load(&db, &org_member_key(org_id, user_id))? {
                members.push(member);
            }
        }
        Ok(members)
    }

    pub async fn add_org_member(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<OrganizationMember> {
        let db = self.db.write().await;
        let org: Organization =
            load(&db, &org_key(org_id))?.ok_or_else(|| not_found("Organization"))?;
        let mut user = require_user(&db, user_id)?;

        if user.organization_id.is_some() {
            return Err(WorkspaceError::AlreadyExists(
                "User already belongs to an organization".into(),
            ));
        }
        let members = load_index(&db, &org_members_index(org_id))?;
        if members.len() as u32 >= org.max_members {
            return Err(WorkspaceError::InvalidInput(format!(
                "Organization member limit reached ({})",
                org.max_members
            )));
        }

        let member = OrganizationMember::new(org_id, user_id, role);
        store(&db, org_member_key(org_id, user_id), &member)?;
        index_insert(&db, &org_members_index(org_id), user_id)?;
        user.organization_id = Some(org_id);
        put_user(&db, &mut user)?;
        Ok(member)
    }

    pub async fn set_org_member_role(
        &self,
        org_id: Uuid,
        user_id: Uuid,
        role: OrgRole,
    ) -> Result<OrganizationMember> {
        let db = self.db.write().await;
        let mut member: OrganizationMember = load(&db, &org_member_key(org_id, user_id))?
            .ok_or_else(|| not_found("Member"))?;
        member.role = role;
        store(&db, org_member_key(org_id, user_id), &member)?;
        Ok(member)
    }

    /// Remove a non-owner member. Their memberships in the organization's
    /// teams go with them, and whatever they shared with the organization or
    /// with one of those teams turns private.
    pub async fn remove_org_member(&self, org_id: Uuid, user_id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        let member: OrganizationMember = load(&db, &org_member_key(org_id, user_id))?
            .ok_or_else(|| not_found("Member"))?;
        if member.role == OrgRole::Owner {
            return Err(WorkspaceError::InvalidInput(
                "Cannot remove the organization owner".into(),
            ));
        }

        let org_teams = load_index(&db, &org_teams_index(org_id))?;
        for team_id in &org_teams {
            let team: Option<Team> = load(&db, &team_key(*team_id))?;
            if team.map_or(false, |t| t.owner_id == user_id) {
                return Err(WorkspaceError::InvalidInput(
                    "Member owns a team in this organization; transfer or delete it first".into(),
                ));
            }
        }
        for team_id in &org_teams {
            detach_team_member(&db, *team_id, user_id)?;
        }

        unshare_where(&db, |owner, sharing| {
            owner == user_id
                && (sharing.organization_id() == Some(org_id)
                    || sharing.team_id().is_some_and(|t| org_teams.contains(&t)))
        })?;

        db.remove(&org_member_key(org_id, user_id))?;
        index_remove(&db, &org_members_index(org_id), user_id)?;
        let mut user = require_user(&db, user_id)?;
        user.organization_id = None;
        put_user(&db, &mut user)
    }

    /// Swap OWNER to another member; the previous owner stays on as ADMIN
    pub async fn transfer_org_ownership(
        &self,
        org_id: Uuid,
        new_owner: Uuid,
    ) -> Result<Organization> {
        let db = self.db.write().await;
        let mut org: Organization =
            load(&db, &org_key(org_id))?.ok_or_else(|| not_found("Organization"))?;
        let mut incoming: OrganizationMember = load(&db, &org_member_key(org_id, new_owner))?
            .ok_or_else(|| {
                WorkspaceError::InvalidInput(
                    "New owner must be a member of the organization".into(),
                )
            })?;
        let mut outgoing: OrganizationMember = load(&db, &org_member_key(org_id, org.owner_id))?
            .ok_or_else(|| not_found("Owner membership"))?;

        outgoing.role = OrgRole::Admin;
        incoming.role = OrgRole::Owner;
        store(&db, org_member_key(org_id, outgoing.user_id), &outgoing)?;
        store(&db, org_member_key(org_id, incoming.user_id), &incoming)?;

        org.owner_id = new_owner;
        org.updated_at = chrono::Utc::now();
        store(&db, org_key(org_id), &org)?;
        Ok(org)
    }

    pub async fn list_org_teams(&self, org_id: Uuid) -> Result<Vec<Team>> {
        let db = self.db.read().await;
        load_all(&db, &org_teams_index(org_id), "team")
    }

    // === TEAM ===

    /// Create the team with `team.owner_id` as OWNER
    pub async fn create_team(&self, team: &Team) -> Result<()> {
        let db = self.db.write().await;
        let mut owner = require_user(&db, team.owner_id)?;

        if let Some(org_id) = team.organization_id {
            let org: Organization =
                load(&db, &org_key(org_id))?.ok_or_else(|| not_found("Organization"))?;
            let teams = load_index(&db, &org_teams_index(org_id))?;
            if teams.len() as u32 >= org.max_teams {
                return Err(WorkspaceError::InvalidInput(format!(
                    "Organization team limit reached ({})",
                    org.max_teams
                )));
            }
            index_insert(&db, &org_teams_index(org_id), team.id)?;
        }

        store(&db, team_key(team.id), team)?;
        index_insert(&db, ALL_TEAMS, team.id)?;
        let member = TeamMember::new(team.id, owner.id, TeamRole::Owner);
        store(&db, team_member_key(team.id, owner.id), &member)?;
        index_insert(&db, &team_members_index(team.id), owner.id)?;
        index_insert(&db, &user_teams_index(owner.id), team.id)?;

        if owner.team_id.is_none() {
            owner.team_id = Some(team.id);
            put_user(&db, &mut owner)?;
        }
        on_leadership_gained(&db, owner.id)
    }

    pub async fn get_team(&self, id: Uuid) -> Result<Option<Team>> {
        let db = self.db.read().await;
        load(&db, &team_key(id))
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        let db = self.db.read().await;
        load_all(&db, ALL_TEAMS, "team")
    }

    pub async fn list_user_teams(&self, user_id: Uuid) -> Result<Vec<Team>> {
        let db = self.db.read().await;
        load_all(&db, &user_teams_index(user_id), "team")
    }

    pub async fn team_ids_for_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let db = self.db.read().await;
        user_team_ids(&db, user_id)
    }

    pub async fn update_team(&self, id: Uuid, changes: TeamChanges) -> Result<Team> {
        let db = self.db.write().await;
        let mut team: Team = load(&db, &team_key(id))?.ok_or_else(|| not_found("Team"))?;
        replace_if_some(&mut team.name, changes.name.map(|n| n.trim().to_string()));
        replace_optional(&mut team.description, changes.description);
        team.updated_at = chrono::Utc::now();
        store(&db, team_key(id), &team)?;
        Ok(team)
    }

    /// Delete a team, its memberships and its sharing
    pub async fn delete_team(&self, team_id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        let team: Team = load(&db, &team_key(team_id))?.ok_or_else(|| not_found("Team"))?;

        unshare_where(&db, |_, sharing| sharing.team_id() == Some(team_id))?;

        for user_id in load_index(&db, &team_members_index(team_id))? {
            detach_team_member(&db, team_id, user_id)?;
        }
        db.remove(&team_members_index(team_id))?;
        if let Some(org_id) = team.organization_id {
            index_remove(&db, &org_teams_index(org_id), team_id)?;
        }
        index_remove(&db, ALL_TEAMS, team_id)?;
        db.remove(&team_key(team_id))?;
        Ok(())
    }

    pub async fn get_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TeamMember>> {
        let db = self.db.read().await;
        load(&db, &team_member_key(team_id, user_id))
    }

    pub async fn list_team_members(&self, team_id: Uuid) -> Result<Vec<TeamMember>> {
        let db = self.db.read().await;
        let mut members = Vec::new();
        for user_id in load_index(&db, &team_members_index(team_id))? {
            if let Some(member) = load(&db, &team_member_key(team_id, user_id))? {
                members.push(member);
            }
        }
        Ok(members)
    }

    pub async fn add_team_member(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember> {
        let db = self.db.write().await;
        let team: Team = load(&db, &team_key(team_id))?.ok_or_else(|| not_found("Team"))?;
        let mut user = require_user(&db, user_id)?;

        if db.contains_key(&team_member_key(team_id, user_id))? {
            return Err(WorkspaceError::AlreadyExists(
                "User is already a member of this team".into(),
            ));
        }
        if let Some(org_id) = team.organization_id {
            if user.organization_id != Some(org_id) {
                return Err(WorkspaceError::InvalidInput(
                    "User must be a member of the team's organization".into(),
                ));
            }
        }

        let member = TeamMember::new(team_id, user_id, role);
        store(&db, team_member_key(team_id, user_id), &member)?;
        index_insert(&db, &team_members_index(team_id), user_id)?;
        index_insert(&db, &user_teams_index(user_id), team_id)?;

        if user.team_id.is_none() {
            user.team_id = Some(team_id);
            put_user(&db, &mut user)?;
        }
        if role.is_leadership() {
            on_leadership_gained(&db, user_id)?;
        }
        Ok(member)
    }

    pub async fn set_team_member_role(
        &self,
        team_id: Uuid,
        user_id: Uuid,
        role: TeamRole,
    ) -> Result<TeamMember> {
        let db = self.db.write().await;
        let mut member: TeamMember = load(&db, &team_member_key(team_id, user_id))?
            .ok_or_else(|| not_found("Member"))?;
        let previous = member.role;
        member.role = role;
        store(&db, team_member_key(team_id, user_id), &member)?;

        match (previous.is_leadership(), role.is_leadership()) {
            (false, true) => on_leadership_gained(&db, user_id)?,
            (true, false) => on_leadership_lost(&db, user_id)?,
            _ => {}
        }
        Ok(member)
    }

    pub async fn remove_team_member(&self, team_id: Uuid, user_id: Uuid) -> Result<TeamMember> {
        let db = self.db.write().await;
        let team: Team = load(&db, &team_key(team_id))?.ok_or_else(|| not_found("Team"))?;
        if team.owner_id == user_id {
            return Err(WorkspaceError::InvalidInput("Cannot remove the team owner".into()));
        }
        let member =
            detach_team_member(&db, team_id, user_id)?.ok_or_else(|| not_found("Member"))?;
        unshare_where(&db, |owner, sharing| {
            owner == user_id && sharing.team_id() == Some(team_id)
        })?;
        Ok(member)
    }

    /// Swap OWNER to another member; the previous owner becomes LEADER
    pub async fn transfer_team_ownership(&self, team_id: Uuid, new_owner: Uuid) -> Result<Team> {
        let db = self.db.write().await;
        let mut team: Team = load(&db, &team_key(team_id))?.ok_or_else(|| not_found("Team"))?;
        let mut incoming: TeamMember = load(&db, &team_member_key(team_id, new_owner))?
            .ok_or_else(|| {
                WorkspaceError::InvalidInput("New owner must be a member of the team".into())
            })?;
        let mut outgoing: TeamMember = load(&db, &team_member_key(team_id, team.owner_id))?
            .ok_or_else(|| not_found("Owner membership"))?;

        outgoing.role = TeamRole::Leader;
        let gained = !incoming.role.is_leadership();
        incoming.role = TeamRole::Owner;
        store(&db, team_member_key(team_id, outgoing.user_id), &outgoing)?;
        store(&db, team_member_key(team_id, incoming.user_id), &incoming)?;
        if gained {
            on_leadership_gained(&db, new_owner)?;
        }

        team.owner_id = new_owner;
        team.updated_at = chrono::Utc::now();
        store(&db, team_key(team_id), &team)?;
        Ok(team)
    }

    // === CONTACT ===

    pub async fn create_contact(&self, contact: &Contact) -> Result<()> {
        let db = self.db.write().await;
        store(&db, contact_key(contact.id), contact)?;
        index_insert(&db, ALL_CONTACTS, contact.id)
    }

    pub async fn get_contact(&self, id: Uuid) -> Result<Option<Contact>> {
        let db = self.db.read().await;
        load(&db, &contact_key(id))
    }

    pub async fn list_contacts(&self) -> Result<Vec<Contact>> {
        let db = self.db.read().await;
        load_all(&db, ALL_CONTACTS, "contact")
    }

    pub async fn update_contact(&self, id: Uuid, changes: ContactChanges) -> Result<Contact> {
        let db = self.db.write().await;
        let mut contact: Contact =
            load(&db, &contact_key(id))?.ok_or_else(|| not_found("Contact"))?;
        let trim = |s: String| s.trim().to_string();
        replace_if_some(&mut contact.first_name, changes.first_name.map(trim));
        replace_if_some(&mut contact.last_name, changes.last_name.map(trim));
        replace_optional(&mut contact.email, changes.email);
        replace_optional(&mut contact.phone, changes.phone);
        replace_optional(&mut contact.company, changes.company);
        replace_optional(&mut contact.notes, changes.notes);
        contact.updated_at = chrono::Utc::now();
        store(&db, contact_key(id), &contact)?;
        Ok(contact)
    }

    pub async fn share_contact(&self, id: Uuid, sharing: Sharing) -> Result<Contact> {
        let db = self.db.write().await;
        let mut contact: Contact =
            load(&db, &contact_key(id))?.ok_or_else(|| not_found("Contact"))?;
        check_sharing(&db, contact.owner_id, &sharing)?;
        contact.sharing = sharing;
        contact.updated_at = chrono::Utc::now();
        store(&db, contact_key(id), &contact)?;
        Ok(contact)
    }

    pub async fn delete_contact(&self, id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        if !db.remove(&contact_key(id))? {
            return Err(not_found("Contact"));
        }
        index_remove(&db, ALL_CONTACTS, id)
    }

    // === DOCUMENT ===

    pub async fn create_document(&self, document: &Document) -> Result<()> {
        let db = self.db.write().await;
        store(&db, document_key(document.id), document)?;
        index_insert(&db, ALL_DOCUMENTS, document.id)
    }

    pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let db = self.db.read().await;
        load(&db, &document_key(id))
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let db = self.db.read().await;
        load_all(&db, ALL_DOCUMENTS, "document")
    }

    async fn modify_document<F>(&self, id: Uuid, change: F) -> Result<Document>
    where
        F: FnOnce(&RadDB, &mut Document) -> Result<()>,
    {
        let db = self.db.write().await;
        let mut document: Document =
            load(&db, &document_key(id))?.ok_or_else(|| not_found("Document"))?;
        change(&db, &mut document)?;
        document.updated_at = chrono::Utc::now();
        store(&db, document_key(id), &document)?;
        Ok(document)
    }

    pub async fn update_document(&self, id: Uuid, changes: DocumentChanges) -> Result<Document> {
        self.modify_document(id, |_, document| {
            replace_if_some(&mut document.title, changes.title.map(|t| t.trim().to_string()));
            replace_if_some(&mut document.content, changes.content);
            Ok(())
        })
        .await
    }

    pub async fn share_document(&self, id: Uuid, sharing: Sharing) -> Result<Document> {
        self.modify_document(id, |db, document| {
            check_sharing(db, document.owner_id, &sharing)?;
            document.sharing = sharing;
            Ok(())
        })
        .await
    }

    /// Replace the attachment and hand back the one it displaced
    pub async fn set_attachment(
        &self,
        id: Uuid,
        attachment: Attachment,
    ) -> Result<(Document, Option<Attachment>)> {
        let mut previous = None;
        let document = self
            .modify_document(id, |_, document| {
                previous = document.attachment.replace(attachment);
                Ok(())
            })
            .await?;
        Ok((document, previous))
    }

    /// Set or clear the public link, keeping the token index in step
    pub async fn set_share_token(&self, id: Uuid, token: Option<String>) -> Result<Document> {
        self.modify_document(id, |db, document| {
            if let Some(old) = &document.share_token {
                db.remove(&share_token_key(old))?;
            }
            if let Some(new) = &token {
                store(db, share_token_key(new), &id)?;
            }
            document.share_token = token;
            Ok(())
        })
        .await
    }

    pub async fn find_document_by_share_token(&self, token: &str) -> Result<Option<Document>> {
        let db = self.db.read().await;
        let id: Option<Uuid> = load(&db, &share_token_key(token))?;
        match id {
            Some(id) => load(&db, &document_key(id)),
            None => Ok(None),
        }
    }

    pub async fn delete_document(&self, id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        let document: Document =
            load(&db, &document_key(id))?.ok_or_else(|| not_found("Document"))?;
        if let Some(token) = &document.share_token {
            db.remove(&share_token_key(token))?;
        }
        db.remove(&document_key(id))?;
        index_remove(&db, ALL_DOCUMENTS, id)
    }

    // === FACILITY ===

    pub async fn create_facility(&self, facility: &Facility) -> Result<()> {
        let db = self.db.write().await;
        let key = facility.dedup_key();
        let existing = load_all::<Facility>(&db, ALL_FACILITIES, "facility")?;
        if existing.iter().any(|f| f.dedup_key() == key) {
            return Err(facility_conflict());
        }
        store(&db, facility_key(facility.id), facility)?;
        index_insert(&db, ALL_FACILITIES, facility.id)
    }

    pub async fn get_facility(&self, id: Uuid) -> Result<Option<Facility>> {
        let db = self.db.read().await;
        load(&db, &facility_key(id))
    }

    pub async fn list_facilities(&self) -> Result<Vec<Facility>> {
        let db = self.db.read().await;
        let mut facilities: Vec<Facility> = load_all(&db, ALL_FACILITIES, "facility")?;
        facilities.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(facilities)
    }

    pub async fn update_facility(&self, id: Uuid, changes: FacilityChanges) -> Result<Facility> {
        let db = self.db.write().await;
        let mut facility: Facility =
            load(&db, &facility_key(id))?.ok_or_else(|| not_found("Facility"))?;

        let trim = |s: String| s.trim().to_string();
        replace_if_some(&mut facility.name, changes.name.map(trim));
        replace_if_some(&mut facility.address, changes.address.map(trim));
        replace_optional(&mut facility.city, changes.city);
        replace_optional(&mut facility.state, changes.state);
        replace_optional(&mut facility.postal_code, changes.postal_code);
        replace_optional(&mut facility.country, changes.country);
        replace_optional(&mut facility.kind, changes.kind);
        replace_optional(&mut facility.phone, changes.phone);
        replace_optional(&mut facility.notes, changes.notes);

        let key = facility.dedup_key();
        let existing = load_all::<Facility>(&db, ALL_FACILITIES, "facility")?;
        if existing.iter().any(|f| f.id != id && f.dedup_key() == key) {
            return Err(facility_conflict());
        }
        facility.updated_at = chrono::Utc::now();
        store(&db, facility_key(id), &facility)?;
        Ok(facility)
    }

    pub async fn delete_facility(&self, id: Uuid) -> Result<()> {
        let db = self.db.write().await;
        if !db.remove(&facility_key(id))? {
            return Err(not_found("Facility"));
        }
        index_remove(&db, ALL_FACILITIES, id)
    }

    /// Insert `(row, facility)` pairs, skipping any whose name and address
    /// already exist in the store or earlier in the batch. The new records
    /// and the index land in one write.
    pub async fn import_facilities(&self, rows: Vec<(usize, Facility)>) -> Result<ImportSummary> {
        let db = self.db.write().await;
        let mut index = load_index(&db, ALL_FACILITIES)?;
        let mut seen: HashSet<String> = load_all::<Facility>(&db, ALL_FACILITIES, "facility")?
            .iter()
            .map(Facility::dedup_key)
            .collect();

        let mut summary = ImportSummary::default();
        let mut entries = Vec::new();
        for (row, facility) in rows {
            if !seen.insert(facility.dedup_key()) {
                summary.skipped.push(row);
                continue;
            }
            entries.push((facility_key(facility.id), encode(&facility)?));
            index.push(facility.id);
            summary.created.push(facility);
        }

        if !entries.is_empty() {
            entries.push((ALL_FACILITIES.to_string(), encode(&index)?));
            db.set_many(entries)?;
        }
        Ok(summary)
    }
}
