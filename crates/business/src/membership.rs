//! Membership operations - registration, approval, roles

use crate::error::BusinessResult;
use crate::services::ServiceContext;
use chrono::Utc;
use sacco_core::{Account, Actor, Capability, CoreError, Member, MemberStatus, NewMember, Role};
use sacco_persistence::{AccountRepo, LoanRepo, MemberRepo};
use tracing::{debug, info, warn};

/// Membership Service - register, approve, reject, assign roles
pub struct MembershipService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MembershipService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Creates a pending member together with an empty savings account
    pub async fn register(&self, new_member: NewMember) -> BusinessResult<Member> {
        let member = Member::register(new_member, Utc::now())?;

        let mut db = self.ctx.begin_write().await?;

        if MemberRepo::find_by_phone(&mut db, &member.phone_number)
            .await?
            .is_some()
        {
            warn!(phone = %member.phone_number, "Registration refused: phone already registered");
            return Err(CoreError::validation(format!(
                "phone number already registered: {}",
                member.phone_number
            ))
            .into());
        }

        MemberRepo::insert(&mut db, &member).await?;
        AccountRepo::insert(&mut db, &Account::open(&member.id, member.created_at)).await?;
        db.commit().await?;

        info!(member_id = %member.id, "Member registered");
        Ok(member)
    }

    /// Registers the first administrator, already active.
    ///
    /// Refused once any admin exists; from then on roles are assigned
    /// through [`MembershipService::assign_role`].
    pub async fn bootstrap_admin(&self, new_member: NewMember) -> BusinessResult<Member> {
        let now = Utc::now();
        let mut member = Member::register(new_member, now)?;
        member.role = Role::Admin;
        member.approve(now)?;

        let mut db = self.ctx.begin_write().await?;
        if MemberRepo::count_with_role(&mut db, Role::Admin).await? > 0 {
            warn!("Admin bootstrap refused: an admin already exists");
            return Err(CoreError::invalid_state("Member", Role::Admin.as_str(), "bootstrap").into());
        }
        if MemberRepo::find_by_phone(&mut db, &member.phone_number)
            .await?
            .is_some()
        {
            return Err(CoreError::validation(format!(
                "phone number already registered: {}",
                member.phone_number
            ))
            .into());
        }

        MemberRepo::insert(&mut db, &member).await?;
        AccountRepo::insert(&mut db, &Account::open(&member.id, now)).await?;
        db.commit().await?;

        info!(member_id = %member.id, "Administrator bootstrapped");
        Ok(member)
    }

    pub async fn approve(&self, actor: &Actor, member_id: &str) -> BusinessResult<Member> {
        actor.require(Capability::ManageMembers)?;

        let mut db = self.ctx.begin_write().await?;
        let mut member = MemberRepo::get_by_id(&mut db, member_id).await?;
        member.approve(Utc::now())?;

        let approved_at = member.approved_at.unwrap_or_else(Utc::now);
        if !MemberRepo::approve(&mut db, member_id, approved_at).await? {
            return Err(CoreError::already_processed("Member", MemberStatus::Active.as_str()).into());
        }
        db.commit().await?;

        info!(member_id, approved_by = %actor.member_id, "Member approved");
        Ok(member)
    }

    /// Turns down a pending registration, removing the member and account
    pub async fn reject(&self, actor: &Actor, member_id: &str) -> BusinessResult<Member> {
        actor.require(Capability::ManageMembers)?;

        let mut db = self.ctx.begin_write().await?;
        let member = MemberRepo::get_by_id(&mut db, member_id).await?;
        member.ensure_rejectable()?;

        let account = AccountRepo::get(&mut db, member_id).await?;
        if !account.balance().is_zero() {
            warn!(member_id, balance = %account.balance(), "Rejection refused: account not empty");
            return Err(CoreError::invalid_state(
                "Member",
                member.status.as_str(),
                "reject member with savings",
            )
            .into());
        }
        if LoanRepo::count_involving(&mut db, member_id).await? > 0 {
            warn!(member_id, "Rejection refused: member appears on loans");
            return Err(CoreError::invalid_state(
                "Member",
                member.status.as_str(),
                "reject member referenced by loans",
            )
            .into());
        }

        if !MemberRepo::delete_pending(&mut db, member_id).await? {
            return Err(CoreError::already_processed("Member", MemberStatus::Active.as_str()).into());
        }
        db.commit().await?;

        info!(member_id, rejected_by = %actor.member_id, "Member registration rejected");
        Ok(member)
    }

    pub async fn assign_role(
        &self,
        actor: &Actor,
        member_id: &str,
        role: Role,
    ) -> BusinessResult<Member> {
        actor.require(Capability::ManageMembers)?;

        let mut db = self.ctx.begin_write().await?;
        MemberRepo::update_role(&mut db, member_id, role).await?;
        let member = MemberRepo::get_by_id(&mut db, member_id).await?;
        db.commit().await?;

        info!(member_id, role = %role, assigned_by = %actor.member_id, "Role assigned");
        Ok(member)
    }

    pub async fn list_pending(&self, actor: &Actor) -> BusinessResult<Vec<Member>> {
        actor.require(Capability::ManageMembers)?;
        let mut conn = self.ctx.pool().acquire().await?;
        let members = MemberRepo::list_by_status(&mut conn, MemberStatus::Pending).await?;
        debug!(count = members.len(), "Listed pending members");
        Ok(members)
    }

    pub async fn get(&self, member_id: &str) -> BusinessResult<Member> {
        let mut conn = self.ctx.pool().acquire().await?;
        Ok(MemberRepo::get_by_id(&mut conn, member_id).await?)
    }

    pub async fn find_by_phone(&self, phone_number: &str) -> BusinessResult<Member> {
        let mut conn = self.ctx.pool().acquire().await?;
        MemberRepo::find_by_phone(&mut conn, phone_number)
            .await?
            .ok_or_else(|| CoreError::not_found("Member", phone_number).into())
    }
}
