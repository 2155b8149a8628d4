//! # Member Module
//!
//! Members of the cooperative and the roles they hold.
//! - Member: saves, borrows, guarantees other members' loans
//! - Secretary: records loans, repayments and transactions on behalf of members
//! - Treasurer: approves transactions, loans and repayments
//! - Admin: manages membership, can do everything

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role held by a member. One role per member, stored in a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Secretary,
    Treasurer,
    Admin,
}

/// Things a caller may be allowed to do, independent of record ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    RecordTransaction,
    ApproveTransaction,
    RecordLoan,
    DecideLoan,
    RecordRepayment,
    ApproveRepayment,
    ManageMembers,
    ViewAllRecords,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Secretary => "secretary",
            Role::Treasurer => "treasurer",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "member" => Some(Role::Member),
            "secretary" => Some(Role::Secretary),
            "treasurer" => Some(Role::Treasurer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Capability lookup, the only place roles are interpreted
    pub fn can(&self, capability: Capability) -> bool {
        use Capability::*;
        match self {
            Role::Member => false,
            Role::Secretary => matches!(
                capability,
                RecordTransaction | RecordLoan | RecordRepayment | ViewAllRecords
            ),
            Role::Treasurer => matches!(
                capability,
                RecordTransaction
                    | ApproveTransaction
                    | DecideLoan
                    | ApproveRepayment
                    | ViewAllRecords
            ),
            Role::Admin => true,
        }
    }

    /// Treasurer and secretary sign off on loans, so they cannot guarantee one
    pub fn is_restricted_guarantor(&self) -> bool {
        matches!(self, Role::Treasurer | Role::Secretary)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Membership status. Registration creates a pending member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Active,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Pending => "pending",
            MemberStatus::Active => "active",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(MemberStatus::Pending),
            "active" => Some(MemberStatus::Active),
            _ => None,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    /// Local 10-digit number, also the login name
    pub phone_number: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl NewMember {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = Vec::new();

        if self.first_name.trim().is_empty() {
            errors.push("first name is required".to_string());
        }
        if self.last_name.trim().is_empty() {
            errors.push("last name is required".to_string());
        }
        if self.first_name.chars().count() > 30 || self.last_name.chars().count() > 30 {
            errors.push("names are limited to 30 characters".to_string());
        }
        if self.phone_number.len() != 10 || !self.phone_number.chars().all(|c| c.is_ascii_digit())
        {
            errors.push(format!(
                "phone number must be 10 digits: {}",
                self.phone_number
            ));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                errors.push(format!("invalid email: {}", email));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::validation(errors.join("; ")))
        }
    }
}

/// A cooperative member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Role,
    pub status: MemberStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Member {
    /// Pending member from a validated registration
    pub fn register(new_member: NewMember, now: DateTime<Utc>) -> CoreResult<Self> {
        new_member.validate()?;

        Ok(Self {
            id: Self::generate_id(),
            first_name: new_member.first_name.trim().to_string(),
            last_name: new_member.last_name.trim().to_string(),
            phone_number: new_member.phone_number,
            email: new_member.email,
            date_of_birth: new_member.date_of_birth,
            role: Role::Member,
            status: MemberStatus::Pending,
            created_at: now,
            approved_at: None,
        })
    }

    /// 12 character id
    pub fn generate_id() -> String {
        uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != MemberStatus::Pending {
            return Err(CoreError::already_processed("Member", self.status.as_str()));
        }
        self.status = MemberStatus::Active;
        self.approved_at = Some(now);
        Ok(())
    }

    /// Only pending registrations can be turned down
    pub fn ensure_rejectable(&self) -> CoreResult<()> {
        if self.status != MemberStatus::Pending {
            return Err(CoreError::already_processed("Member", self.status.as_str()));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn actor(&self) -> Actor {
        Actor::new(&self.id, self.role)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} ({})", self.first_name, self.phone_number, self.role)
    }
}

/// Authenticated caller, supplied by the request layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub member_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(member_id: &str, role: Role) -> Self {
        Self {
            member_id: member_id.to_string(),
            role,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    pub fn require(&self, capability: Capability) -> CoreResult<()> {
        if self.can(capability) {
            Ok(())
        } else {
            Err(CoreError::forbidden(format!(
                "{} ({}) lacks {:?}",
                self.member_id, self.role, capability
            )))
        }
    }

    /// Either the record belongs to the caller or the caller holds `capability`
    pub fn require_self_or(&self, member_id: &str, capability: Capability) -> CoreResult<()> {
        if self.member_id == member_id {
            return Ok(());
        }
        self.require(capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice_registration() -> NewMember {
        NewMember {
            first_name: "Alice".to_string(),
            last_name: "Wanjiku".to_string(),
            phone_number: "0712345678".to_string(),
            email: Some("alice@example.com".to_string()),
            date_of_birth: None,
        }
    }

    #[test]
    fn test_role_str() {
        assert_eq!(Role::Treasurer.as_str(), "treasurer");
        assert_eq!(Role::from_str("SECRETARY"), Some(Role::Secretary));
        assert_eq!(Role::from_str("chairman"), None);
    }

    #[test]
    fn test_role_capabilities() {
        assert!(!Role::Member.can(Capability::RecordTransaction));
        assert!(Role::Secretary.can(Capability::RecordRepayment));
        assert!(!Role::Secretary.can(Capability::ApproveRepayment));
        assert!(Role::Treasurer.can(Capability::DecideLoan));
        assert!(!Role::Treasurer.can(Capability::ManageMembers));
        assert!(Role::Admin.can(Capability::ManageMembers));
        assert!(Role::Admin.can(Capability::ApproveTransaction));
    }

    #[test]
    fn test_restricted_guarantors() {
        assert!(Role::Treasurer.is_restricted_guarantor());
        assert!(Role::Secretary.is_restricted_guarantor());
        assert!(!Role::Member.is_restricted_guarantor());
        assert!(!Role::Admin.is_restricted_guarantor());
    }

    #[test]
    fn test_register_creates_pending_member() {
        let member = Member::register(alice_registration(), Utc::now()).unwrap();

        assert_eq!(member.id.len(), 12);
        assert_eq!(member.role, Role::Member);
        assert_eq!(member.status, MemberStatus::Pending);
        assert!(!member.is_active());
    }

    #[test]
    fn test_register_validation() {
        let mut registration = alice_registration();
        registration.phone_number = "07123".to_string();
        registration.first_name = "  ".to_string();

        let err = Member::register(registration, Utc::now()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("first name is required"));
        assert!(message.contains("phone number must be 10 digits"));
    }

    #[test]
    fn test_approve_once() {
        let mut member = Member::register(alice_registration(), Utc::now()).unwrap();

        member.approve(Utc::now()).unwrap();
        assert!(member.is_active());
        assert!(member.approved_at.is_some());

        assert!(member.approve(Utc::now()).unwrap_err().is_already_processed());
        assert!(member.ensure_rejectable().is_err());
    }

    #[test]
    fn test_actor_require() {
        let secretary = Actor::new("SEC", Role::Secretary);
        assert!(secretary.require(Capability::RecordLoan).is_ok());
        assert!(matches!(
            secretary.require(Capability::DecideLoan),
            Err(CoreError::Forbidden(_))
        ));

        let member = Actor::new("M1", Role::Member);
        assert!(member.require_self_or("M1", Capability::RecordLoan).is_ok());
        assert!(member.require_self_or("M2", Capability::RecordLoan).is_err());
    }
}
