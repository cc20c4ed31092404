//! Organization invites and membership roles.

use uuid::Uuid;

/// Invite row looked up by its token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invite {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub invited_email: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

impl Invite {
    fn status_is(&self, expected: &str) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(expected))
    }

    pub fn is_pending(&self) -> bool {
        self.status_is("pending")
    }

    pub fn is_accepted(&self) -> bool {
        self.status_is("accepted")
    }

    /// Case-insensitive comparison with the invited address, Unicode aware.
    pub fn is_addressed_to(&self, email: &str) -> bool {
        let invited = self.invited_email.as_deref().unwrap_or_default();
        invited.trim().to_lowercase() == email.trim().to_lowercase()
    }
}

/// Role of a user inside an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRole {
    Owner,
    Admin,
    User,
}

impl MemberRole {
    /// Anything that is not owner or admin is a plain user.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "owner" => MemberRole::Owner,
            "admin" => MemberRole::Admin,
            _ => MemberRole::User,
        }
    }

    /// Owners and admins may invite and are notified about accepted invites.
    pub fn manages_team(self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}
