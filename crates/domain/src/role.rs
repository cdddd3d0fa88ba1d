use std::fmt::{Display, Formatter};

/// Access role carried in token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Full access, including tenant management.
    Admin,
    /// Can create audit logs and read the caller's tenant data.
    User,
    /// Read-only access plus lifecycle scheduling.
    Auditor,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Auditor => "auditor",
        }
    }

    /// Whether `roles` contains this role.
    #[must_use]
    pub fn granted_by(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| role == self.as_str())
    }

    /// Whether `roles` contains any of `required`.
    #[must_use]
    pub fn any_granted_by(roles: &[String], required: &[Role]) -> bool {
        required.iter().any(|role| role.granted_by(roles))
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}
