use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;
use crate::repos::account_repo::{Account, Role};

#[derive(Debug, thiserror::Error)]
pub enum RoleGateError {
    #[error("role gate needs at least one allowed role")]
    EmptyAllowSet,
}

/// Route-level allow-set of roles. Pure check, no I/O.
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Vec<Role>,
}

impl RoleGate {
    pub fn new(allowed: &[Role]) -> Result<Self, RoleGateError> {
        if allowed.is_empty() {
            return Err(RoleGateError::EmptyAllowSet);
        }
        Ok(Self {
            allowed: allowed.to_vec(),
        })
    }

    pub fn allows(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    pub fn check<'a>(&self, ctx: Option<&'a AuthCtx>) -> Result<&'a Account, AppError> {
        // Only reachable when the identity layer was not applied to the route.
        let ctx = ctx.ok_or(AppError::Unauthenticated)?;

        let role = ctx.account.role;
        if !self.allows(role) {
            tracing::warn!(
                user_id = %ctx.user_id(),
                role = %role,
                allowed = ?self.allowed,
                "role not permitted"
            );
            return Err(AppError::RoleForbidden { role });
        }

        Ok(&ctx.account)
    }
}
