//! Entitlement check for automated execution.

use crate::domain::gateway::Session;

pub trait EntitlementPort: Send + Sync {
    fn is_automated_execution_allowed(&self, session: &Session) -> bool;
}
