use async_trait::async_trait;

use crate::domain::user::{Role, User};
use crate::error::AppResult;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users holding `role`, in storage order.
    async fn users_with_role(&self, role: Role) -> AppResult<Vec<User>>;
}
