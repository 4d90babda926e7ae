use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::client::ApiClient;
use crate::errors::ClientResult;
use crate::models::rbac::{Permission, Role, UpdateRolePermissionsRequest};

/// Backend operations the permission matrix needs.
#[async_trait]
pub trait RoleAdmin: Send + Sync {
    async fn list_permissions(&self) -> ClientResult<Vec<Permission>>;
    async fn list_roles(&self) -> ClientResult<Vec<Role>>;
    /// Replaces the role's whole permission set.
    async fn set_role_permissions(&self, role_id: Uuid, codes: &[String]) -> ClientResult<Role>;
}

pub struct RoleService {
    client: Arc<ApiClient>,
}

impl RoleService {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RoleAdmin for RoleService {
    async fn list_permissions(&self) -> ClientResult<Vec<Permission>> {
        self.client.get("rbac/permissions").await
    }

    async fn list_roles(&self) -> ClientResult<Vec<Role>> {
        self.client.get("rbac/roles").await
    }

    async fn set_role_permissions(&self, role_id: Uuid, codes: &[String]) -> ClientResult<Role> {
        let path = format!("rbac/roles/{role_id}/permissions");
        let role: Role = self
            .client
            .post(
                &path,
                &UpdateRolePermissionsRequest {
                    permission_codes: codes.to_vec(),
                },
            )
            .await?;

        tracing::info!(role = %role.name, count = codes.len(), "role permissions replaced");
        Ok(role)
    }
}
