//! Role × permission matrix editor.
//!
//! Toggling a cell sends the role's complete replacement code set. Only one
//! toggle may be in flight across the whole matrix; while it runs every cell
//! is disabled. After a successful write the role list is reloaded from the
//! backend instead of being patched locally.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::errors::ClientResult;
use crate::models::rbac::{Permission, PermissionCode, Role};
use crate::services::permissions::Invalidate;
use crate::services::roles::RoleAdmin;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroup {
    pub resource: String,
    /// Sorted by action, then code
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleGroup {
    pub module: String,
    pub resources: Vec<ResourceGroup>,
}

/// Groups by module, then resource, then action, all in lexicographic order.
pub fn group_permissions(permissions: &[Permission]) -> Vec<ModuleGroup> {
    let mut tree: BTreeMap<&str, BTreeMap<&str, Vec<&Permission>>> = BTreeMap::new();
    for permission in permissions {
        tree.entry(permission.module.as_str())
            .or_default()
            .entry(permission.resource.as_str())
            .or_default()
            .push(permission);
    }

    tree.into_iter()
        .map(|(module, resources)| ModuleGroup {
            module: module.to_string(),
            resources: resources
                .into_iter()
                .map(|(resource, mut perms)| {
                    perms.sort_by(|a, b| a.action.cmp(&b.action).then_with(|| a.code.cmp(&b.code)));
                    ResourceGroup {
                        resource: resource.to_string(),
                        permissions: perms.into_iter().cloned().collect(),
                    }
                })
                .collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Written and reloaded
    Saved,
    /// Written, but the reload failed; the last loaded roles are still shown
    SavedNotReloaded,
    /// Another toggle is in flight
    Busy,
    /// The role cannot be edited from the client
    Immutable,
    UnknownRole,
    UnknownPermission,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCell {
    pub role_id: Uuid,
    pub code: String,
}

#[derive(Debug, Default)]
struct MatrixState {
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    pending: Option<PendingCell>,
    error: Option<String>,
}

pub struct MatrixEditor {
    admin: Arc<dyn RoleAdmin>,
    cache: Option<Arc<dyn Invalidate>>,
    state: Mutex<MatrixState>,
}

impl MatrixEditor {
    pub fn new(admin: Arc<dyn RoleAdmin>) -> Self {
        Self {
            admin,
            cache: None,
            state: Mutex::new(MatrixState::default()),
        }
    }

    /// Permission cache to drop after every successful write.
    pub fn with_cache(mut self, cache: Arc<dyn Invalidate>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MatrixState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn load(&self) -> ClientResult<()> {
        let loaded = tokio::try_join!(self.admin.list_permissions(), self.admin.list_roles());

        let mut state = self.lock();
        match loaded {
            Ok((permissions, roles)) => {
                state.permissions = permissions;
                state.roles = roles;
                state.error = None;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to load permission matrix");
                state.error = Some("No se pudieron cargar los roles y permisos".to_string());
                Err(err)
            }
        }
    }

    pub fn roles(&self) -> Vec<Role> {
        self.lock().roles.clone()
    }

    pub fn groups(&self) -> Vec<ModuleGroup> {
        group_permissions(&self.lock().permissions)
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn pending(&self) -> Option<PendingCell> {
        self.lock().pending.clone()
    }

    pub fn is_granted(&self, role_id: Uuid, code: &str) -> bool {
        self.lock()
            .roles
            .iter()
            .find(|role| role.id == role_id)
            .map(|role| role.grants(code))
            .unwrap_or(false)
    }

    pub fn is_cell_enabled(&self, role_id: Uuid) -> bool {
        let state = self.lock();
        state.pending.is_none()
            && state
                .roles
                .iter()
                .any(|role| role.id == role_id && !role.is_immutable())
    }

    pub async fn toggle(&self, role_id: Uuid, code: &str) -> ToggleOutcome {
        let codes = {
            let mut state = self.lock();
            let Some(role) = state.roles.iter().find(|role| role.id == role_id) else {
                return ToggleOutcome::UnknownRole;
            };
            if role.is_immutable() {
                return ToggleOutcome::Immutable;
            }
            if state.pending.is_some() {
                return ToggleOutcome::Busy;
            }
            // Codes already on the role are sent back as the backend stored them.
            if PermissionCode::parse(code).is_err() || !state.permissions.iter().any(|p| p.code == code) {
                return ToggleOutcome::UnknownPermission;
            }

            let codes = role.toggled_permissions(code);
            state.pending = Some(PendingCell {
                role_id,
                code: code.to_string(),
            });
            state.error = None;
            codes
        };

        let outcome = match self.admin.set_role_permissions(role_id, &codes).await {
            Ok(_) => {
                if let Some(cache) = &self.cache {
                    cache.invalidate();
                }
                match self.admin.list_roles().await {
                    Ok(roles) => {
                        self.lock().roles = roles;
                        ToggleOutcome::Saved
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "role reload failed after update");
                        self.lock().error =
                            Some("Los permisos se guardaron, pero no se pudo recargar la lista de roles".to_string());
                        ToggleOutcome::SavedNotReloaded
                    }
                }
            }
            Err(err) => {
                tracing::warn!(role_id = %role_id, code = %code, error = %err, "role permission update failed");
                self.lock().error = Some(format!("No se pudo actualizar el permiso {code}"));
                ToggleOutcome::Failed
            }
        };

        self.lock().pending = None;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permission(module: &str, resource: &str, action: &str) -> Permission {
        Permission {
            id: Uuid::new_v4(),
            name: format!("{module} {resource} {action}"),
            code: format!("{module}.{resource}.{action}"),
            description: None,
            module: module.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }

    #[test]
    fn groups_are_sorted_at_every_level() {
        let catalog = vec![
            permission("usuarios", "usuarios", "ver"),
            permission("clientes", "clientes", "ver"),
            permission("usuarios", "roles", "editar"),
            permission("clientes", "clientes", "crear"),
            permission("usuarios", "roles", "ver"),
        ];

        let groups = group_permissions(&catalog);
        let modules: Vec<&str> = groups.iter().map(|g| g.module.as_str()).collect();
        assert_eq!(modules, vec!["clientes", "usuarios"]);

        let usuarios = &groups[1];
        let resources: Vec<&str> = usuarios.resources.iter().map(|r| r.resource.as_str()).collect();
        assert_eq!(resources, vec!["roles", "usuarios"]);

        let actions: Vec<&str> = groups[0].resources[0]
            .permissions
            .iter()
            .map(|p| p.action.as_str())
            .collect();
        assert_eq!(actions, vec!["crear", "ver"]);
    }

    #[test]
    fn grouping_ignores_input_order() {
        let mut catalog = vec![
            permission("b", "x", "ver"),
            permission("a", "y", "ver"),
            permission("a", "x", "editar"),
        ];
        let first = group_permissions(&catalog);
        catalog.reverse();
        assert_eq!(first, group_permissions(&catalog));
    }
}
