//! Sidebar filtering.
//!
//! An entry is shown when it needs no permission or the user holds at least
//! one of its codes. Until permissions are known, and after a failed fetch,
//! gated entries stay hidden.

use std::sync::Arc;

use crate::authz::{permissions, Principal};
use crate::services::permissions::PermissionSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMenuEntry {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuEntry {
    pub label: String,
    pub href: String,
    pub required: Vec<String>,
    pub children: Vec<SubMenuEntry>,
}

impl MenuEntry {
    pub fn new(label: &str, href: &str) -> Self {
        Self {
            label: label.to_string(),
            href: href.to_string(),
            required: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn requires<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn child(mut self, label: &str, href: &str) -> Self {
        self.children.push(SubMenuEntry {
            label: label.to_string(),
            href: href.to_string(),
        });
        self
    }

    pub fn is_gated(&self) -> bool {
        !self.required.is_empty()
    }

    /// Exact match on the entry or one of its children; prefixes never match.
    pub fn is_active(&self, pathname: &str) -> bool {
        self.href == pathname || self.children.iter().any(|c| c.href == pathname)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionState {
    Loading,
    Loaded(Principal),
    Failed,
}

impl PermissionState {
    fn allows(&self, entry: &MenuEntry) -> bool {
        if !entry.is_gated() {
            return true;
        }
        match self {
            PermissionState::Loaded(principal) => principal.has_any(&entry.required),
            PermissionState::Loading | PermissionState::Failed => false,
        }
    }
}

/// Visible subsequence of `entries`, order preserved.
pub fn visible_entries<'a>(entries: &'a [MenuEntry], state: &PermissionState) -> Vec<&'a MenuEntry> {
    entries.iter().filter(|entry| state.allows(entry)).collect()
}

pub fn erp_menu() -> Vec<MenuEntry> {
    use permissions::*;

    vec![
        MenuEntry::new("Inicio", "/"),
        MenuEntry::new("Dashboard", "/dashboard").requires([DASHBOARD_VIEW]),
        MenuEntry::new("Cuentas por cobrar", "/cuentas-cobrar")
            .requires([RECEIVABLES_VIEW, RECEIVABLES_CREATE])
            .child("Registro", "/cuentas-cobrar")
            .child("Nueva cuenta", "/cuentas-cobrar/nueva"),
        MenuEntry::new("Cuentas por pagar", "/cuentas-pagar")
            .requires([PAYABLES_VIEW, PAYABLES_CREATE])
            .child("Registro", "/cuentas-pagar")
            .child("Nueva cuenta", "/cuentas-pagar/nueva"),
        MenuEntry::new("Clientes", "/clientes").requires([CLIENTS_VIEW]),
        MenuEntry::new("Proveedores", "/proveedores").requires([SUPPLIERS_VIEW]),
        MenuEntry::new("Reportes", "/reportes").requires([REPORTS_VIEW]),
        MenuEntry::new("Administración", "/usuarios")
            .requires([USERS_VIEW, ROLES_VIEW, PERMISSIONS_VIEW])
            .child("Usuarios", "/usuarios")
            .child("Roles", "/roles")
            .child("Permisos", "/permisos"),
        MenuEntry::new("Mi perfil", "/perfil"),
    ]
}

/// Sidebar component: a fixed menu plus the permission state it is filtered by.
pub struct Sidebar {
    entries: Vec<MenuEntry>,
    state: PermissionState,
}

impl Sidebar {
    pub fn new(entries: Vec<MenuEntry>) -> Self {
        Self {
            entries,
            state: PermissionState::Loading,
        }
    }

    pub fn state(&self) -> &PermissionState {
        &self.state
    }

    pub async fn load(&mut self, source: &Arc<dyn PermissionSource>) -> &PermissionState {
        self.state = match source.my_permission_codes().await {
            Ok(codes) => PermissionState::Loaded(Principal::from_codes(codes)),
            Err(err) => {
                tracing::warn!(error = %err, "sidebar permissions unavailable");
                PermissionState::Failed
            }
        };
        &self.state
    }

    pub fn visible(&self) -> Vec<&MenuEntry> {
        visible_entries(&self.entries, &self.state)
    }

    pub fn active(&self, pathname: &str) -> Option<&MenuEntry> {
        self.visible().into_iter().find(|entry| entry.is_active(pathname))
    }
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new(erp_menu())
    }
}
