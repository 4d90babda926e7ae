//! Authorization module - client-side route gating
//!
//! This module decides what the current session may see:
//! - Static route-permission table (first match wins on redirect)
//! - Pure access evaluation against held permission codes
//! - Route guard state machine with fail-closed error handling
//!
//! Every decision here is advisory: the backend enforces the same rules.

mod evaluator;
pub mod guard;
mod principal;

pub use evaluator::{evaluate, AccessDecision};
pub use guard::{GuardState, ProtectedRoute, RouteGuard};
pub use principal::Principal;

/// Well-known role names
pub mod roles {
    pub const SUPER_ADMIN: &str = "super_admin";
}

/// Well-known permission codes
pub mod permissions {
    // Reporting
    pub const DASHBOARD_VIEW: &str = "reportes.dashboard.ver";
    pub const REPORTS_VIEW: &str = "reportes.reportes.ver";

    // Accounts receivable / payable
    pub const RECEIVABLES_VIEW: &str = "cuentas_cobrar.registro.ver";
    pub const RECEIVABLES_CREATE: &str = "cuentas_cobrar.registro.crear";
    pub const PAYABLES_VIEW: &str = "cuentas_pagar.registro.ver";
    pub const PAYABLES_CREATE: &str = "cuentas_pagar.registro.crear";

    // Counterparties
    pub const CLIENTS_VIEW: &str = "clientes.clientes.ver";
    pub const SUPPLIERS_VIEW: &str = "proveedores.proveedores.ver";

    // Administration
    pub const USERS_VIEW: &str = "usuarios.usuarios.ver";
    pub const ROLES_VIEW: &str = "usuarios.roles.ver";
    pub const ROLES_EDIT: &str = "usuarios.roles.editar";
    pub const PERMISSIONS_VIEW: &str = "usuarios.permisos.ver";
}

/// One row of the route-permission table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub path: String,
    pub required: Vec<String>,
}

/// Ordered table of top-level routes and the codes that open them.
/// A route that is not listed is unprotected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePermissionMap {
    rules: Vec<RouteRule>,
}

impl RoutePermissionMap {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn route<I, S>(mut self, path: &str, required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(RouteRule {
            path: path.to_string(),
            required: required.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn required_for(&self, path: &str) -> Option<&[String]> {
        self.rules
            .iter()
            .find(|rule| rule.path == path)
            .map(|rule| rule.required.as_slice())
    }

    /// First route, in table order, that the principal can open.
    pub fn first_reachable(&self, principal: &Principal) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| principal.has_any(&rule.required))
            .map(|rule| rule.path.as_str())
    }

    /// Like [`first_reachable`](Self::first_reachable) but never returns `current`,
    /// so a page whose requirements disagree with the table cannot redirect to itself.
    pub fn first_reachable_except(&self, principal: &Principal, current: &str) -> Option<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.path != current)
            .find(|rule| principal.has_any(&rule.required))
            .map(|rule| rule.path.as_str())
    }

    /// Routes the ERP ships with.
    pub fn erp_default() -> Self {
        use permissions::*;

        Self::new()
            .route("/dashboard", [DASHBOARD_VIEW])
            .route("/cuentas-cobrar", [RECEIVABLES_VIEW])
            .route("/cuentas-pagar", [PAYABLES_VIEW])
            .route("/clientes", [CLIENTS_VIEW])
            .route("/proveedores", [SUPPLIERS_VIEW])
            .route("/reportes", [REPORTS_VIEW])
            .route("/usuarios", [USERS_VIEW])
            .route("/roles", [ROLES_VIEW])
            .route("/permisos", [PERMISSIONS_VIEW, ROLES_EDIT])
    }
}

impl Default for RoutePermissionMap {
    fn default() -> Self {
        Self::erp_default()
    }
}

pub const NO_PERMISSIONS_MESSAGE: &str =
    "No tienes permisos para acceder a ningún módulo. Contacta al administrador.";

/// Login location used when the session has no reachable module left.
pub fn no_permissions_location() -> String {
    // Any absolute base works; only the path and query are kept.
    let url = reqwest::Url::parse_with_params(
        "http://app.invalid/login",
        &[("error", "no_permissions"), ("message", NO_PERMISSIONS_MESSAGE)],
    );
    match url {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => "/login?error=no_permissions".to_string(),
    }
}
