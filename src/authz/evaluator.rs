use super::principal::Principal;
use super::RoutePermissionMap;
use crate::navigator::HOME_PATH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Required and held codes overlap
    Grant,
    /// Not allowed here, but the session can still reach another page
    Redirect(String),
    /// No route is reachable; the session must end
    Deny,
    /// The session itself is gone or expired
    Unauthenticated,
}

/// Evaluation order:
/// 1. any required code held -> grant
/// 2. first reachable route in table order, other than `pathname` -> redirect
/// 3. `pathname` itself is the only reachable route -> redirect home
/// 4. deny
pub fn evaluate(
    pathname: &str,
    required: &[String],
    principal: &Principal,
    routes: &RoutePermissionMap,
) -> AccessDecision {
    if principal.has_any(required) {
        tracing::debug!(required = ?required, "required permission held");
        return AccessDecision::Grant;
    }

    if let Some(path) = routes.first_reachable_except(principal, pathname) {
        tracing::debug!(required = ?required, redirect = %path, "redirecting to reachable route");
        return AccessDecision::Redirect(path.to_string());
    }

    // The module is open but this page needs more; stay logged in.
    if routes.first_reachable(principal).is_some() {
        tracing::debug!(required = ?required, redirect = HOME_PATH, "only the current route is reachable");
        return AccessDecision::Redirect(HOME_PATH.to_string());
    }

    tracing::debug!(required = ?required, "no reachable route");
    AccessDecision::Deny
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn grant_iff_overlap() {
        let universe = ["a.a.ver", "b.b.ver", "c.c.ver"];
        let routes = RoutePermissionMap::new();

        // every subset of held x every subset of required
        for held_mask in 0u8..8 {
            for req_mask in 0u8..8 {
                let held: Vec<&str> = (0..3).filter(|i| held_mask & (1 << i) != 0).map(|i| universe[i]).collect();
                let required: Vec<&str> = (0..3).filter(|i| req_mask & (1 << i) != 0).map(|i| universe[i]).collect();
                let principal = Principal::from_codes(held.iter().copied());
                let decision = evaluate("/", &codes(&required), &principal, &routes);
                let overlap = held_mask & req_mask != 0;
                assert_eq!(decision == AccessDecision::Grant, overlap, "held={held:?} required={required:?}");
            }
        }
    }

    #[test]
    fn redirects_to_first_reachable_route() {
        let routes = RoutePermissionMap::new()
            .route("/cuentas-cobrar", ["cuentas_cobrar.registro.ver"])
            .route("/usuarios", ["usuarios.usuarios.ver"]);
        let principal = Principal::from_codes(["cuentas_cobrar.registro.ver"]);

        let decision = evaluate("/usuarios", &codes(&["usuarios.usuarios.ver"]), &principal, &routes);
        assert_eq!(decision, AccessDecision::Redirect("/cuentas-cobrar".to_string()));
    }

    #[test]
    fn denies_when_nothing_is_reachable() {
        let routes = RoutePermissionMap::erp_default();
        let decision = evaluate("/usuarios", &codes(&["usuarios.usuarios.ver"]), &Principal::default(), &routes);
        assert_eq!(decision, AccessDecision::Deny);
    }

    #[test]
    fn current_route_as_only_reachable_goes_home() {
        let routes = RoutePermissionMap::erp_default();
        let principal = Principal::from_codes(["reportes.dashboard.ver"]);

        let decision = evaluate("/dashboard", &codes(&["reportes.dashboard.editar"]), &principal, &routes);
        assert_eq!(decision, AccessDecision::Redirect("/".to_string()));
    }

    #[test]
    fn empty_requirement_is_never_granted_by_overlap() {
        let routes = RoutePermissionMap::new();
        let principal = Principal::from_codes(["a.a.ver"]);
        assert_eq!(evaluate("/", &[], &principal, &routes), AccessDecision::Deny);
    }
}
