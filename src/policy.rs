//! Route and feature access policy.
//!
//! Pure functions over static tables. Decisions here gate what the UI
//! renders; they are not a security boundary — the backend enforces its
//! own authorization on every request.

use crate::models::UserRole;

/// Access requirement attached to a route or feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    /// Open to everyone, signed in or not
    Public,

    /// Requires at least the given role
    MinRole(UserRole),

    /// Requires the role to be literally in the set, hierarchy ignored
    Roles(&'static [UserRole]),
}

/// A route pattern and its requirement.
///
/// Patterns support `[param]` segments and `*` wildcards; a trailing `*`
/// matches any remaining depth.
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub pattern: &'static str,
    pub rule: AccessRule,
}

const LOGIN_ROUTE: &str = "/login";
const DASHBOARD_ROUTE: &str = "/dashboard";

/// The site's route policy table, checked in order after exact matches.
pub const ROUTE_RULES: &[RouteRule] = &[
    RouteRule { pattern: "/", rule: AccessRule::Public },
    RouteRule { pattern: "/about", rule: AccessRule::Public },
    RouteRule { pattern: "/pricing", rule: AccessRule::Public },
    RouteRule { pattern: "/security", rule: AccessRule::Public },
    RouteRule { pattern: "/login", rule: AccessRule::Public },
    RouteRule { pattern: "/register", rule: AccessRule::Public },
    RouteRule { pattern: "/forgot-password", rule: AccessRule::Public },
    RouteRule { pattern: "/reset-password", rule: AccessRule::Public },
    RouteRule { pattern: "/verify-email", rule: AccessRule::Public },
    RouteRule { pattern: "/dashboard", rule: AccessRule::MinRole(UserRole::Reader) },
    RouteRule { pattern: "/settings", rule: AccessRule::MinRole(UserRole::Reader) },
    RouteRule { pattern: "/shared/[id]", rule: AccessRule::MinRole(UserRole::Reader) },
    RouteRule { pattern: "/messages", rule: AccessRule::MinRole(UserRole::Writer) },
    RouteRule { pattern: "/messages/new", rule: AccessRule::MinRole(UserRole::Writer) },
    RouteRule { pattern: "/messages/[id]", rule: AccessRule::MinRole(UserRole::Writer) },
    RouteRule { pattern: "/check-in", rule: AccessRule::MinRole(UserRole::Writer) },
    RouteRule { pattern: "/admin", rule: AccessRule::Roles(&[UserRole::Admin]) },
    RouteRule { pattern: "/admin/*", rule: AccessRule::Roles(&[UserRole::Admin]) },
];

/// In-page feature gates, keyed by feature name.
pub const FEATURE_RULES: &[(&str, AccessRule)] = &[
    ("messages.view", AccessRule::MinRole(UserRole::Reader)),
    ("messages.create", AccessRule::MinRole(UserRole::Writer)),
    ("messages.edit", AccessRule::MinRole(UserRole::Writer)),
    ("messages.delete", AccessRule::MinRole(UserRole::Writer)),
    ("checkin.perform", AccessRule::MinRole(UserRole::Writer)),
    ("settings.edit", AccessRule::MinRole(UserRole::Reader)),
    ("admin.users.view", AccessRule::Roles(&[UserRole::Admin])),
    ("admin.users.manage", AccessRule::Roles(&[UserRole::Admin])),
];

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    /// Whether access is granted
    pub allowed: bool,

    /// Where the UI should send the user on denial
    pub redirect_to: Option<&'static str>,

    /// Human-readable denial reason
    pub reason: Option<String>,

    /// The minimum role that would grant access, where one exists
    pub required_role: Option<UserRole>,

    /// The role the decision was evaluated against
    pub user_role: Option<UserRole>,
}

impl AccessDecision {
    fn allow(user_role: Option<UserRole>) -> Self {
        Self {
            allowed: true,
            redirect_to: None,
            reason: None,
            required_role: None,
            user_role,
        }
    }

    fn deny(
        redirect_to: &'static str,
        reason: String,
        required_role: Option<UserRole>,
        user_role: Option<UserRole>,
    ) -> Self {
        Self {
            allowed: false,
            redirect_to: Some(redirect_to),
            reason: Some(reason),
            required_role,
            user_role,
        }
    }
}

/// Evaluate route access for a (possibly anonymous) user.
///
/// Matching order: exact path, then pattern match in table order, else
/// default-deny-unless-authenticated.
pub fn check_route_access(
    path: &str,
    role: Option<UserRole>,
    authenticated: bool,
) -> AccessDecision {
    let rule = ROUTE_RULES
        .iter()
        .find(|route| route.pattern == path)
        .or_else(|| {
            ROUTE_RULES
                .iter()
                .find(|route| matches_pattern(route.pattern, path))
        })
        .map(|route| route.rule);

    match rule {
        Some(rule) => evaluate(rule, role, authenticated),
        None => {
            // Unknown paths require a session but no particular role.
            if authenticated {
                AccessDecision::allow(role)
            } else {
                AccessDecision::deny(
                    LOGIN_ROUTE,
                    "authentication required".to_string(),
                    None,
                    role,
                )
            }
        }
    }
}

/// Evaluate a named in-page feature gate.
pub fn check_feature_access(
    feature: &str,
    role: Option<UserRole>,
    authenticated: bool,
) -> AccessDecision {
    match FEATURE_RULES
        .iter()
        .find(|(name, _)| *name == feature)
        .map(|(_, rule)| *rule)
    {
        Some(rule) => evaluate(rule, role, authenticated),
        None => AccessDecision::deny(
            DASHBOARD_ROUTE,
            format!("unknown feature: {feature}"),
            None,
            role,
        ),
    }
}

/// Routes from the policy table this user may visit.
///
/// A UI affordance for menus and sitemaps, not an enforcement mechanism.
pub fn accessible_routes(role: Option<UserRole>, authenticated: bool) -> Vec<&'static str> {
    ROUTE_RULES
        .iter()
        .filter(|route| check_route_access(route.pattern, role, authenticated).allowed)
        .map(|route| route.pattern)
        .collect()
}

fn evaluate(rule: AccessRule, role: Option<UserRole>, authenticated: bool) -> AccessDecision {
    match rule {
        AccessRule::Public => AccessDecision::allow(role),
        AccessRule::MinRole(required) => {
            if !authenticated {
                return AccessDecision::deny(
                    LOGIN_ROUTE,
                    "authentication required".to_string(),
                    Some(required),
                    role,
                );
            }
            match role {
                Some(role) if role.satisfies(required) => AccessDecision::allow(Some(role)),
                _ => AccessDecision::deny(
                    DASHBOARD_ROUTE,
                    format!("requires at least the {required} role"),
                    Some(required),
                    role,
                ),
            }
        }
        AccessRule::Roles(allowed) => {
            if !authenticated {
                return AccessDecision::deny(
                    LOGIN_ROUTE,
                    "authentication required".to_string(),
                    lowest_of(allowed),
                    role,
                );
            }
            match role {
                Some(role) if allowed.contains(&role) => AccessDecision::allow(Some(role)),
                _ => {
                    let names: Vec<&str> = allowed.iter().map(UserRole::as_str).collect();
                    AccessDecision::deny(
                        DASHBOARD_ROUTE,
                        format!("requires one of: {}", names.join(", ")),
                        lowest_of(allowed),
                        role,
                    )
                }
            }
        }
    }
}

fn lowest_of(roles: &[UserRole]) -> Option<UserRole> {
    roles.iter().copied().min_by_key(UserRole::hierarchy_level)
}

/// Segment-wise pattern match. `[param]` and `*` match any one segment; a
/// trailing `*` swallows the rest of the path.
fn matches_pattern(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let trailing_wildcard = pattern_segments.last() == Some(&"*");
    if trailing_wildcard {
        if path_segments.len() < pattern_segments.len() {
            return false;
        }
    } else if path_segments.len() != pattern_segments.len() {
        return false;
    }

    pattern_segments
        .iter()
        .zip(path_segments.iter())
        .all(|(pattern_seg, path_seg)| {
            *pattern_seg == "*"
                || (pattern_seg.starts_with('[') && pattern_seg.ends_with(']'))
                || pattern_seg == path_seg
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_routes_are_open_to_anonymous_users() {
        assert!(check_route_access("/", None, false).allowed);
        assert!(check_route_access("/pricing", None, false).allowed);
        assert!(check_route_access("/login", None, false).allowed);
    }

    #[test]
    fn protected_routes_redirect_anonymous_users_to_login() {
        let decision = check_route_access("/dashboard", None, false);
        assert!(!decision.allowed);
        assert_eq!(decision.redirect_to, Some("/login"));
    }

    #[test]
    fn min_role_respects_hierarchy() {
        for (role, allowed) in [
            (UserRole::Reader, false),
            (UserRole::Writer, true),
            (UserRole::Admin, true),
        ] {
            let decision = check_route_access("/messages", Some(role), true);
            assert_eq!(decision.allowed, allowed, "role {role}");
        }
    }

    #[test]
    fn exact_role_set_ignores_hierarchy() {
        // Writer outranks reader but is not in the admin set.
        for role in [UserRole::Reader, UserRole::Writer] {
            let decision = check_route_access("/admin", Some(role), true);
            assert!(!decision.allowed);
            assert_eq!(decision.required_role, Some(UserRole::Admin));
        }
        assert!(check_route_access("/admin", Some(UserRole::Admin), true).allowed);
    }

    #[test]
    fn bracket_params_match_single_segments() {
        assert!(check_route_access("/messages/42", Some(UserRole::Writer), true).allowed);
        // Denied for readers even through the pattern.
        assert!(!check_route_access("/messages/42", Some(UserRole::Reader), true).allowed);
        // A deeper path doesn't match [id] and falls to the default rule.
        let deeper = check_route_access("/messages/42/extra", None, false);
        assert_eq!(deeper.redirect_to, Some("/login"));
    }

    #[test]
    fn trailing_wildcard_matches_any_depth() {
        assert!(check_route_access("/admin/users", Some(UserRole::Admin), true).allowed);
        assert!(check_route_access("/admin/users/7/roles", Some(UserRole::Admin), true).allowed);
        assert!(!check_route_access("/admin/users", Some(UserRole::Writer), true).allowed);
    }

    #[test]
    fn unknown_routes_default_to_authenticated_only() {
        assert!(check_route_access("/totally-new-page", Some(UserRole::Reader), true).allowed);
        let decision = check_route_access("/totally-new-page", None, false);
        assert!(!decision.allowed);
        assert_eq!(decision.redirect_to, Some("/login"));
    }

    #[test]
    fn feature_gates_follow_the_same_policy() {
        assert!(check_feature_access("messages.create", Some(UserRole::Writer), true).allowed);
        assert!(!check_feature_access("messages.create", Some(UserRole::Reader), true).allowed);
        assert!(check_feature_access("admin.users.view", Some(UserRole::Admin), true).allowed);
        assert!(!check_feature_access("admin.users.view", Some(UserRole::Writer), true).allowed);
    }

    #[test]
    fn unknown_features_are_denied() {
        let decision = check_feature_access("no.such.feature", Some(UserRole::Admin), true);
        assert!(!decision.allowed);
    }

    #[test]
    fn accessible_routes_grow_with_privilege() {
        let anonymous = accessible_routes(None, false);
        let reader = accessible_routes(Some(UserRole::Reader), true);
        let admin = accessible_routes(Some(UserRole::Admin), true);

        assert!(anonymous.contains(&"/pricing"));
        assert!(!anonymous.contains(&"/dashboard"));
        assert!(reader.contains(&"/dashboard"));
        assert!(!reader.contains(&"/admin"));
        assert!(admin.contains(&"/admin"));
        assert!(admin.len() > reader.len());
        assert!(reader.len() > anonymous.len());
    }
}
