//! Route permission table.
//!
//! Maps route templates such as `/clients/[id]` to the roles allowed to
//! open them. Templates are matched in two passes: an exact string lookup,
//! then a segment-by-segment comparison against templates with the same
//! number of segments, where a bracketed segment matches any value. When
//! several templates match, the first one declared wins; there is no
//! specificity ranking.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::role::Role;

/// The single route reachable without a session.
pub const PUBLIC_ROUTE: &str = "/";
/// Where authenticated users land.
pub const LANDING_ROUTE: &str = "/dashboard";

const ALL_STAFF: &[Role] = &[Role::Admin, Role::Directivo, Role::Comercial, Role::Colaborador];
const SALES: &[Role] = &[Role::Admin, Role::Directivo, Role::Comercial];
const MANAGEMENT: &[Role] = &[Role::Admin, Role::Directivo];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// The back-office navigation links and who may follow them.
pub const BACKOFFICE_LINKS: &[(&str, &[Role])] = &[
    ("/dashboard", ALL_STAFF),
    ("/clients", ALL_STAFF),
    ("/clients/[id]", ALL_STAFF),
    ("/brands", SALES),
    ("/brands/[id]", SALES),
    ("/managers", MANAGEMENT),
    ("/managers/[id]", MANAGEMENT),
    ("/invoices", SALES),
    ("/invoices/[id]", SALES),
    ("/users", ADMIN_ONLY),
    ("/users/[id]", ADMIN_ONLY),
    ("/settings", ADMIN_ONLY),
];

/// Errors raised while building the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionTableError {
    #[error("route template {0:?} must start with '/'")]
    MissingLeadingSlash(String),

    #[error("route template {template:?} has an invalid segment {segment:?}")]
    InvalidSegment { template: String, segment: String },

    #[error("route template {0:?} is declared twice")]
    Duplicate(String),

    #[error("route template {0:?} allows no role")]
    EmptyAllowSet(String),
}

/// What `is_allowed` answers for a path no template matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnlistedRoutePolicy {
    /// Unlisted paths are not gated.
    #[default]
    Open,
    /// Unlisted paths are refused to every role.
    Deny,
}

impl FromStr for UnlistedRoutePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(UnlistedRoutePolicy::Open),
            "deny" => Ok(UnlistedRoutePolicy::Deny),
            other => Err(format!("unknown unlisted route policy {:?}", other)),
        }
    }
}

impl fmt::Display for UnlistedRoutePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnlistedRoutePolicy::Open => f.write_str("open"),
            UnlistedRoutePolicy::Deny => f.write_str("deny"),
        }
    }
}

/// One segment of a route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the concrete segment.
    Static(String),
    /// `[name]`: matches any non-empty concrete segment.
    Dynamic(String),
}

/// A parsed route template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl RouteTemplate {
    pub fn parse(raw: &str) -> Result<Self, PermissionTableError> {
        if !raw.starts_with('/') {
            return Err(PermissionTableError::MissingLeadingSlash(raw.to_string()));
        }

        let segments = split_segments(raw)
            .into_iter()
            .map(|segment| parse_segment(raw, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the template has no dynamic segment.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Static(_)))
    }

    /// Matches concrete segments, returning the captured dynamic values.
    fn capture(&self, concrete: &[&str]) -> Option<Vec<(String, String)>> {
        if concrete.len() != self.segments.len() {
            return None;
        }

        let mut params = Vec::new();
        for (segment, value) in self.segments.iter().zip(concrete) {
            match segment {
                Segment::Static(expected) if expected == value => {}
                Segment::Dynamic(name) if !value.is_empty() => {
                    params.push((name.clone(), (*value).to_string()));
                }
                _ => return None,
            }
        }
        Some(params)
    }
}

fn parse_segment(template: &str, segment: &str) -> Result<Segment, PermissionTableError> {
    let invalid = || PermissionTableError::InvalidSegment {
        template: template.to_string(),
        segment: segment.to_string(),
    };

    if let Some(name) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        if name.is_empty() || name.contains(['[', ']', '/']) {
            return Err(invalid());
        }
        return Ok(Segment::Dynamic(name.to_string()));
    }

    if segment.is_empty() || segment.contains(['[', ']']) {
        return Err(invalid());
    }
    Ok(Segment::Static(segment.to_string()))
}

/// Splits a path on `/`, the root having no segments.
fn split_segments(path: &str) -> Vec<&str> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        Vec::new()
    } else {
        rest.split('/').collect()
    }
}

/// Drops a trailing slash, keeping the root as `/`.
pub fn normalize_path(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// A template matching a concrete path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'t> {
    /// The template as declared.
    pub template: &'t str,
    /// The roles allowed on it.
    pub allowed_roles: &'t [Role],
    /// Dynamic segment values, in template order.
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
struct PermissionEntry {
    template: RouteTemplate,
    roles: Vec<Role>,
}

/// Immutable table answering "may role R open path P?".
#[derive(Debug, Clone)]
pub struct PermissionTable {
    entries: Vec<PermissionEntry>,
    exact: HashMap<String, usize>,
    unlisted: UnlistedRoutePolicy,
}

impl PermissionTable {
    /// Builds the table from `(template, roles)` links, in priority order.
    pub fn build(
        links: &[(&str, &[Role])],
        unlisted: UnlistedRoutePolicy,
    ) -> Result<Self, PermissionTableError> {
        let mut entries = Vec::with_capacity(links.len());
        let mut exact = HashMap::with_capacity(links.len());

        for (raw, roles) in links {
            let template = RouteTemplate::parse(raw)?;
            if roles.is_empty() {
                return Err(PermissionTableError::EmptyAllowSet(raw.to_string()));
            }
            if exact.insert(raw.to_string(), entries.len()).is_some() {
                return Err(PermissionTableError::Duplicate(raw.to_string()));
            }

            let mut roles = roles.to_vec();
            roles.sort_unstable_by_key(|role| i32::from(*role));
            roles.dedup();
            entries.push(PermissionEntry { template, roles });
        }

        Ok(Self {
            entries,
            exact,
            unlisted,
        })
    }

    /// The back-office table.
    pub fn backoffice(unlisted: UnlistedRoutePolicy) -> Result<Self, PermissionTableError> {
        Self::build(BACKOFFICE_LINKS, unlisted)
    }

    pub fn unlisted_policy(&self) -> UnlistedRoutePolicy {
        self.unlisted
    }

    pub fn templates(&self) -> impl Iterator<Item = &RouteTemplate> {
        self.entries.iter().map(|entry| &entry.template)
    }

    /// Finds the template governing `path`.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch<'_>> {
        let path = normalize_path(path);

        if let Some(&index) = self.exact.get(path) {
            let entry = &self.entries[index];
            return Some(RouteMatch {
                template: entry.template.as_str(),
                allowed_roles: &entry.roles,
                params: Vec::new(),
            });
        }

        let concrete = split_segments(path);
        self.entries.iter().find_map(|entry| {
            entry.template.capture(&concrete).map(|params| RouteMatch {
                template: entry.template.as_str(),
                allowed_roles: &entry.roles,
                params,
            })
        })
    }

    /// Roles allowed on `path`, or `None` when the path is not gated.
    ///
    /// Resolves the path once. Under [`UnlistedRoutePolicy::Deny`] an
    /// unlisted path is gated with no allowed role.
    pub fn allowed_roles(&self, path: &str) -> Option<&[Role]> {
        match self.resolve(path) {
            Some(matched) => {
                tracing::trace!(
                    template = matched.template,
                    params = ?matched.params,
                    "route matched"
                );
                Some(matched.allowed_roles)
            }
            None => match self.unlisted {
                UnlistedRoutePolicy::Open => None,
                UnlistedRoutePolicy::Deny => Some(&[]),
            },
        }
    }

    /// Whether `role` may open `path`. Unlisted paths follow the table's
    /// unlisted-route policy.
    pub fn is_allowed(&self, path: &str, role: Role) -> bool {
        self.allowed_roles(path)
            .is_none_or(|roles| roles.contains(&role))
    }

    /// The static navigation links `role` may follow, in declaration order.
    pub fn links_for(&self, role: Role) -> Vec<&str> {
        self.templates()
            .filter(|template| template.is_static())
            .map(RouteTemplate::as_str)
            .filter(|path| self.is_allowed(path, role))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PermissionTable {
        PermissionTable::backoffice(UnlistedRoutePolicy::Open).unwrap()
    }

    /// Replaces every dynamic segment with a concrete value.
    fn concrete_path(template: &RouteTemplate) -> String {
        let segments: Vec<String> = template
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Static(s) => s.clone(),
                Segment::Dynamic(_) => "42".to_string(),
            })
            .collect();
        format!("/{}", segments.join("/"))
    }

    #[test]
    fn allowance_matches_declared_roles_for_every_link() {
        let table = table();
        for (raw, roles) in BACKOFFICE_LINKS {
            let template = RouteTemplate::parse(raw).unwrap();
            let path = concrete_path(&template);
            for role in Role::ALL {
                assert_eq!(
                    table.is_allowed(&path, role),
                    roles.contains(&role),
                    "{role} on {path}"
                );
            }
        }
    }

    #[test]
    fn dynamic_segment_matches_same_arity_only() {
        let table = table();
        let matched = table.resolve("/clients/42").unwrap();
        assert_eq!(matched.template, "/clients/[id]");
        assert_eq!(matched.params, vec![("id".to_string(), "42".to_string())]);

        assert_eq!(table.resolve("/clients").unwrap().template, "/clients");
        assert!(table.resolve("/clients/42/edit").is_none());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        let table = table();
        assert_eq!(table.resolve("/users/").unwrap().template, "/users");
        assert_eq!(table.resolve("/users/7/").unwrap().template, "/users/[id]");
    }

    #[test]
    fn first_declared_template_wins() {
        let table = PermissionTable::build(
            &[
                ("/reports/[year]", &[Role::Admin]),
                ("/reports/[slug]", &[Role::Comercial]),
            ],
            UnlistedRoutePolicy::Open,
        )
        .unwrap();
        let matched = table.resolve("/reports/2024").unwrap();
        assert_eq!(matched.template, "/reports/[year]");
        assert!(!table.is_allowed("/reports/2024", Role::Comercial));
    }

    #[test]
    fn exact_match_beats_dynamic_declared_earlier() {
        let table = PermissionTable::build(
            &[
                ("/clients/[id]", &[Role::Comercial]),
                ("/clients/new", &[Role::Admin]),
            ],
            UnlistedRoutePolicy::Open,
        )
        .unwrap();
        assert_eq!(table.resolve("/clients/new").unwrap().template, "/clients/new");
        assert_eq!(table.resolve("/clients/9").unwrap().template, "/clients/[id]");
    }

    #[test]
    fn unlisted_paths_follow_policy() {
        let open = table();
        assert!(open.resolve("/reports").is_none());
        assert!(open.is_allowed("/reports", Role::Colaborador));
        assert!(open.is_allowed("/", Role::NoAutenticado));

        let deny = PermissionTable::backoffice(UnlistedRoutePolicy::Deny).unwrap();
        assert!(!deny.is_allowed("/reports", Role::Admin));
        assert!(deny.is_allowed("/users", Role::Admin));
    }

    #[test]
    fn allowed_roles_answers_in_one_lookup() {
        let open = table();
        assert_eq!(open.allowed_roles("/users/3"), Some(&[Role::Admin][..]));
        assert_eq!(open.allowed_roles("/reports"), None);

        let deny = PermissionTable::backoffice(UnlistedRoutePolicy::Deny).unwrap();
        assert_eq!(deny.allowed_roles("/reports"), Some(&[][..]));
        assert_eq!(
            deny.allowed_roles("/managers"),
            open.allowed_roles("/managers")
        );
    }

    #[test]
    fn links_skip_dynamic_templates_and_refused_routes() {
        let table = table();
        assert_eq!(
            table.links_for(Role::Colaborador),
            vec!["/dashboard", "/clients"]
        );
        assert_eq!(
            table.links_for(Role::Directivo),
            vec!["/dashboard", "/clients", "/brands", "/managers", "/invoices"]
        );
        assert_eq!(table.links_for(Role::Admin).last(), Some(&"/settings"));
        assert!(table.links_for(Role::NoAutenticado).is_empty());
    }

    #[test]
    fn rejects_bad_tables() {
        assert_eq!(
            PermissionTable::build(&[("clients", &[Role::Admin])], UnlistedRoutePolicy::Open)
                .unwrap_err(),
            PermissionTableError::MissingLeadingSlash("clients".to_string())
        );
        assert!(matches!(
            PermissionTable::build(&[("/clients/[]", &[Role::Admin])], UnlistedRoutePolicy::Open),
            Err(PermissionTableError::InvalidSegment { .. })
        ));
        assert!(matches!(
            PermissionTable::build(&[("/clients/[id", &[Role::Admin])], UnlistedRoutePolicy::Open),
            Err(PermissionTableError::InvalidSegment { .. })
        ));
        assert_eq!(
            PermissionTable::build(
                &[("/a", &[Role::Admin]), ("/a", &[Role::Comercial])],
                UnlistedRoutePolicy::Open
            )
            .unwrap_err(),
            PermissionTableError::Duplicate("/a".to_string())
        );
        assert_eq!(
            PermissionTable::build(&[("/a", &[])], UnlistedRoutePolicy::Open).unwrap_err(),
            PermissionTableError::EmptyAllowSet("/a".to_string())
        );
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("open".parse::<UnlistedRoutePolicy>(), Ok(UnlistedRoutePolicy::Open));
        assert_eq!(" DENY ".parse::<UnlistedRoutePolicy>(), Ok(UnlistedRoutePolicy::Deny));
        assert!("closed".parse::<UnlistedRoutePolicy>().is_err());
    }
}
