//! Hierarchical ownership checks: Ministry → District → Institution.
//!
//! Every resource transitively belongs to one institution, and every
//! institution to one district. [`ScopeAuthorizer::authorize`] resolves the
//! owning institution of a [`ScopeTarget`] through a [`ScopeResolver`] and
//! decides whether the [`Actor`] covers it. Call sites turn the decision into
//! an HTTP outcome with [`ScopeDecision::require`] and a [`Masking`] policy.

pub mod resolver;

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::{Identity, Role};
use crate::database::manager::DatabaseError;
use crate::error::ApiError;

pub use resolver::PgScopeResolver;

/// The authenticated caller, built from verified token claims
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role_id: i64,
    pub role_name: String,
    pub role: Option<Role>,
    pub institution_id: Option<i64>,
    pub district_id: Option<i64>,
    pub is_ministry_user: bool,
}

impl From<Identity> for Actor {
    fn from(identity: Identity) -> Self {
        Self {
            role: Role::parse(&identity.role_name),
            user_id: identity.user_id,
            role_id: identity.role_id,
            role_name: identity.role_name,
            institution_id: identity.institution_id,
            district_id: identity.district_id,
            is_ministry_user: identity.is_ministry_user,
        }
    }
}

impl Actor {
    pub fn is(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role.map_or(false, |role| roles.contains(&role))
    }

    /// Either the ministry flag or the AdminMinisterio role makes a ministry actor.
    pub fn is_ministry(&self) -> bool {
        self.is_ministry_user || self.is(Role::AdminMinisterio)
    }

    /// Ministry actors and AdminApp see every institution.
    pub fn has_full_scope(&self) -> bool {
        self.is_ministry() || self.is(Role::AdminApp)
    }

    /// Which rows a list query may return for this actor.
    pub fn list_scope(&self) -> ListScope {
        if self.has_full_scope() {
            return ListScope::All;
        }
        match (self.role, self.district_id, self.institution_id) {
            (Some(Role::AdminDistrito), Some(district_id), _) => ListScope::District(district_id),
            (Some(role), _, Some(institution_id)) if role.is_institution_bound() => {
                ListScope::Institution(institution_id)
            }
            _ => ListScope::Denied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    District(i64),
    Institution(i64),
    Denied,
}

impl ListScope {
    /// Adds the scope predicate for a query whose institution and district
    /// columns are `institution_col` and `district_col`.
    pub fn restrict(
        &self,
        conditions: &mut crate::database::listing::Conditions,
        institution_col: &str,
        district_col: &str,
        denied_message: &str,
    ) -> Result<(), ApiError> {
        match *self {
            ListScope::All => {}
            ListScope::District(id) => {
                conditions.bind(format!("{} =", district_col), id);
            }
            ListScope::Institution(id) => {
                conditions.bind(format!("{} =", institution_col), id);
            }
            ListScope::Denied => return Err(ApiError::forbidden(denied_message)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeTarget {
    Institution(i64),
    Student(i64),
    Group(i64),
    AttendanceRecord(i64),
    Excuse(i64),
    BiometricTemplate(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    Allowed { institution_id: i64 },
    Forbidden { institution_id: i64 },
    NotFound,
}

/// How a forbidden decision is reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Masking {
    /// Forbidden is a 403.
    None,
    /// Forbidden is a 404 for the listed roles, 403 for everyone else.
    Roles(&'static [Role]),
    /// Forbidden is always a 404.
    Always,
}

impl ScopeDecision {
    /// Returns the owning institution when allowed.
    pub fn require(
        self,
        actor: &Actor,
        masking: Masking,
        forbidden_message: &str,
        not_found_message: &str,
    ) -> Result<i64, ApiError> {
        match self {
            ScopeDecision::Allowed { institution_id } => Ok(institution_id),
            ScopeDecision::NotFound => Err(ApiError::not_found(not_found_message)),
            ScopeDecision::Forbidden { institution_id } => {
                tracing::warn!(
                    user_id = actor.user_id,
                    role = %actor.role_name,
                    institution_id,
                    "Scope check denied"
                );
                let masked = match masking {
                    Masking::None => false,
                    Masking::Roles(roles) => actor.has_any_role(roles),
                    Masking::Always => true,
                };
                if masked {
                    Err(ApiError::not_found(not_found_message))
                } else {
                    Err(ApiError::forbidden(forbidden_message))
                }
            }
        }
    }
}

/// Looks up ownership facts the authorizer needs.
#[async_trait]
pub trait ScopeResolver: Send + Sync {
    /// Institution that owns the target, or `None` when the target does not exist.
    async fn owning_institution(&self, target: ScopeTarget) -> Result<Option<i64>, DatabaseError>;

    async fn district_of(&self, institution_id: i64) -> Result<Option<i64>, DatabaseError>;
}

#[derive(Clone)]
pub struct ScopeAuthorizer {
    resolver: Arc<dyn ScopeResolver>,
}

impl std::fmt::Debug for ScopeAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeAuthorizer").finish_non_exhaustive()
    }
}

impl ScopeAuthorizer {
    pub fn new(resolver: Arc<dyn ScopeResolver>) -> Self {
        Self { resolver }
    }

    pub async fn authorize(&self, actor: &Actor, target: ScopeTarget) -> Result<ScopeDecision, DatabaseError> {
        let Some(institution_id) = self.resolver.owning_institution(target).await? else {
            return Ok(ScopeDecision::NotFound);
        };

        if self.covers_institution(actor, institution_id).await? {
            Ok(ScopeDecision::Allowed { institution_id })
        } else {
            Ok(ScopeDecision::Forbidden { institution_id })
        }
    }

    /// The four-tier rule. The district lookup only happens for AdminDistrito.
    pub async fn covers_institution(&self, actor: &Actor, institution_id: i64) -> Result<bool, DatabaseError> {
        if actor.has_full_scope() {
            return Ok(true);
        }
        match actor.role {
            Some(Role::AdminDistrito) => match actor.district_id {
                Some(district_id) => {
                    let owner = self.resolver.district_of(institution_id).await?;
                    Ok(owner == Some(district_id))
                }
                None => Ok(false),
            },
            Some(role) if role.is_institution_bound() => Ok(actor.institution_id == Some(institution_id)),
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// In-memory ownership graph for authorizer tests.
    #[derive(Default)]
    pub struct MemoryResolver {
        pub institutions: HashMap<i64, i64>,
        pub owners: HashMap<ScopeTarget, i64>,
        pub district_lookups: AtomicUsize,
    }

    impl MemoryResolver {
        pub fn institution(mut self, institution_id: i64, district_id: i64) -> Self {
            self.institutions.insert(institution_id, district_id);
            self.owners.insert(ScopeTarget::Institution(institution_id), institution_id);
            self
        }

        pub fn owned(mut self, target: ScopeTarget, institution_id: i64) -> Self {
            self.owners.insert(target, institution_id);
            self
        }
    }

    #[async_trait]
    impl ScopeResolver for MemoryResolver {
        async fn owning_institution(&self, target: ScopeTarget) -> Result<Option<i64>, DatabaseError> {
            Ok(self.owners.get(&target).copied())
        }

        async fn district_of(&self, institution_id: i64) -> Result<Option<i64>, DatabaseError> {
            self.district_lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.institutions.get(&institution_id).copied())
        }
    }

    pub fn actor(role: Role, institution_id: Option<i64>, district_id: Option<i64>) -> Actor {
        Actor {
            user_id: 1,
            role_id: 1,
            role_name: role.as_str().to_string(),
            role: Some(role),
            institution_id,
            district_id,
            is_ministry_user: role == Role::AdminMinisterio,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::testing::{actor, MemoryResolver};
    use super::*;

    // District 1 owns institution 7; district 2 owns institution 9.
    fn graph() -> Arc<MemoryResolver> {
        Arc::new(
            MemoryResolver::default()
                .institution(7, 1)
                .institution(9, 2)
                .owned(ScopeTarget::Student(100), 7)
                .owned(ScopeTarget::Student(200), 9)
                .owned(ScopeTarget::Group(5), 9)
                .owned(ScopeTarget::AttendanceRecord(50), 9)
                .owned(ScopeTarget::Excuse(60), 7)
                .owned(ScopeTarget::BiometricTemplate(70), 9),
        )
    }

    #[tokio::test]
    async fn full_scope_roles_see_everything() {
        let authorizer = ScopeAuthorizer::new(graph());
        for who in [actor(Role::AdminApp, None, None), actor(Role::AdminMinisterio, None, None)] {
            let decision = authorizer.authorize(&who, ScopeTarget::Student(200)).await.unwrap();
            assert_eq!(decision, ScopeDecision::Allowed { institution_id: 9 });
        }
    }

    #[tokio::test]
    async fn district_admin_is_confined_to_own_district() {
        let authorizer = ScopeAuthorizer::new(graph());
        let district_one = actor(Role::AdminDistrito, None, Some(1));

        for target in [
            ScopeTarget::Institution(9),
            ScopeTarget::Student(200),
            ScopeTarget::Group(5),
            ScopeTarget::AttendanceRecord(50),
            ScopeTarget::BiometricTemplate(70),
        ] {
            let decision = authorizer.authorize(&district_one, target).await.unwrap();
            assert_eq!(decision, ScopeDecision::Forbidden { institution_id: 9 }, "{:?}", target);
        }

        let decision = authorizer.authorize(&district_one, ScopeTarget::Excuse(60)).await.unwrap();
        assert_eq!(decision, ScopeDecision::Allowed { institution_id: 7 });
    }

    #[tokio::test]
    async fn institution_roles_are_confined_to_own_institution() {
        let authorizer = ScopeAuthorizer::new(graph());
        for role in [Role::AdminInstitucion, Role::Profesor, Role::PersonalApoyo] {
            let who = actor(role, Some(7), None);
            assert_eq!(
                authorizer.authorize(&who, ScopeTarget::Student(100)).await.unwrap(),
                ScopeDecision::Allowed { institution_id: 7 }
            );
            assert_eq!(
                authorizer.authorize(&who, ScopeTarget::Student(200)).await.unwrap(),
                ScopeDecision::Forbidden { institution_id: 9 }
            );
        }
    }

    #[tokio::test]
    async fn missing_resource_is_not_found() {
        let authorizer = ScopeAuthorizer::new(graph());
        let who = actor(Role::AdminApp, None, None);
        let decision = authorizer.authorize(&who, ScopeTarget::Student(999)).await.unwrap();
        assert_eq!(decision, ScopeDecision::NotFound);
    }

    #[tokio::test]
    async fn unbound_or_unknown_roles_are_forbidden() {
        let authorizer = ScopeAuthorizer::new(graph());
        let unbound = actor(Role::AdminDistrito, None, None);
        let mut custom = actor(Role::Profesor, Some(7), None);
        custom.role = None;
        custom.role_name = "Coordinador".to_string();

        for who in [unbound, custom] {
            let decision = authorizer.authorize(&who, ScopeTarget::Student(100)).await.unwrap();
            assert_eq!(decision, ScopeDecision::Forbidden { institution_id: 7 });
        }
    }

    #[tokio::test]
    async fn district_lookup_only_for_district_admins() {
        let resolver = graph();
        let authorizer = ScopeAuthorizer::new(resolver.clone());
        authorizer.authorize(&actor(Role::Profesor, Some(7), None), ScopeTarget::Student(100)).await.unwrap();
        authorizer.authorize(&actor(Role::AdminApp, None, None), ScopeTarget::Student(100)).await.unwrap();
        assert_eq!(resolver.district_lookups.load(Ordering::SeqCst), 0);

        authorizer.authorize(&actor(Role::AdminDistrito, None, Some(1)), ScopeTarget::Student(100)).await.unwrap();
        assert_eq!(resolver.district_lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn masking_policies() {
        let institution_admin = actor(Role::AdminInstitucion, Some(7), None);
        let district_admin = actor(Role::AdminDistrito, None, Some(1));
        let forbidden = ScopeDecision::Forbidden { institution_id: 9 };
        let masked_for_institution = Masking::Roles(&[Role::AdminInstitucion]);

        let err = forbidden.require(&institution_admin, masked_for_institution, "no", "nf").unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = forbidden.require(&district_admin, masked_for_institution, "no", "nf").unwrap_err();
        assert_eq!(err.status_code(), 403);
        let err = forbidden.require(&district_admin, Masking::Always, "no", "nf").unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = forbidden.require(&institution_admin, Masking::None, "no", "nf").unwrap_err();
        assert_eq!(err.status_code(), 403);

        let allowed = ScopeDecision::Allowed { institution_id: 7 };
        assert_eq!(allowed.require(&institution_admin, Masking::None, "no", "nf").unwrap(), 7);
        let err = ScopeDecision::NotFound.require(&institution_admin, Masking::None, "no", "nf").unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn list_scopes() {
        assert_eq!(actor(Role::AdminApp, None, None).list_scope(), ListScope::All);
        assert_eq!(actor(Role::AdminMinisterio, None, None).list_scope(), ListScope::All);

        let unflagged = Actor { is_ministry_user: false, ..actor(Role::AdminMinisterio, None, None) };
        assert!(unflagged.is_ministry());
        assert_eq!(unflagged.list_scope(), ListScope::All);
        assert_eq!(actor(Role::AdminDistrito, None, Some(3)).list_scope(), ListScope::District(3));
        assert_eq!(actor(Role::Profesor, Some(7), None).list_scope(), ListScope::Institution(7));
        assert_eq!(actor(Role::AdminInstitucion, None, None).list_scope(), ListScope::Denied);
    }
}
