//! Who may create which kind of user, and how the new user is scoped.

use crate::auth::Role;

/// Scope binding applied to a newly created user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRule {
    /// No district, no institution, not ministry.
    Unscoped,
    /// Flagged as a ministry user.
    Ministry,
    /// Bound to a `districtId` that must exist.
    ExistingDistrict,
    /// Bound to an `institutionId` that must exist.
    ExistingInstitution,
    /// Bound to an `institutionId` inside the creator's own district.
    InstitutionInCreatorDistrict,
    /// Bound to the creator's own institution, whatever the request says.
    CreatorInstitution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreationRule {
    pub creator: Role,
    pub target: Role,
    pub scope: ScopeRule,
}

const fn rule(creator: Role, target: Role, scope: ScopeRule) -> CreationRule {
    CreationRule { creator, target, scope }
}

pub const CREATION_MATRIX: &[CreationRule] = &[
    rule(Role::AdminApp, Role::AdminApp, ScopeRule::Unscoped),
    rule(Role::AdminApp, Role::AdminMinisterio, ScopeRule::Ministry),
    rule(Role::AdminApp, Role::AdminDistrito, ScopeRule::ExistingDistrict),
    rule(Role::AdminApp, Role::AdminInstitucion, ScopeRule::ExistingInstitution),
    rule(Role::AdminApp, Role::Profesor, ScopeRule::ExistingInstitution),
    rule(Role::AdminApp, Role::PersonalApoyo, ScopeRule::ExistingInstitution),
    rule(Role::AdminMinisterio, Role::AdminDistrito, ScopeRule::ExistingDistrict),
    rule(Role::AdminMinisterio, Role::AdminMinisterio, ScopeRule::Ministry),
    rule(Role::AdminDistrito, Role::AdminInstitucion, ScopeRule::InstitutionInCreatorDistrict),
    rule(Role::AdminInstitucion, Role::Profesor, ScopeRule::CreatorInstitution),
    rule(Role::AdminInstitucion, Role::PersonalApoyo, ScopeRule::CreatorInstitution),
];

pub fn creation_rule(creator: Role, target: Role) -> Option<ScopeRule> {
    CREATION_MATRIX
        .iter()
        .find(|r| r.creator == creator && r.target == target)
        .map(|r| r.scope)
}

/// Denial message for a creator that has no rule for the requested role.
pub fn denial_message(creator: Option<Role>) -> &'static str {
    match creator {
        Some(Role::AdminApp) => "AdminApp no puede crear este tipo de rol.",
        Some(Role::AdminMinisterio) => "AdminMinisterio no puede crear este tipo de rol directamente.",
        Some(Role::AdminDistrito) => "AdminDistrito no puede crear este tipo de rol.",
        Some(Role::AdminInstitucion) => {
            "AdminInstitucion solo puede crear roles de Profesor o PersonalApoyo dentro de su institución."
        }
        _ => "No tiene permiso para crear usuarios.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_pair_matches_the_table() {
        use Role::*;
        use ScopeRule::*;

        let expected: &[(Role, Role, Option<ScopeRule>)] = &[
            (AdminApp, AdminApp, Some(Unscoped)),
            (AdminApp, AdminMinisterio, Some(Ministry)),
            (AdminApp, AdminDistrito, Some(ExistingDistrict)),
            (AdminApp, AdminInstitucion, Some(ExistingInstitution)),
            (AdminApp, Profesor, Some(ExistingInstitution)),
            (AdminApp, PersonalApoyo, Some(ExistingInstitution)),
            (AdminMinisterio, AdminApp, None),
            (AdminMinisterio, AdminMinisterio, Some(Ministry)),
            (AdminMinisterio, AdminDistrito, Some(ExistingDistrict)),
            (AdminMinisterio, AdminInstitucion, None),
            (AdminMinisterio, Profesor, None),
            (AdminMinisterio, PersonalApoyo, None),
            (AdminDistrito, AdminApp, None),
            (AdminDistrito, AdminMinisterio, None),
            (AdminDistrito, AdminDistrito, None),
            (AdminDistrito, AdminInstitucion, Some(InstitutionInCreatorDistrict)),
            (AdminDistrito, Profesor, None),
            (AdminDistrito, PersonalApoyo, None),
            (AdminInstitucion, AdminApp, None),
            (AdminInstitucion, AdminMinisterio, None),
            (AdminInstitucion, AdminDistrito, None),
            (AdminInstitucion, AdminInstitucion, None),
            (AdminInstitucion, Profesor, Some(CreatorInstitution)),
            (AdminInstitucion, PersonalApoyo, Some(CreatorInstitution)),
        ];

        for (creator, target, scope) in expected {
            assert_eq!(creation_rule(*creator, *target), *scope, "{} -> {}", creator, target);
        }
    }

    #[test]
    fn teaching_staff_create_nobody() {
        for creator in [Role::Profesor, Role::PersonalApoyo] {
            for target in Role::ALL {
                assert_eq!(creation_rule(creator, target), None);
            }
        }
    }
}
