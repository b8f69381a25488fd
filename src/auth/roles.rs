use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed authorization vocabulary. Role rows with other names may exist
/// but never match a route's allowed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    AdminApp,
    AdminMinisterio,
    AdminDistrito,
    AdminInstitucion,
    Profesor,
    PersonalApoyo,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::AdminApp,
        Role::AdminMinisterio,
        Role::AdminDistrito,
        Role::AdminInstitucion,
        Role::Profesor,
        Role::PersonalApoyo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::AdminApp => "AdminApp",
            Role::AdminMinisterio => "AdminMinisterio",
            Role::AdminDistrito => "AdminDistrito",
            Role::AdminInstitucion => "AdminInstitucion",
            Role::Profesor => "Profesor",
            Role::PersonalApoyo => "PersonalApoyo",
        }
    }

    pub fn parse(name: &str) -> Option<Role> {
        Self::ALL.into_iter().find(|role| role.as_str() == name)
    }

    /// Roles whose scope is a single institution.
    pub fn is_institution_bound(&self) -> bool {
        matches!(self, Role::AdminInstitucion | Role::Profesor | Role::PersonalApoyo)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exact_names_only() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("adminapp"), None);
        assert_eq!(Role::parse("Coordinador"), None);
    }
}
