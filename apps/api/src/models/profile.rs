use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which dashboard a user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Employer,
    Employee,
    Independent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Employer => "employer",
            Role::Employee => "employee",
            Role::Independent => "independent",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "employer" => Some(Role::Employer),
            "employee" => Some(Role::Employee),
            "independent" => Some(Role::Independent),
            _ => None,
        }
    }
}

/// One row of the `profiles` table, restricted to the columns role resolution reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub role: Option<String>,
    pub role_selected: bool,
}

impl ProfileRow {
    /// The persisted role, but only when the user explicitly chose it.
    /// A row with `role_selected = false` or an unknown role string counts as no selection.
    pub fn selected_role(&self) -> Option<Role> {
        if !self.role_selected {
            return None;
        }
        self.role.as_deref().and_then(Role::parse)
    }
}
