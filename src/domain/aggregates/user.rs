//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::aggregates::UnknownStatus;
use crate::domain::value_objects::CampusZone;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Customer,
    Rider,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Rider => "rider",
            Self::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "rider" => Ok(Self::Rider),
            "admin" => Ok(Self::Admin),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub campus_zone: Option<CampusZone>,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn register(name: impl Into<String>, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            email: email.trim().to_lowercase(),
            phone: None,
            campus_zone: None,
            role: Role::Customer,
            is_active: true,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool { self.role == Role::Admin }
    pub fn touch(&mut self) { self.updated_at = Utc::now(); }
}
