use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub mod role {
    /// The administrative role is the only one whose email survives a term
    /// transition; every other account is retired by the resetter.
    pub const ADMIN: &str = "admin";
}

/// Organization scoped to a term. `status` is `recognized`/`unrecognized`
/// (recognition is revoked on every term transition); `entity_type` is
/// `new`/`old` and flips to `old` once the entity lives through one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrganizationRow {
    pub id: Uuid,
    pub name: String,
    pub academic_year_id: Option<Uuid>,
    pub status: String,
    pub entity_type: String,
    pub adviser_name: Option<String>,
    pub president_name: Option<String>,
    pub adviser_id: Option<Uuid>,
    pub president_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Same shape as an organization; councils live in their own table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CouncilRow {
    pub id: Uuid,
    pub name: String,
    pub academic_year_id: Option<Uuid>,
    pub status: String,
    pub entity_type: String,
    pub adviser_name: Option<String>,
    pub president_name: Option<String>,
    pub adviser_id: Option<Uuid>,
    pub president_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MisCoordinatorRow {
    pub id: Uuid,
    pub academic_year_id: Option<Uuid>,
    pub coordinator_name: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}
