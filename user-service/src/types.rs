//! The user record this service owns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ticketwire_domain::ids::UserId;

/// A registered user, scoped to exactly what the saga and the gateway need
/// to know: who they are and whether they're allowed to transact.
///
/// Profile fields (name, phone), sessions, and password credentials all
/// belong to the external collaborator spec.md §1 carves out (account
/// registration, authentication token minting) — this type only carries
/// what `VALIDATE_USER` and the thin read endpoint use.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// This user's id.
    pub user_id: UserId,
    /// Contact email, unique per user.
    pub email: String,
    /// Whether this account may participate in a workflow. A user that
    /// registered but was since suspended is not deleted, just flagged
    /// inactive — mirroring `is_active` in the original account model.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
