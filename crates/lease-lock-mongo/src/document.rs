use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Persisted lock record, one per logical lock name.
///
/// `expiresAt` is the lease boundary and the target of the store's TTL
/// index; automatic deletion after expiry is garbage collection only.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockDocument {
    #[serde(rename = "_id")]
    pub name: String,

    pub owner: String,

    pub host: String,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime,

    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime,
}
