//! MongoDB implementation of the coordination-store contract.

use std::time::{Duration, SystemTime};

use lease_lock_core::error::{LockError, LockResult};
use lease_lock_core::store::{ClaimOutcome, InsertOutcome, LeaseClaim, LockStore, RenewOutcome};
use mongodb::bson::{DateTime, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use tracing::{debug, instrument};

use crate::document::LockDocument;

const DEFAULT_COLLECTION: &str = "service_locks";
const TTL_INDEX_NAME: &str = "ttl_expiresAt";

/// Lock store backed by a MongoDB collection.
///
/// Every mutation is a single conditional `update_one`, `insert_one`, or
/// `delete_one`; document-level atomicity in the server is what orders
/// competing instances. A TTL index on `expiresAt` clears orphaned records.
#[derive(Clone)]
pub struct MongoLockStore {
    database: Database,
    collection: Collection<LockDocument>,
}

impl MongoLockStore {
    /// Creates a store over an existing database handle.
    pub fn new(database: Database, collection_name: Option<&str>) -> Self {
        let collection = database.collection(collection_name.unwrap_or(DEFAULT_COLLECTION));
        Self {
            database,
            collection,
        }
    }

    /// Connects to `uri` and creates a store over `db_name`.
    pub async fn connect(
        uri: &str,
        db_name: &str,
        collection_name: Option<&str>,
    ) -> LockResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| LockError::Connection(Box::new(e)))?;
        Ok(Self::new(client.database(db_name), collection_name))
    }

    /// Name of the backing collection.
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }
}

impl LockStore for MongoLockStore {
    #[instrument(skip(self), fields(collection = %self.collection.name()))]
    async fn prepare(&self) -> LockResult<()> {
        // Fail fast if the server is unreachable rather than polling forever.
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| LockError::Connection(Box::new(e)))?;

        let index = IndexModel::builder()
            .keys(doc! { "expiresAt": 1 })
            .options(
                IndexOptions::builder()
                    .name(TTL_INDEX_NAME.to_string())
                    .expire_after(Duration::ZERO)
                    .build(),
            )
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(|e| LockError::Connection(Box::new(e)))?;
        debug!("expiry index ready");
        Ok(())
    }

    async fn claim(&self, claim: &LeaseClaim) -> LockResult<ClaimOutcome> {
        let now = DateTime::from_system_time(claim.now);
        let expires_at = DateTime::from_system_time(claim.expires_at);

        // Matches an expired lease, a same-owner re-entrance, or a record
        // that never got an expiry (older schema); no upsert.
        let filter = doc! {
            "_id": &claim.name,
            "$or": [
                { "expiresAt": { "$lte": now } },
                { "owner": &claim.owner },
                { "expiresAt": { "$exists": false } },
            ],
        };
        let update = doc! {
            "$set": {
                "owner": &claim.owner,
                "host": &claim.host,
                "updatedAt": now,
                "expiresAt": expires_at,
            },
        };

        let result = self
            .collection
            .update_one(filter, update)
            .await
            .map_err(|e| LockError::Backend(Box::new(e)))?;
        if result.modified_count == 1 {
            Ok(ClaimOutcome::Claimed)
        } else {
            Ok(ClaimOutcome::Held)
        }
    }

    async fn insert(&self, claim: &LeaseClaim) -> LockResult<InsertOutcome> {
        let document = LockDocument {
            name: claim.name.clone(),
            owner: claim.owner.clone(),
            host: claim.host.clone(),
            created_at: DateTime::from_system_time(claim.now),
            updated_at: DateTime::from_system_time(claim.now),
            expires_at: DateTime::from_system_time(claim.expires_at),
        };

        match self.collection.insert_one(&document).await {
            Ok(_) => Ok(InsertOutcome::Created),
            // First writer wins; a duplicate key means a competitor inserted
            // between our update and insert phases.
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::AlreadyHeld),
            Err(e) => Err(LockError::Backend(Box::new(e))),
        }
    }

    async fn renew(
        &self,
        name: &str,
        owner: &str,
        now: SystemTime,
        expires_at: SystemTime,
    ) -> LockResult<RenewOutcome> {
        let result = self
            .collection
            .update_one(
                doc! { "_id": name, "owner": owner },
                doc! {
                    "$set": {
                        "expiresAt": DateTime::from_system_time(expires_at),
                        "updatedAt": DateTime::from_system_time(now),
                    },
                },
            )
            .await
            .map_err(|e| LockError::Backend(Box::new(e)))?;
        if result.matched_count == 0 {
            Ok(RenewOutcome::Lost)
        } else {
            Ok(RenewOutcome::Renewed)
        }
    }

    async fn delete_owned(&self, name: &str, owner: &str) -> LockResult<()> {
        self.collection
            .delete_one(doc! { "_id": name, "owner": owner })
            .await
            .map_err(|e| LockError::Backend(Box::new(e)))?;
        Ok(())
    }
}

const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
