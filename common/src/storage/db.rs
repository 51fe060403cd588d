use std::ops::Deref;

use surrealdb::{
    engine::any::{connect, Any},
    Error, Surreal,
};

use super::types::StoredObject;

/// Handle to the vector index. The address decides the engine: `rocksdb://`
/// for the durable on-disk index, `mem://` for throwaway indexes and tests.
/// The embedded engines run unauthenticated.
#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

impl SurrealDbClient {
    pub async fn new(address: &str, namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect(address).await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// In-memory index, used for ad-hoc ingestion and tests.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        Self::new("mem://", namespace, database).await
    }

    /// Defines the chunk indexes. The HNSW index must match the embedding
    /// dimension of the provider that writes to this database.
    pub async fn ensure_indexes(&self, dimension: usize) -> Result<(), Error> {
        self.client
            .query("DEFINE INDEX IF NOT EXISTS idx_chunk_source ON TABLE document_chunk FIELDS source")
            .await?;
        self.client
            .query(format!(
                "DEFINE INDEX IF NOT EXISTS idx_chunk_embedding ON TABLE document_chunk FIELDS embedding HNSW DIMENSION {dimension}"
            ))
            .await?;

        Ok(())
    }

    /// Operation to store a object in SurrealDB, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `item` - The item to be stored
    ///
    /// # Returns
    /// * `Result` - Item or Error
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Operation to retrieve all objects from a certain table, requires the struct to implement StoredObject
    ///
    /// # Returns
    /// * `Result` - Vec<T> or Error
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Operation to retrieve a single object by its ID, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `id` - The ID of the item to retrieve
    ///
    /// # Returns
    /// * `Result<Option<T>, Error>` - The found item or Error
    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    /// Operation to delete a single object by its ID, requires the struct to implement StoredObject
    ///
    /// # Arguments
    /// * `id` - The ID of the item to delete
    ///
    /// # Returns
    /// * `Result<Option<T>, Error>` - The deleted item or Error
    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}
