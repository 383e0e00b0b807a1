use anyhow::Result;
use futures_util::StreamExt;
use moka::future::Cache;
use sqlx::MySqlPool;
use std::time::Duration;

/// rfid_uid => student id, for badges seen recently or loaded at startup.
#[derive(Clone)]
pub struct BadgeCache {
    cache: Cache<String, u64>,
}

#[inline]
fn normalize(uid: &str) -> String {
    uid.trim().to_string()
}

impl BadgeCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity) // tune based on memory
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, uid: &str) -> Option<u64> {
        self.cache.get(&normalize(uid)).await
    }

    pub async fn insert(&self, uid: &str, student_id: u64) {
        self.cache.insert(normalize(uid), student_id).await;
    }

    pub async fn invalidate(&self, uid: &str) {
        self.cache.invalidate(&normalize(uid)).await;
    }

    /// Cache first, then the `students` table. `None` means the badge is not enrolled.
    pub async fn resolve(&self, pool: &MySqlPool, uid: &str) -> Result<Option<u64>, sqlx::Error> {
        let uid = normalize(uid);

        if let Some(id) = self.get(&uid).await {
            return Ok(Some(id));
        }

        let found = sqlx::query_scalar::<_, u64>("SELECT id FROM students WHERE rfid_uid = ?")
            .bind(&uid)
            .fetch_optional(pool)
            .await?;

        if let Some(id) = found {
            self.cache.insert(uid, id).await;
        }

        Ok(found)
    }

    /// Batch insert badges concurrently
    async fn batch_insert(&self, badges: &[(String, u64)]) {
        let futures: Vec<_> = badges
            .iter()
            .map(|(uid, id)| self.cache.insert(normalize(uid), *id))
            .collect();

        futures::future::join_all(futures).await;
    }

    /// Load every enrolled badge into the cache (batched)
    pub async fn warmup(&self, pool: &MySqlPool, batch_size: usize) -> Result<()> {
        let mut stream =
            sqlx::query_as::<_, (String, u64)>("SELECT rfid_uid, id FROM students").fetch(pool);

        let mut batch = Vec::with_capacity(batch_size);
        let mut total_count = 0usize;

        while let Some(row) = stream.next().await {
            batch.push(row?);
            total_count += 1;

            if batch.len() >= batch_size {
                self.batch_insert(&batch).await;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.batch_insert(&batch).await;
        }

        log::info!("Badge cache warmup complete: {} badges", total_count);

        Ok(())
    }
}
