use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pulseboard_core::{IntegrationConfig, IntegrationData};
use pulseboard_db::DataStreamRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::IntegrationError;
use crate::factory::IntegrationFactory;
use crate::sync::{sync_data, SyncOutcome, SyncStore};

/// [`SyncStore`] backed by the `data_streams` and `analytics_data` tables.
#[derive(Debug, Clone)]
pub struct PgSyncStore {
    pool: PgPool,
}

impl PgSyncStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the adapter for a stored stream and syncs `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrationError::Persistence`] if the stored config cannot
    /// be decoded, [`IntegrationError::UnsupportedPlatform`] for an unknown
    /// platform key, or any error from [`sync_data`].
    pub async fn sync_stream(
        &self,
        factory: &IntegrationFactory,
        stream: &DataStreamRow,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SyncOutcome, IntegrationError> {
        let config = stream.integration_config()?;
        let mut integration =
            factory.create_integration(&stream.platform_type, stream.organization_id, config)?;
        sync_data(integration.as_mut(), self, stream.id, start, end).await
    }
}

#[async_trait]
impl SyncStore for PgSyncStore {
    async fn mark_pending(&self, data_stream_id: Uuid) -> Result<(), IntegrationError> {
        Ok(pulseboard_db::mark_stream_pending(&self.pool, data_stream_id).await?)
    }

    async fn mark_active(
        &self,
        data_stream_id: Uuid,
        synced_at: DateTime<Utc>,
    ) -> Result<(), IntegrationError> {
        Ok(pulseboard_db::mark_stream_active(&self.pool, data_stream_id, synced_at).await?)
    }

    async fn mark_error(
        &self,
        data_stream_id: Uuid,
        message: &str,
    ) -> Result<(), IntegrationError> {
        Ok(pulseboard_db::mark_stream_error(&self.pool, data_stream_id, message).await?)
    }

    async fn save_config(
        &self,
        data_stream_id: Uuid,
        config: &IntegrationConfig,
    ) -> Result<(), IntegrationError> {
        Ok(pulseboard_db::update_stream_config(&self.pool, data_stream_id, config).await?)
    }

    async fn upsert_analytics(
        &self,
        organization_id: Uuid,
        data_stream_id: Uuid,
        rows: &[IntegrationData],
    ) -> Result<u64, IntegrationError> {
        Ok(
            pulseboard_db::upsert_analytics_data(&self.pool, organization_id, data_stream_id, rows)
                .await?,
        )
    }
}
