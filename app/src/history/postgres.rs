use anyhow::Context as _;
use serde_json::Value;

use super::{HistoryRecord, HistoryStore, RecordValue};
use crate::core::time::TimeWindow;
use crate::telemetry::DevicePayload;

const SCHEMA: [&str; 3] = [
    r#"CREATE TABLE IF NOT EXISTS sensor_readings (
        id BIGSERIAL PRIMARY KEY,
        timestamp TIMESTAMPTZ NOT NULL,
        sensor_id TEXT NOT NULL,
        value DOUBLE PRECISION NOT NULL,
        unit TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS device_readings (
        id BIGSERIAL PRIMARY KEY,
        timestamp TIMESTAMPTZ NOT NULL,
        device_id TEXT NOT NULL,
        device_type TEXT NOT NULL,
        data JSONB NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS system_settings (
        key TEXT PRIMARY KEY,
        value JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
];

#[derive(sqlx::FromRow)]
struct SensorRow {
    timestamp: chrono::DateTime<chrono::Utc>,
    sensor_id: String,
    value: f64,
    unit: String,
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    timestamp: chrono::DateTime<chrono::Utc>,
    device_id: String,
    data: Value,
}

pub struct PgHistoryStore {
    pool: sqlx::PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Error creating history tables")?;
        }
        Ok(())
    }

    async fn query_sensor(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let rows: Vec<SensorRow> = sqlx::query_as(
            r#"SELECT timestamp, sensor_id, value, unit
                FROM sensor_readings
                WHERE sensor_id = $1
                AND ($2::timestamptz IS NULL OR timestamp >= $2)
                AND ($3::timestamptz IS NULL OR timestamp <= $3)
                ORDER BY timestamp DESC
                LIMIT $4"#,
        )
        .bind(metric)
        .bind(window.start().map(|dt| dt.into_db()))
        .bind(window.end().map(|dt| dt.into_db()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|row| HistoryRecord::reading(row.timestamp.into(), &row.sensor_id, row.value, &row.unit))
            .collect())
    }

    async fn query_device(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let rows: Vec<DeviceRow> = sqlx::query_as(
            r#"SELECT timestamp, device_id, data
                FROM device_readings
                WHERE device_id = $1
                AND ($2::timestamptz IS NULL OR timestamp >= $2)
                AND ($3::timestamptz IS NULL OR timestamp <= $3)
                ORDER BY timestamp DESC
                LIMIT $4"#,
        )
        .bind(metric)
        .bind(window.start().map(|dt| dt.into_db()))
        .bind(window.end().map(|dt| dt.into_db()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|row| {
                let data = match row.data {
                    Value::Object(map) => map,
                    other => DevicePayload::from_iter([("value".to_string(), other)]),
                };
                HistoryRecord::device(row.timestamp.into(), &row.device_id, data)
            })
            .collect())
    }
}

impl HistoryStore for PgHistoryStore {
    #[tracing::instrument(skip_all, fields(records = records.len()))]
    async fn append(&self, records: &[HistoryRecord]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            match &record.value {
                RecordValue::Reading { value, unit } => {
                    sqlx::query(
                        r#"INSERT INTO sensor_readings (timestamp, sensor_id, value, unit)
                           VALUES ($1, $2, $3, $4)"#,
                    )
                        .bind(record.timestamp.into_db())
                        .bind(&record.metric)
                        .bind(value)
                        .bind(unit)
                        .execute(&mut *tx)
                        .await?;
                }
                RecordValue::Device { device_type, data } => {
                    sqlx::query(
                        r#"INSERT INTO device_readings (timestamp, device_id, device_type, data)
                           VALUES ($1, $2, $3, $4)"#,
                    )
                        .bind(record.timestamp.into_db())
                        .bind(&record.metric)
                        .bind(device_type.to_string())
                        .bind(Value::Object(data.clone()))
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, window), fields(%window))]
    async fn query(
        &self,
        metric: &str,
        window: TimeWindow,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<HistoryRecord>> {
        let limit = limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));

        let sensor = self.query_sensor(metric, window, limit).await?;
        if !sensor.is_empty() {
            return Ok(sensor);
        }

        self.query_device(metric, window, limit).await
    }

    async fn get_setting(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let value: Option<Value> = sqlx::query_scalar(r#"SELECT value FROM system_settings WHERE key = $1"#)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    async fn put_setting(&self, key: &str, value: Value) -> anyhow::Result<()> {
        sqlx::query(
            r#"INSERT INTO system_settings (key, value, updated_at) VALUES ($1, $2, now())
                ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = EXCLUDED.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
