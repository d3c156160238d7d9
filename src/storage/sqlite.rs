//! SQLite device directory
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Request handlers can read while the monitor writes
//! - **Connection pooling**: Shared between the monitor task and API handlers
//! - **Migrations**: Schema is versioned with sqlx and applied on startup
//!
//! Timestamps are stored as Unix milliseconds.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Pool, Row, Sqlite};
use tracing::{debug, info, instrument};

use super::backend::{DeviceDirectory, DeviceStore};
use super::error::{StorageError, StorageResult};
use super::schema::{
    Device, DeviceId, MonitoredDevice, NewDevice, NewWorkload, Workload, WorkloadType,
};

const DEVICE_COLUMNS: &str = r#"
    id, mac_address, ip_address, hostname, name, notes, is_disabled, disabled_at,
    is_online, last_seen, first_seen, last_status_change
"#;

const WORKLOAD_COLUMNS: &str = r#"
    id, name, workload_type, status, port, definition, run_as_user, run_as_group,
    image, container_id, device_id
"#;

/// SQLite-backed device directory
pub struct SqliteDirectory {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteDirectory {
    /// Open (or create) the database at `db_path` and run migrations
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite directory at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("SQLite directory ready");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Path of the database file
    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn timestamp_to_millis(dt: &DateTime<Utc>) -> i64 {
        dt.timestamp_millis()
    }

    fn millis_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    fn device_from_row(row: &SqliteRow) -> Device {
        let optional_time =
            |column: &str| row.get::<Option<i64>, _>(column).map(Self::millis_to_timestamp);

        Device {
            id: row.get("id"),
            mac_address: row.get("mac_address"),
            ip_address: row.get("ip_address"),
            hostname: row.get("hostname"),
            name: row.get("name"),
            notes: row.get("notes"),
            is_disabled: row.get("is_disabled"),
            disabled_at: optional_time("disabled_at"),
            is_online: row.get("is_online"),
            last_seen: optional_time("last_seen"),
            first_seen: Self::millis_to_timestamp(row.get("first_seen")),
            last_status_change: optional_time("last_status_change"),
            workloads: vec![],
        }
    }

    fn workload_from_row(row: &SqliteRow) -> StorageResult<Workload> {
        let workload_type: String = row.get("workload_type");
        let workload_type = workload_type
            .parse::<WorkloadType>()
            .map_err(StorageError::Corrupt)?;

        Ok(Workload {
            id: row.get("id"),
            name: row.get("name"),
            workload_type,
            status: row.get("status"),
            port: row
                .get::<Option<i64>, _>("port")
                .and_then(|port| u16::try_from(port).ok()),
            definition: row.get("definition"),
            run_as_user: row.get("run_as_user"),
            run_as_group: row.get("run_as_group"),
            image: row.get("image"),
            container_id: row.get("container_id"),
            device_id: row.get("device_id"),
        })
    }

    async fn workloads_for(&self, device_id: DeviceId) -> StorageResult<Vec<Workload>> {
        let sql = format!("SELECT {WORKLOAD_COLUMNS} FROM workloads WHERE device_id = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::workload_from_row).collect()
    }

    async fn fetch_device(&self, row: Option<SqliteRow>) -> StorageResult<Option<Device>> {
        let Some(row) = row else {
            return Ok(None);
        };

        let mut device = Self::device_from_row(&row);
        device.workloads = self.workloads_for(device.id).await?;
        Ok(Some(device))
    }
}

#[async_trait]
impl DeviceDirectory for SqliteDirectory {
    #[instrument(skip(self))]
    async fn list_monitorable(&self) -> StorageResult<Vec<MonitoredDevice>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ip_address, hostname, is_disabled, is_online
            FROM devices
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        let devices = rows
            .into_iter()
            .map(|row| {
                let id: DeviceId = row.get("id");
                let address: Option<String> = row.get("ip_address");
                let hostname: Option<String> = row.get("hostname");
                let is_disabled: bool = row.get("is_disabled");

                MonitoredDevice {
                    id,
                    label: hostname
                        .or_else(|| address.clone())
                        .unwrap_or_else(|| format!("device {id}")),
                    address,
                    monitoring_enabled: !is_disabled,
                    is_online: row.get("is_online"),
                }
            })
            .collect::<Vec<_>>();

        debug!("directory returned {} devices", devices.len());
        Ok(devices)
    }

    #[instrument(skip(self, at))]
    async fn record_status(
        &self,
        id: DeviceId,
        is_online: bool,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        let at_millis = Self::timestamp_to_millis(&at);

        let result = sqlx::query(
            r#"
            UPDATE devices
            SET is_online = ?,
                last_status_change = ?,
                last_seen = CASE WHEN ? THEN ? ELSE last_seen END
            WHERE id = ?
            "#,
        )
        .bind(is_online)
        .bind(at_millis)
        .bind(is_online)
        .bind(at_millis)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryFailed(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("device {id}")));
        }

        Ok(())
    }
}

#[async_trait]
impl DeviceStore for SqliteDirectory {
    #[instrument(skip(self, new), fields(mac = %new.mac_address))]
    async fn create_device(&self, new: NewDevice) -> StorageResult<Device> {
        let now = Utc::now();
        let now_millis = Self::timestamp_to_millis(&now);

        let result = sqlx::query(
            r#"
            INSERT INTO devices (
                mac_address, ip_address, hostname, name, notes,
                is_disabled, disabled_at, is_online, first_seen
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&new.mac_address)
        .bind(&new.ip_address)
        .bind(&new.hostname)
        .bind(&new.name)
        .bind(&new.notes)
        .bind(new.is_disabled)
        .bind(new.is_disabled.then_some(now_millis))
        .bind(now_millis)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!("created device {id}");

        self.get_device(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("device {id}")))
    }

    async fn get_device(&self, id: DeviceId) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        self.fetch_device(row).await
    }

    async fn get_device_by_mac(&self, mac_address: &str) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE mac_address = ?");
        let row = sqlx::query(&sql)
            .bind(mac_address)
            .fetch_optional(&self.pool)
            .await?;

        self.fetch_device(row).await
    }

    #[instrument(skip(self))]
    async fn list_devices(&self, skip: usize, limit: usize) -> StorageResult<Vec<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id ASC LIMIT ? OFFSET ?");
        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(skip as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut devices: Vec<Device> = rows.iter().map(Self::device_from_row).collect();
        let (Some(first), Some(last)) = (devices.first(), devices.last()) else {
            return Ok(devices);
        };

        // The page is a contiguous id range, so one range scan loads every workload on it.
        let sql = format!(
            "SELECT {WORKLOAD_COLUMNS} FROM workloads WHERE device_id BETWEEN ? AND ? ORDER BY id"
        );
        let workload_rows = sqlx::query(&sql)
            .bind(first.id)
            .bind(last.id)
            .fetch_all(&self.pool)
            .await?;

        let mut by_device: HashMap<DeviceId, Vec<Workload>> = HashMap::new();
        for row in &workload_rows {
            let workload = Self::workload_from_row(row)?;
            by_device.entry(workload.device_id).or_default().push(workload);
        }

        for device in &mut devices {
            device.workloads = by_device.remove(&device.id).unwrap_or_default();
        }

        Ok(devices)
    }

    #[instrument(skip(self, new), fields(workload = %new.name))]
    async fn create_workload(
        &self,
        device_id: DeviceId,
        new: NewWorkload,
    ) -> StorageResult<Workload> {
        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM devices WHERE id = ?")
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(StorageError::NotFound(format!("device {device_id}")));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO workloads (
                name, workload_type, status, port, definition,
                run_as_user, run_as_group, image, container_id, device_id
            )
            VALUES (?, ?, 'unknown', ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(new.workload_type.as_str())
        .bind(new.port.map(i64::from))
        .bind(&new.definition)
        .bind(&new.run_as_user)
        .bind(&new.run_as_group)
        .bind(&new.image)
        .bind(&new.container_id)
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let sql = format!("SELECT {WORKLOAD_COLUMNS} FROM workloads WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_one(&self.pool).await?;

        Self::workload_from_row(&row)
    }
}
