use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::instrument;

use statustag_core::DeviceId;

use crate::database::Database;
use crate::error::StoreError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRow {
    pub id: DeviceId,
    pub active_image: Option<i64>,
    pub screen_width: Option<u16>,
    pub screen_height: Option<u16>,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct DeviceRepo {
    db: Database,
}

impl DeviceRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record the display geometry a device reported. Idempotent.
    #[instrument(skip(self), fields(device_id = %id))]
    pub fn upsert_geometry(&self, id: &DeviceId, width: u16, height: u16) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO devices (id, screen_width, screen_height, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    screen_width = excluded.screen_width,
                    screen_height = excluded.screen_height,
                    updated_at = excluded.updated_at",
                rusqlite::params![id.as_str(), width, height, now],
            )?;
            Ok(())
        })
    }

    #[instrument(skip(self), fields(device_id = %id))]
    pub fn get(&self, id: &DeviceId) -> Result<Option<DeviceRow>, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, active_image, screen_width, screen_height, updated_at
                     FROM devices WHERE id = ?1",
                    [id.as_str()],
                    |row| {
                        Ok(DeviceRow {
                            id: DeviceId::from_string(row.get(0)?),
                            active_image: row.get(1)?,
                            screen_width: row.get(2)?,
                            screen_height: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    /// List all known devices.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<DeviceRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, active_image, screen_width, screen_height, updated_at
                 FROM devices ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(DeviceRow {
                        id: DeviceId::from_string(row.get(0)?),
                        active_image: row.get(1)?,
                        screen_width: row.get(2)?,
                        screen_height: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
