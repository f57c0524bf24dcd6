use bytes::Bytes;
use chrono::Utc;
use rusqlite::OptionalExtension;
use tracing::{debug, instrument};

use statustag_core::{DeviceId, ImageFormat, ImageIdentity, SourceImage};

use crate::database::Database;
use crate::error::StoreError;

/// Image metadata without the blob.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageRow {
    pub id: i64,
    pub device_id: DeviceId,
    pub format: ImageFormat,
    pub size: u64,
    pub created_at: String,
}

#[derive(Clone)]
pub struct ImageRepo {
    db: Database,
    max_file_size: u64,
}

impl ImageRepo {
    pub fn new(db: Database, max_file_size: u64) -> Self {
        Self { db, max_file_size }
    }

    /// Store an image for a device. The format is sniffed from the bytes.
    #[instrument(skip(self, data), fields(device_id = %device, size = data.len()))]
    pub fn insert(&self, device: &DeviceId, data: &[u8]) -> Result<ImageRow, StoreError> {
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(StoreError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        let format = ImageFormat::sniff(data);
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO images (device_id, data, format, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![device.as_str(), data, format.as_str(), now],
            )?;
            Ok(ImageRow {
                id: conn.last_insert_rowid(),
                device_id: device.clone(),
                format,
                size,
                created_at: now,
            })
        })
    }

    /// Make `image_id` the device's active image, creating the device row if needed.
    #[instrument(skip(self), fields(device_id = %device))]
    pub fn set_active(&self, device: &DeviceId, image_id: i64) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            let owner: Option<String> = conn
                .query_row("SELECT device_id FROM images WHERE id = ?1", [image_id], |row| {
                    row.get(0)
                })
                .optional()?;
            if owner.as_deref() != Some(device.as_str()) {
                return Err(StoreError::NotFound(format!("image {image_id} for device {device}")));
            }
            conn.execute(
                "INSERT INTO devices (id, active_image, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET
                    active_image = excluded.active_image,
                    updated_at = excluded.updated_at",
                rusqlite::params![device.as_str(), image_id, now],
            )?;
            Ok(())
        })
    }

    /// Insert and activate.
    pub fn push(&self, device: &DeviceId, data: &[u8]) -> Result<ImageRow, StoreError> {
        let row = self.insert(device, data)?;
        self.set_active(device, row.id)?;
        debug!(device_id = %device, image_id = row.id, format = row.format.as_str(), "image activated");
        Ok(row)
    }

    /// Detach the active image without deleting it.
    #[instrument(skip(self), fields(device_id = %device))]
    pub fn clear_active(&self, device: &DeviceId) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let _ = conn.execute(
                "UPDATE devices SET active_image = NULL, updated_at = ?2 WHERE id = ?1",
                rusqlite::params![device.as_str(), Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// The device's active image, identity being the image row id.
    #[instrument(skip(self), fields(device_id = %device))]
    pub fn active_for_device(&self, device: &DeviceId) -> Result<Option<SourceImage>, StoreError> {
        self.db.with_conn(|conn| {
            let found: Option<(i64, Vec<u8>, String)> = conn
                .query_row(
                    "SELECT i.id, i.data, i.format
                     FROM devices d JOIN images i ON i.id = d.active_image
                     WHERE d.id = ?1",
                    [device.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            found
                .map(|(id, data, format)| {
                    let format = ImageFormat::parse(&format).ok_or_else(|| StoreError::CorruptRow {
                        table: "images",
                        column: "format",
                        detail: format!("unknown format {format:?}"),
                    })?;
                    Ok(SourceImage {
                        identity: ImageIdentity::from(id),
                        bytes: Bytes::from(data),
                        format,
                    })
                })
                .transpose()
        })
    }

    /// Images stored for a device, newest first.
    #[instrument(skip(self), fields(device_id = %device))]
    pub fn list_for_device(&self, device: &DeviceId) -> Result<Vec<ImageRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, format, length(data), created_at
                 FROM images WHERE device_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map([device.as_str()], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, device_id, format, size, created_at)| {
                    Ok(ImageRow {
                        id,
                        device_id: DeviceId::from_string(device_id),
                        format: ImageFormat::parse(&format).ok_or_else(|| StoreError::CorruptRow {
                            table: "images",
                            column: "format",
                            detail: format!("unknown format {format:?}"),
                        })?,
                        size: size as u64,
                        created_at,
                    })
                })
                .collect()
        })
    }
}
