use async_trait::async_trait;
use tracing::debug;

use statustag_core::{DeviceId, ImageSource, SourceError, SourceImage};

use crate::database::Database;
use crate::devices::DeviceRepo;
use crate::error::StoreError;
use crate::images::ImageRepo;

/// [`ImageSource`] backed by the SQLite store.
///
/// Queries run on the blocking pool so a slow disk never stalls the runtime.
#[derive(Clone)]
pub struct SqliteImageSource {
    devices: DeviceRepo,
    images: ImageRepo,
}

impl SqliteImageSource {
    pub fn new(db: Database, max_file_size: u64) -> Self {
        Self {
            devices: DeviceRepo::new(db.clone()),
            images: ImageRepo::new(db, max_file_size),
        }
    }

    pub fn devices(&self) -> &DeviceRepo {
        &self.devices
    }

    pub fn images(&self) -> &ImageRepo {
        &self.images
    }
}

async fn blocking<T, F>(f: F) -> Result<T, SourceError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SourceError::Backend(format!("store task failed: {e}")))?
        .map_err(SourceError::from)
}

#[async_trait]
impl ImageSource for SqliteImageSource {
    async fn active_image(&self, device: &DeviceId) -> Result<Option<SourceImage>, SourceError> {
        let images = self.images.clone();
        let device = device.clone();
        blocking(move || images.active_for_device(&device)).await
    }

    async fn register_device(&self, device: &DeviceId, width: u16, height: u16) -> Result<(), SourceError> {
        let devices = self.devices.clone();
        let id = device.clone();
        blocking(move || devices.upsert_geometry(&id, width, height)).await?;
        debug!(device_id = %device, width, height, "device geometry recorded");
        Ok(())
    }
}
