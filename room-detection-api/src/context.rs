use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};

use crate::config::ServiceConfig;
use crate::model::{load_model, select_device, Device, SegmentationModel};

/// Process-wide service state shared with every handler
pub struct ServiceContext {
    model: Option<Arc<dyn SegmentationModel>>,
    device: Device,
    model_path: PathBuf,
}

impl ServiceContext {
    pub fn new(model: Option<Arc<dyn SegmentationModel>>, device: Device, model_path: PathBuf) -> Self {
        Self {
            model,
            device,
            model_path,
        }
    }

    /// Select the compute device and load the model.
    ///
    /// Never fails: a missing or unloadable model leaves the service running
    /// without one, and `/detect` answers 503 until restart.
    pub fn initialize(config: &ServiceConfig) -> Self {
        let device = select_device(config.device);
        info!("Using device: {} (requested: {})", device, config.device);

        let model: Option<Arc<dyn SegmentationModel>> =
            match load_model(&config.model_path, device, config.intra_threads) {
                Ok(Some(model)) => Some(Arc::new(model)),
                Ok(None) => None,
                Err(e) => {
                    error!("Failed to load model from {}: {:#}", config.model_path.display(), e);
                    None
                }
            };

        Self::new(model, device, config.model_path.clone())
    }

    pub fn model(&self) -> Option<Arc<dyn SegmentationModel>> {
        self.model.clone()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn model_path(&self) -> &PathBuf {
        &self.model_path
    }

    /// Release the model once the server has stopped accepting requests
    pub fn shutdown(self) {
        match self.model {
            Some(model) => {
                info!("Releasing model: {}", model.model_info());
                drop(model);
            }
            None => info!("Shutting down (no model was loaded)"),
        }
    }
}
