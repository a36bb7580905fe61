use std::sync::Arc;

use common::{error::AppError, utils::config::AppConfig};
use job_lifecycle::JobLifecycleManager;

#[derive(Clone)]
pub struct ApiState {
    pub manager: Arc<JobLifecycleManager>,
    pub config: AppConfig,
}

impl ApiState {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let manager = JobLifecycleManager::from_config(config)?;

        Ok(Self {
            manager: Arc::new(manager),
            config: config.clone(),
        })
    }

    pub fn with_manager(config: &AppConfig, manager: JobLifecycleManager) -> Self {
        Self {
            manager: Arc::new(manager),
            config: config.clone(),
        }
    }
}
