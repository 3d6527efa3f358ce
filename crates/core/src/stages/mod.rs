//! Delegated pipeline stages.
//!
//! The numeric work (monthly aggregation, concatenation, drought-index
//! fitting, raster cropping) is done by external programs; this module only
//! runs them, in order, with templated arguments. Publishing and archival are
//! native stages living in [`crate::publish`] and [`crate::archive`].

mod command;
mod config;
mod error;
mod readiness;
mod template;
mod traits;
mod types;

use std::sync::Arc;

pub use command::CommandStage;
pub use config::{CommandStageConfig, StagesConfig};
pub use error::StageError;
pub use readiness::wait_until_ready;
pub use template::TemplateVars;
pub use traits::Stage;
pub use types::{StageContext, StageKind, StageReport};

/// Builds a stage for every configured external command.
pub fn command_stages(config: &StagesConfig) -> Vec<Arc<dyn Stage>> {
    [
        (StageKind::Aggregate, &config.aggregate),
        (StageKind::Concatenate, &config.concatenate),
        (StageKind::PrecipitationCrop, &config.precipitation_crop),
        (StageKind::DroughtIndex, &config.drought_index),
        (StageKind::IndexCrop, &config.index_crop),
    ]
    .into_iter()
    .filter_map(|(kind, stage)| {
        stage.as_ref().map(|c| {
            Arc::new(CommandStage::new(kind, c.clone(), config.timeout_secs)) as Arc<dyn Stage>
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_stages_skips_unconfigured() {
        let mut config = StagesConfig::default();
        assert!(command_stages(&config).is_empty());

        config.drought_index = Some(CommandStageConfig {
            program: "spi".to_string(),
            args: vec![],
            outputs: vec![],
            per_scale: true,
            working_dir: None,
            timeout_secs: None,
        });
        config.aggregate = Some(CommandStageConfig {
            program: "sum".to_string(),
            args: vec![],
            outputs: vec![],
            per_scale: false,
            working_dir: None,
            timeout_secs: None,
        });

        let kinds: Vec<_> = command_stages(&config).iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, vec![StageKind::Aggregate, StageKind::DroughtIndex]);
    }
}
