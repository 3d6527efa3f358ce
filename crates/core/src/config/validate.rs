use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Reset day fits every month
/// - Subset paging and region are usable
/// - Drought-index scales are present and positive
/// - Mailbox and SMTP sections name their addresses
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    if !(1..=28).contains(&config.calendar.reset_day) {
        return Err(invalid("calendar.reset_day must be between 1 and 28"));
    }

    if config.subset.batch_size == 0 {
        return Err(invalid("subset.batch_size cannot be 0"));
    }
    if !config.subset.bounding_box.is_valid() {
        return Err(invalid("subset.bounding_box is not a valid west/south/east/north box"));
    }

    if config.stages.scales.is_empty() || config.stages.scales.contains(&0) {
        return Err(invalid("stages.scales must list positive month counts"));
    }

    if config.schedule.daily_cron.trim().is_empty() || config.schedule.mailbox_cron.trim().is_empty()
    {
        return Err(invalid("schedule cron expressions cannot be empty"));
    }

    if let Some(mailbox) = &config.mailbox {
        if !mailbox.trusted_sender.contains('@') {
            return Err(invalid("mailbox.trusted_sender must be an email address"));
        }
        if mailbox.command_token.trim().is_empty() {
            return Err(invalid("mailbox.command_token cannot be empty"));
        }
    }

    if let Some(smtp) = &config.notify.smtp {
        if smtp.to.is_empty() {
            return Err(invalid("notify.smtp.to needs at least one recipient"));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MailboxConfig;
    use crate::config::ServerConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_reset_day() {
        let mut config = Config::default();
        config.calendar.reset_day = 31;
        assert!(validate_config(&config).is_err());
        config.calendar.reset_day = 28;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_scales() {
        let mut config = Config::default();
        config.stages.scales = vec![];
        assert!(validate_config(&config).is_err());
        config.stages.scales = vec![1, 0];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_mailbox_sender() {
        let mut config = Config::default();
        config.mailbox = Some(MailboxConfig::new("robot@example.org", "not-an-address"));
        assert!(validate_config(&config).is_err());
        config.mailbox = Some(MailboxConfig::new("robot@example.org", "ops@example.org"));
        assert!(validate_config(&config).is_ok());
    }
}
