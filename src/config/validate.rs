use super::{ConfigError, Settings};

pub fn validate_settings(settings: &Settings) -> Result<(), ConfigError> {
    settings.validate()
}
