//! Configuration validation.

use crate::error::ConfigError;
use crate::schema::Config;

/// Recovery bases understood by the detector.
pub const RECOVERY_BASES: [&str; 2] = ["ping_instant", "missed_fire"];

/// Email providers understood by the notifier.
pub const EMAIL_PROVIDERS: [&str; 2] = ["log", "sendgrid"];

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Turn the first error into a [`ConfigError`].
    pub fn into_result(self) -> Result<Vec<ValidationWarning>, ConfigError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(ConfigError::InvalidValue {
                field: err.path,
                message: err.message,
            }),
            None => Ok(self.warnings),
        }
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> Result<ValidationResult, ConfigError> {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_database(config, &mut result);
        Self::validate_owner(config, &mut result);
        Self::validate_detector(config, &mut result);
        Self::validate_dispatcher(config, &mut result);
        Self::validate_email(config, &mut result);

        Ok(result)
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_database(config: &Config, result: &mut ValidationResult) {
        if config.database.path.as_os_str().is_empty() {
            result.add_error(ValidationError::new(
                "database.path",
                "Database path cannot be empty",
            ));
        } else if config.database.is_in_memory() {
            result.add_warning(ValidationWarning::new(
                "database.path",
                "In-memory database, all jobs are lost on restart",
            ));
        }
    }

    fn validate_owner(config: &Config, result: &mut ValidationResult) {
        if config.owner.id.trim().is_empty() {
            result.add_error(ValidationError::new("owner.id", "Owner id cannot be empty"));
        }

        if !config.owner.email.contains('@') {
            result.add_warning(ValidationWarning::new(
                "owner.email",
                format!(
                    "'{}' does not look like an email address, alerts will not arrive",
                    config.owner.email
                ),
            ));
        }
    }

    fn validate_detector(config: &Config, result: &mut ValidationResult) {
        if config.detector.interval_secs == 0 {
            result.add_error(ValidationError::new(
                "detector.interval_secs",
                "interval_secs must be greater than 0",
            ));
        }

        if !RECOVERY_BASES.contains(&config.detector.recovery_basis.as_str()) {
            result.add_error(ValidationError::new(
                "detector.recovery_basis",
                format!(
                    "Unknown recovery basis '{}', valid values: {:?}",
                    config.detector.recovery_basis, RECOVERY_BASES
                ),
            ));
        }

        if !config.detector.enabled {
            result.add_warning(ValidationWarning::new(
                "detector.enabled",
                "Detector disabled, missed runs will not be noticed",
            ));
        }
    }

    fn validate_dispatcher(config: &Config, result: &mut ValidationResult) {
        let dispatcher = &config.dispatcher;

        if dispatcher.interval_secs == 0 {
            result.add_error(ValidationError::new(
                "dispatcher.interval_secs",
                "interval_secs must be greater than 0",
            ));
        }

        if dispatcher.batch_size == 0 {
            result.add_error(ValidationError::new(
                "dispatcher.batch_size",
                "batch_size must be greater than 0",
            ));
        }

        if dispatcher.max_attempts == 0 {
            result.add_error(ValidationError::new(
                "dispatcher.max_attempts",
                "max_attempts must be at least 1",
            ));
        }

        if dispatcher.max_attempts > 10 {
            result.add_warning(ValidationWarning::new(
                "dispatcher.max_attempts",
                "max_attempts is very high (>10), alerts may arrive long after the miss",
            ));
        }

        if dispatcher.retry_base_secs == 0 && dispatcher.max_attempts > 1 {
            result.add_error(ValidationError::new(
                "dispatcher.retry_base_secs",
                "retry_base_secs must be greater than 0 when retries are enabled",
            ));
        }

        if dispatcher.retry_base_secs > dispatcher.retry_max_secs {
            result.add_error(ValidationError::new(
                "dispatcher.retry_max_secs",
                "retry_max_secs must not be smaller than retry_base_secs",
            ));
        }

        if let Some(ref url) = dispatcher.dashboard_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                result.add_error(ValidationError::new(
                    "dispatcher.dashboard_url",
                    "dashboard_url must start with http:// or https://",
                ));
            }
        }
    }

    fn validate_email(config: &Config, result: &mut ValidationResult) {
        let email = &config.email;

        if !EMAIL_PROVIDERS.contains(&email.provider.as_str()) {
            result.add_error(ValidationError::new(
                "email.provider",
                format!(
                    "Unknown email provider '{}', valid values: {:?}",
                    email.provider, EMAIL_PROVIDERS
                ),
            ));
            return;
        }

        if email.provider == "log" {
            result.add_warning(ValidationWarning::new(
                "email.provider",
                "Alerts are written to the log only, no email will be delivered",
            ));
            return;
        }

        if email.api_key.as_deref().is_none_or(str::is_empty) {
            result.add_error(ValidationError::new(
                "email.api_key",
                "api_key is required for the sendgrid provider",
            ));
        }

        if !email.api_base_url.starts_with("http://") && !email.api_base_url.starts_with("https://") {
            result.add_error(ValidationError::new(
                "email.api_base_url",
                "api_base_url must start with http:// or https://",
            ));
        }

        if !email.from_address.contains('@') {
            result.add_error(ValidationError::new(
                "email.from_address",
                "from_address must be an email address",
            ));
        }

        if email.timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "email.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }
    }
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
