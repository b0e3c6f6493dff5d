use crate::{error::ConfigError, types::LocationId};

/// How the in-process substrate delivers asynchronous invocations.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Messages are queued and run only when the runtime is polled.
    #[default]
    Deferred,
    /// Every send drains the queue before returning, so a send may call back
    /// into the sender before the send itself returns.
    Eager,
}

/// Runtime configuration.
///
/// Binds the shape of the simulated execution (how many locations take part)
/// and the delivery discipline of the remote-invocation substrate.
#[must_use]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of locations of the runtime.
    pub num_locations: LocationId,
    /// Message delivery discipline.
    pub delivery: DeliveryMode,
}

impl Config {
    /// Configuration for `num_locations` locations with deferred delivery.
    pub const fn new(num_locations: LocationId) -> Self {
        Self {
            num_locations,
            delivery: DeliveryMode::Deferred,
        }
    }

    /// Replace the delivery discipline.
    pub const fn with_delivery(self, delivery: DeliveryMode) -> Self {
        Self { delivery, ..self }
    }

    /// Check that the configuration describes a runnable runtime.
    ///
    /// # Errors
    /// If the runtime would have no locations.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.num_locations == 0 {
            return Err(ConfigError::NoLocations);
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_locations_is_rejected() {
        assert_eq!(Config::new(0).validate(), Err(ConfigError::NoLocations));
        assert_eq!(Config::new(3).validate(), Ok(()));
    }

    #[test]
    fn delivery_defaults_to_deferred() {
        let config = Config::default();
        assert_eq!(config.delivery, DeliveryMode::Deferred);
        assert_eq!(
            config.with_delivery(DeliveryMode::Eager).delivery,
            DeliveryMode::Eager
        );
    }
}
