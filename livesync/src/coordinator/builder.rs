use std::sync::Arc;

use super::SessionCoordinator;
use crate::bus::EventBus;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::roster::Roster;
use crate::throttle::{ActionThrottler, RepeatedActionThrottler};

/// Builder for [`SessionCoordinator`]
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use livesync::prelude::*;
/// # fn demo(bus: Arc<dyn EventBus>, roster: Arc<dyn Roster>) -> livesync::Result<()> {
/// let coordinator = SessionCoordinator::builder(bus, Arc::new(SystemClock::new()), roster)
///     .config(SessionConfig::strict())
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionCoordinatorBuilder {
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    roster: Arc<dyn Roster>,
    config: SessionConfig,
    throttler: Option<Arc<dyn ActionThrottler>>,
}

impl SessionCoordinatorBuilder {
    pub fn new(bus: Arc<dyn EventBus>, clock: Arc<dyn Clock>, roster: Arc<dyn Roster>) -> Self {
        Self {
            bus,
            clock,
            roster,
            config: SessionConfig::default(),
            throttler: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the default [`RepeatedActionThrottler`]
    pub fn throttler(mut self, throttler: Arc<dyn ActionThrottler>) -> Self {
        self.throttler = Some(throttler);
        self
    }

    pub fn build(self) -> Result<Arc<SessionCoordinator>> {
        self.config.validate()?;
        let throttler = self.throttler.unwrap_or_else(|| {
            Arc::new(RepeatedActionThrottler::new(self.config.throttle_window))
        });
        Ok(Arc::new(SessionCoordinator::new(
            self.bus,
            self.clock,
            self.roster,
            self.config,
            throttler,
        )))
    }
}
