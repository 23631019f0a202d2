//! Component lifecycle state machine
//!
//! ```text
//! STOPPED ──start──▶ STARTING ──hook ok──▶ RUNNING ──stop──▶ STOPPING ──▶ STOPPED
//!    ▲                   │                                                  ▲
//!    │                   └──hook failed──▶ ERROR ──────────stop─────────────┘
//!    └──────────────start (retry from ERROR) ◀──────┘
//! ```
//!
//! Transitions are pure: the caller supplies the timestamp.

use crate::error::{ComponentError, ComponentResult};
use crate::protocol::ComponentStatus;
use chrono::{DateTime, Utc};

/// Lifecycle status plus the last start/stop timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentState {
    pub status: ComponentStatus,
    /// Set on entering RUNNING, kept as the last-start record
    pub started_at: Option<DateTime<Utc>>,
    /// Set on entering STOPPED from RUNNING or ERROR
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Default for ComponentState {
    fn default() -> Self {
        Self {
            status: ComponentStatus::Stopped,
            started_at: None,
            stopped_at: None,
        }
    }
}

impl ComponentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.status == ComponentStatus::Running
    }

    /// Whether `start()` is admissible from the current status
    pub fn can_start(&self) -> bool {
        matches!(
            self.status,
            ComponentStatus::Stopped | ComponentStatus::Error
        )
    }

    /// STOPPED | ERROR → STARTING
    pub fn begin_start(&mut self) -> ComponentResult<()> {
        if !self.can_start() {
            return Err(ComponentError::AlreadyRunning {
                status: self.status,
            });
        }
        self.status = ComponentStatus::Starting;
        Ok(())
    }

    /// STARTING → RUNNING
    pub fn complete_start(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, ComponentStatus::Starting);
        self.status = ComponentStatus::Running;
        self.started_at = Some(now);
    }

    /// STARTING → ERROR
    pub fn fail_start(&mut self) {
        debug_assert_eq!(self.status, ComponentStatus::Starting);
        self.status = ComponentStatus::Error;
    }

    /// RUNNING | ERROR → STOPPING
    ///
    /// Returns `Ok(false)` when already STOPPED, which makes stop idempotent.
    pub fn begin_stop(&mut self) -> ComponentResult<bool> {
        match self.status {
            ComponentStatus::Stopped => Ok(false),
            ComponentStatus::Running | ComponentStatus::Error => {
                self.status = ComponentStatus::Stopping;
                Ok(true)
            }
            status => Err(ComponentError::NotRunning { status }),
        }
    }

    /// STOPPING → STOPPED
    pub fn complete_stop(&mut self, now: DateTime<Utc>) {
        debug_assert_eq!(self.status, ComponentStatus::Stopping);
        self.status = ComponentStatus::Stopped;
        self.stopped_at = Some(now);
    }
}
