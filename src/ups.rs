//! Unattended power-loss monitor.
//!
//! Polls the charging-port flag. When external power is seen missing, waits
//! out a grace period and checks once more; only a second "unplugged" reading
//! runs the shutdown action. Either way, polling then carries on.

use crate::error::Result;
use crate::frame::DeviceState;
use crate::protocol::Powerbank;
use crate::transport::Transport;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(60);
pub const DEFAULT_IDLE: Duration = Duration::from_millis(250);
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "/sbin/poweroff";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsConfig {
    /// How long power must stay away before shutting down
    pub grace: Duration,
    /// Pause between polls while powered
    pub idle: Duration,
}

impl Default for UpsConfig {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            idle: DEFAULT_IDLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    #[default]
    Powered,
    Suspect,
    ShutdownTriggered,
}

/// Whatever takes the host down once power loss is confirmed.
pub trait ShutdownAction {
    fn trigger(&mut self) -> impl Future<Output = ()> + Send;
}

/// Runs a shell command line; its exit status is logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct ShutdownCommand {
    command: String,
}

impl ShutdownCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl Default for ShutdownCommand {
    fn default() -> Self {
        Self::new(DEFAULT_SHUTDOWN_COMMAND)
    }
}

impl ShutdownAction for ShutdownCommand {
    async fn trigger(&mut self) {
        tracing::info!("Running shutdown command: {}", self.command);
        match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .status()
            .await
        {
            Ok(status) => tracing::info!("Shutdown command exited with {}", status),
            Err(e) => tracing::error!("Failed to run shutdown command: {}", e),
        }
    }
}

pub struct UpsMonitor<A> {
    action: A,
    config: UpsConfig,
    state: PowerState,
}

impl<A: ShutdownAction> UpsMonitor<A> {
    pub fn new(action: A, config: UpsConfig) -> Self {
        Self {
            action,
            config,
            state: PowerState::Powered,
        }
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// One poll, plus the grace wait and re-check if power is missing.
    ///
    /// Returns the state reached: `Powered` or `ShutdownTriggered`.
    pub async fn check<T: Transport>(&mut self, bank: &mut Powerbank<T>) -> Result<PowerState> {
        let state = bank.read_state().await?;
        if state.charging_port_plugged_in() {
            self.state = PowerState::Powered;
            return Ok(self.state);
        }

        self.state = PowerState::Suspect;
        tracing::warn!(
            "External power lost (battery {:.2} V), re-checking in {:?}",
            battery_volts(&state),
            self.config.grace
        );
        tokio::time::sleep(self.config.grace).await;

        let state = bank.read_state().await?;
        if state.charging_port_plugged_in() {
            tracing::info!("External power restored");
            self.state = PowerState::Powered;
        } else {
            tracing::warn!(
                "External power still absent after {:?}, shutting down",
                self.config.grace
            );
            self.state = PowerState::ShutdownTriggered;
            self.action.trigger().await;
        }

        Ok(self.state)
    }

    /// Poll until a protocol or transport error occurs.
    pub async fn run<T: Transport>(&mut self, bank: &mut Powerbank<T>) -> Result<()> {
        tracing::info!(
            "UPS monitor started (grace {:?}, idle {:?})",
            self.config.grace,
            self.config.idle
        );
        loop {
            self.check(bank).await?;
            tokio::time::sleep(self.config.idle).await;
        }
    }
}

fn battery_volts(state: &DeviceState) -> f32 {
    state
        .battery_voltage
        .get::<uom::si::electric_potential::volt>()
}
