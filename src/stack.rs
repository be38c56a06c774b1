//! Stack handle: spawns the service task and hands out client endpoints.

use crate::actor::{request, run_stack_actor, StackCmd, Timers};
use crate::client::XtcpClient;
use crate::config::StackConfig;
use crate::driver::{NetInput, NetworkDriver};
use crate::error::{Result, XtcpError};
use crate::metrics::{MetricsSnapshot, StackMetrics};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;
use xtcp_core::{IpConfig, MacAddress, StackEngine, XtcpCoreConfig};

/// One running stack instance.
///
/// All connection state lives in a single service task; this handle and
/// every [`XtcpClient`] talk to it over a command channel. Dropping the
/// handle stops the service.
pub struct XtcpStack<S = u32> {
    cmd_tx: mpsc::Sender<StackCmd<S>>,
    metrics: Arc<StackMetrics>,
    task: Option<JoinHandle<()>>,
}

impl<S: Clone + Send + 'static> XtcpStack<S> {
    /// Start the service task with `driver` as packet engine.
    ///
    /// The MAC address comes from the configuration, else from the
    /// driver's factory storage, else is all-zero. Returns the handle the
    /// packet engine uses to report occurrences.
    pub fn spawn<D: NetworkDriver>(config: StackConfig, driver: D) -> Result<(Self, NetInput)> {
        config.validate()?;

        let mac = config
            .mac_address
            .or_else(|| driver.factory_mac())
            .unwrap_or(MacAddress::ZERO);
        let ip_config = config.ip_config;
        let engine = StackEngine::new(XtcpCoreConfig::from(config.clone()), mac, ip_config)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_capacity);
        let (net_tx, net_rx) = mpsc::channel(config.input_capacity);
        let metrics = Arc::new(StackMetrics::default());
        let timers = Timers {
            tick: config.tick_interval,
            phy_poll: config.phy_poll_interval,
        };

        let task = tokio::spawn(run_stack_actor(
            engine,
            cmd_rx,
            net_rx,
            driver,
            metrics.clone(),
            timers,
        ));

        info!(
            %mac,
            ip = %ip_config.address(),
            dhcp = ip_config.wants_dhcp(),
            max_connections = config.max_connections,
            "Stack started"
        );

        Ok((
            Self {
                cmd_tx,
                metrics,
                task: Some(task),
            },
            NetInput::new(net_tx),
        ))
    }

    /// Attach a new client endpoint.
    pub async fn client(&self) -> Result<XtcpClient<S>> {
        let id = request(&self.cmd_tx, |reply| StackCmd::Attach { reply }).await?;
        Ok(XtcpClient::new(id, self.cmd_tx.clone()))
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn mac_address(&self) -> Result<MacAddress> {
        request(&self.cmd_tx, |reply| StackCmd::MacAddress { reply }).await
    }

    pub async fn ip_config(&self) -> Result<IpConfig> {
        request(&self.cmd_tx, |reply| StackCmd::IpConfig { reply }).await
    }

    /// Stop the service task and wait for it to finish.
    ///
    /// Pending client requests fail with a stack-closed error.
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.cmd_tx.send(StackCmd::Shutdown).await;
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| XtcpError::internal(format!("stack task failed: {e}")))?;
        }
        info!("Stack stopped");
        Ok(())
    }
}

impl<S> Drop for XtcpStack<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if self.cmd_tx.try_send(StackCmd::Shutdown).is_err() {
                task.abort();
            }
        }
    }
}
