// ABOUTME: Module bring-up: probe the module and SIM, configure PDU mode, UCS2 and CNMI, wait for attach
// ABOUTME: Every step before the attach wait is fail-fast; the attach wait is capped and cancellable

use crate::client::error::{ModemError, ModemResult};
use crate::client::transport::Transport;
use crate::command::{AtCommand, CnmiSettings};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Character set selected during bring-up
pub const BRING_UP_CHARSET: &str = "UCS2";

/// Bring-up parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringUpConfig {
    /// Delay between `AT+CGATT?` polls
    pub attach_interval: Duration,
    /// Number of attach polls before giving up; `None` waits until cancelled
    pub attach_attempts: Option<u32>,
    pub cnmi: CnmiSettings,
    /// Let startup continue when the attach wait ends unattached
    pub tolerate_unattached: bool,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            attach_interval: Duration::from_secs(5),
            attach_attempts: None,
            cnmi: CnmiSettings::default(),
            tolerate_unattached: false,
        }
    }
}

impl BringUpConfig {
    pub fn with_attach_interval(mut self, interval: Duration) -> Self {
        self.attach_interval = interval;
        self
    }

    pub fn with_attach_attempts(mut self, attempts: u32) -> Self {
        self.attach_attempts = Some(attempts);
        self
    }

    pub fn with_cnmi(mut self, cnmi: CnmiSettings) -> Self {
        self.cnmi = cnmi;
        self
    }

    pub fn with_tolerate_unattached(mut self, tolerate: bool) -> Self {
        self.tolerate_unattached = tolerate;
        self
    }
}

/// How the network attach wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStatus {
    Attached { attempts: u32 },
    /// The attempt cap was reached first
    StillWaiting { attempts: u32 },
}

impl AttachStatus {
    pub fn is_attached(&self) -> bool {
        matches!(self, AttachStatus::Attached { .. })
    }
}

/// Run the bring-up sequence.
///
/// Returns [`ModemError::Cancelled`] if `cancel` fires during the attach
/// wait.
pub async fn bring_up(
    transport: &Transport,
    config: &BringUpConfig,
    cancel: &CancellationToken,
) -> ModemResult<AttachStatus> {
    info!("starting module bring-up");

    let response = transport.execute(AtCommand::Attention.into_command()).await?;
    if !response.is_ok() {
        return Err(ModemError::ModuleUnresponsive);
    }

    let response = transport
        .execute(AtCommand::cpin(None).into_command())
        .await?;
    if !response.contains("READY") {
        warn!(response = %response.text().trim(), "SIM not ready");
        return Err(ModemError::SimNotReady);
    }

    configure(transport, AtCommand::cmgf(0)).await?;
    configure(transport, AtCommand::cscs(BRING_UP_CHARSET)).await?;
    configure(transport, AtCommand::NewMessageIndication(config.cnmi)).await?;

    let status = wait_for_attach(transport, config, cancel).await?;
    match status {
        AttachStatus::Attached { attempts } => info!(attempts, "attached to the network"),
        AttachStatus::StillWaiting { attempts } => {
            warn!(attempts, "network attach still pending")
        }
    }
    Ok(status)
}

async fn configure(transport: &Transport, command: AtCommand) -> ModemResult<()> {
    let step = command.to_string();
    let response = transport.execute(command.into_command()).await?;
    if !response.is_ok() {
        warn!(step = %step, response = %response.text().trim(), "configuration rejected");
        return Err(ModemError::BringUpFailed { step });
    }
    debug!(step = %step, "configured");
    Ok(())
}

async fn wait_for_attach(
    transport: &Transport,
    config: &BringUpConfig,
    cancel: &CancellationToken,
) -> ModemResult<AttachStatus> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let response = transport
            .execute(AtCommand::cgatt(None).into_command())
            .await?;
        if response.contains("+CGATT: 1") {
            return Ok(AttachStatus::Attached { attempts });
        }
        if config.attach_attempts.is_some_and(|cap| attempts >= cap) {
            return Ok(AttachStatus::StillWaiting { attempts });
        }

        debug!(attempts, "not attached yet, waiting");
        tokio::select! {
            _ = cancel.cancelled() => return Err(ModemError::Cancelled),
            _ = tokio::time::sleep(config.attach_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::TransportConfig;
    use crate::mock::{MockConnector, ScriptedModem, Step};

    const OK: &str = "\r\nOK\r\n";

    fn fast() -> BringUpConfig {
        BringUpConfig::default().with_attach_interval(Duration::from_millis(10))
    }

    async fn transport(steps: Vec<Step>) -> (Transport, tokio::task::JoinHandle<Vec<String>>) {
        let (stream, modem) = ScriptedModem::spawn(steps);
        let (transport, _feed) = Transport::open(
            MockConnector::new(vec![Ok(stream)]),
            TransportConfig::default(),
        )
        .await
        .unwrap();
        (transport, modem)
    }

    fn commands(log: Vec<String>) -> Vec<String> {
        log.into_iter().map(|c| c.trim_end().to_string()).collect()
    }

    #[tokio::test]
    async fn full_sequence_attaches() {
        let (transport, modem) = transport(vec![
            Step::new("AT", OK),
            Step::new("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n"),
            Step::new("AT+CMGF=0", OK),
            Step::new("AT+CSCS=\"UCS2\"", OK),
            Step::new("AT+CNMI=2,2,0,0,0", OK),
            Step::new("AT+CGATT?", "\r\n+CGATT: 0\r\n\r\nOK\r\n"),
            Step::new("AT+CGATT?", "\r\n+CGATT: 1\r\n\r\nOK\r\n"),
        ])
        .await;

        let status = bring_up(&transport, &fast(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, AttachStatus::Attached { attempts: 2 });

        transport.shutdown().await;
        drop(transport);
        assert_eq!(
            commands(modem.await.unwrap()),
            vec![
                "AT",
                "AT+CPIN?",
                "AT+CMGF=0",
                "AT+CSCS=\"UCS2\"",
                "AT+CNMI=2,2,0,0,0",
                "AT+CGATT?",
                "AT+CGATT?",
            ]
        );
    }

    #[tokio::test]
    async fn sim_failure_stops_before_charset() {
        let (transport, modem) = transport(vec![
            Step::new("AT", OK),
            Step::new("AT+CPIN?", "\r\n+CME ERROR: 10\r\n\r\nERROR\r\n"),
        ])
        .await;

        let err = bring_up(&transport, &fast(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModemError::SimNotReady));

        transport.shutdown().await;
        drop(transport);
        let log = commands(modem.await.unwrap());
        assert_eq!(log, vec!["AT", "AT+CPIN?"]);
        assert!(!log.iter().any(|c| c.starts_with("AT+CSCS")));
    }

    #[tokio::test]
    async fn silent_module_is_unresponsive() {
        let (transport, _modem) = transport(vec![Step::silent("AT")]).await;
        let err = bring_up(&transport, &fast(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModemError::ModuleUnresponsive));
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn rejected_step_is_named() {
        let (transport, _modem) = transport(vec![
            Step::new("AT", OK),
            Step::new("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n"),
            Step::new("AT+CMGF=0", "\r\nERROR\r\n"),
        ])
        .await;
        let err = bring_up(&transport, &fast(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ModemError::BringUpFailed { step } if step == "AT+CMGF=0"));
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn attach_cap_reports_still_waiting() {
        let unattached = "\r\n+CGATT: 0\r\n\r\nOK\r\n";
        let (transport, _modem) = transport(vec![
            Step::new("AT", OK),
            Step::new("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n"),
            Step::new("AT+CMGF=0", OK),
            Step::new("AT+CSCS=\"UCS2\"", OK),
            Step::new("AT+CNMI=2,2,0,0,0", OK),
            Step::new("AT+CGATT?", unattached),
            Step::new("AT+CGATT?", unattached),
        ])
        .await;
        let config = fast().with_attach_attempts(2);
        let status = bring_up(&transport, &config, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(status, AttachStatus::StillWaiting { attempts: 2 });
        assert!(!status.is_attached());
        transport.shutdown().await;
    }

    #[tokio::test]
    async fn attach_wait_is_cancellable() {
        let unattached = "\r\n+CGATT: 0\r\n\r\nOK\r\n";
        let (transport, _modem) = transport(vec![
            Step::new("AT", OK),
            Step::new("AT+CPIN?", "\r\n+CPIN: READY\r\n\r\nOK\r\n"),
            Step::new("AT+CMGF=0", OK),
            Step::new("AT+CSCS=\"UCS2\"", OK),
            Step::new("AT+CNMI=2,2,0,0,0", OK),
            Step::new("AT+CGATT?", unattached),
        ])
        .await;
        let cancel = CancellationToken::new();
        let config = BringUpConfig::default().with_attach_interval(Duration::from_secs(60));
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stopper.cancel();
        });
        let err = bring_up(&transport, &config, &cancel).await.unwrap_err();
        assert!(matches!(err, ModemError::Cancelled));
        transport.shutdown().await;
    }
}
