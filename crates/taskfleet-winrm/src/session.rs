//! The production `PsExecutor`: one WS-Man shell per script run.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use std::time::Duration;

use taskfleet_core::Credential;

use crate::error::{Error, Result};
use crate::{ntlm, soap, ExecOutcome, PsExecutor};

const WINRM_PORT: u16 = 5985;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on Receive polls for one command; with a 30s operation
/// timeout this caps a single script at roughly ten minutes.
const MAX_RECEIVE_POLLS: usize = 20;

pub struct WinRmExecutor {
    client: reqwest::Client,
    endpoint: String,
    host_label: String,
    credential: Credential,
}

impl WinRmExecutor {
    /// Build an executor for one host, bound to its resolved credential.
    /// Certificate validation is disabled to match the fleet's existing
    /// WinRM listener configuration.
    pub fn new(host_label: &str, address: &str, credential: Credential) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(OPERATION_TIMEOUT + Duration::from_secs(10))
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("http://{}:{}/wsman", address, WINRM_PORT),
            host_label: host_label.to_string(),
            credential,
        })
    }

    /// One authenticated WS-Man exchange: NTLM negotiate, consume the
    /// challenge, then send the envelope with the authenticate message
    /// attached. WinRM authenticates per request, so each envelope redoes
    /// the three-leg handshake.
    async fn post_soap(&self, envelope: String) -> Result<String> {
        let negotiate = BASE64.encode(ntlm::negotiate_message());
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .header("Authorization", format!("Negotiate {}", negotiate))
            .body(Vec::new())
            .send()
            .await?;

        let challenge_b64 = response
            .headers()
            .get("WWW-Authenticate")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Negotiate "))
            .map(|value| value.trim().to_string())
            .ok_or_else(|| Error::Auth("server offered no NTLM challenge".to_string()))?;

        let challenge = ntlm::parse_challenge(&BASE64.decode(challenge_b64)?)?;

        let (domain, user) = ntlm::split_account(&self.credential.username);
        let mut client_challenge = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut client_challenge);
        let authenticate = ntlm::authenticate_message(
            &challenge,
            user,
            domain,
            &self.credential.password,
            "TASKFLEET",
            client_challenge,
            ntlm::filetime_now(),
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/soap+xml;charset=UTF-8")
            .header("Authorization", format!("Negotiate {}", BASE64.encode(authenticate)))
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Auth(format!(
                "authentication rejected for {}",
                self.credential.username
            )));
        }
        if !status.is_success() && !soap::is_operation_timeout(&body) {
            let reason = soap::fault_text(&body)
                .unwrap_or_else(|| format!("HTTP {} from {}", status, self.endpoint));
            return Err(Error::Fault(reason));
        }

        Ok(body)
    }

    async fn run_ps_inner(&self, script: &str) -> Result<ExecOutcome> {
        let encoded = BASE64.encode(ntlm::utf16le(script));

        let create_response = self.post_soap(soap::create_shell(&self.endpoint)).await?;
        let shell_id = soap::element_text(&create_response, "ShellId")
            .ok_or_else(|| Error::Protocol("create shell returned no ShellId".to_string()))?;

        let result = self.run_in_shell(&shell_id, &encoded).await;

        // Best-effort cleanup; a shell that fails to delete times out on
        // the host side eventually.
        if let Err(e) = self.post_soap(soap::delete_shell(&self.endpoint, &shell_id)).await {
            tracing::debug!(host = %self.host_label, "Failed to delete shell: {}", e);
        }

        result
    }

    async fn run_in_shell(&self, shell_id: &str, encoded_command: &str) -> Result<ExecOutcome> {
        let command_response = self
            .post_soap(soap::command(&self.endpoint, shell_id, encoded_command))
            .await?;
        let command_id = soap::element_text(&command_response, "CommandId")
            .ok_or_else(|| Error::Protocol("command returned no CommandId".to_string()))?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut exit_code = None;

        for _ in 0..MAX_RECEIVE_POLLS {
            let receive_response = self
                .post_soap(soap::receive(&self.endpoint, shell_id, &command_id))
                .await?;

            for (stream, chunk) in soap::stream_chunks(&receive_response) {
                // Replacement decoding: remote output is whatever code page
                // the host felt like, and must never abort the call.
                let decoded = BASE64.decode(chunk.trim()).unwrap_or_default();
                let text = String::from_utf8_lossy(&decoded);
                match stream.as_str() {
                    "stderr" => stderr.push_str(&text),
                    _ => stdout.push_str(&text),
                }
            }

            if soap::command_done(&receive_response) {
                exit_code = soap::exit_code(&receive_response);
                break;
            }
            if soap::is_operation_timeout(&receive_response) {
                // Output not ready yet; keep polling.
                continue;
            }
        }

        let _ = self
            .post_soap(soap::signal_terminate(&self.endpoint, shell_id, &command_id))
            .await;

        match exit_code {
            Some(0) => Ok(ExecOutcome::ok(stdout)),
            Some(code) => {
                let message = if stderr.trim().is_empty() { stdout } else { stderr };
                tracing::debug!(host = %self.host_label, code, "Remote script exited nonzero");
                Ok(ExecOutcome::failed(message))
            }
            None => Err(Error::Protocol(
                "command produced no completion state before the poll limit".to_string(),
            )),
        }
    }
}

#[async_trait]
impl PsExecutor for WinRmExecutor {
    async fn run_ps(&self, script: &str) -> ExecOutcome {
        tracing::debug!(host = %self.host_label, bytes = script.len(), "Running remote script");
        match self.run_ps_inner(script).await {
            Ok(outcome) => outcome,
            // The single error channel: transport, auth and protocol
            // failures all collapse into a failed outcome whose message is
            // the only distinguishing information.
            Err(e) => {
                tracing::warn!(host = %self.host_label, "Remote execution failed: {}", e);
                ExecOutcome::failed(e.to_string())
            }
        }
    }

    fn host_label(&self) -> &str {
        &self.host_label
    }
}
