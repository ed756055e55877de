//! Interactive IOS collection session.
//!
//! A [`CiscoSession`] drives one SSH shell on one device: it waits for the
//! initial prompt, escalates to enable mode when a secret is supplied,
//! disables paging, and then executes inspection commands one at a time
//! with prompt-based completion detection.

mod buffer;
mod output;
pub mod prompt;

pub use buffer::PatternBuffer;
pub use output::CommandOutput;
pub use prompt::PromptSet;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::{debug, info};
use regex::bytes::Regex;
use russh::{Channel, ChannelMsg, client::Msg};
use secrecy::{ExposeSecret, SecretString};

use crate::error::{Result, SessionError, TransportError};
use crate::transport::{AuthMethod, HostKeyVerification, SshConfig, SshTransport};

/// Paging must be off before any show command, or output stalls on
/// `--More--` and the prompt never arrives.
const DISABLE_PAGING: &str = "terminal length 0";

/// An authenticated interactive session against one Cisco IOS device.
pub struct CiscoSession {
    /// SSH configuration for this device.
    config: SshConfig,

    /// Enable secret, when privilege escalation is wanted.
    enable_secret: Option<SecretString>,

    /// SSH transport (None when disconnected).
    transport: Option<SshTransport>,

    /// The interactive shell channel (None when disconnected).
    channel: Option<Channel<Msg>>,

    /// Accumulating output buffer.
    buffer: PatternBuffer,

    /// Compiled prompt patterns.
    prompts: PromptSet,

    /// Per-operation timeout.
    timeout: Duration,
}

impl CiscoSession {
    /// Open the connection: connect, authenticate, find the initial prompt,
    /// enter enable mode if a secret was provided, and disable paging.
    pub async fn open(&mut self) -> Result<()> {
        if self.transport.is_some() {
            return Err(SessionError::AlreadyConnected.into());
        }

        let transport = SshTransport::connect(self.config.clone()).await?;
        let channel = transport.open_channel().await?;
        self.transport = Some(transport);
        self.channel = Some(channel);

        // Wait for the login banner to finish and a prompt to appear
        let any = self.prompts.any.clone();
        let data = self.read_until(&any).await?;
        let prompt = last_prompt(&any, &data);
        debug!("{}: initial prompt '{}'", self.config.host, prompt.trim());

        if !self.prompts.is_privileged(&prompt) {
            if self.enable_secret.is_some() {
                self.enter_enable().await?;
            } else {
                info!(
                    "{}: no enable secret supplied, staying in exec mode",
                    self.config.host
                );
            }
        }

        self.run(DISABLE_PAGING).await?;
        Ok(())
    }

    /// Escalate from exec to privileged exec with the enable secret.
    async fn enter_enable(&mut self) -> Result<()> {
        self.send_line("enable").await?;

        // The device answers with either a password prompt or, when enable
        // needs no password, the privileged prompt directly.
        let expect = Regex::new(&format!(
            "(?:{})|(?:{})",
            self.prompts.password.as_str(),
            self.prompts.privileged.as_str()
        ))
        .map_err(SessionError::from)?;
        let data = self.read_until(&expect).await?;

        let prompt = if self.prompts.password.is_match(&data) {
            let secret = self
                .enable_secret
                .as_ref()
                .ok_or(SessionError::EnableFailed)?
                .expose_secret()
                .to_string();
            self.send_line(&secret).await?;
            let any = self.prompts.any.clone();
            let data = self.read_until(&any).await?;
            last_prompt(&any, &data)
        } else {
            last_prompt(&self.prompts.privileged.clone(), &data)
        };

        if !self.prompts.is_privileged(&prompt) {
            return Err(SessionError::EnableFailed.into());
        }

        debug!("{}: entered enable mode", self.config.host);
        Ok(())
    }

    /// Execute one command and wait for the prompt to return.
    pub async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let start = Instant::now();

        self.send_line(command).await?;
        let any = self.prompts.any.clone();
        let data = self.read_until(&any).await?;

        let elapsed = start.elapsed();
        let raw_result = String::from_utf8_lossy(&data).to_string();
        let prompt = last_prompt(&any, &data).trim().to_string();
        let result = normalize_output(&raw_result, command);
        let failure_message = prompt::find_failure(&result).map(str::to_string);

        if let Some(ref marker) = failure_message {
            debug!("{}: '{}' rejected: {}", self.config.host, command, marker);
        }

        Ok(CommandOutput {
            command: command.to_string(),
            result,
            raw_result,
            prompt,
            elapsed,
            failure_message,
        })
    }

    /// Execute several commands in order, stopping at the first transport
    /// error. Device-side rejections are recorded on the output, not raised.
    pub async fn run_all(&mut self, commands: &[&str]) -> Result<Vec<CommandOutput>> {
        let mut outputs = Vec::with_capacity(commands.len());
        for command in commands {
            outputs.push(self.run(command).await?);
        }
        Ok(outputs)
    }

    /// Close the session.
    pub async fn close(&mut self) -> Result<()> {
        self.channel = None;
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }

    /// Check if the session is open.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Host this session talks to.
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Send one line down the shell channel.
    async fn send_line(&mut self, line: &str) -> Result<()> {
        let channel = self.channel.as_mut().ok_or(SessionError::NotConnected)?;
        let payload = format!("{line}\n");
        channel
            .data(payload.as_bytes())
            .await
            .map_err(TransportError::Ssh)?;
        Ok(())
    }

    /// Read channel data until the pattern appears in the buffer tail.
    async fn read_until(&mut self, pattern: &Regex) -> Result<Vec<u8>> {
        let channel = self.channel.as_mut().ok_or(SessionError::NotConnected)?;
        let deadline = tokio::time::Instant::now() + self.timeout;

        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }

            let msg = tokio::time::timeout_at(deadline, channel.wait())
                .await
                .map_err(|_| SessionError::PromptTimeout(self.timeout))?;

            match msg {
                Some(ChannelMsg::Data { data }) => self.buffer.extend(&data),
                Some(ChannelMsg::ExtendedData { data, .. }) => self.buffer.extend(&data),
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected.into());
                }
                Some(_) => {}
            }
        }
    }
}

/// Extract the last prompt match from a chunk of output.
fn last_prompt(pattern: &Regex, data: &[u8]) -> String {
    pattern
        .find_iter(data)
        .last()
        .map(|m| String::from_utf8_lossy(&data[m.start()..m.end()]).to_string())
        .unwrap_or_default()
}

/// Strip the command echo and the trailing prompt line from raw output.
fn normalize_output(raw: &str, command: &str) -> String {
    let output = raw
        .strip_prefix(command)
        .unwrap_or(raw)
        .trim_start_matches(['\r', '\n']);

    match output.rfind('\n') {
        Some(pos) => output[..pos].trim_end_matches('\r').to_string(),
        None => output.to_string(),
    }
}

/// Builder for [`CiscoSession`].
///
/// # Example
///
/// ```rust,no_run
/// use circuitscan::session::SessionBuilder;
///
/// # fn example() -> Result<(), circuitscan::Error> {
/// let session = SessionBuilder::new("10.0.0.1")
///     .username("admin")
///     .password("secret")
///     .enable_secret("supersecret")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: Option<AuthMethod>,
    enable_secret: Option<SecretString>,
    timeout: Duration,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: None,
            enable_secret: None,
            timeout: Duration::from_secs(30),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username for authentication.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = Some(AuthMethod::Password(SecretString::from(password.into())));
        self
    }

    /// Set private key authentication.
    pub fn private_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.auth = Some(AuthMethod::PrivateKey {
            path: key_path.into(),
            passphrase: None,
        });
        self
    }

    /// Set the enable secret for privilege escalation.
    pub fn enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the per-operation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the host key verification mode.
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Set a non-default known_hosts path.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Build the session. Does not connect; call `open()` on the result.
    pub fn build(self) -> Result<CiscoSession> {
        let username = self.username.ok_or_else(|| SessionError::InvalidConfig {
            message: "username is required".to_string(),
        })?;
        let auth = self.auth.ok_or_else(|| SessionError::InvalidConfig {
            message: "password or private key is required".to_string(),
        })?;

        let config = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        Ok(CiscoSession {
            config,
            enable_secret: self.enable_secret,
            transport: None,
            channel: None,
            buffer: PatternBuffer::default(),
            prompts: PromptSet::ios()?,
            timeout: self.timeout,
        })
    }
}
