//! Liveness probes run against a single candidate

use crate::proxy::models::{Candidate, ProtocolKind};
use crate::proxy::socks::{socks_connect_to, SocksConnectError, SocksVersion};
use async_trait::async_trait;
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Why a probe did not confirm a working proxy
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("connect failed: {0}")]
    Connect(std::io::Error),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status: {0}")]
    Status(reqwest::StatusCode),
    #[error("socks handshake failed: {0}")]
    Socks(#[from] SocksConnectError),
}

/// A single-attempt liveness check
///
/// Implementations report `Ok(())` only when the proxy relayed traffic.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &Candidate) -> Result<(), ProbeError>;
}

/// Probe that talks to the candidate over the network
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    timeout: Duration,
    test_url: String,
    socks_target_host: String,
    socks_target_port: u16,
}

impl NetworkProbe {
    pub fn new(
        timeout: Duration,
        test_url: String,
        socks_target_host: String,
        socks_target_port: u16,
    ) -> Self {
        Self {
            timeout,
            test_url,
            socks_target_host,
            socks_target_port,
        }
    }

    /// GET the test URL through the candidate as an HTTP forward proxy
    async fn probe_http(&self, candidate: &Candidate) -> Result<(), ProbeError> {
        let proxy_url = format!("http://{}", candidate.address);
        let client = Client::builder()
            .proxy(ReqwestProxy::all(&proxy_url)?)
            .timeout(self.timeout)
            .build()?;

        let response = client.get(&self.test_url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Http(e)
            }
        })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProbeError::Status(response.status()))
        }
    }

    /// Handshake with the candidate and CONNECT to the downstream target
    async fn probe_socks(
        &self,
        candidate: &Candidate,
        version: SocksVersion,
    ) -> Result<(), ProbeError> {
        let handshake = async {
            let mut stream = TcpStream::connect(candidate.address.as_str())
                .await
                .map_err(ProbeError::Connect)?;
            socks_connect_to(
                &mut stream,
                version,
                &self.socks_target_host,
                self.socks_target_port,
            )
            .await?;
            // nothing is sent through the tunnel
            let _ = stream.shutdown().await;
            Ok::<(), ProbeError>(())
        };

        tokio::time::timeout(self.timeout, handshake)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl Probe for NetworkProbe {
    async fn probe(&self, candidate: &Candidate) -> Result<(), ProbeError> {
        match candidate.protocol {
            ProtocolKind::Socks4 => self.probe_socks(candidate, SocksVersion::V4).await,
            ProtocolKind::Socks5 => self.probe_socks(candidate, SocksVersion::V5).await,
            // unlabeled candidates get the best-effort http probe
            ProtocolKind::Http | ProtocolKind::Unknown => self.probe_http(candidate).await,
        }
    }
}
