//! SOCKS4/4a and SOCKS5 client handshakes
//!
//! Only the TCP CONNECT command without authentication is supported, which is
//! all a liveness probe needs.

use bytes::{BufMut, BytesMut};
use std::io;
use std::net::IpAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS5_VERSION: u8 = 0x05;
const CMD_TCP_CONNECT: u8 = 0x01;
const SOCKS4_REQUEST_GRANTED: u8 = 90;
const SOCKS5_AUTH_NONE: u8 = 0x00;

#[derive(Error, Debug)]
pub enum SocksConnectError {
    #[error("write failed: {0}")]
    WriteFailed(io::Error),
    #[error("read failed: {0}")]
    ReadFailed(#[from] io::Error),
    #[error("invalid version code {0:#04x}")]
    InvalidVersion(u8),
    #[error("no acceptable auth method")]
    NoAuthMethodAvailable,
    #[error("invalid addr type {0:#04x}")]
    InvalidAddrType(u8),
    #[error("target domain is longer than 255 bytes")]
    DomainTooLong,
    #[error("ipv6 target is not supported by socks4")]
    Ipv6Unsupported,
    #[error("request failed: {0}")]
    RequestFailed(&'static str),
}

/// SOCKS protocol version spoken by a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    V4,
    V5,
}

/// Perform the handshake of `version` and CONNECT to `host:port`
pub async fn socks_connect_to<S>(
    stream: &mut S,
    version: SocksVersion,
    host: &str,
    port: u16,
) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match version {
        SocksVersion::V4 => socks4a_connect_to(stream, host, port).await,
        SocksVersion::V5 => socks5_connect_to(stream, host, port).await,
    }
}

/// CONNECT through a socks4 proxy, using the 4a extension for domain targets
pub async fn socks4a_connect_to<S>(
    stream: &mut S,
    host: &str,
    port: u16,
) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(1 + 1 + 2 + 4 + 1 + host.len() + 1);
    buf.put_u8(SOCKS4_VERSION);
    buf.put_u8(CMD_TCP_CONNECT);
    buf.put_u16(port);
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip4)) => {
            buf.put_slice(&ip4.octets());
            // empty user id
            buf.put_u8(0x00);
        }
        Ok(IpAddr::V6(_)) => return Err(SocksConnectError::Ipv6Unsupported),
        Err(_) => {
            buf.put_slice(&[0x00, 0x00, 0x00, 0x01]);
            buf.put_u8(0x00);
            buf.put_slice(host.as_bytes());
            buf.put_u8(0x00);
        }
    }
    write_all_flush(stream, &buf).await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;
    if reply[0] != 0x00 {
        return Err(SocksConnectError::InvalidVersion(reply[0]));
    }
    match reply[1] {
        SOCKS4_REQUEST_GRANTED => Ok(()),
        code => Err(SocksConnectError::RequestFailed(socks4_reply_message(code))),
    }
}

/// CONNECT through a socks5 proxy offering only the "no auth" method
pub async fn socks5_connect_to<S>(
    stream: &mut S,
    host: &str,
    port: u16,
) -> Result<(), SocksConnectError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_all_flush(stream, &[SOCKS5_VERSION, 0x01, SOCKS5_AUTH_NONE]).await?;

    let mut method = [0u8; 2];
    stream.read_exact(&mut method).await?;
    if method[0] != SOCKS5_VERSION {
        return Err(SocksConnectError::InvalidVersion(method[0]));
    }
    if method[1] != SOCKS5_AUTH_NONE {
        return Err(SocksConnectError::NoAuthMethodAvailable);
    }

    let mut buf = BytesMut::with_capacity(4 + 1 + host.len() + 2);
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(CMD_TCP_CONNECT);
    buf.put_u8(0x00);
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip4)) => {
            buf.put_u8(0x01);
            buf.put_slice(&ip4.octets());
        }
        Ok(IpAddr::V6(ip6)) => {
            buf.put_u8(0x04);
            buf.put_slice(&ip6.octets());
        }
        Err(_) => {
            let len = u8::try_from(host.len()).map_err(|_| SocksConnectError::DomainTooLong)?;
            buf.put_u8(0x03);
            buf.put_u8(len);
            buf.put_slice(host.as_bytes());
        }
    }
    buf.put_u16(port);
    write_all_flush(stream, &buf).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != SOCKS5_VERSION {
        return Err(SocksConnectError::InvalidVersion(head[0]));
    }
    let code = head[1];

    // drain the bound address so the stream is left at a frame boundary
    let addr_len = match head[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => stream.read_u8().await? as usize,
        atyp => return Err(SocksConnectError::InvalidAddrType(atyp)),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    if code == 0x00 {
        Ok(())
    } else {
        Err(SocksConnectError::RequestFailed(socks5_reply_message(code)))
    }
}

async fn write_all_flush<W>(writer: &mut W, buf: &[u8]) -> Result<(), SocksConnectError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(buf)
        .await
        .map_err(SocksConnectError::WriteFailed)?;
    writer.flush().await.map_err(SocksConnectError::WriteFailed)
}

const fn socks4_reply_message(code: u8) -> &'static str {
    match code {
        91 => "request rejected or failed",
        92 => "request rejected because SOCKS server cannot connect to identd on the client",
        93 => "request rejected because the client program and identd report different user-ids",
        _ => "unassigned reply code",
    }
}

// messages from rfc1928
const fn socks5_reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "General SOCKS server failure",
        0x02 => "Connection not allowed by ruleset",
        0x03 => "Network unreachable",
        0x04 => "Host unreachable",
        0x05 => "Connection refused",
        0x06 => "TTL expired",
        0x07 => "Command not supported",
        0x08 => "Address type not supported",
        0x09 => "Connection attempt timed out",
        _ => "unassigned reply code",
    }
}
