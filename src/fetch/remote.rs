//! Remote file store seam and its FTPS implementation.
use super::credentials::Credentials;
use std::io::{self, Write};
use suppaftp::native_tls::TlsConnector;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpResult, NativeTlsConnector, NativeTlsFtpStream};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The server refused the request (FTP 5xx). The session is still usable.
    #[error("permission denied: {0}")]
    Permission(String),
    /// The session itself failed.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    pub fn is_permission(&self) -> bool {
        matches!(self, RemoteError::Permission(_))
    }
}

/// Operations the fetcher needs from a remote file server.
pub trait RemoteStore {
    fn change_dir(&mut self, path: &str) -> Result<(), RemoteError>;
    /// Raw `LIST` lines for the current directory.
    fn list(&mut self) -> Result<Vec<String>, RemoteError>;
    fn size(&mut self, name: &str) -> Result<u64, RemoteError>;
    /// Stream `name` into `sink`, returning the number of bytes copied.
    fn retrieve(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64, RemoteError>;
    fn quit(&mut self) -> Result<(), RemoteError>;
}

/// Explicit FTPS session: `AUTH TLS` on the control channel, then
/// `PBSZ 0`/`PROT P` so every data connection is encrypted too.
pub struct FtpsSession {
    stream: NativeTlsFtpStream,
}

impl FtpsSession {
    /// Connect and log in. Certificates are not verified; the production
    /// host serves a self-signed certificate.
    pub fn connect(creds: &Credentials) -> Result<Self, RemoteError> {
        let plain = NativeTlsFtpStream::connect((creds.host.as_str(), creds.port))
            .map_err(RemoteError::from)?;
        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|err| RemoteError::Transport(format!("build TLS connector: {err}")))?;
        let mut stream = plain
            .into_secure(NativeTlsConnector::from(tls), &creds.host)
            .map_err(RemoteError::from)?;
        start_session(&mut stream, creds)?;
        tracing::info!(host = %creds.host, port = creds.port, "ftps session established");
        Ok(Self { stream })
    }
}

/// Control-channel steps run once the connection is up.
trait SessionControl {
    fn login(&mut self, user: &str, password: &str) -> FtpResult<()>;
    fn binary_transfers(&mut self) -> FtpResult<()>;
}

impl SessionControl for NativeTlsFtpStream {
    fn login(&mut self, user: &str, password: &str) -> FtpResult<()> {
        NativeTlsFtpStream::login(self, user, password)
    }

    fn binary_transfers(&mut self) -> FtpResult<()> {
        self.transfer_type(FileType::Binary)
    }
}

/// Log in, then switch to `TYPE I`. The FTP default is ASCII, which lets
/// servers rewrite line endings in archives and refuse `SIZE`.
fn start_session(stream: &mut dyn SessionControl, creds: &Credentials) -> Result<(), RemoteError> {
    stream.login(&creds.username, &creds.password)?;
    stream.binary_transfers()?;
    Ok(())
}

impl RemoteStore for FtpsSession {
    fn change_dir(&mut self, path: &str) -> Result<(), RemoteError> {
        self.stream.cwd(path).map_err(RemoteError::from)
    }

    fn list(&mut self) -> Result<Vec<String>, RemoteError> {
        self.stream.list(None).map_err(RemoteError::from)
    }

    fn size(&mut self, name: &str) -> Result<u64, RemoteError> {
        let size = self.stream.size(name).map_err(RemoteError::from)?;
        Ok(size as u64)
    }

    fn retrieve(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.stream
            .retr(name, |reader| {
                io::copy(reader, &mut *sink).map_err(FtpError::ConnectionError)
            })
            .map_err(RemoteError::from)
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        self.stream.quit().map_err(RemoteError::from)
    }
}

impl From<FtpError> for RemoteError {
    fn from(err: FtpError) -> Self {
        match &err {
            FtpError::UnexpectedResponse(response) if response.status.code() >= 500 => {
                RemoteError::Permission(err.to_string())
            }
            _ => RemoteError::Transport(err.to_string()),
        }
    }
}
