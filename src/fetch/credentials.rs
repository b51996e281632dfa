use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const HOST_KEY: &str = "FTP_HOST";
pub const USERNAME_KEY: &str = "FTP_USERNAME";
pub const PASSWORD_KEY: &str = "FTP_PASSWORD";
pub const PORT_KEY: &str = "FTP_PORT";
pub const DEFAULT_PORT: u16 = 21;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub username: String,
    pub password: String,
    pub port: u16,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("port", &self.port)
            .finish()
    }
}

/// Parse `KEY=VALUE` lines. Blank lines, `#` comments, and lines without `=`
/// are ignored; the value is everything after the first `=`.
pub fn parse_env_file(text: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for raw in text.lines() {
        let line = raw.trim().replace('\r', "");
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.to_string(), value.to_string());
        }
    }
    values
}

/// Load FTP credentials from `path`. Fails before any network activity when
/// the file is missing or a required key is absent or empty.
pub fn load_credentials(path: &Path) -> Result<Credentials> {
    if !path.is_file() {
        return Err(anyhow!("{} not found", path.display()));
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    credentials_from_values(&parse_env_file(&text), path)
}

fn credentials_from_values(values: &BTreeMap<String, String>, path: &Path) -> Result<Credentials> {
    let get = |key: &str| {
        values
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    };
    let (host, username, password) = match (get(HOST_KEY), get(USERNAME_KEY), get(PASSWORD_KEY)) {
        (Some(host), Some(username), Some(password)) => (host, username, password),
        (host, username, password) => {
            let state = |value: Option<&str>| if value.is_some() { "set" } else { "MISSING" };
            return Err(anyhow!(
                "Missing FTP credentials in {}\n  {HOST_KEY}: {}\n  {USERNAME_KEY}: {}\n  {PASSWORD_KEY}: {}",
                path.display(),
                state(host),
                state(username),
                state(password)
            ));
        }
    };
    let port = match get(PORT_KEY) {
        Some(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid {PORT_KEY} {raw:?} in {}", path.display()))?,
        None => DEFAULT_PORT,
    };
    Ok(Credentials {
        host: host.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        port,
    })
}
