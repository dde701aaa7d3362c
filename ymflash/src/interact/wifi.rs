//! Wi-Fi credential entry over the serial console.

use std::fmt;

use log::{debug, info};

use super::InteractOptions;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;
use crate::stream::{ChunkReader, DebouncedChunker, Responder, ResponseLog, TriggerMatcher};

const SSID_PROMPT: &str = "SSID:";
const SECURITY_PROMPT: &str = "Security 0=unsecured, 1=WEP, 2=WPA, 3=WPA2:";
const SECURITY_ENTERPRISE_PROMPT: &str =
    "Security 0=unsecured, 1=WEP, 2=WPA, 3=WPA2, 4=WPA Enterprise, 5=WPA2 Enterprise:";
const CIPHER_PROMPT: &str = "Security Cipher 1=AES, 2=TKIP, 3=AES+TKIP:";
const PASSWORD_PROMPT: &str = "Password:";
const DONE_PROMPTS: [&str; 2] = ["Particle <3 you!", "Spark <3 you!"];

/// Access point security, numbered as the device menu numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// Open network.
    Unsecured,
    /// WEP.
    Wep,
    /// WPA personal.
    Wpa,
    /// WPA2 personal.
    #[default]
    Wpa2,
}

impl Security {
    /// Menu number.
    pub fn code(self) -> u8 {
        match self {
            Self::Unsecured => 0,
            Self::Wep => 1,
            Self::Wpa => 2,
            Self::Wpa2 => 3,
        }
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unsecured => "Unsecured",
            Self::Wep => "WEP",
            Self::Wpa => "WPA",
            Self::Wpa2 => "WPA2",
        })
    }
}

/// WPA cipher, numbered as the device menu numbers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cipher {
    /// AES.
    #[default]
    Aes,
    /// TKIP.
    Tkip,
    /// AES and TKIP.
    AesTkip,
}

impl Cipher {
    /// Menu number.
    pub fn code(self) -> u8 {
        match self {
            Self::Aes => 1,
            Self::Tkip => 2,
            Self::AesTkip => 3,
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Aes => "AES",
            Self::Tkip => "TKIP",
            Self::AesTkip => "AES+TKIP",
        })
    }
}

/// Network to store on the device.
#[derive(Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    /// Network name.
    pub ssid: String,
    /// Security type.
    pub security: Security,
    /// Cipher, used when the device asks for one.
    pub cipher: Cipher,
    /// Passphrase. Required unless the network is open.
    pub password: Option<String>,
}

impl WifiCredentials {
    /// Credentials for a WPA2 network.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            security: Security::Wpa2,
            cipher: Cipher::Aes,
            password: Some(password.into()),
        }
    }

    /// Credentials for an open network.
    pub fn open(ssid: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            security: Security::Unsecured,
            cipher: Cipher::Aes,
            password: None,
        }
    }
}

impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("security", &self.security)
            .field("cipher", &self.cipher)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Store Wi-Fi credentials on a device in listening mode.
///
/// Writes `w` and answers the device's prompts until it confirms. Answers
/// are never logged. The port is closed afterwards.
pub fn configure_wifi<T, C>(
    port: &mut T,
    clock: &C,
    credentials: &WifiCredentials,
    options: &InteractOptions,
) -> Result<()>
where
    T: Transport,
    C: Clock,
{
    if !port.is_open() {
        port.open()?;
    }
    let outcome = wifi_exchange(port, clock, credentials, options);
    port.close();
    if outcome.is_ok() {
        info!("Wi-Fi credentials stored for '{}'", credentials.ssid);
    }
    outcome
}

fn wifi_exchange<T, C>(
    port: &mut T,
    clock: &C,
    credentials: &WifiCredentials,
    options: &InteractOptions,
) -> Result<()>
where
    T: Transport,
    C: Clock,
{
    let mut matcher = TriggerMatcher::new();

    let ssid = format!("{}\n", credentials.ssid);
    matcher.register(SSID_PROMPT, move |r| r.respond(&ssid))?;

    let security = format!("{}\n", credentials.security.code());
    for prompt in [SECURITY_PROMPT, SECURITY_ENTERPRISE_PROMPT] {
        let answer = security.clone();
        matcher.register(prompt, move |r| r.respond(&answer))?;
    }

    let cipher = format!("{}\n", credentials.cipher.code());
    matcher.register(CIPHER_PROMPT, move |r| r.respond(&cipher))?;

    let password = credentials.password.as_ref().map(|p| format!("{p}\n"));
    matcher.register(PASSWORD_PROMPT, move |r| match &password {
        Some(password) => r.respond(password),
        None => Err(Error::MissingCredential("password")),
    })?;

    for prompt in DONE_PROMPTS {
        matcher.register(prompt, |r: &mut Responder<'_>| {
            debug!("Device confirmed Wi-Fi credentials");
            r.stop();
            Ok(())
        })?;
    }

    matcher.start(ResponseLog::Silent);
    port.send(b"w")?;

    let chunker = DebouncedChunker::new(clock, options.quiet_period);
    let mut reader = ChunkReader::new(port, chunker);
    matcher.run(&mut reader, options.idle_timeout)
}
