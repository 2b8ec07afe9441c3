//! Configuration for the duetlapse monitor.
//!
//! A TOML file with `[printer]`, `[webcam]` and `[output]` sections, layered
//! under `DUETLAPSE_*` environment variables, webcam credential resolution
//! (env + keyring + plaintext), and translation to
//! `duetlapse_core::MonitorConfig`. The CLI applies its flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::{BaseDirs, ProjectDirs};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use duetlapse_core::{
    BasicAuth, MonitorConfig, PrinterConfig, TlsMode, VideoConfig, WebcamConfig,
};

/// Environment variable consulted for the webcam password when the config
/// names no variable of its own (or that variable is unset).
pub const WEBCAM_PASSWORD_ENV: &str = "DUETLAPSE_WEBCAM_PASSWORD";

const KEYRING_SERVICE: &str = "duetlapse";
const KEYRING_WEBCAM_USER: &str = "webcam/password";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{field} is not configured")]
    Missing { field: String },

    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("keyring access failed: {reason}")]
    Keyring { reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub printer: PrinterSection,

    #[serde(default)]
    pub webcam: WebcamSection,

    #[serde(default)]
    pub output: OutputSection,
}

/// Firmware connection and timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PrinterSection {
    /// Hostname or IP address of the printer.
    pub host: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,

    #[serde(default = "default_startup_delay")]
    pub startup_delay_secs: u64,
}

impl Default for PrinterSection {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            settle_delay_ms: default_settle_delay(),
            poll_interval_ms: default_poll_interval(),
            backoff_secs: default_backoff(),
            startup_delay_secs: default_startup_delay(),
        }
    }
}

fn default_port() -> u16 {
    PrinterConfig::default().port
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    10
}
fn default_settle_delay() -> u64 {
    4500
}
fn default_poll_interval() -> u64 {
    500
}
fn default_backoff() -> u64 {
    10
}
fn default_startup_delay() -> u64 {
    15
}

/// Webcam snapshot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WebcamSection {
    /// URL returning one JPEG per GET.
    pub url: Option<String>,

    /// Username for HTTP Basic auth.
    pub username: Option<String>,

    /// Password (plaintext; prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    #[serde(default = "default_webcam_timeout")]
    pub timeout_secs: u64,
}

impl Default for WebcamSection {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            password_env: None,
            insecure: false,
            ca_cert: None,
            timeout_secs: default_webcam_timeout(),
        }
    }
}

fn default_webcam_timeout() -> u64 {
    5
}

/// Where runs are written and how they are turned into video.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputSection {
    /// Root folder for run directories and videos. A leading `~` is expanded.
    pub folder: Option<String>,

    /// Assemble a video when a print finishes.
    #[serde(default)]
    pub run_ffmpeg: bool,

    /// Keep the snapshot directory after a successful encode.
    #[serde(default)]
    pub keep_snapshots: bool,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: PathBuf,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    #[serde(default = "default_codec")]
    pub codec: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            folder: None,
            run_ffmpeg: false,
            keep_snapshots: false,
            ffmpeg: default_ffmpeg(),
            frame_rate: default_frame_rate(),
            codec: default_codec(),
        }
    }
}

fn default_ffmpeg() -> PathBuf {
    VideoConfig::default().program
}
fn default_frame_rate() -> u32 {
    VideoConfig::default().frame_rate
}
fn default_codec() -> String {
    VideoConfig::default().codec
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "duetlapse", "duetlapse").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = home_dir().unwrap_or_else(|| PathBuf::from("."));
    p.push(".config");
    p.push("duetlapse");
    p
}

fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf())
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from defaults, file and environment.
///
/// With `path: None` the platform config file is read if it exists. An
/// explicit path must exist.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(explicit) if !explicit.exists() => {
            return Err(ConfigError::NotFound {
                path: explicit.to_path_buf(),
            });
        }
        Some(explicit) => explicit.to_path_buf(),
        None => config_path(),
    };

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("DUETLAPSE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Config written by `config init`: defaults plus placeholder endpoints.
pub fn starter_config() -> Config {
    Config {
        printer: PrinterSection {
            host: Some("duet.local".into()),
            ..PrinterSection::default()
        },
        webcam: WebcamSection {
            url: Some("http://duet.local:8080/?action=snapshot".into()),
            ..WebcamSection::default()
        },
        output: OutputSection {
            folder: Some("~/timelapses".into()),
            run_ffmpeg: true,
            ..OutputSection::default()
        },
    }
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(cfg)?)?;
    Ok(())
}

/// The TOML text `save_config` would write.
pub fn render_config(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the webcam password.
///
/// Order: the variable named by `password_env`, then
/// [`WEBCAM_PASSWORD_ENV`], then the system keyring, then the plaintext
/// `password` field.
pub fn resolve_webcam_password(webcam: &WebcamSection) -> Option<SecretString> {
    resolve_password_chain(webcam, &|name| std::env::var(name).ok(), &|| {
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_WEBCAM_USER)
            .and_then(|entry| entry.get_password())
            .ok()
    })
}

fn resolve_password_chain(
    webcam: &WebcamSection,
    env: &dyn Fn(&str) -> Option<String>,
    keyring: &dyn Fn() -> Option<String>,
) -> Option<SecretString> {
    webcam
        .password_env
        .as_deref()
        .and_then(env)
        .or_else(|| env(WEBCAM_PASSWORD_ENV))
        .or_else(keyring)
        .or_else(|| webcam.password.clone())
        .map(SecretString::from)
}

/// Store the webcam password in the system keyring.
pub fn store_webcam_password(password: &SecretString) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_WEBCAM_USER).map_err(|e| {
        ConfigError::Keyring {
            reason: e.to_string(),
        }
    })?;
    entry
        .set_password(password.expose_secret())
        .map_err(|e| ConfigError::Keyring {
            reason: e.to_string(),
        })
}

/// Basic credentials when a username is configured.
///
/// A username without any resolvable password is an error.
pub fn resolve_webcam_auth(webcam: &WebcamSection) -> Result<Option<BasicAuth>, ConfigError> {
    let Some(username) = webcam.username.as_deref() else {
        return Ok(None);
    };
    let password = resolve_webcam_password(webcam).ok_or_else(|| ConfigError::Missing {
        field: "webcam.password".into(),
    })?;
    Ok(Some(BasicAuth::new(username, password)))
}

// ── Translation ─────────────────────────────────────────────────────

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with(['/', '\\']) => &rest[1..],
        _ => return PathBuf::from(path),
    };
    match home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing {
            field: field.into(),
        })
}

impl PrinterSection {
    pub fn to_printer_config(&self) -> Result<PrinterConfig, ConfigError> {
        let host = required(self.host.as_deref(), "printer.host")?;
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation {
                field: "printer.poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(PrinterConfig {
            host: host.trim().to_owned(),
            port: self.port,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            backoff: Duration::from_secs(self.backoff_secs),
            startup_delay: Duration::from_secs(self.startup_delay_secs),
        })
    }
}

impl WebcamSection {
    pub fn to_webcam_config(&self) -> Result<WebcamConfig, ConfigError> {
        let raw = required(self.url.as_deref(), "webcam.url")?;
        let url: url::Url = raw.trim().parse().map_err(|_| ConfigError::Validation {
            field: "webcam.url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;

        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        };

        Ok(WebcamConfig {
            url,
            auth: resolve_webcam_auth(self)?,
            tls,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

impl OutputSection {
    pub fn output_root(&self) -> Result<PathBuf, ConfigError> {
        required(self.folder.as_deref(), "output.folder").map(expand_tilde)
    }

    /// `None` unless `run_ffmpeg` is set.
    pub fn video_config(&self) -> Option<VideoConfig> {
        self.run_ffmpeg.then(|| VideoConfig {
            program: self.ffmpeg.clone(),
            frame_rate: self.frame_rate,
            codec: self.codec.clone(),
            keep_snapshots: self.keep_snapshots,
        })
    }
}

/// Build a `MonitorConfig` from a loaded config.
pub fn to_monitor_config(cfg: &Config) -> Result<MonitorConfig, ConfigError> {
    Ok(MonitorConfig {
        printer: cfg.printer.to_printer_config()?,
        webcam: cfg.webcam.to_webcam_config()?,
        output_root: cfg.output.output_root()?,
        video: cfg.output.video_config(),
    })
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    fn complete() -> Config {
        Config {
            printer: PrinterSection {
                host: Some("duet.local".into()),
                ..PrinterSection::default()
            },
            webcam: WebcamSection {
                url: Some("http://cam.local/snapshot.jpg".into()),
                ..WebcamSection::default()
            },
            output: OutputSection {
                folder: Some("/srv/timelapse".into()),
                ..OutputSection::default()
            },
        }
    }

    #[test]
    fn defaults_match_runtime_defaults() {
        let monitor = to_monitor_config(&complete()).unwrap();

        assert_eq!(monitor.printer.port, 23);
        assert_eq!(monitor.printer.settle_delay, Duration::from_millis(4500));
        assert_eq!(monitor.printer.poll_interval, Duration::from_millis(500));
        assert_eq!(monitor.printer.backoff, Duration::from_secs(10));
        assert_eq!(monitor.printer.startup_delay, Duration::from_secs(15));
        assert_eq!(monitor.webcam.tls, TlsMode::System);
        assert!(monitor.webcam.auth.is_none());
        assert_eq!(monitor.output_root, PathBuf::from("/srv/timelapse"));
        assert!(monitor.video.is_none());
    }

    #[test]
    fn missing_host_is_reported() {
        let mut cfg = complete();
        cfg.printer.host = None;

        let err = to_monitor_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field == "printer.host"));
    }

    #[test]
    fn invalid_url_is_a_validation_error() {
        let mut cfg = complete();
        cfg.webcam.url = Some("not a url".into());

        assert!(matches!(
            to_monitor_config(&cfg),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn insecure_wins_over_custom_ca() {
        let mut cfg = complete();
        cfg.webcam.ca_cert = Some("/etc/ca.pem".into());
        assert_eq!(
            cfg.webcam.to_webcam_config().unwrap().tls,
            TlsMode::CustomCa("/etc/ca.pem".into())
        );

        cfg.webcam.insecure = true;
        assert_eq!(
            cfg.webcam.to_webcam_config().unwrap().tls,
            TlsMode::DangerAcceptInvalid
        );
    }

    #[test]
    fn video_only_when_ffmpeg_enabled() {
        let mut cfg = complete();
        cfg.output.run_ffmpeg = true;
        cfg.output.keep_snapshots = true;

        let video = cfg.output.video_config().unwrap();
        assert_eq!(video.program, PathBuf::from("ffmpeg"));
        assert_eq!(video.frame_rate, 20);
        assert_eq!(video.codec, "libx264");
        assert!(video.keep_snapshots);
    }

    #[test]
    fn password_chain_order() {
        let section = WebcamSection {
            username: Some("cam".into()),
            password: Some("plain".into()),
            password_env: Some("MY_CAM_PW".into()),
            ..WebcamSection::default()
        };
        let no_keyring = || -> Option<String> { None };

        let named = |name: &str| (name == "MY_CAM_PW").then(|| "from-named".to_owned());
        let pw = resolve_password_chain(&section, &named, &no_keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-named");

        let global = |name: &str| (name == WEBCAM_PASSWORD_ENV).then(|| "from-global".to_owned());
        let pw = resolve_password_chain(&section, &global, &no_keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-global");

        let no_env = |_: &str| -> Option<String> { None };
        let keyring = || Some("from-keyring".to_owned());
        let pw = resolve_password_chain(&section, &no_env, &keyring).unwrap();
        assert_eq!(pw.expose_secret(), "from-keyring");

        let pw = resolve_password_chain(&section, &no_env, &no_keyring).unwrap();
        assert_eq!(pw.expose_secret(), "plain");

        let empty = WebcamSection::default();
        assert!(resolve_password_chain(&empty, &no_env, &no_keyring).is_none());
    }

    #[test]
    fn no_username_means_no_auth() {
        let section = WebcamSection {
            password: Some("ignored".into()),
            ..WebcamSection::default()
        };
        assert!(resolve_webcam_auth(&section).unwrap().is_none());
    }

    #[test]
    fn tilde_expansion() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("~user/x"), PathBuf::from("~user/x"));

        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde("~"), home);
            assert_eq!(expand_tilde("~/prints"), home.join("prints"));
        }
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "duetlapse.toml",
                r#"
                    [printer]
                    host = "duet.local"
                    poll_interval_ms = 250

                    [webcam]
                    url = "http://cam.local/snap"

                    [output]
                    folder = "/srv/tl"
                    run_ffmpeg = true
                "#,
            )?;
            jail.set_env("DUETLAPSE_PRINTER__HOST", "10.0.0.7");
            jail.set_env("DUETLAPSE_OUTPUT__FRAME_RATE", "30");

            let cfg = load_config(Some(Path::new("duetlapse.toml"))).map_err(|e| e.to_string())?;
            assert_eq!(cfg.printer.host.as_deref(), Some("10.0.0.7"));
            assert_eq!(cfg.printer.poll_interval_ms, 250);
            assert_eq!(cfg.printer.port, 23);
            assert_eq!(cfg.webcam.url.as_deref(), Some("http://cam.local/snap"));
            assert!(cfg.output.run_ffmpeg);
            assert_eq!(cfg.output.frame_rate, 30);
            Ok(())
        });
    }

    #[test]
    fn starter_config_is_complete() {
        let monitor = to_monitor_config(&starter_config()).unwrap();
        assert_eq!(monitor.printer.host, "duet.local");
        assert!(monitor.video.is_some());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn save_writes_loadable_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = complete();

        save_config(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[printer]"));
        assert!(text.contains("host = \"duet.local\""));

        let reparsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(reparsed, cfg);
    }
}
