use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::{self, Deserializer, Visitor};
use serde_derive::Deserialize;
use validator::Validate;

use crate::core::GenericResult;

const DEFAULT_RETENTION_DAYS: u32 = 30;
const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[validate(length(min = 1))]
    pub source: String,
    #[validate(length(min = 1))]
    pub backup_root: String,
    #[serde(default = "default_retention_days")]
    #[validate(range(min = 1))]
    pub retention_days: u32,

    #[validate(nested)]
    pub upload: Option<UploadConfig>,

    pub prometheus_metrics: Option<String>,
}

#[derive(Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    #[validate(range(min = 1))]
    pub port: u16,
    #[validate(length(min = 1))]
    pub username: String,
    pub password: String,
    #[validate(length(min = 1))]
    pub path: String,
    #[serde(default)]
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Option<Duration>,
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("path", &self.path)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    pub fn load(path: &str) -> GenericResult<Config> {
        let mut data = Vec::new();
        File::open(path)?.read_to_end(&mut data)?;
        Config::parse(&data)
    }

    fn parse(data: &[u8]) -> GenericResult<Config> {
        let mut config: Config = serde_yaml::from_slice(data)?;
        config.validate()?;

        config.source = validate_local_path(&config.source)?;
        config.backup_root = validate_local_path(&config.backup_root)?;

        {
            let source = Path::new(&config.source);
            let backup_root = Path::new(&config.backup_root);

            if source.starts_with(backup_root) || backup_root.starts_with(source) {
                return Err!("Source path and backup root mustn't be nested into each other");
            }
        }

        if let Some(upload) = config.upload.as_mut() {
            upload.path = validate_path(&upload.path)?;
        }

        if let Some(metrics_path) = config.prometheus_metrics.clone() {
            config.prometheus_metrics.replace(validate_local_path(&metrics_path)?);
        }

        Ok(config)
    }
}

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

fn default_ftp_port() -> u16 {
    DEFAULT_FTP_PORT
}

fn validate_path(path: &str) -> GenericResult<String> {
    let mut normalized_path = PathBuf::new();
    let mut path_components = Path::new(path).components();

    if path_components.next() != Some(Component::RootDir) {
        return Err!("Paths must be absolute: {:?}", path);
    }
    normalized_path.push(Component::RootDir.as_os_str());

    for component in path_components {
        if let Component::Normal(component) = component {
            normalized_path.push(component);
        } else {
            return Err!("Invalid path: {}", path);
        }
    }

    Ok(normalized_path.to_str().ok_or_else(|| format!("Invalid path: {}", path))?.to_owned())
}

fn validate_local_path(path: &str) -> GenericResult<String> {
    validate_path(&shellexpand::tilde(path))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where D: Deserializer<'de>
{
    deserializer.deserialize_string(DurationVisitor)
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Option<Duration>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("time duration in $number{m|h|d} format")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> where E: de::Error {
        match parse_duration(v) {
            Ok(duration) => Ok(Some(duration)),
            Err(err) => Err(E::custom(err))
        }
    }
}

fn parse_duration(string: &str) -> GenericResult<Duration> {
    lazy_static! {
        static ref DURATION_RE: Regex = Regex::new(
            r"^(?P<number>[1-9]\d*)(?P<unit>[mhd])$").unwrap();
    }

    let captures = DURATION_RE.captures(string).ok_or_else(|| format!(
        "Invalid time duration specification: {:?}", string))?;

    let mut duration: u64 = captures["number"].parse().map_err(|_| format!(
        "Invalid time duration specification: {:?}", string))?;

    duration = duration.checked_mul(match &captures["unit"] {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 60 * 60 * 24,
        _ => unreachable!(),
    }).ok_or_else(|| format!("Too big time duration: {:?}", string))?;

    Ok(Duration::from_secs(duration))
}
