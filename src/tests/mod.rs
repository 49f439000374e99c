use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use assert_fs::TempDir;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use maplit::btreeset;

use crate::backuping::Runner;
use crate::config::{Config, UploadConfig};
use crate::core::{EmptyResult, GenericResult};
use crate::remote::RemoteTree;
use crate::remote::testing::{MemoryTree, Operation};

lazy_static! {
    // Passes set a process-wide logging context, so runs mustn't overlap
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}

fn serialize() -> MutexGuard<'static, ()> {
    RUN_LOCK.lock().unwrap_or_else(|err| err.into_inner())
}

struct Environment {
    temp_dir: TempDir,
    config: Config,
    remote: MemoryTree,
}

impl Environment {
    fn new() -> GenericResult<Environment> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("Obsidian");
        let backup_root = temp_dir.path().join("DailyBackup");

        fs::create_dir_all(source.join("folder"))?;
        fs::write(source.join("notes.md"), "# Notes")?;
        fs::write(source.join("folder/img.png"), [0x89, 0x50, 0x4e, 0x47])?;

        for name in ["2024-01-01", "2024-03-30"] {
            fs::create_dir_all(backup_root.join(name).join("folder"))?;
            fs::write(backup_root.join(name).join("notes.md"), name)?;
        }
        fs::create_dir(backup_root.join("notes"))?;

        let remote = MemoryTree::new()
            .with_file("/backups/obsidian/2024-01-01/notes.md", b"old")
            .with_file("/backups/obsidian/2024-01-01/folder/img.png", b"old")
            .with_file("/backups/obsidian/2024-03-30/notes.md", b"recent")
            .with_directory("/backups/obsidian/misc");

        let config = Config {
            source: source.to_str().unwrap().to_owned(),
            backup_root: backup_root.to_str().unwrap().to_owned(),
            retention_days: 30,
            upload: Some(UploadConfig {
                host: s!("ftp.example.com"),
                port: 21,
                username: s!("user"),
                password: s!("secret"),
                path: s!("/backups/obsidian"),
                timeout: None,
            }),
            prometheus_metrics: None,
        };

        Ok(Environment {temp_dir, config, remote})
    }

    fn connector(&self) -> impl Fn(&UploadConfig) -> GenericResult<Box<dyn RemoteTree>> + use<> {
        let remote = self.remote.clone();
        move |_: &UploadConfig| -> GenericResult<Box<dyn RemoteTree>> {
            Ok(Box::new(remote.clone()))
        }
    }

    fn backup_root(&self) -> &Path {
        Path::new(&self.config.backup_root)
    }

    fn local_buckets(&self) -> std::collections::BTreeSet<String> {
        fs::read_dir(self.backup_root()).unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect()
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
}

#[test]
fn backup() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    let connect = env.connector();

    assert!(Runner::new(&env.config, today(), &connect).backup()?);

    assert_eq!(env.local_buckets(), btreeset! {s!("2024-03-30"), s!("2024-03-31"), s!("notes")});
    assert_eq!(fs::read_to_string(env.backup_root().join("2024-03-31/notes.md"))?, "# Notes");
    assert_eq!(fs::read(env.backup_root().join("2024-03-31/folder/img.png"))?, vec![0x89, 0x50, 0x4e, 0x47]);
    assert_eq!(fs::read_to_string(env.backup_root().join("2024-03-30/notes.md"))?, "2024-03-30");

    let remote = &env.remote;
    assert_eq!(remote.file("/backups/obsidian/2024-03-31/notes.md").unwrap(), b"# Notes");
    assert_eq!(remote.file("/backups/obsidian/2024-03-31/folder/img.png").unwrap(), vec![0x89, 0x50, 0x4e, 0x47]);
    assert_eq!(remote.file("/backups/obsidian/2024-03-30/notes.md").unwrap(), b"recent");
    assert!(!remote.is_directory("/backups/obsidian/2024-01-01"));
    assert!(remote.is_directory("/backups/obsidian/misc"));

    // A second run on the same day just refreshes the bucket
    fs::write(Path::new(&env.config.source).join("notes.md"), "# Updated notes")?;
    assert!(Runner::new(&env.config, today(), &connect).backup()?);

    assert_eq!(fs::read_to_string(env.backup_root().join("2024-03-31/notes.md"))?, "# Updated notes");
    assert_eq!(remote.file("/backups/obsidian/2024-03-31/notes.md").unwrap(), b"# Updated notes");

    Ok(())
}

#[test]
fn failed_mirror() -> EmptyResult {
    let _guard = serialize();

    let mut env = Environment::new()?;
    env.config.source = env.temp_dir.path().join("missing").to_str().unwrap().to_owned();
    let connect = env.connector();

    assert!(!Runner::new(&env.config, today(), &connect).backup()?);

    assert!(env.local_buckets().contains("2024-01-01"));
    assert!(env.remote.is_directory("/backups/obsidian/2024-01-01"));
    assert!(env.remote.journal_of(Operation::Store).is_empty());

    Ok(())
}

#[test]
fn failed_upload() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    env.remote.deny(Operation::CreateDirectory, "/backups/obsidian/2024-03-31");
    let connect = env.connector();

    assert!(!Runner::new(&env.config, today(), &connect).backup()?);

    // The local copy is fine, so local cleanup is done, but the remote one is left intact
    assert!(!env.local_buckets().contains("2024-01-01"));
    assert!(env.local_buckets().contains("2024-03-31"));
    assert!(env.remote.is_directory("/backups/obsidian/2024-01-01"));

    Ok(())
}

#[test]
fn partially_failed_upload() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    env.remote.deny(Operation::Store, "/backups/obsidian/2024-03-31/notes.md");
    let connect = env.connector();

    assert!(!Runner::new(&env.config, today(), &connect).backup()?);

    assert!(env.remote.file("/backups/obsidian/2024-03-31/folder/img.png").is_some());
    assert!(env.remote.file("/backups/obsidian/2024-03-31/notes.md").is_none());
    assert!(!env.remote.is_directory("/backups/obsidian/2024-01-01"));

    Ok(())
}

#[test]
fn unreachable_server() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    let connect = |config: &UploadConfig| -> GenericResult<Box<dyn RemoteTree>> {
        Err!("Unable to connect to {}:{}: Connection refused", config.host, config.port)
    };

    assert!(!Runner::new(&env.config, today(), &connect).backup()?);
    assert_eq!(env.local_buckets(), btreeset! {s!("2024-03-30"), s!("2024-03-31"), s!("notes")});

    Ok(())
}

#[test]
fn local_only() -> EmptyResult {
    let _guard = serialize();

    let mut env = Environment::new()?;
    env.config.upload = None;
    let connect = env.connector();

    assert!(Runner::new(&env.config, today(), &connect).backup()?);
    assert_eq!(env.local_buckets(), btreeset! {s!("2024-03-30"), s!("2024-03-31"), s!("notes")});
    assert!(env.remote.journal().is_empty());

    Ok(())
}

#[test]
fn prune() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    let connect = env.connector();

    assert!(Runner::new(&env.config, today(), &connect).prune()?);

    assert_eq!(env.local_buckets(), btreeset! {s!("2024-03-30"), s!("notes")});
    assert!(!env.remote.is_directory("/backups/obsidian/2024-01-01"));
    assert!(env.remote.is_directory("/backups/obsidian/2024-03-30"));
    assert!(env.remote.journal_of(Operation::Store).is_empty());

    Ok(())
}

#[test]
fn overlapping_runs() -> EmptyResult {
    let _guard = serialize();

    let env = Environment::new()?;
    let connect = env.connector();

    let _lock = crate::util::sys::acquire_lock(env.backup_root())?;
    assert!(Runner::new(&env.config, today(), &connect).backup().is_err());
    assert!(!env.local_buckets().contains("2024-03-31"));

    Ok(())
}

#[test]
fn prune_without_local_root() -> EmptyResult {
    let _guard = serialize();

    let mut env = Environment::new()?;
    env.config.backup_root = env.temp_dir.path().join("missing").to_str().unwrap().to_owned();
    let connect = env.connector();

    assert!(!Runner::new(&env.config, today(), &connect).prune()?);

    assert!(!env.remote.is_directory("/backups/obsidian/2024-01-01"));
    assert!(env.remote.is_directory("/backups/obsidian/2024-03-30"));
    assert!(!env.temp_dir.path().join("missing").exists());

    Ok(())
}
