use std::fs::{self, File};
use std::io::{BufWriter, Write};

use lazy_static::lazy_static;
use prometheus::{self, Encoder, IntGauge, IntGaugeVec, TextEncoder, register_int_gauge, register_int_gauge_vec};

use crate::core::{EmptyResult, GenericError};

lazy_static! {
    pub static ref MIRRORED_FILES: IntGauge = register(
        "mirrored_files", "Number of files copied to the local backup during the last run.");
    pub static ref UPLOADED_FILES: IntGauge = register(
        "uploaded_files", "Number of files uploaded to the remote server during the last run.");
    pub static ref UPLOAD_FAILURES: IntGauge = register(
        "upload_failures", "Number of files which failed to upload or were skipped during the last run.");
    pub static ref PRUNED_BUCKETS: IntGaugeVec = register_int_gauge_vec!(
        "backup_pruned_buckets", "Number of expired backups deleted during the last run.",
        &["location"]).unwrap();
    pub static ref LAST_RUN_SUCCESS: IntGauge = register(
        "last_run_success", "Whether the last run has finished without errors.");
    pub static ref LAST_RUN_TIME: IntGauge = register(
        "last_run_time", "Time when the last run has finished.");
}

pub fn save(path: &str) -> EmptyResult {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();

    let temp_path = format!("{}.tmp", path);
    let mut file = BufWriter::new(File::create(&temp_path)?);

    encoder.encode(&metrics, &mut file)
        .map_err(Into::into)
        .and_then(|_| {
            Ok(file.flush()?)
        })
        .or_else(|err: GenericError| {
            fs::remove_file(&temp_path)?;
            Err(err)
        })?;

    Ok(fs::rename(&temp_path, path)?)
}

fn register(name: &str, help: &str) -> IntGauge {
    register_int_gauge!(format!("backup_{}", name), help).unwrap()
}
