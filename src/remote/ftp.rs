use std::io::Read;

use log::{debug, warn};
use suppaftp::{FtpError, FtpStream};
use suppaftp::types::FileType;

use crate::config::UploadConfig;
use crate::core::GenericResult;

use super::{RemoteError, RemotePath, RemoteResult, RemoteTree};

/// An authenticated FTP session. It's closed on drop.
pub struct Ftp {
    host: String,
    stream: FtpStream,
}

impl Ftp {
    pub fn connect(config: &UploadConfig) -> GenericResult<Ftp> {
        let address = format!("{}:{}", config.host, config.port);
        debug!("Connecting to {}...", address);

        let mut stream = FtpStream::connect(&address).map_err(|e| format!(
            "Unable to connect to {}: {}", address, e))?;

        if let Err(err) = stream.login(&config.username, &config.password) {
            let _ = stream.quit();
            return Err!("Unable to log in to {} as {:?}: {}", config.host, config.username, err);
        }

        if let Err(err) = stream.transfer_type(FileType::Binary) {
            let _ = stream.quit();
            return Err!("Unable to switch {} to binary transfer mode: {}", config.host, err);
        }

        debug!("Connected to {} as {:?}.", config.host, config.username);

        Ok(Ftp {
            host: config.host.clone(),
            stream,
        })
    }
}

impl RemoteTree for Ftp {
    fn name(&self) -> &str {
        &self.host
    }

    fn change_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.stream.cwd(path.as_str()).map_err(map_error)
    }

    fn create_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.stream.mkdir(path.as_str()).map_err(map_error)
    }

    fn list_directory(&mut self) -> RemoteResult<Vec<String>> {
        self.stream.nlst(None).map_err(map_error)
    }

    fn store_file(&mut self, path: &RemotePath, mut data: &mut dyn Read) -> RemoteResult<u64> {
        self.stream.put_file(path.as_str(), &mut data).map_err(map_error)
    }

    fn delete_file(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.stream.rm(path.as_str()).map_err(map_error)
    }

    fn remove_directory(&mut self, path: &RemotePath) -> RemoteResult<()> {
        self.stream.rmdir(path.as_str()).map_err(map_error)
    }
}

impl Drop for Ftp {
    fn drop(&mut self) {
        if let Err(err) = self.stream.quit() {
            warn!("Failed to close FTP session with {}: {}.", self.host, err);
        }
    }
}

// A reply code from the server is a refusal of this particular command. Anything else means that the
// control connection is no longer in a known state.
fn map_error(err: FtpError) -> RemoteError {
    match err {
        FtpError::UnexpectedResponse(_) => RemoteError::Denied(err.to_string().trim_end().to_owned()),
        _ => RemoteError::Connection(err.to_string()),
    }
}
