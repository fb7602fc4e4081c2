use async_trait::async_trait;
use russh::client;
use russh::keys::{HashAlg, PublicKey};
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::transport::{
    Connector, FileChannel, RemoteEntry, RemoteReader, RemoteWriter, TransportError,
    TransportErrorKind,
};
use crate::utils::{file_name, resolve_path};

/// Opens password-authenticated SFTP channels over `russh`.
#[derive(Debug, Clone, Default)]
pub struct SftpConnector;

/// SSH handler that accepts any server host key.
///
/// Host-key verification is switched off on purpose so the client can talk
/// to servers whose keys are not provisioned locally. This exposes the
/// connection to man-in-the-middle attacks; the fingerprint is logged so it
/// can at least be audited.
struct AcceptAnyHostKey {
    address: String,
}

impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        warn!(
            "Accepting unverified host key {} for {}",
            server_public_key.fingerprint(HashAlg::Sha256),
            self.address
        );
        Ok(true)
    }
}

#[async_trait]
impl Connector for SftpConnector {
    type Channel = SftpChannel;

    async fn connect(&self, config: &ConnectionConfig) -> Result<SftpChannel, TransportError> {
        debug!("Starting SSH handshake with {}", config.address());
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.operation_timeout()),
            ..Default::default()
        });
        let handler = AcceptAnyHostKey {
            address: config.address(),
        };

        let mut session =
            client::connect(ssh_config, (config.host(), config.port()), handler).await?;

        let auth = session
            .authenticate_password(config.username(), config.credential())
            .await?;
        if !auth.success() {
            return Err(TransportError::new(
                TransportErrorKind::Authentication,
                format!(
                    "password rejected for {}@{}",
                    config.username(),
                    config.address()
                ),
            ));
        }

        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        let cwd = match sftp.canonicalize(".").await {
            Ok(path) => path,
            Err(e) => {
                debug!("Could not resolve login directory, using /: {}", e);
                "/".to_string()
            }
        };
        debug!("sftp channel ready, working directory {:?}", cwd);

        Ok(SftpChannel {
            sftp: Some(sftp),
            session: Some(session),
            cwd,
        })
    }
}

/// SFTP channel plus the SSH session that carries it.
///
/// SFTP has no notion of a working directory, so the channel tracks one and
/// resolves relative paths against it before each request.
pub struct SftpChannel {
    sftp: Option<SftpSession>,
    session: Option<client::Handle<AcceptAnyHostKey>>,
    cwd: String,
}

impl SftpChannel {
    fn sftp(&self) -> Result<&SftpSession, TransportError> {
        self.sftp.as_ref().ok_or_else(TransportError::closed)
    }

    fn resolve(&self, path: &str) -> String {
        resolve_path(&self.cwd, path)
    }
}

#[async_trait]
impl FileChannel for SftpChannel {
    fn working_directory(&self) -> &str {
        &self.cwd
    }

    async fn change_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.resolve(path);
        let metadata = self.sftp()?.metadata(target.clone()).await?;
        if !metadata.is_dir() {
            return Err(TransportError::new(
                TransportErrorKind::Other,
                format!("{target} is not a directory"),
            ));
        }
        self.cwd = target;
        Ok(())
    }

    async fn make_directory(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.resolve(path);
        self.sftp()?.create_dir(target).await?;
        Ok(())
    }

    async fn put(&mut self, path: &str) -> Result<RemoteWriter, TransportError> {
        let target = self.resolve(path);
        let file = self.sftp()?.create(target).await?;
        Ok(Box::new(file))
    }

    async fn get(&mut self, path: &str) -> Result<RemoteReader, TransportError> {
        let target = self.resolve(path);
        let file = self.sftp()?.open(target).await?;
        Ok(Box::new(file))
    }

    async fn remove(&mut self, path: &str) -> Result<(), TransportError> {
        let target = self.resolve(path);
        self.sftp()?.remove_file(target).await?;
        Ok(())
    }

    async fn rename(&mut self, from: &str, to: &str) -> Result<(), TransportError> {
        let (from, to) = (self.resolve(from), self.resolve(to));
        self.sftp()?.rename(from, to).await?;
        Ok(())
    }

    async fn list(&mut self, path: &str) -> Result<Vec<RemoteEntry>, TransportError> {
        let target = self.resolve(path);
        let sftp = self.sftp()?;
        let metadata = sftp.metadata(target.clone()).await?;
        if !metadata.is_dir() {
            return Ok(vec![RemoteEntry {
                filename: file_name(&target).to_string(),
                is_directory: false,
            }]);
        }

        let entries = sftp
            .read_dir(target)
            .await?
            .filter(|entry| entry.file_name() != "." && entry.file_name() != "..")
            .map(|entry| RemoteEntry {
                is_directory: entry.file_type().is_dir(),
                filename: entry.file_name(),
            })
            .collect();
        Ok(entries)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut first_error = None;
        if let Some(sftp) = self.sftp.take() {
            if let Err(e) = sftp.close().await {
                first_error = Some(TransportError::from(e));
            }
        }
        if let Some(session) = self.session.take() {
            if let Err(e) = session
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                first_error.get_or_insert(TransportError::from(e));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
