//! Pinned telepresence client acquisition
//!
//! Prefer a client on PATH when it already reports the pinned version;
//! otherwise download the release asset for this OS/arch into a per-version
//! cache directory and reuse it on later runs.

use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tpdev_core::version::{parse_client_version, versions_match};
use tpdev_core::{BinaryHandle, CommandRunner, Platform, RunConfig, TpError};
use tracing::{debug, info, warn};

const CLIENT_FILE_NAME: &str = "telepresence";

/// Seam over the release download so provisioning can be tested offline.
pub trait AssetFetcher {
    /// Stream the body at `url` into `dest`, returning the number of bytes written.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> tpdev_core::Result<u64>;
}

/// Downloads release assets over HTTPS.
///
/// The HTTP client is built on the first fetch, so runs that find the pinned
/// client on PATH or in the cache never construct one.
#[derive(Default)]
pub struct HttpFetcher {
    client: OnceCell<reqwest::blocking::Client>,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, url: &str) -> tpdev_core::Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tpdev/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| TpError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(self.client.get_or_init(|| client))
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> tpdev_core::Result<u64> {
        let mut resp = self.client(url)?.get(url).send().map_err(|e| TpError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !resp.status().is_success() {
            return Err(TpError::DownloadStatus {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }

        resp.copy_to(dest).map_err(|e| TpError::Download {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Release asset coordinates in the upstream naming (`telepresence-{os}-{arch}`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseAsset {
    os: &'static str,
    arch: &'static str,
}

impl ReleaseAsset {
    /// Map the host platform onto the release vocabulary.
    pub fn resolve(platform: &Platform) -> tpdev_core::Result<Self> {
        let os = match platform.os.as_str() {
            "linux" => "linux",
            "macos" | "darwin" => "darwin",
            other => return Err(TpError::UnsupportedOs(other.to_string())),
        };
        let arch = match platform.arch.as_str() {
            "x86_64" | "amd64" => "amd64",
            "aarch64" | "arm64" => "arm64",
            other => return Err(TpError::UnsupportedArch(other.to_string())),
        };
        Ok(Self { os, arch })
    }

    pub fn file_name(&self) -> String {
        format!("telepresence-{}-{}", self.os, self.arch)
    }

    pub fn url(&self, base_url: &str, version: &str) -> String {
        format!("{}/{}/{}", base_url, version, self.file_name())
    }
}

/// Where the client for `version` lives inside the cache directory
pub fn cache_path(cache_dir: &Path, version: &str) -> PathBuf {
    cache_dir.join(version).join(CLIENT_FILE_NAME)
}

pub struct Provisioner<'a> {
    config: &'a RunConfig,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn AssetFetcher,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a RunConfig,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn AssetFetcher,
    ) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Resolve the client binary for this run.
    pub fn ensure_binary(&self) -> tpdev_core::Result<BinaryHandle> {
        let pinned = &self.config.pinned_version;

        if let Some(version) = self.version_of(&self.config.client_program) {
            if versions_match(&version, pinned) {
                info!(%version, "using system telepresence");
                return Ok(BinaryHandle::system(&self.config.client_program, version));
            }
            debug!(found = %version, %pinned, "system telepresence does not match pinned version");
        }

        // Resolve before touching the cache or network so unsupported hosts fail fast
        let asset = ReleaseAsset::resolve(&self.config.platform)?;
        let path = cache_path(&self.config.cache_dir, pinned);

        if path.is_file() {
            debug!(path = %path.display(), "using cached telepresence");
        } else {
            self.download(&asset, &path)?;
        }

        let path = fs::canonicalize(&path)?;
        let program = path.to_string_lossy().to_string();
        let version = self.version_of(&program);
        match &version {
            Some(v) if !versions_match(v, pinned) => {
                warn!(found = %v, %pinned, path = %program, "cached telepresence reports a different version");
            }
            None => warn!(path = %program, "could not read cached telepresence version"),
            _ => {}
        }

        let digest = file_sha256(&path)?;
        Ok(BinaryHandle::bundled(program, version, Some(digest)))
    }

    /// `<program> version`, parsed. Launch failures and non-zero exits yield None.
    fn version_of(&self, program: &str) -> Option<String> {
        match self.runner.run(program, &["version"]) {
            Ok(out) if out.success() => parse_client_version(&out.stdout),
            Ok(out) => {
                debug!(program, exit_code = out.exit_code, "version command failed");
                None
            }
            Err(e) => {
                debug!(program, error = %e, "version command could not start");
                None
            }
        }
    }

    fn download(&self, asset: &ReleaseAsset, path: &Path) -> tpdev_core::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let url = asset.url(&self.config.release_base_url, &self.config.pinned_version);
        let partial = path.with_extension("part");
        info!(%url, dest = %path.display(), "downloading telepresence");

        let bytes = match self.write_partial(&url, &partial) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        };

        mark_executable(&partial)?;
        fs::rename(&partial, path)?;
        info!(bytes, path = %path.display(), "downloaded telepresence");
        Ok(())
    }

    fn write_partial(&self, url: &str, partial: &Path) -> tpdev_core::Result<u64> {
        let mut file = File::create(partial)?;
        let bytes = self.fetcher.fetch(url, &mut file)?;
        file.flush()?;
        file.sync_all()?;
        Ok(bytes)
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn file_sha256(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}
