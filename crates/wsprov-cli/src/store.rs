use std::{
    fs,
    io::{self, Write},
    net::Ipv4Addr,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use wsprov::{Token, WorkspaceRecord};

/// Everything the CLI persists between invocations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Live workspaces, in creation order.
    pub workspaces: Vec<WorkspaceRecord>,
    /// Subdomains of deleted workspaces. They stay issued forever.
    #[serde(default)]
    pub retired: Vec<Token>,
    /// Free addresses that were released and not allocated since, oldest
    /// release first. They queue behind every never-used address.
    #[serde(default)]
    pub released: Vec<Ipv4Addr>,
}

/// Exclusive hold on a state file for the lifetime of one invocation.
///
/// The lock is a `<state file>.lock` sibling created with `create_new`, so
/// a second invocation against the same state file fails fast instead of
/// racing the first. The file is removed on drop.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(_e) = fs::remove_file(&self.path) {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = %self.path.display(), error = %_e, "failed to remove lock file");
        }
    }
}

/// A JSON state file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a crash mid-write leaves the previous state intact.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Takes the state file's lock.
    ///
    /// Fails if another invocation holds it. A lock left behind by a crashed
    /// process has to be removed by hand.
    pub fn lock(&self) -> anyhow::Result<StateLock> {
        let path = self.lock_path();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(StateLock { path })
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => bail!(
                "{} is locked by another invocation (remove {} if no other process is running)",
                self.path.display(),
                path.display()
            ),
            Err(e) => {
                Err(e).with_context(|| format!("failed to create lock file {}", path.display()))
            }
        }
    }

    /// Reads the state, or an empty state if the file does not exist yet.
    pub fn load(&self) -> anyhow::Result<State> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %self.path.display(), "no state file, starting empty");
                return Ok(State::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", self.path.display()))
    }

    pub fn save(&self, state: &State) -> anyhow::Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut file, state)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            path = %self.path.display(),
            workspaces = state.workspaces.len(),
            "state saved"
        );
        Ok(())
    }
}
