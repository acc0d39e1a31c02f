// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where build definitions live, and where each product keeps its
//! sources, build tree, and installed headers.
//!
//! # Workspace Layout
//!
//! ```text
//! <root>/
//! ├── ode/                    first-party sources
//! ├── anthem/
//! ├── external/<product>/     third-party checkouts
//! └── build/
//!     ├── <product>/          per-product build trees
//!     └── install/include/    shared include directory
//! ```
//!
//! Every directory besides the root can be moved through the build
//! definition.

use std::{
    fs::write,
    io,
    path::{Path, PathBuf},
};

/// Name of build definition file looked up in current directory.
pub const DEFINITION_FILE: &str = "anthem-build.toml";

/// Name of marker file flagging the include directory as populated.
pub const INCLUDE_MARKER: &str = ".populated";

/// Determine default absolute path to user-wide build definition.
///
/// Uses `$XDG_CONFIG_HOME/anthem-build/config.toml` on Linux, and the
/// platform equivalent elsewhere. Does not check if the path returned
/// actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if configuration directory cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("anthem-build").join("config.toml"))
        .ok_or(NoConfigDir)
}

/// Find build definition to use.
///
/// Looks in the current directory first, then at the user-wide location.
/// Returns `None` when neither exists, meaning built-in defaults apply.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(DEFINITION_FILE);
    if local.is_file() {
        return Some(local);
    }

    default_config_file().ok().filter(|path| path.is_file())
}

/// Directory layout of a build.
///
/// All paths are absolute once constructed through
/// [`BuildContext`](crate::config::BuildContext).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
    source_root: PathBuf,
    build_root: PathBuf,
    install_prefix: PathBuf,
}

impl Workspace {
    /// Construct new workspace.
    ///
    /// Relative `sources`, `build`, and `install` paths are taken relative to
    /// `root`. Absolute ones are kept as is.
    pub fn new(
        root: impl AsRef<Path>,
        sources: impl AsRef<Path>,
        build: impl AsRef<Path>,
        install: impl AsRef<Path>,
    ) -> Self {
        let root = root.as_ref();
        Self {
            root: root.to_path_buf(),
            source_root: root.join(sources),
            build_root: root.join(build),
            install_prefix: root.join(install),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    pub fn install_prefix(&self) -> &Path {
        &self.install_prefix
    }

    /// Checkout directory of a third-party product.
    pub fn source_dir(&self, name: &str) -> PathBuf {
        self.source_root.join(name)
    }

    /// Source directory of a first-party product.
    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Build tree of a product.
    pub fn build_dir(&self, name: &str) -> PathBuf {
        self.build_root.join(name)
    }

    /// Shared include directory that header-only products install into.
    pub fn include_dir(&self) -> PathBuf {
        self.install_prefix.join("include")
    }

    /// Marker file flagging the shared include directory as populated.
    pub fn include_marker(&self) -> PathBuf {
        self.include_dir().join(INCLUDE_MARKER)
    }

    /// Check if the shared include directory has been populated during the
    /// current dispatch pass.
    pub fn include_populated(&self) -> bool {
        self.include_marker().is_file()
    }

    /// Flag the shared include directory as populated.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if marker file cannot be written.
    pub fn mark_include_populated(&self) -> io::Result<()> {
        write(self.include_marker(), b"")
    }
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;
