// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Artifact existence checks.
//!
//! An __artifact__ is the file a product leaves behind after a successful
//! build. Its presence is the only record anthem-build keeps of past builds,
//! so checking it is what makes a repeated dispatch pass a no-op.
//!
//! Artifacts are either exact paths, or glob patterns anchored at a base
//! directory. Patterns cover build tools that drop their output into a
//! per-configuration subdirectory whose name depends on the generator.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io,
    path::{Path, PathBuf},
};

/// Expected location of a product's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPath {
    /// Artifact at exactly this path.
    Exact(PathBuf),

    /// Any file under `base` matching glob `pattern`.
    Pattern { base: PathBuf, pattern: String },
}

impl ArtifactPath {
    pub fn exact(path: impl Into<PathBuf>) -> Self {
        Self::Exact(path.into())
    }

    pub fn pattern(base: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self::Pattern {
            base: base.into(),
            pattern: pattern.into(),
        }
    }
}

impl Display for ArtifactPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Exact(path) => write!(fmt, "{}", path.display()),
            Self::Pattern { base, pattern } => write!(fmt, "{}", base.join(pattern).display()),
        }
    }
}

/// Check whether artifacts exist.
pub trait ArtifactProbe {
    /// Check if artifact exists.
    ///
    /// Must not modify anything it looks at.
    fn exists(&self, artifact: &ArtifactPath) -> Result<bool>;
}

/// Probe the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsProbe;

impl FsProbe {
    /// Construct new filesystem probe.
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactProbe for FsProbe {
    fn exists(&self, artifact: &ArtifactPath) -> Result<bool> {
        match artifact {
            ArtifactPath::Exact(path) => path.try_exists().map_err(|source| ProbeError::Access {
                source,
                path: path.clone(),
            }),
            ArtifactPath::Pattern { base, pattern } => glob_exists(base, pattern),
        }
    }
}

fn glob_exists(base: &Path, pattern: &str) -> Result<bool> {
    // INVARIANT: Base directory is literal even if it contains glob characters.
    let full = format!(
        "{}/{pattern}",
        glob::Pattern::escape(base.to_string_lossy().as_ref())
    );

    let mut matches = glob::glob(&full).map_err(|source| ProbeError::Pattern {
        source,
        pattern: full.clone(),
    })?;

    match matches.next() {
        Some(Ok(_)) => Ok(true),
        Some(Err(err)) => Err(ProbeError::Access {
            path: err.path().to_path_buf(),
            source: err.into(),
        }),
        None => Ok(false),
    }
}

/// Artifact probe error types.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// Artifact pattern is not a valid glob.
    #[error("invalid artifact pattern {pattern:?}")]
    Pattern {
        #[source]
        source: glob::PatternError,
        pattern: String,
    },

    /// Filesystem could not be inspected.
    #[error("cannot inspect {:?}", path.display())]
    Access {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ProbeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, write};

    #[sealed_test]
    fn probe_exact_artifact() -> anyhow::Result<()> {
        let probe = FsProbe::new();
        let artifact = ArtifactPath::exact("build/install/include/clara.hpp");
        assert!(!probe.exists(&artifact)?);

        create_dir_all("build/install/include")?;
        write("build/install/include/clara.hpp", "// clara")?;
        assert!(probe.exists(&artifact)?);

        Ok(())
    }

    #[sealed_test]
    fn probe_pattern_artifact() -> anyhow::Result<()> {
        let probe = FsProbe::new();
        let artifact = ArtifactPath::pattern("build/ode", "**/libode.a");
        assert!(!probe.exists(&artifact)?);

        create_dir_all("build/ode/Release/lib")?;
        write("build/ode/Release/lib/libode.a", "")?;
        assert!(probe.exists(&artifact)?);

        Ok(())
    }

    #[sealed_test]
    fn probe_escapes_base_directory() -> anyhow::Result<()> {
        let probe = FsProbe::new();
        create_dir_all("odd[dir]/lib")?;
        write("odd[dir]/lib/libode.a", "")?;

        assert!(probe.exists(&ArtifactPath::pattern("odd[dir]", "lib/*.a"))?);

        Ok(())
    }

    #[test]
    fn probe_rejects_invalid_pattern() {
        let result = FsProbe::new().exists(&ArtifactPath::pattern("build", "[*.a"));
        assert!(matches!(result, Err(ProbeError::Pattern { .. })));
    }
}
