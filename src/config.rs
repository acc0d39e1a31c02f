// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the build definition file that anthem-build reads,
//! and turn it into a validated [`BuildContext`] that every product receives
//! during a dispatch pass.
//!
//! # Build Definition
//!
//! A __build definition__ is a TOML file, normally `anthem-build.toml` at the
//! project root. It has three tables: `layout` for directory placement,
//! `toolchain` for compiler selection, and `build` for what to build and how.
//! Every key is optional. Missing keys take their default value.
//!
//! # Build Context
//!
//! The build context is the validated, resolved form of a build definition.
//! All paths are absolute and every cross-field constraint has been checked.
//! Once constructed, it is only ever handed out by shared reference, so no
//! product can alter what later products observe.

use crate::path::Workspace;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    thread::available_parallelism,
};

/// Build definition layout.
///
/// Deserialized form of `anthem-build.toml`. Paths in the `layout` table go
/// through shell expansion when parsed from a string.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildDefinition {
    /// Directory placement.
    pub layout: LayoutSettings,

    /// Compiler and build tool selection.
    pub toolchain: ToolchainSettings,

    /// What to build, and in which mode.
    pub build: BuildSettings,
}

impl BuildDefinition {
    /// Load build definition from file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is not a valid
    ///   build definition.
    /// - Return [`ConfigError::ShellExpansion`] if a layout path cannot be
    ///   expanded.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        read_to_string(path)
            .map_err(|source| ConfigError::Read {
                source,
                path: path.to_path_buf(),
            })?
            .parse()
    }
}

impl FromStr for BuildDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: BuildDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every layout path.
        let layout = &mut definition.layout;
        layout.root = expand_path(&layout.root)?;
        layout.sources = expand_path(&layout.sources)?;
        layout.build = expand_path(&layout.build)?;
        layout.install = expand_path(&layout.install)?;

        Ok(definition)
    }
}

impl Display for BuildDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Directory placement settings.
///
/// Relative paths are resolved against `root`. A relative `root` is resolved
/// against the current working directory.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Project root containing the first-party sources.
    pub root: PathBuf,

    /// Where third-party sources get cloned.
    pub sources: PathBuf,

    /// Parent of every per-product build directory.
    pub build: PathBuf,

    /// Install prefix, holds the shared include directory.
    pub install: PathBuf,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            sources: PathBuf::from("external"),
            build: PathBuf::from("build"),
            install: PathBuf::from("build/install"),
        }
    }
}

/// Compiler and build tool settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Compiler family.
    pub compiler: Compiler,

    /// C++ standard library, derived from compiler and platform if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdlib: Option<StdLib>,

    /// CMake generator name.
    pub generator: String,

    /// Number of parallel jobs handed to the native build tool.
    pub jobs: usize,

    /// Python interpreter used to run code generators.
    pub python: String,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            compiler: Compiler::host_default(),
            stdlib: None,
            generator: "Ninja".into(),
            jobs: available_parallelism().map(NonZeroUsize::get).unwrap_or(1),
            python: if cfg!(windows) { "python" } else { "python3" }.into(),
        }
    }
}

/// Build selection settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Build mode for every CMake product.
    pub mode: BuildMode,

    /// Build test suites, and the test-only dependencies.
    pub test: bool,

    /// Build benchmark suites, and the benchmark library.
    pub benchmarks: bool,

    /// OpenGL API version to generate a loader for, as `MAJOR.MINOR`.
    pub gl_version: String,

    /// Target platform, host platform if absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            mode: BuildMode::default(),
            test: false,
            benchmarks: false,
            gl_version: "4.5".into(),
            platform: None,
        }
    }
}

/// Target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// Platform the tool is currently running on.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// File name of a static library on this platform.
    pub fn static_lib(&self, name: &str) -> String {
        match self {
            Self::Windows => format!("{name}.lib"),
            Self::Linux | Self::MacOs => format!("lib{name}.a"),
        }
    }

    /// File name of an executable on this platform.
    pub fn executable(&self, name: &str) -> String {
        match self {
            Self::Windows => format!("{name}.exe"),
            Self::Linux | Self::MacOs => name.to_string(),
        }
    }
}

impl Display for Platform {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        })
    }
}

/// Compiler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compiler {
    Gcc,
    Clang,
    Msvc,
}

impl Compiler {
    /// Usual compiler for the host platform.
    pub fn host_default() -> Self {
        match Platform::host() {
            Platform::Linux => Self::Gcc,
            Platform::MacOs => Self::Clang,
            Platform::Windows => Self::Msvc,
        }
    }

    /// C compiler executable.
    pub fn c_compiler(&self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
            Self::Msvc => "cl",
        }
    }

    /// C++ compiler executable.
    pub fn cxx_compiler(&self) -> &'static str {
        match self {
            Self::Gcc => "g++",
            Self::Clang => "clang++",
            Self::Msvc => "cl",
        }
    }
}

impl Display for Compiler {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
            Self::Msvc => "msvc",
        })
    }
}

/// C++ standard library implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum StdLib {
    #[serde(rename = "libstdc++")]
    LibStdCxx,

    #[serde(rename = "libc++")]
    LibCxx,

    #[serde(rename = "msvc")]
    Msvc,
}

impl Display for StdLib {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::LibStdCxx => "libstdc++",
            Self::LibCxx => "libc++",
            Self::Msvc => "msvc",
        })
    }
}

/// Build mode.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lowercase")]
pub enum BuildMode {
    Debug,
    #[default]
    Release,
    RelWithDebInfo,
}

impl BuildMode {
    /// Value for `CMAKE_BUILD_TYPE`.
    pub fn cmake_build_type(&self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Release => "Release",
            Self::RelWithDebInfo => "RelWithDebInfo",
        }
    }
}

/// OpenGL API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlVersion {
    pub major: u8,
    pub minor: u8,
}

impl FromStr for GlVersion {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidGlVersion {
            version: data.to_string(),
        };

        let (major, minor) = data.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl Display for GlVersion {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}.{}", self.major, self.minor)
    }
}

/// Validated build configuration.
///
/// Constructed once before dispatch begins, then passed by shared reference
/// to every predicate and procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    workspace: Workspace,
    platform: Platform,
    compiler: Compiler,
    stdlib: StdLib,
    mode: BuildMode,
    build_test: bool,
    build_benchmarks: bool,
    gl_version: GlVersion,
    generator: String,
    jobs: usize,
    python: String,
}

impl BuildContext {
    /// Construct new build context from build definition.
    ///
    /// Resolves every layout path to an absolute path, fills in the platform
    /// and standard library when left unspecified, and checks that the
    /// combination is buildable.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ZeroJobs`] if job count is zero.
    /// - Return [`ConfigError::InvalidGlVersion`] if OpenGL version is not
    ///   of the form `MAJOR.MINOR`.
    /// - Return [`ConfigError::UnsupportedCompiler`] if compiler cannot target
    ///   platform.
    /// - Return [`ConfigError::UnsupportedStdLib`] if standard library cannot
    ///   be used with compiler.
    /// - Return [`ConfigError::ResolvePath`] if root cannot be made absolute.
    /// - Return [`ConfigError::MissingRoot`] if root is not a directory.
    pub fn try_new(definition: &BuildDefinition) -> Result<Self> {
        let BuildDefinition {
            layout,
            toolchain,
            build,
        } = definition;

        if toolchain.jobs == 0 {
            return Err(ConfigError::ZeroJobs);
        }

        let gl_version = build.gl_version.parse::<GlVersion>()?;
        let platform = build.platform.unwrap_or_else(Platform::host);
        let compiler = toolchain.compiler;
        if compiler == Compiler::Msvc && platform != Platform::Windows {
            return Err(ConfigError::UnsupportedCompiler { compiler, platform });
        }

        let stdlib = toolchain
            .stdlib
            .unwrap_or(match (compiler, platform) {
                (Compiler::Msvc, _) => StdLib::Msvc,
                (Compiler::Clang, Platform::MacOs) => StdLib::LibCxx,
                _ => StdLib::LibStdCxx,
            });
        let compatible = matches!(
            (compiler, stdlib),
            (Compiler::Msvc, StdLib::Msvc)
                | (Compiler::Gcc, StdLib::LibStdCxx)
                | (Compiler::Clang, StdLib::LibStdCxx)
                | (Compiler::Clang, StdLib::LibCxx)
        );
        if !compatible {
            return Err(ConfigError::UnsupportedStdLib { stdlib, compiler });
        }

        let root = std::path::absolute(&layout.root).map_err(|source| ConfigError::ResolvePath {
            source,
            path: layout.root.clone(),
        })?;
        if !root.is_dir() {
            return Err(ConfigError::MissingRoot { root });
        }

        Ok(Self {
            workspace: Workspace::new(&root, &layout.sources, &layout.build, &layout.install),
            platform,
            compiler,
            stdlib,
            mode: build.mode,
            build_test: build.test,
            build_benchmarks: build.benchmarks,
            gl_version,
            generator: toolchain.generator.clone(),
            jobs: toolchain.jobs,
            python: toolchain.python.clone(),
        })
    }

    /// Directory layout to build in.
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Target platform.
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Compiler family.
    pub fn compiler(&self) -> Compiler {
        self.compiler
    }

    /// C++ standard library.
    pub fn stdlib(&self) -> StdLib {
        self.stdlib
    }

    /// Build mode.
    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Whether test suites are enabled.
    pub fn build_test(&self) -> bool {
        self.build_test
    }

    /// Whether benchmark suites are enabled.
    pub fn build_benchmarks(&self) -> bool {
        self.build_benchmarks
    }

    /// OpenGL API version to generate a loader for.
    pub fn gl_version(&self) -> GlVersion {
        self.gl_version
    }

    /// CMake generator name.
    pub fn generator(&self) -> &str {
        &self.generator
    }

    /// Parallel job count.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Python interpreter.
    pub fn python(&self) -> &str {
        &self.python
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read build definition file.
    #[error("failed to read build definition at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Root path cannot be made absolute.
    #[error("failed to resolve path {:?}", path.display())]
    ResolvePath {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Root directory does not exist.
    #[error("project root {:?} is not a directory", root.display())]
    MissingRoot { root: PathBuf },

    /// OpenGL version is malformed.
    #[error("invalid OpenGL version {version:?}, expected MAJOR.MINOR")]
    InvalidGlVersion { version: String },

    /// Compiler cannot target platform.
    #[error("compiler {compiler} cannot target {platform}")]
    UnsupportedCompiler {
        compiler: Compiler,
        platform: Platform,
    },

    /// Standard library cannot be used with compiler.
    #[error("standard library {stdlib} cannot be used with {compiler}")]
    UnsupportedStdLib { stdlib: StdLib, compiler: Compiler },

    /// Job count is zero.
    #[error("job count must be at least one")]
    ZeroJobs,
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
