// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Native builds through CMake.
//!
//! A CMake product is built in two or three steps: configure the build tree,
//! build it, and optionally install it into the shared install prefix so
//! later products can find it. Every configure run receives the common
//! definitions derived from the build context (build type, install prefix,
//! compilers, standard library), followed by the product's own option
//! mapping.

use crate::{
    config::{BuildContext, StdLib},
    probe::ArtifactPath,
    product::{Origin, Predicate, Product, Result, Source},
    shell::Shell,
};

use std::{collections::BTreeMap, ffi::OsString, path::PathBuf};
use tracing::{info, instrument};

/// Value of a CMake cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CMakeValue {
    Bool(bool),
    Str(String),
}

impl CMakeValue {
    /// Render as `-D` command line definition.
    pub fn definition(&self, key: &str) -> String {
        match self {
            Self::Bool(value) => format!("-D{key}:BOOL={}", if *value { "ON" } else { "OFF" }),
            Self::Str(value) => format!("-D{key}:STRING={value}"),
        }
    }
}

impl From<bool> for CMakeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for CMakeValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CMakeValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Named options handed to CMake, sorted by name.
pub type CMakeOptions = BTreeMap<String, CMakeValue>;

/// Derive option mapping from build context.
pub type OptionsFn = fn(&BuildContext) -> CMakeOptions;

/// Derive artifact glob, relative to build directory, from build context.
pub type ArtifactFn = fn(&BuildContext) -> String;

/// Product built by configuring and building a CMake project.
#[derive(Debug, Clone)]
pub struct CMakeBuild {
    name: String,
    origin: Origin,
    predicate: Predicate,
    options: OptionsFn,
    artifact: ArtifactFn,
    install: bool,
    assets: Option<String>,
}

impl CMakeBuild {
    /// Construct new CMake product.
    ///
    /// Built unconditionally, with no extra options, and an artifact pattern
    /// matching anything in the build tree until told otherwise.
    pub fn new(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            origin,
            predicate: super::always,
            options: |_| CMakeOptions::new(),
            artifact: |_| "**/*".into(),
            install: false,
            assets: None,
        }
    }

    /// Only build when predicate holds.
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Set option mapping.
    pub fn options(mut self, options: OptionsFn) -> Self {
        self.options = options;
        self
    }

    /// Set artifact glob relative to build directory.
    pub fn artifact(mut self, artifact: ArtifactFn) -> Self {
        self.artifact = artifact;
        self
    }

    /// Install into shared prefix after building.
    pub fn install(mut self) -> Self {
        self.install = true;
        self
    }

    /// Copy directory from sources into build tree after building.
    pub fn assets(mut self, dir: impl Into<String>) -> Self {
        self.assets = Some(dir.into());
        self
    }

    /// Product option mapping for build context.
    pub fn option_mapping(&self, ctx: &BuildContext) -> CMakeOptions {
        (self.options)(ctx)
    }

    fn build_dir(&self, ctx: &BuildContext) -> PathBuf {
        ctx.workspace().build_dir(&self.name)
    }

    /// Arguments of configure step.
    pub fn configure_args(&self, ctx: &BuildContext) -> Vec<OsString> {
        let workspace = ctx.workspace();
        let prefix = workspace.install_prefix().to_string_lossy().into_owned();
        let mut args: Vec<OsString> = vec![
            "cmake".into(),
            "-S".into(),
            self.source_dir(ctx).into(),
            "-B".into(),
            self.build_dir(ctx).into(),
            "-G".into(),
            ctx.generator().into(),
        ];

        let mut common = CMakeOptions::new();
        common.insert("CMAKE_BUILD_TYPE".into(), ctx.mode().cmake_build_type().into());
        common.insert("CMAKE_INSTALL_PREFIX".into(), prefix.clone().into());
        common.insert("CMAKE_PREFIX_PATH".into(), prefix.into());
        common.insert("CMAKE_C_COMPILER".into(), ctx.compiler().c_compiler().into());
        common.insert("CMAKE_CXX_COMPILER".into(), ctx.compiler().cxx_compiler().into());
        if ctx.stdlib() == StdLib::LibCxx {
            common.insert("CMAKE_CXX_FLAGS".into(), "-stdlib=libc++".into());
        }

        // INVARIANT: Product options come last so they win over common ones.
        let options = common.into_iter().chain(self.option_mapping(ctx));
        args.extend(options.map(|(key, value)| value.definition(&key).into()));

        args
    }

    /// Arguments of build step.
    pub fn build_args(&self, ctx: &BuildContext) -> Vec<OsString> {
        vec![
            "cmake".into(),
            "--build".into(),
            self.build_dir(ctx).into(),
            "--config".into(),
            ctx.mode().cmake_build_type().into(),
            "--parallel".into(),
            ctx.jobs().to_string().into(),
        ]
    }

    /// Arguments of install step.
    pub fn install_args(&self, ctx: &BuildContext) -> Vec<OsString> {
        vec![
            "cmake".into(),
            "--install".into(),
            self.build_dir(ctx).into(),
            "--config".into(),
            ctx.mode().cmake_build_type().into(),
        ]
    }
}

impl Product for CMakeBuild {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_build(&self, ctx: &BuildContext) -> bool {
        (self.predicate)(ctx)
    }

    fn artifact_path(&self, ctx: &BuildContext) -> ArtifactPath {
        ArtifactPath::pattern(self.build_dir(ctx), (self.artifact)(ctx))
    }

    #[instrument(skip(self, ctx, shell), fields(product = %self.name), level = "debug")]
    fn build(&self, ctx: &BuildContext, shell: &dyn Shell) -> Result<()> {
        let build_dir = self.build_dir(ctx);

        info!("configure {}", self.name);
        shell.call(&self.configure_args(ctx), &build_dir)?;

        info!("compile {}", self.name);
        shell.call(&self.build_args(ctx), &build_dir)?;

        if self.install {
            info!("install {}", self.name);
            shell.call(&self.install_args(ctx), &build_dir)?;
        }

        if let Some(assets) = &self.assets {
            let from = self.source_dir(ctx).join(assets);
            if from.is_dir() {
                info!("stage {assets} for {}", self.name);
                shell.copytree(&from, &build_dir.join(assets))?;
            }
        }

        Ok(())
    }

    fn source_dir(&self, ctx: &BuildContext) -> PathBuf {
        self.origin.source_dir(ctx, &self.name)
    }

    fn remote(&self) -> Option<&Source> {
        self.origin.remote()
    }
}
