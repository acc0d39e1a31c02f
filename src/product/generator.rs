// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Code generator products.
//!
//! Products like the glad OpenGL loader are not compiled here at all. Their
//! sources are produced by a generator script that runs inside the
//! product's checkout and writes into its build directory.

use crate::{
    config::BuildContext,
    probe::ArtifactPath,
    product::{Predicate, Product, Result, Source},
    shell::Shell,
};

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};
use tracing::{info, instrument};

/// Derive generator command line from build context and output directory.
pub type ArgsFn = fn(&BuildContext, &Path) -> Vec<OsString>;

/// Product built by running a code generator.
#[derive(Debug, Clone)]
pub struct Generator {
    name: String,
    source: Source,
    predicate: Predicate,
    args: ArgsFn,
    artifact: PathBuf,
}

impl Generator {
    /// Construct new generator product.
    ///
    /// `artifact` is relative to the product's build directory, which is also
    /// the output directory handed to `args`.
    pub fn new(
        name: impl Into<String>,
        source: Source,
        args: ArgsFn,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            predicate: super::always,
            args,
            artifact: artifact.into(),
        }
    }

    /// Only build when predicate holds.
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    /// Generator command line for build context.
    pub fn command(&self, ctx: &BuildContext) -> Vec<OsString> {
        (self.args)(ctx, &ctx.workspace().build_dir(&self.name))
    }
}

impl Product for Generator {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_build(&self, ctx: &BuildContext) -> bool {
        (self.predicate)(ctx)
    }

    fn artifact_path(&self, ctx: &BuildContext) -> ArtifactPath {
        ArtifactPath::exact(ctx.workspace().build_dir(&self.name).join(&self.artifact))
    }

    #[instrument(skip(self, ctx, shell), fields(product = %self.name), level = "debug")]
    fn build(&self, ctx: &BuildContext, shell: &dyn Shell) -> Result<()> {
        info!("generate {}", self.name);
        let output = shell.call(&self.command(ctx), &self.source_dir(ctx))?;
        if !output.is_empty() {
            info!("{output}");
        }

        Ok(())
    }

    fn remote(&self) -> Option<&Source> {
        Some(&self.source)
    }
}
