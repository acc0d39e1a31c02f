// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Header-only products.
//!
//! Some dependencies ship as a single amalgamated header. Building them
//! amounts to copying that header into the shared include directory.

use crate::{
    config::BuildContext,
    probe::ArtifactPath,
    product::{Predicate, Product, ProductError, Result, Source},
    shell::Shell,
};

use std::path::PathBuf;
use tracing::{info, instrument};

/// Product built by copying one header into the include directory.
#[derive(Debug, Clone)]
pub struct CopyHeader {
    name: String,
    source: Source,
    predicate: Predicate,
    header: PathBuf,
    dest: PathBuf,
}

impl CopyHeader {
    /// Construct new header product.
    ///
    /// `header` is relative to the product's checkout, `dest` is relative to
    /// the shared include directory.
    pub fn new(
        name: impl Into<String>,
        source: Source,
        header: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            predicate: super::always,
            header: header.into(),
            dest: dest.into(),
        }
    }

    /// Only build when predicate holds.
    pub fn when(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    fn dest_path(&self, ctx: &BuildContext) -> PathBuf {
        ctx.workspace().include_dir().join(&self.dest)
    }
}

impl Product for CopyHeader {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_build(&self, ctx: &BuildContext) -> bool {
        (self.predicate)(ctx)
    }

    fn artifact_path(&self, ctx: &BuildContext) -> ArtifactPath {
        ArtifactPath::exact(self.dest_path(ctx))
    }

    #[instrument(skip(self, ctx, shell), fields(product = %self.name), level = "debug")]
    fn build(&self, ctx: &BuildContext, shell: &dyn Shell) -> Result<()> {
        let workspace = ctx.workspace();
        let from = self.source_dir(ctx).join(&self.header);
        if !from.is_file() {
            return Err(ProductError::MissingInput { path: from });
        }

        let to = self.dest_path(ctx);
        if let Some(parent) = to.parent() {
            shell.makedirs(parent)?;
        }

        // INVARIANT: Stale copies go away unless this run already populated
        // the include directory.
        if !workspace.include_populated() && to.exists() {
            info!("remove stale {:?}", to.display());
            shell.remove(&to)?;
        }

        info!("copy {:?} into {:?}", self.header.display(), to.display());
        shell.copy(&from, &to)?;

        workspace
            .mark_include_populated()
            .map_err(|source| ProductError::IncludeMarker {
                source,
                path: workspace.include_dir(),
            })
    }

    fn remote(&self) -> Option<&Source> {
        Some(&self.source)
    }
}
