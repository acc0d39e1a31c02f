// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reserved product names.

use crate::{
    config::BuildContext,
    probe::ArtifactPath,
    product::{Product, Result},
    shell::Shell,
};

use tracing::debug;

/// Product that is registered but never built.
///
/// Keeps a slot in the registry for a component whose build is not handled
/// by anthem-build yet, e.g., LLVM, which is expected to come preinstalled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    name: String,
}

impl Placeholder {
    /// Construct new placeholder.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Product for Placeholder {
    fn name(&self) -> &str {
        &self.name
    }

    fn should_build(&self, _: &BuildContext) -> bool {
        false
    }

    fn artifact_path(&self, ctx: &BuildContext) -> ArtifactPath {
        ArtifactPath::exact(ctx.workspace().build_dir(&self.name))
    }

    fn build(&self, _: &BuildContext, _: &dyn Shell) -> Result<()> {
        debug!("nothing to build for placeholder {}", self.name);
        Ok(())
    }
}
