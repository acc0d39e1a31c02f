// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Third-party source acquisition.
//!
//! Before a dispatch pass can build a third-party product, its sources must
//! be checked out under the workspace source root. Fetching is idempotent in
//! the same way dispatch is: a product whose checkout directory already
//! exists is left alone, so fetching twice clones nothing the second time.
//!
//! Only products that the build context wants are fetched. There is no point
//! in cloning Catch2 when tests are disabled.

use crate::{
    config::BuildContext,
    product::{Registry, Revision, Source},
};

use git2::{build::RepoBuilder, AutotagOption, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::{
    fs::remove_dir_all,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument, warn};

/// Layer of indirection for source checkout.
pub trait SourceAccess {
    /// Clone remote into fresh directory.
    fn clone_source(&self, source: &Source, path: &Path) -> Result<(), CloneError>;
}

/// Source checkout through libgit2.
#[derive(Debug, Default)]
pub struct Git2Source;

impl Git2Source {
    /// Construct new libgit2 source checkout.
    pub fn new() -> Self {
        Self
    }
}

impl SourceAccess for Git2Source {
    /// Clone remote into fresh directory.
    ///
    /// The progress of the clone is displayed through a progress bar. Tags
    /// are checked out with a detached HEAD once the clone is done.
    ///
    /// # Errors
    ///
    /// - Return [`CloneError::Git2`] if libgit2 operations fail.
    /// - Return [`CloneError::IndicatifStyleTemplate`] if progress bar cannot
    ///   be styled.
    /// - Return [`CloneError::CreateParent`] if parent directory of checkout
    ///   cannot be created.
    /// - Return [`CloneError::Discard`] if a checkout whose tag cannot be
    ///   checked out cannot be removed again.
    #[instrument(skip(self, source), fields(url = %source.url), level = "debug")]
    fn clone_source(&self, source: &Source, path: &Path) -> Result<(), CloneError> {
        if let Some(parent) = path.parent() {
            mkdirp::mkdirp(parent).map_err(|err| CloneError::CreateParent {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
        )?
        .progress_chars("-Cco.");
        bar.set_style(style);
        bar.set_message(source.url.clone());
        bar.enable_steady_tick(Duration::from_millis(100));

        let mut throttle = Instant::now();
        let mut rc = RemoteCallbacks::new();
        rc.transfer_progress(|progress| {
            if throttle.elapsed() > Duration::from_millis(10) {
                throttle = Instant::now();
                bar.set_length(progress.total_objects() as u64);
                bar.set_position(progress.received_objects() as u64);
            }
            true
        });

        let mut fo = FetchOptions::new();
        fo.remote_callbacks(rc);
        fo.download_tags(AutotagOption::All);
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fo);
        if let Some(Revision::Branch(branch)) = &source.revision {
            builder.branch(branch);
        }

        let repository = builder.clone(&source.url, path);
        bar.finish_and_clear();
        let repository = repository?;

        if let Some(Revision::Tag(tag)) = &source.revision {
            if let Err(error) = checkout_tag(&repository, tag) {
                // INVARIANT: Never leave a checkout of the wrong revision behind.
                //   - Fetching skips any product whose checkout directory exists.
                drop(repository);
                warn!("discard checkout {:?}", path.display());
                remove_dir_all(path).map_err(|err| CloneError::Discard {
                    source: err,
                    path: path.to_path_buf(),
                })?;
                return Err(error.into());
            }
        }

        Ok(())
    }
}

fn checkout_tag(repository: &Repository, tag: &str) -> Result<(), git2::Error> {
    debug!("checkout tag {tag}");
    let commit = repository
        .revparse_single(&format!("refs/tags/{tag}"))?
        .peel_to_commit()?;
    repository.checkout_tree(commit.as_object(), None)?;
    repository.set_head_detached(commit.id())
}

/// Clone missing sources of every wanted third-party product.
///
/// Returns the names of the products that were cloned, in registration
/// order. Stops at the first failure.
///
/// # Errors
///
/// - Return [`FetchError::Clone`] if a product's sources cannot be cloned.
#[instrument(skip(registry, ctx, access), level = "debug")]
pub fn fetch(
    registry: &Registry,
    ctx: &BuildContext,
    access: &impl SourceAccess,
) -> Result<Vec<String>> {
    let mut fetched = Vec::new();

    for product in registry.iter() {
        let name = product.name();
        let Some(source) = product.remote() else {
            debug!("{name} has no remote");
            continue;
        };

        if !product.should_build(ctx) {
            debug!("{name} not requested");
            continue;
        }

        let dir = product.source_dir(ctx);
        if dir.exists() {
            info!("{name} already checked out at {:?}", dir.display());
            continue;
        }

        info!("fetch {name} from {}", source.url);
        access
            .clone_source(source, &dir)
            .map_err(|err| FetchError::Clone {
                source: err,
                product: name.to_string(),
                path: dir.clone(),
            })?;
        fetched.push(name.to_string());
    }

    Ok(fetched)
}

/// Source checkout error types.
#[derive(Debug, thiserror::Error)]
pub enum CloneError {
    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Checkout of the wrong revision cannot be removed.
    #[error("failed to discard checkout {:?}", path.display())]
    Discard {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Parent of checkout directory cannot be created.
    #[error("failed to create {:?}", path.display())]
    CreateParent {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Fetch error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Product sources cannot be cloned.
    #[error("failed to fetch {product} into {:?}", path.display())]
    Clone {
        #[source]
        source: CloneError,
        product: String,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BuildDefinition, Compiler, Platform},
        product::catalog,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, fs::create_dir_all};

    #[derive(Debug, Default)]
    struct FakeAccess {
        cloned: RefCell<Vec<(String, PathBuf)>>,
        fail: bool,
    }

    impl SourceAccess for FakeAccess {
        fn clone_source(&self, source: &Source, path: &Path) -> Result<(), CloneError> {
            if self.fail {
                return Err(CloneError::Git2(git2::Error::from_str("network down")));
            }

            self.cloned
                .borrow_mut()
                .push((source.url.clone(), path.to_path_buf()));
            create_dir_all(path).map_err(|err| CloneError::CreateParent {
                source: err,
                path: path.to_path_buf(),
            })
        }
    }

    fn context(test: bool) -> BuildContext {
        let mut definition = BuildDefinition::default();
        definition.layout.root = std::env::current_dir().unwrap();
        definition.toolchain.compiler = Compiler::Gcc;
        definition.toolchain.jobs = 1;
        definition.build.test = test;
        definition.build.platform = Some(Platform::Linux);
        BuildContext::try_new(&definition).unwrap()
    }

    #[sealed_test]
    fn fetch_clones_wanted_missing_sources() -> anyhow::Result<()> {
        let ctx = context(true);
        create_dir_all(ctx.workspace().source_dir("clara"))?;
        let access = FakeAccess::default();

        let fetched = fetch(&catalog::standard(), &ctx, &access)?;

        assert_eq!(fetched, vec!["catch2", "glad"]);
        let urls = access
            .cloned
            .borrow()
            .iter()
            .map(|(url, _)| url.clone())
            .collect::<Vec<_>>();
        assert_eq!(
            urls,
            vec![
                "https://github.com/catchorg/Catch2.git",
                "https://github.com/Dav1dde/glad.git",
            ]
        );

        Ok(())
    }

    #[sealed_test]
    fn fetch_twice_clones_nothing_new() -> anyhow::Result<()> {
        let ctx = context(false);
        let access = FakeAccess::default();

        fetch(&catalog::standard(), &ctx, &access)?;
        let again = fetch(&catalog::standard(), &ctx, &access)?;

        assert!(again.is_empty());
        assert_eq!(access.cloned.borrow().len(), 2);

        Ok(())
    }

    #[sealed_test]
    fn fetch_names_failing_product() {
        let ctx = context(false);
        let access = FakeAccess {
            fail: true,
            ..FakeAccess::default()
        };

        let result = fetch(&catalog::standard(), &ctx, &access);
        assert!(matches!(result, Err(FetchError::Clone { product, .. }) if product == "clara"));
    }
}
