// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Product build dispatch.
//!
//! A __dispatch pass__ walks a [`Registry`] once, in registration order, and
//! decides for every product whether its build procedure runs:
//!
//! 1. Products the build context does not want are skipped.
//! 2. Products whose artifact already exists are skipped.
//! 3. Everything else gets its build directory created, then gets built.
//!
//! Because the artifact check happens on every pass, running dispatch again
//! right after a successful pass builds nothing. The filesystem is the only
//! state carried between passes. The include marker is the exception: it only
//! tracks what the current pass populated, so every pass starts by removing
//! it.
//!
//! # Failure Policy
//!
//! By default the first failing product ends the pass, and nothing after it
//! is attempted. [`FailurePolicy::KeepGoing`] instead records the failure,
//! carries on with the remaining products, and reports every failure at the
//! end. A failed artifact probe always ends the pass, because without it
//! there is no way to decide between building and skipping.

use crate::{
    config::BuildContext,
    probe::{ArtifactProbe, FsProbe, ProbeError},
    product::{Product, ProductError, Registry},
    shell::{Shell, ShellError, SystemShell},
    status::{InstallStatus, SkipReason},
};

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{debug, info, instrument, warn};

/// How a dispatch pass reacts to a failing build.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure.
    #[default]
    FailFast,

    /// Attempt every product, then report all failures.
    KeepGoing,
}

/// Outcome of every product in a dispatch pass, in registration order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    entries: Vec<(String, InstallStatus)>,
}

impl DispatchReport {
    fn record(&mut self, name: &str, status: InstallStatus) {
        self.entries.push((name.to_string(), status));
    }

    pub fn entries(&self) -> &[(String, InstallStatus)] {
        &self.entries
    }

    /// Status of product by name.
    pub fn status(&self, name: &str) -> Option<InstallStatus> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, status)| *status)
    }

    /// Names of products whose build procedure succeeded.
    pub fn built(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|(_, status)| status.is_built())
            .map(|(name, _)| name.as_str())
    }

    /// Check that the pass invoked no build procedure at all.
    pub fn is_converged(&self) -> bool {
        self.entries
            .iter()
            .all(|(_, status)| matches!(status, InstallStatus::Skipped(_)))
    }
}

impl Display for DispatchReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let width = self
            .entries
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or_default();

        for (name, status) in &self.entries {
            writeln!(fmt, "{name:<width$}  {status}")?;
        }

        Ok(())
    }
}

/// Run dispatch passes over product registries.
#[derive(Debug)]
pub struct Dispatcher<P = FsProbe, S = SystemShell>
where
    P: ArtifactProbe,
    S: Shell,
{
    probe: P,
    shell: S,
    policy: FailurePolicy,
}

impl Dispatcher {
    /// Construct new dispatcher over the real filesystem and processes.
    pub fn new() -> Self {
        Self::with_parts(FsProbe::new(), SystemShell::new())
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> Dispatcher<P, S>
where
    P: ArtifactProbe,
    S: Shell,
{
    /// Construct new dispatcher from artifact probe and shell.
    pub fn with_parts(probe: P, shell: S) -> Self {
        Self {
            probe,
            shell,
            policy: FailurePolicy::default(),
        }
    }

    /// Set failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    /// Run one dispatch pass.
    ///
    /// Invokes the build procedure of every product that is wanted by the
    /// build context and whose artifact is missing, at most once each.
    ///
    /// # Errors
    ///
    /// - Return [`DispatchError::IncludeMarker`] if the include marker of a
    ///   previous pass cannot be removed.
    /// - Return [`DispatchError::Probe`] if an artifact cannot be checked.
    /// - Return [`DispatchError::Build`] on the first failing product under
    ///   [`FailurePolicy::FailFast`].
    /// - Return [`DispatchError::Incomplete`] after the pass under
    ///   [`FailurePolicy::KeepGoing`] if any product failed.
    #[instrument(skip(self, registry, ctx), level = "debug")]
    pub fn run(&self, registry: &Registry, ctx: &BuildContext) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let mut failures = Vec::new();

        let marker = ctx.workspace().include_marker();
        if ctx.workspace().include_populated() {
            debug!("reset include marker {:?}", marker.display());
            self.shell
                .remove(&marker)
                .map_err(|source| DispatchError::IncludeMarker {
                    source,
                    path: marker.clone(),
                })?;
        }

        for product in registry.iter() {
            let name = product.name();
            if !product.should_build(ctx) {
                info!("skip {name}: not requested");
                report.record(name, InstallStatus::Skipped(SkipReason::NotRequested));
                continue;
            }

            let artifact = product.artifact_path(ctx);
            let present = self
                .probe
                .exists(&artifact)
                .map_err(|source| DispatchError::Probe {
                    product: name.to_string(),
                    source,
                })?;
            if present {
                info!("skip {name}: found {artifact}");
                report.record(name, InstallStatus::Skipped(SkipReason::UpToDate));
                continue;
            }

            info!("build {name}");
            match self.build(product, ctx) {
                Ok(()) => {
                    info!("built {name}");
                    report.record(name, InstallStatus::Built);
                }
                Err(source) => {
                    let failure = DispatchError::Build {
                        product: name.to_string(),
                        source,
                    };

                    if self.policy == FailurePolicy::FailFast {
                        return Err(failure);
                    }

                    warn!("{failure}, moving on");
                    report.record(name, InstallStatus::Failed);
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            return Err(DispatchError::Incomplete { report, failures });
        }

        Ok(report)
    }

    fn build(&self, product: &dyn Product, ctx: &BuildContext) -> Result<(), ProductError> {
        let build_dir = ctx.workspace().build_dir(product.name());
        debug!("ensure build directory {:?}", build_dir.display());
        self.shell.makedirs(&build_dir)?;
        product.build(ctx, &self.shell)
    }
}

/// Dispatch error types.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Include marker of a previous pass could not be removed.
    #[error("cannot reset include marker {:?}", path.display())]
    IncludeMarker {
        #[source]
        source: ShellError,
        path: PathBuf,
    },

    /// Artifact existence could not be determined.
    #[error("cannot check artifact of {product}")]
    Probe {
        #[source]
        source: ProbeError,
        product: String,
    },

    /// Build procedure failed.
    #[error("failed to build {product}")]
    Build {
        #[source]
        source: ProductError,
        product: String,
    },

    /// Pass finished with failed products.
    #[error("failed to build {}", failed_names(.failures))]
    Incomplete {
        report: DispatchReport,
        failures: Vec<DispatchError>,
    },
}

fn failed_names(failures: &[DispatchError]) -> String {
    failures
        .iter()
        .filter_map(|failure| match failure {
            DispatchError::Build { product, .. } | DispatchError::Probe { product, .. } => {
                Some(product.as_str())
            }
            DispatchError::Incomplete { .. } | DispatchError::IncludeMarker { .. } => None,
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Friendly result alias :3
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{BuildDefinition, Compiler, Platform},
        probe::ArtifactPath,
        shell::testing::{Recorded, RecordingShell},
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, collections::HashSet, fs, io, path::PathBuf, rc::Rc};

    type CallLog = Rc<RefCell<Vec<String>>>;

    #[derive(Debug)]
    struct Fake {
        name: &'static str,
        wanted: bool,
        fails: bool,
        calls: CallLog,
    }

    impl Fake {
        fn artifact(name: &str) -> PathBuf {
            PathBuf::from("/artifacts").join(name)
        }
    }

    impl Product for Fake {
        fn name(&self) -> &str {
            self.name
        }

        fn should_build(&self, _: &BuildContext) -> bool {
            self.wanted
        }

        fn artifact_path(&self, _: &BuildContext) -> ArtifactPath {
            ArtifactPath::exact(Self::artifact(self.name))
        }

        fn build(&self, _: &BuildContext, _: &dyn Shell) -> crate::product::Result<()> {
            self.calls.borrow_mut().push(self.name.to_string());
            if self.fails {
                return Err(ProductError::MissingInput {
                    path: PathBuf::from(self.name),
                });
            }

            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FakeProbe {
        present: HashSet<PathBuf>,
        broken: Option<PathBuf>,
    }

    impl ArtifactProbe for FakeProbe {
        fn exists(&self, artifact: &ArtifactPath) -> crate::probe::Result<bool> {
            let ArtifactPath::Exact(path) = artifact else {
                return Ok(false);
            };

            if self.broken.as_ref() == Some(path) {
                return Err(ProbeError::Access {
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                    path: path.clone(),
                });
            }

            Ok(self.present.contains(path))
        }
    }

    struct Fixture {
        registry: Registry,
        calls: CallLog,
    }

    impl Fixture {
        fn new(products: &[(&'static str, bool, bool)]) -> Self {
            let calls = CallLog::default();
            let mut registry = Registry::new();
            for &(name, wanted, fails) in products {
                registry
                    .register(Fake {
                        name,
                        wanted,
                        fails,
                        calls: calls.clone(),
                    })
                    .unwrap();
            }

            Self { registry, calls }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    fn context() -> BuildContext {
        let mut definition = BuildDefinition::default();
        definition.layout.root = "/".into();
        definition.toolchain.compiler = Compiler::Gcc;
        definition.toolchain.jobs = 1;
        definition.build.platform = Some(Platform::Linux);
        BuildContext::try_new(&definition).unwrap()
    }

    fn probe_with(present: &[&str]) -> FakeProbe {
        FakeProbe {
            present: present.iter().map(|name| Fake::artifact(name)).collect(),
            broken: None,
        }
    }

    #[test]
    fn only_wanted_missing_products_are_built() -> anyhow::Result<()> {
        let fixture = Fixture::new(&[("a", false, false), ("b", true, false), ("c", true, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&["b"]), RecordingShell::default());

        let report = dispatcher.run(&fixture.registry, &context())?;

        assert_eq!(fixture.calls(), vec!["c"]);
        assert_eq!(
            report.entries(),
            &[
                ("a".to_string(), InstallStatus::Skipped(SkipReason::NotRequested)),
                ("b".to_string(), InstallStatus::Skipped(SkipReason::UpToDate)),
                ("c".to_string(), InstallStatus::Built),
            ]
        );
        assert_eq!(report.built().collect::<Vec<_>>(), vec!["c"]);
        assert!(!report.is_converged());

        Ok(())
    }

    #[test]
    fn build_dir_created_only_for_built_products() -> anyhow::Result<()> {
        let fixture = Fixture::new(&[("a", false, false), ("b", true, false), ("c", true, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&["b"]), RecordingShell::default());

        dispatcher.run(&fixture.registry, &context())?;

        assert_eq!(
            *dispatcher.shell().log.borrow(),
            vec![Recorded::MakeDirs(PathBuf::from("/build/c"))]
        );

        Ok(())
    }

    #[sealed_test]
    fn pass_starts_by_resetting_include_marker() -> anyhow::Result<()> {
        let mut definition = BuildDefinition::default();
        definition.layout.root = std::env::current_dir()?;
        definition.toolchain.compiler = Compiler::Gcc;
        definition.toolchain.jobs = 1;
        definition.build.platform = Some(Platform::Linux);
        let ctx = BuildContext::try_new(&definition)?;
        let marker = ctx.workspace().include_marker();
        fs::create_dir_all(ctx.workspace().include_dir())?;
        ctx.workspace().mark_include_populated()?;

        let fixture = Fixture::new(&[("a", false, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&[]), RecordingShell::default());
        dispatcher.run(&fixture.registry, &ctx)?;

        assert_eq!(*dispatcher.shell().log.borrow(), vec![Recorded::Remove(marker)]);

        Ok(())
    }

    #[test]
    fn fail_fast_halts_remaining_products() {
        let fixture = Fixture::new(&[("a", true, false), ("b", true, true), ("c", true, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&[]), RecordingShell::default());

        let result = dispatcher.run(&fixture.registry, &context());

        assert!(matches!(result, Err(DispatchError::Build { product, .. }) if product == "b"));
        assert_eq!(fixture.calls(), vec!["a", "b"]);
    }

    #[test]
    fn keep_going_attempts_every_product() {
        let fixture = Fixture::new(&[("a", true, true), ("b", true, false), ("c", true, true)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&[]), RecordingShell::default())
            .with_policy(FailurePolicy::KeepGoing);

        let result = dispatcher.run(&fixture.registry, &context());

        assert_eq!(fixture.calls(), vec!["a", "b", "c"]);
        match result {
            Err(error @ DispatchError::Incomplete { .. }) => {
                assert_eq!(error.to_string(), "failed to build a, c");
                let DispatchError::Incomplete { report, failures } = error else {
                    unreachable!();
                };
                assert_eq!(failures.len(), 2);
                assert!(report.status("a").is_some_and(|status| status.is_failed()));
                assert_eq!(report.status("b"), Some(InstallStatus::Built));
                assert_eq!(report.status("c"), Some(InstallStatus::Failed));
            }
            other => panic!("expected incomplete pass, got {other:?}"),
        }
    }

    #[test]
    fn probe_failure_is_fatal_even_when_keeping_going() {
        let fixture = Fixture::new(&[("a", true, false), ("b", true, false)]);
        let probe = FakeProbe {
            present: HashSet::new(),
            broken: Some(Fake::artifact("a")),
        };
        let dispatcher = Dispatcher::with_parts(probe, RecordingShell::default())
            .with_policy(FailurePolicy::KeepGoing);

        let result = dispatcher.run(&fixture.registry, &context());

        assert!(matches!(result, Err(DispatchError::Probe { product, .. }) if product == "a"));
        assert!(fixture.calls().is_empty());
    }

    #[test]
    fn build_dir_failure_counts_as_build_failure() {
        #[derive(Debug, Default)]
        struct ReadOnlyShell(RecordingShell);

        impl Shell for ReadOnlyShell {
            fn call(
                &self,
                argv: &[std::ffi::OsString],
                cwd: &std::path::Path,
            ) -> crate::shell::Result<String> {
                self.0.call(argv, cwd)
            }

            fn copy(&self, src: &std::path::Path, dst: &std::path::Path) -> crate::shell::Result<()> {
                self.0.copy(src, dst)
            }

            fn remove(&self, path: &std::path::Path) -> crate::shell::Result<()> {
                self.0.remove(path)
            }

            fn makedirs(&self, path: &std::path::Path) -> crate::shell::Result<()> {
                Err(crate::shell::ShellError::Filesystem {
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                    op: "create directory",
                    path: path.to_path_buf(),
                })
            }

            fn rmtree(&self, path: &std::path::Path) -> crate::shell::Result<()> {
                self.0.rmtree(path)
            }

            fn copytree(
                &self,
                src: &std::path::Path,
                dst: &std::path::Path,
            ) -> crate::shell::Result<()> {
                self.0.copytree(src, dst)
            }
        }

        let fixture = Fixture::new(&[("a", true, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&[]), ReadOnlyShell::default());

        let result = dispatcher.run(&fixture.registry, &context());

        assert!(matches!(
            result,
            Err(DispatchError::Build {
                source: ProductError::Shell(_),
                ..
            })
        ));
        assert!(fixture.calls().is_empty());
    }

    #[test]
    fn report_lists_products_in_columns() -> anyhow::Result<()> {
        let fixture = Fixture::new(&[("llvm", false, false), ("ode", true, false)]);
        let dispatcher = Dispatcher::with_parts(probe_with(&[]), RecordingShell::default());

        let report = dispatcher.run(&fixture.registry, &context())?;

        assert_eq!(
            report.to_string(),
            "llvm  skipped (not requested)\node   built\n"
        );

        Ok(())
    }
}
