// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Process and filesystem collaborator.
//!
//! Build procedures never touch the outside world directly. They go through
//! a [`Shell`], which runs external tools and performs the handful of
//! filesystem operations a build needs. Swapping the shell lets callers
//! observe exactly what a procedure would have done.

use std::{
    ffi::OsString,
    fs::{copy, read_dir, remove_dir_all, remove_file},
    io,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Execute external tools and manipulate files.
pub trait Shell {
    /// Run program with arguments in working directory.
    ///
    /// The first element of `argv` is the program. Only the child process
    /// runs in `cwd`; the caller's working directory never changes. Returns
    /// the captured stdout and stderr.
    fn call(&self, argv: &[OsString], cwd: &Path) -> Result<String>;

    /// Copy file, overwriting destination.
    fn copy(&self, src: &Path, dst: &Path) -> Result<()>;

    /// Remove file.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Create directory and all missing parents. Existing directories are
    /// left alone.
    fn makedirs(&self, path: &Path) -> Result<()>;

    /// Remove directory tree. Missing directories are left alone.
    fn rmtree(&self, path: &Path) -> Result<()>;

    /// Copy directory tree, merging into destination.
    fn copytree(&self, src: &Path, dst: &Path) -> Result<()>;
}

/// Shell that runs real processes against the real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShell;

impl SystemShell {
    /// Construct new system shell.
    pub fn new() -> Self {
        Self
    }
}

impl Shell for SystemShell {
    #[instrument(skip(self, argv), fields(command = %display_argv(argv)), level = "debug")]
    fn call(&self, argv: &[OsString], cwd: &Path) -> Result<String> {
        let (program, args) = argv.split_first().ok_or(ShellError::EmptyCommand)?;
        debug!("run in {:?}", cwd.display());
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| ShellError::Spawn {
                source,
                program: program.clone(),
            })?;

        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
        let mut message = String::new();

        if !stdout.is_empty() {
            message.push_str(format!("stdout: {stdout}").as_str());
        }

        if !stderr.is_empty() {
            message.push_str(format!("stderr: {stderr}").as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        let message = message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message);

        if !output.status.success() {
            return Err(ShellError::Status {
                command: display_argv(argv),
                code: output.status.code(),
                output: message,
            });
        }

        Ok(message)
    }

    fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
        debug!("copy {:?} to {:?}", src.display(), dst.display());
        copy(src, dst)
            .map(|_| ())
            .map_err(|source| ShellError::filesystem("copy", dst, source))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        debug!("remove {:?}", path.display());
        remove_file(path).map_err(|source| ShellError::filesystem("remove", path, source))
    }

    fn makedirs(&self, path: &Path) -> Result<()> {
        let created = mkdirp::mkdirp(path)
            .map_err(|source| ShellError::filesystem("create directory", path, source))?;
        if let Some(first) = created {
            debug!("created {:?}", first.display());
        }

        Ok(())
    }

    fn rmtree(&self, path: &Path) -> Result<()> {
        debug!("remove tree {:?}", path.display());
        match remove_dir_all(path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result.map_err(|source| ShellError::filesystem("remove tree", path, source)),
        }
    }

    fn copytree(&self, src: &Path, dst: &Path) -> Result<()> {
        self.makedirs(dst)?;
        let entries =
            read_dir(src).map_err(|source| ShellError::filesystem("read directory", src, source))?;

        for entry in entries {
            let entry =
                entry.map_err(|source| ShellError::filesystem("read directory", src, source))?;
            let from = entry.path();
            let to = dst.join(entry.file_name());
            if from.is_dir() {
                self.copytree(&from, &to)?;
            } else {
                self.copy(&from, &to)?;
            }
        }

        Ok(())
    }
}

/// Render argument vector for diagnostics.
pub fn display_argv(argv: &[OsString]) -> String {
    argv.iter()
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shell error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// No program given.
    #[error("cannot run empty command")]
    EmptyCommand,

    /// Program could not be started.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: io::Error,
        program: OsString,
    },

    /// Program exited unsuccessfully.
    #[error("command `{command}` failed with {}:\n{output}", exit_code(.code))]
    Status {
        command: String,
        code: Option<i32>,
        output: String,
    },

    /// Filesystem operation failed.
    #[error("failed to {op} {:?}", path.display())]
    Filesystem {
        #[source]
        source: io::Error,
        op: &'static str,
        path: PathBuf,
    },
}

impl ShellError {
    fn filesystem(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            source,
            op,
            path: path.to_path_buf(),
        }
    }
}

fn exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code".into(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = ShellError> = std::result::Result<T, E>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// Single operation observed by [`RecordingShell`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Recorded {
        Call { argv: Vec<String>, cwd: PathBuf },
        Copy { src: PathBuf, dst: PathBuf },
        Remove(PathBuf),
        MakeDirs(PathBuf),
        RemoveTree(PathBuf),
        CopyTree { src: PathBuf, dst: PathBuf },
    }

    /// Shell that records operations without performing them.
    ///
    /// Calls whose program matches `failing` exit unsuccessfully.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingShell {
        pub(crate) log: RefCell<Vec<Recorded>>,
        pub(crate) failing: Option<String>,
    }

    impl RecordingShell {
        pub(crate) fn failing(program: impl Into<String>) -> Self {
            Self {
                log: RefCell::default(),
                failing: Some(program.into()),
            }
        }

        pub(crate) fn calls(&self) -> Vec<Vec<String>> {
            self.log
                .borrow()
                .iter()
                .filter_map(|op| match op {
                    Recorded::Call { argv, .. } => Some(argv.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl Shell for RecordingShell {
        fn call(&self, argv: &[OsString], cwd: &Path) -> Result<String> {
            let argv = argv
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            let program = argv.first().cloned().unwrap_or_default();
            self.log.borrow_mut().push(Recorded::Call {
                argv: argv.clone(),
                cwd: cwd.to_path_buf(),
            });

            if self.failing.as_deref() == Some(program.as_str()) {
                return Err(ShellError::Status {
                    command: argv.join(" "),
                    code: Some(1),
                    output: "stderr: boom".into(),
                });
            }

            Ok(String::new())
        }

        fn copy(&self, src: &Path, dst: &Path) -> Result<()> {
            self.log.borrow_mut().push(Recorded::Copy {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            });
            Ok(())
        }

        fn remove(&self, path: &Path) -> Result<()> {
            self.log
                .borrow_mut()
                .push(Recorded::Remove(path.to_path_buf()));
            Ok(())
        }

        fn makedirs(&self, path: &Path) -> Result<()> {
            self.log
                .borrow_mut()
                .push(Recorded::MakeDirs(path.to_path_buf()));
            Ok(())
        }

        fn rmtree(&self, path: &Path) -> Result<()> {
            self.log
                .borrow_mut()
                .push(Recorded::RemoveTree(path.to_path_buf()));
            Ok(())
        }

        fn copytree(&self, src: &Path, dst: &Path) -> Result<()> {
            self.log.borrow_mut().push(Recorded::CopyTree {
                src: src.to_path_buf(),
                dst: dst.to_path_buf(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::{create_dir_all, read_to_string, write};

    #[sealed_test]
    fn makedirs_is_idempotent() -> anyhow::Result<()> {
        let shell = SystemShell::new();
        let path = Path::new("build/ode/nested");

        shell.makedirs(path)?;
        shell.makedirs(path)?;
        assert!(path.is_dir());

        Ok(())
    }

    #[sealed_test]
    fn rmtree_ignores_missing_directory() -> anyhow::Result<()> {
        let shell = SystemShell::new();
        create_dir_all("build/glad/src")?;

        shell.rmtree(Path::new("build/glad"))?;
        assert!(!Path::new("build/glad").exists());
        shell.rmtree(Path::new("build/glad"))?;

        Ok(())
    }

    #[sealed_test]
    fn copytree_merges_nested_files() -> anyhow::Result<()> {
        let shell = SystemShell::new();
        create_dir_all("assets/shaders")?;
        write("assets/icon.png", "png")?;
        write("assets/shaders/basic.vert", "void main() {}")?;
        create_dir_all("out")?;
        write("out/keep.txt", "keep")?;

        shell.copytree(Path::new("assets"), Path::new("out"))?;

        assert_eq!(read_to_string("out/icon.png")?, "png");
        assert_eq!(read_to_string("out/shaders/basic.vert")?, "void main() {}");
        assert_eq!(read_to_string("out/keep.txt")?, "keep");

        Ok(())
    }

    #[test]
    fn call_rejects_empty_command() {
        let result = SystemShell::new().call(&[], Path::new("."));
        assert!(matches!(result, Err(ShellError::EmptyCommand)));
    }

    #[cfg(unix)]
    #[test]
    fn call_reports_failure_with_output() {
        let argv = ["sh", "-c", "echo oops >&2; exit 3"].map(OsString::from);
        let result = SystemShell::new().call(&argv, Path::new("."));

        match result {
            Err(ShellError::Status { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "stderr: oops");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[sealed_test]
    fn call_runs_in_working_directory() -> anyhow::Result<()> {
        create_dir_all("nested")?;
        let argv = ["pwd"].map(OsString::from);
        let output = SystemShell::new().call(&argv, Path::new("nested"))?;

        assert!(output.ends_with("nested"));
        assert!(!std::env::current_dir()?.ends_with("nested"));

        Ok(())
    }
}
