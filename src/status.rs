// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Outcome of products in a dispatch pass.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// What happened to a product during a dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallStatus {
    /// Build procedure ran and succeeded.
    Built,

    /// Build procedure was not invoked.
    Skipped(SkipReason),

    /// Build procedure ran and failed.
    Failed,
}

impl InstallStatus {
    pub fn is_built(&self) -> bool {
        matches!(self, Self::Built)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl Display for InstallStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Built => fmt.write_str("built"),
            Self::Skipped(reason) => write!(fmt, "skipped ({reason})"),
            Self::Failed => fmt.write_str("failed"),
        }
    }
}

/// Why a build procedure was not invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Build context does not want the product.
    NotRequested,

    /// Artifact already exists.
    UpToDate,
}

impl Display for SkipReason {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::NotRequested => "not requested",
            Self::UpToDate => "up to date",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn display_install_status() {
        assert_eq!(InstallStatus::Built.to_string(), "built");
        assert_eq!(
            InstallStatus::Skipped(SkipReason::UpToDate).to_string(),
            "skipped (up to date)"
        );
        assert_eq!(
            InstallStatus::Skipped(SkipReason::NotRequested).to_string(),
            "skipped (not requested)"
        );
        assert_eq!(InstallStatus::Failed.to_string(), "failed");
    }
}
