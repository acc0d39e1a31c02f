// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Buildable products.
//!
//! A __product__ is one component of the project that anthem-build knows how
//! to build: a third-party dependency like Catch2, or a first-party target
//! like Ode. Each product answers three questions about a given
//! [`BuildContext`]: should it be built at all, where does its artifact live,
//! and how is it built.
//!
//! # Build Procedures
//!
//! Products differ mainly in the external tool they drive:
//!
//! - [`CopyHeader`]: copy a single header into the shared include directory.
//! - [`Generator`]: run a code generator with context-derived arguments.
//! - [`CMakeBuild`]: configure and build a CMake project.
//! - [`Placeholder`]: reserved name that is never built.
//!
//! # Registry
//!
//! A [`Registry`] is an ordered list of products. Registration order is the
//! dependency order. Nothing resolves dependencies between products, so a
//! product must be registered after everything it consumes.
//!
//! # See Also
//!
//! 1. [`catalog::standard`] for the products of the Anthem project.

pub mod catalog;
pub mod cmake;
pub mod copy;
pub mod generator;
pub mod placeholder;

pub use cmake::{CMakeBuild, CMakeOptions, CMakeValue};
pub use copy::CopyHeader;
pub use generator::Generator;
pub use placeholder::Placeholder;

use crate::{config::BuildContext, probe::ArtifactPath, shell::Shell};

use std::{fmt::Debug, path::PathBuf};

/// Pure predicate over the build context.
pub type Predicate = fn(&BuildContext) -> bool;

/// Predicate that always holds.
pub fn always(_: &BuildContext) -> bool {
    true
}

/// A buildable component.
pub trait Product: Debug {
    /// Unique name of product.
    fn name(&self) -> &str;

    /// Check if product is wanted by the build context.
    ///
    /// Must not perform I/O.
    fn should_build(&self, ctx: &BuildContext) -> bool;

    /// Expected location of the artifact a successful build leaves behind.
    fn artifact_path(&self, ctx: &BuildContext) -> ArtifactPath;

    /// Build product.
    ///
    /// # Errors
    ///
    /// - Return [`ProductError`] if any step of the build fails.
    fn build(&self, ctx: &BuildContext, shell: &dyn Shell) -> Result<()>;

    /// Directory holding the product's sources.
    fn source_dir(&self, ctx: &BuildContext) -> PathBuf {
        ctx.workspace().source_dir(self.name())
    }

    /// Remote to fetch sources from, if the product is third party.
    fn remote(&self) -> Option<&Source> {
        None
    }
}

/// Git remote of a third-party product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Clone URL.
    pub url: String,

    /// Revision to check out, remote default branch if absent.
    pub revision: Option<Revision>,
}

impl Source {
    /// Construct new source tracking remote default branch.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            revision: None,
        }
    }

    /// Track branch.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.revision = Some(Revision::Branch(branch.into()));
        self
    }

    /// Pin to tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.revision = Some(Revision::Tag(tag.into()));
        self
    }
}

/// Revision of a remote to check out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Branch(String),
    Tag(String),
}

/// Where a product's sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Third-party checkout under the workspace source root.
    Remote(Source),

    /// First-party directory under the project root.
    Project,
}

impl Origin {
    pub(crate) fn source_dir(&self, ctx: &BuildContext, name: &str) -> PathBuf {
        match self {
            Self::Remote(_) => ctx.workspace().source_dir(name),
            Self::Project => ctx.workspace().project_dir(name),
        }
    }

    pub(crate) fn remote(&self) -> Option<&Source> {
        match self {
            Self::Remote(source) => Some(source),
            Self::Project => None,
        }
    }
}

/// Ordered collection of products.
#[derive(Debug, Default)]
pub struct Registry {
    products: Vec<Box<dyn Product>>,
}

impl Registry {
    /// Construct new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_products(products: Vec<Box<dyn Product>>) -> Self {
        Self { products }
    }

    /// Append product to the end of the registry.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Duplicate`] if a product with the same name
    ///   is already registered.
    pub fn register(&mut self, product: impl Product + 'static) -> Result<(), RegistryError> {
        if self.get(product.name()).is_some() {
            return Err(RegistryError::Duplicate {
                name: product.name().to_string(),
            });
        }

        self.products.push(Box::new(product));
        Ok(())
    }

    /// Append product, builder style.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Duplicate`] if a product with the same name
    ///   is already registered.
    pub fn with(mut self, product: impl Product + 'static) -> Result<Self, RegistryError> {
        self.register(product)?;
        Ok(self)
    }

    /// Find product by name.
    pub fn get(&self, name: &str) -> Option<&dyn Product> {
        self.iter().find(|product| product.name() == name)
    }

    /// Iterate products in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Product> + '_ {
        self.products.iter().map(|product| product.as_ref())
    }

    /// Names of products in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.iter().map(Product::name).collect()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Keep only the named products.
    ///
    /// Registration order is preserved no matter what order the names are
    /// given in. An empty selection keeps nothing.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Unknown`] if a name matches no product.
    pub fn select(
        mut self,
        names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self, RegistryError> {
        let names = names
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect::<Vec<_>>();

        if let Some(unknown) = names.iter().find(|name| self.get(name).is_none()) {
            return Err(RegistryError::Unknown {
                name: unknown.clone(),
                known: self.names().join(", "),
            });
        }

        self.products
            .retain(|product| names.iter().any(|name| name == product.name()));
        Ok(self)
    }
}

/// Product build error types.
#[derive(Debug, thiserror::Error)]
pub enum ProductError {
    /// External tool or filesystem operation failed.
    #[error(transparent)]
    Shell(#[from] crate::shell::ShellError),

    /// Required input file is missing.
    #[error("expected input {:?} does not exist", path.display())]
    MissingInput { path: PathBuf },

    /// Include directory marker cannot be written.
    #[error("failed to mark {:?} as populated", path.display())]
    IncludeMarker {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Registry manipulation error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Product name already taken.
    #[error("product {name:?} is already registered")]
    Duplicate { name: String },

    /// No product by that name.
    #[error("unknown product {name:?}, expected one of: {known}")]
    Unknown { name: String, known: String },
}

/// Friendly result alias :3
pub type Result<T, E = ProductError> = std::result::Result<T, E>;
