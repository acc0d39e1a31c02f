// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build orchestration for the Anthem project.
//!
//! Anthem is a C++ application sitting on top of the Ode engine, which in
//! turn needs a handful of third-party libraries. This crate drives the whole
//! chain through one __dispatch pass__: every registered product is visited
//! in registration order, and built only when the build context wants it and
//! its artifact is missing from disk.
//!
//! # Products
//!
//! A product is anything that can be built, e.g., a CMake project, a header
//! that needs to be copied into the shared include directory, or a source
//! generator. Each one knows where its artifact lives, so a second dispatch
//! pass over an unchanged workspace builds nothing.
//!
//! # See Also
//!
//! - [`product::catalog`] for the products Anthem needs.
//! - [`dispatch::Dispatcher`] for the dispatch pass itself.

pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod path;
pub mod probe;
pub mod product;
pub mod shell;
pub mod status;
