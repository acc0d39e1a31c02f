// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Products of the Anthem project.
//!
//! The order below is the build order. Third-party dependencies come first,
//! then the Ode engine, then the Anthem application that links against it.

use crate::{
    config::{BuildContext, StdLib},
    product::{
        CMakeBuild, CMakeOptions, CopyHeader, Generator, Origin, Placeholder, Product, Registry,
        Source,
    },
};

use std::{ffi::OsString, path::Path};

/// Names of standard products in build order.
pub const NAMES: [&str; 7] = ["llvm", "benchmark", "catch2", "clara", "glad", "ode", "anthem"];

/// Registry of every standard product.
pub fn standard() -> Registry {
    let products: Vec<Box<dyn Product>> = vec![
        Box::new(llvm()),
        Box::new(benchmark()),
        Box::new(catch2()),
        Box::new(clara()),
        Box::new(glad()),
        Box::new(ode()),
        Box::new(anthem()),
    ];

    Registry::from_products(products)
}

/// LLVM is consumed from a system install.
pub fn llvm() -> Placeholder {
    Placeholder::new("llvm")
}

pub fn benchmark() -> CMakeBuild {
    let source = Source::new("https://github.com/google/benchmark.git").with_tag("v1.8.3");
    CMakeBuild::new("benchmark", Origin::Remote(source))
        .when(BuildContext::build_benchmarks)
        .options(|ctx| {
            CMakeOptions::from([
                ("BENCHMARK_ENABLE_TESTING".into(), false.into()),
                ("BENCHMARK_ENABLE_GTEST_TESTS".into(), false.into()),
                ("BENCHMARK_ENABLE_INSTALL".into(), true.into()),
                (
                    "BENCHMARK_USE_LIBCXX".into(),
                    (ctx.stdlib() == StdLib::LibCxx).into(),
                ),
            ])
        })
        .artifact(|ctx| format!("**/{}", ctx.platform().static_lib("benchmark")))
        .install()
}

pub fn catch2() -> CopyHeader {
    let source = Source::new("https://github.com/catchorg/Catch2.git").with_branch("v2.x");
    CopyHeader::new(
        "catch2",
        source,
        "single_include/catch2/catch.hpp",
        "catch2/catch.hpp",
    )
    .when(BuildContext::build_test)
}

pub fn clara() -> CopyHeader {
    let source = Source::new("https://github.com/catchorg/Clara.git");
    CopyHeader::new("clara", source, "single_include/clara.hpp", "clara.hpp")
}

pub fn glad() -> Generator {
    let source = Source::new("https://github.com/Dav1dde/glad.git").with_tag("v0.1.36");
    Generator::new("glad", source, glad_args, "src/glad.c")
}

fn glad_args(ctx: &BuildContext, out: &Path) -> Vec<OsString> {
    vec![
        ctx.python().into(),
        "-m".into(),
        "glad".into(),
        "--profile=core".into(),
        format!("--api=gl={}", ctx.gl_version()).into(),
        "--generator=c".into(),
        "--spec=gl".into(),
        format!("--out-path={}", out.display()).into(),
    ]
}

pub fn ode() -> CMakeBuild {
    CMakeBuild::new("ode", Origin::Project)
        .options(|ctx| CMakeOptions::from([("ENABLE_TESTS".into(), ctx.build_test().into())]))
        .artifact(|ctx| format!("**/{}", ctx.platform().static_lib("ode")))
}

pub fn anthem() -> CMakeBuild {
    CMakeBuild::new("anthem", Origin::Project)
        .options(|ctx| {
            let workspace = ctx.workspace();
            CMakeOptions::from([
                ("ENABLE_TESTS".into(), ctx.build_test().into()),
                (
                    "ODE_BUILD_DIR".into(),
                    workspace.build_dir("ode").to_string_lossy().into_owned().into(),
                ),
                (
                    "GLAD_DIR".into(),
                    workspace.build_dir("glad").to_string_lossy().into_owned().into(),
                ),
            ])
        })
        .artifact(|ctx| format!("**/{}", ctx.platform().executable("anthem")))
        .assets("assets")
}
