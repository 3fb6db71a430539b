//! @acp:module "Application Parser"
//! @acp:summary "Runs declaration and resource parsing over every package and composes the result"
//! @acp:domain parser
//! @acp:layer service
//!
//! Packages are processed in parallel. Declaration parsing for a package runs
//! to completion on one worker; a bailout there marks only that package as
//! failed. Resource parsers then run phase by phase, each phase over every
//! healthy package, and publish an immutable [`ResourceIndex`] snapshot that
//! later phases resolve references against. Composition checks run last.

pub mod validate;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::apis::{self, sort_middleware, AuthHandler, Middleware, PackageApis, Rpc, ServiceStruct};
use crate::ast::Package;
use crate::diag::{Diagnostic, ErrorList};
use crate::error::Result;
use crate::loader::PackageLoader;
use crate::resources::{self, Resource, ResourceContext, ResourceIndex, ResourceParser};
use crate::schema::SchemaResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    Parsed,
    /// Analysis bailed out; the reason is among the diagnostics
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct PackageSummary {
    pub import_path: String,
    pub name: String,
    pub status: PackageStatus,
}

/// @acp:summary "The parsed application model"
#[derive(Debug, Clone, Default, Serialize)]
pub struct App {
    pub module_path: String,
    pub packages: Vec<PackageSummary>,
    pub rpcs: Vec<Rpc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_handler: Option<AuthHandler>,
    /// In execution order
    pub middleware: Vec<Middleware>,
    pub service_structs: Vec<ServiceStruct>,
    pub resources: Vec<Resource>,
}

impl App {
    pub fn failed_packages(&self) -> impl Iterator<Item = &PackageSummary> {
        self.packages
            .iter()
            .filter(|p| p.status != PackageStatus::Parsed)
    }
}

/// Model and diagnostics of one run.
#[derive(Debug)]
pub struct ParseResult {
    pub app: App,
    pub diagnostics: Vec<Diagnostic>,
}

/// Callback invoked as each package finishes declaration parsing.
pub type ProgressFn = dyn Fn(&str) + Send + Sync;

/// @acp:summary "Orchestrates one parse run over a loaded application"
pub struct AppParser {
    loader: Arc<dyn PackageLoader>,
    parsers: Vec<Arc<dyn ResourceParser>>,
    cancel: Arc<AtomicBool>,
    progress: Option<Box<ProgressFn>>,
}

impl AppParser {
    pub fn new(loader: Arc<dyn PackageLoader>) -> Self {
        Self {
            loader,
            parsers: resources::all_parsers(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
        }
    }

    /// Replace the resource parser registry.
    pub fn with_parsers(mut self, parsers: Vec<Arc<dyn ResourceParser>>) -> Self {
        self.parsers = parsers;
        self
    }

    /// Share a cancellation flag; setting it stops work on packages not yet started.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn on_package(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// @acp:summary "Parse every package and compose the application model"
    /// @acp:ai-careful "Packages are processed on the rayon pool; the ErrorList is the only shared mutable state"
    ///
    /// Only a resource parser dependency cycle is an `Err`; everything wrong
    /// with the application itself ends up in the diagnostics.
    pub fn parse(&self) -> Result<ParseResult> {
        let phases = resources::phases(&self.parsers)?;
        let errs = Arc::new(ErrorList::new());
        let schema = SchemaResolver::new(Arc::clone(&self.loader), Arc::clone(&errs));
        let packages = self.loader.packages();
        info!(
            module = self.loader.module_path(),
            packages = packages.len(),
            "parsing application"
        );

        let decls: Vec<(PackageSummary, PackageApis)> = packages
            .par_iter()
            .map(|pkg| self.parse_declarations(&errs, &schema, pkg))
            .collect();

        let healthy: Vec<&Arc<Package>> = packages
            .iter()
            .zip(&decls)
            .filter(|(_, (summary, _))| summary.status == PackageStatus::Parsed)
            .map(|(pkg, _)| pkg)
            .collect();

        let mut index = ResourceIndex::new();
        for (i, phase) in phases.iter().enumerate() {
            if self.cancelled() {
                warn!(phase = i, "cancelled before resource phase");
                errs.add_unpositioned("parsing was cancelled before all resources were recognized");
                break;
            }
            let kinds: Vec<&str> = phase.iter().map(|p| p.kind().as_str()).collect();
            debug!(phase = i, kinds = ?kinds, "running resource phase");

            let found: Vec<Resource> = healthy
                .par_iter()
                .flat_map_iter(|pkg| {
                    let cx = ResourceContext {
                        errs: &errs,
                        schema: &schema,
                        loader: self.loader.as_ref(),
                        pkg,
                        index: &index,
                    };
                    resources::run_phase(&cx, phase)
                })
                .collect();
            debug!(phase = i, found = found.len(), "resource phase done");
            index = index.extended(found);
        }

        let mut app = App {
            module_path: self.loader.module_path().to_string(),
            resources: index.into_vec(),
            ..App::default()
        };
        let mut auth_handlers = Vec::new();
        for (summary, apis) in decls {
            app.packages.push(summary);
            app.rpcs.extend(apis.rpcs);
            auth_handlers.extend(apis.auth_handlers);
            app.middleware.extend(apis.middleware);
            app.service_structs.extend(apis.service_structs);
        }
        sort_middleware(&mut app.middleware);
        app.auth_handler = validate::single_auth_handler(&errs, auth_handlers);
        validate::compose(&errs, &app);

        let diagnostics = errs.snapshot();
        info!(
            endpoints = app.rpcs.len(),
            resources = app.resources.len(),
            diagnostics = diagnostics.len(),
            "parse finished"
        );
        Ok(ParseResult { app, diagnostics })
    }

    fn parse_declarations(
        &self,
        errs: &ErrorList,
        schema: &SchemaResolver,
        pkg: &Package,
    ) -> (PackageSummary, PackageApis) {
        let summary = |status| PackageSummary {
            import_path: pkg.import_path.clone(),
            name: pkg.name.clone(),
            status,
        };

        if self.cancelled() {
            errs.add_unpositioned(format!(
                "parsing of package {} was cancelled",
                pkg.import_path
            ));
            return (summary(PackageStatus::Cancelled), PackageApis::default());
        }

        debug!(package = %pkg.import_path, "parsing declarations");
        let result = match apis::parse_package(errs, schema, pkg) {
            Ok(apis) => (summary(PackageStatus::Parsed), apis),
            Err(_) => {
                warn!(package = %pkg.import_path, "package analysis bailed out");
                (summary(PackageStatus::Failed), PackageApis::default())
            }
        };
        if let Some(progress) = &self.progress {
            progress(&pkg.import_path);
        }
        result
    }
}
