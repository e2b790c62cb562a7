//! Generation pipeline: route table in, Swagger document out.
//!
//! For every route with a path template the handler is located, its body scanned for
//! parameter reads, and each parameter's type resolved. go-kit routes go through two
//! passes (decoder for parameters, endpoint for the operation name) that are merged by
//! route id before assembly.
//!
//! # Example
//!
//! ```no_run
//! use swagger_from_source::generator::Generator;
//! use swagger_from_source::packages::ChainedLocator;
//! use swagger_from_source::route_table::mux::MuxSourceRouteTable;
//! use swagger_from_source::swagger_builder::DocumentConfig;
//! use std::path::PathBuf;
//! use std::rc::Rc;
//!
//! let root = PathBuf::from("./my-service");
//! let packages = Rc::new(ChainedLocator::for_project(&root));
//! let table = MuxSourceRouteTable::new(root, packages.clone());
//! let mut generator = Generator::new(packages);
//! let document = generator.generate(&table, &DocumentConfig::default()).unwrap();
//! println!("{} paths", document.paths.len());
//! ```

use crate::error::{Error, Result};
use crate::locator::{HandlerLocator, SourceLocator};
use crate::packages::PackageLocator;
use crate::params::{scan_endpoint, scan_handler, ParameterKind};
use crate::parser::SourceCache;
use crate::route_table::{HandlerRef, RouteTable, SymbolRef};
use crate::swagger_builder::{merge_holders, DocumentConfig, RouteHolder, SwaggerBuilder, SwaggerDocument};
use crate::type_resolver::{HandlerContext, TypeResolver};
use log::{debug, info, warn};
use std::rc::Rc;

/// Runs one generation over a route table.
///
/// Holds the per-run state: the source cache (each file is read once) and the type
/// resolver's cache of resolved composites.
pub struct Generator {
    locator: Box<dyn HandlerLocator>,
    resolver: TypeResolver,
    cache: SourceCache,
}

impl Generator {
    pub fn new(packages: Rc<dyn PackageLocator>) -> Self {
        Self {
            locator: Box::new(SourceLocator::new(Rc::clone(&packages))),
            resolver: TypeResolver::new(packages),
            cache: SourceCache::new(),
        }
    }

    /// Replaces the default source-searching handler locator.
    pub fn with_locator(mut self, locator: impl HandlerLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Builds one holder per documented route, ordered by registration.
    ///
    /// Routes without a path template are skipped silently; routes whose handler cannot
    /// be located or read are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails only when the route table itself cannot be walked.
    pub fn collect(&mut self, table: &dyn RouteTable) -> Result<Vec<RouteHolder>> {
        let entries = table.walk(&mut self.cache).map_err(|err| match err {
            Error::Enumeration(_) | Error::Manifest { .. } => err,
            other => Error::Enumeration(other.to_string()),
        })?;
        info!("Route table lists {} routes", entries.len());

        let mut holders = Vec::new();
        let mut id = 0;
        for entry in entries {
            let Some(route) = entry.path else {
                debug!("Skipping route without a path template");
                continue;
            };
            let methods = entry.methods.unwrap_or_default();

            match &entry.handler {
                HandlerRef::Func(symbol) => match self.handler_holder(id, &route, &methods, symbol) {
                    Ok(holder) => holders.push(holder),
                    Err(err) => warn!("Skipping route {}: {}", route, err),
                },
                HandlerRef::Kit { decoder, endpoint } => {
                    match self.handler_holder(id, &route, &methods, decoder) {
                        Ok(holder) => {
                            holders.push(holder);
                            holders.push(self.endpoint_holder(id, &route, &methods, endpoint));
                        }
                        Err(err) => warn!("Skipping route {}: {}", route, err),
                    }
                }
            }
            id += 1;
        }

        let holders = merge_holders(holders);
        info!("Collected {} routes", holders.len());
        Ok(holders)
    }

    /// Collects the routes and assembles them into a document.
    ///
    /// # Arguments
    ///
    /// * `table` - Source of the registered routes
    /// * `config` - Document-level settings (title, host, base path, ...)
    ///
    /// # Errors
    ///
    /// Fails only when the route table cannot be walked. Routes whose handlers cannot be
    /// found are left out with a warning.
    pub fn generate(
        &mut self,
        table: &dyn RouteTable,
        config: &DocumentConfig,
    ) -> Result<SwaggerDocument> {
        let holders = self.collect(table)?;

        let mut builder = SwaggerBuilder::new(config.clone());
        for holder in &holders {
            builder.add_route(holder);
        }
        let document = builder.build();

        info!(
            "Swagger document built: {} paths, {} source files read",
            document.paths.len(),
            self.cache.disk_reads()
        );
        Ok(document)
    }

    /// Parameter pass: locates the handler and resolves every parameter it reads.
    fn handler_holder(
        &mut self,
        id: usize,
        route: &str,
        methods: &[String],
        symbol: &SymbolRef,
    ) -> Result<RouteHolder> {
        let location = self.locator.locate(symbol, &mut self.cache)?;
        let file = self.cache.load(&location.full_path)?;
        let scan = scan_handler(&file.lines, location.line_number);

        let context = HandlerContext {
            package_dir: self
                .resolver
                .package_dir_for(location.package_path(), &location.full_path),
            file: Rc::clone(&file),
            start_line: location.line_number,
            end_line: scan.end_line,
        };

        let mut holder = RouteHolder {
            id,
            route: route.to_string(),
            methods: methods.to_vec(),
            name: scan
                .name
                .unwrap_or_else(|| symbol.split().2.to_string()),
            ..RouteHolder::default()
        };

        for declaration in &scan.declarations {
            let inferred = self
                .resolver
                .resolve_declaration(declaration, &context, &mut self.cache);
            match declaration.kind {
                ParameterKind::Path => holder.path.push(inferred),
                ParameterKind::Query => holder.query.push(inferred),
                ParameterKind::Body if holder.body.is_none() => holder.body = Some(inferred),
                ParameterKind::Body => {
                    debug!("{} decodes the body twice, keeping the first", holder.name)
                }
                ParameterKind::FormFile | ParameterKind::FormValue => {
                    holder.form_data.push(inferred)
                }
            }
        }

        debug!(
            "Route {} handled by {}: {} path, {} query, {} form parameters",
            route,
            holder.name,
            holder.path.len(),
            holder.query.len(),
            holder.form_data.len()
        );
        Ok(holder)
    }

    /// Name pass for a go-kit endpoint. Falls back to the endpoint's own name when its
    /// body cannot be read.
    fn endpoint_holder(
        &mut self,
        id: usize,
        route: &str,
        methods: &[String],
        endpoint: &SymbolRef,
    ) -> RouteHolder {
        let fallback = endpoint.split().2.to_string();
        let name = match self.locator.locate(endpoint, &mut self.cache) {
            Ok(location) => match self.cache.load(&location.full_path) {
                Ok(file) => scan_endpoint(&file.lines, location.line_number).unwrap_or(fallback),
                Err(err) => {
                    warn!("Endpoint body unreadable for {}: {}", route, err);
                    fallback
                }
            },
            Err(err) => {
                warn!("Endpoint not located for {}: {}", route, err);
                fallback
            }
        };

        RouteHolder {
            id,
            route: route.to_string(),
            methods: methods.to_vec(),
            name,
            is_endpoint: true,
            ..RouteHolder::default()
        }
    }
}
