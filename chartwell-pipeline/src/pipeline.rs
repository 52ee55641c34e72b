//! DSL text to chart description.

use chartwell_core::{
    keys, ChartError, ChartResponse, ChartResult, ChartwellConfig, ConfigMap,
    DataSourceDescriptor, FieldMap, VariableSet,
};
use chartwell_dsl::parser::field_map;
use chartwell_dsl::{
    parse_with_limit, resolve, validate_response, validate_schema, ParseError, ResolutionError,
    SchemaRegistry, ValidationIssue,
};
use chartwell_sources::{
    CancelSignal, FetchContext, HttpTransport, ShapeTracker, SourceAdapters,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// A compiled chart before any data is fetched.
#[derive(Debug, Clone, Default)]
pub struct CompiledChart {
    pub config: ConfigMap,
    pub field_map: Option<FieldMap>,
    pub dependencies: Vec<String>,
    pub parse_errors: Vec<ParseError>,
    pub resolution_errors: Vec<ResolutionError>,
    pub validation_issues: Vec<ValidationIssue>,
}

impl CompiledChart {
    /// The data source named by the resolved `source` key.
    pub fn descriptor(&self) -> ChartResult<DataSourceDescriptor> {
        let source = self.config.get(keys::SOURCE).ok_or(ChartError::MissingSource)?;
        Ok(DataSourceDescriptor::from_config(source)?)
    }
}

/// Everything handed to a renderer, plus every problem found on the way.
#[derive(Debug, Clone)]
pub struct ChartDescription {
    pub config: ConfigMap,
    pub descriptor: DataSourceDescriptor,
    pub response: ChartResponse,
    pub parse_errors: Vec<ParseError>,
    pub resolution_errors: Vec<ResolutionError>,
    pub validation_issues: Vec<ValidationIssue>,
    pub rendered_at: DateTime<Utc>,
}

impl ChartDescription {
    /// True when no stage reported anything.
    pub fn is_clean(&self) -> bool {
        self.parse_errors.is_empty()
            && self.resolution_errors.is_empty()
            && self.validation_issues.is_empty()
    }
}

/// Compile → resolve → fetch → validate.
///
/// Holds the named-schema registry, the theme variables and the shared
/// adapters. Parse, resolution and validation problems never abort a
/// render; a missing source or a failed fetch does.
pub struct ChartPipeline {
    config: ChartwellConfig,
    registry: RwLock<SchemaRegistry>,
    variables: VariableSet,
    sources: SourceAdapters,
}

impl ChartPipeline {
    pub fn new(config: ChartwellConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let sources = SourceAdapters::new(transport, &config);
        Self {
            config,
            registry: RwLock::new(SchemaRegistry::new()),
            variables: VariableSet::with_defaults(),
            sources,
        }
    }

    /// A pipeline fetching over a real HTTP client.
    pub fn with_reqwest(config: ChartwellConfig) -> Self {
        let sources = SourceAdapters::with_reqwest(&config);
        Self {
            config,
            registry: RwLock::new(SchemaRegistry::new()),
            variables: VariableSet::with_defaults(),
            sources,
        }
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = RwLock::new(registry);
        self
    }

    pub fn with_variables(mut self, variables: VariableSet) -> Self {
        self.variables = variables;
        self
    }

    pub fn config(&self) -> &ChartwellConfig {
        &self.config
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn sources(&self) -> &SourceAdapters {
        &self.sources
    }

    /// Parse and register a named schema. Returns its parse errors.
    pub fn register_dsl(&self, name: &str, dsl: &str) -> Vec<ParseError> {
        let parsed = parse_with_limit(dsl, self.config.token_limit);
        self.registry_mut().register(name, parsed.config);
        parsed.errors
    }

    pub fn register(&self, name: &str, schema: ConfigMap) {
        self.registry_mut().register(name, schema);
    }

    pub fn has_schema(&self, name: &str) -> bool {
        self.registry().has(name)
    }

    /// Parse, resolve and validate `dsl` without fetching.
    pub fn compile(&self, dsl: &str, props: Option<&Value>) -> CompiledChart {
        let parsed = parse_with_limit(dsl, self.config.token_limit);
        if !parsed.errors.is_empty() {
            tracing::debug!(errors = parsed.errors.len(), "DSL parsed with errors");
        }

        let resolved = resolve(&parsed.config, &self.registry(), &self.variables, props);
        let validation_issues = validate_schema(&resolved.config);
        for issue in &validation_issues {
            tracing::warn!(path = %issue.path, message = %issue.message, "Schema validation issue");
        }

        CompiledChart {
            field_map: resolved.config.get(keys::MAP).and_then(field_map),
            config: resolved.config,
            dependencies: resolved.dependencies,
            parse_errors: parsed.errors,
            resolution_errors: resolved.errors,
            validation_issues,
        }
    }

    /// Compile `dsl`, fetch its data and check the response shape.
    pub async fn render(
        &self,
        dsl: &str,
        props: Option<&Value>,
        cancel: &CancelSignal,
    ) -> ChartResult<ChartDescription> {
        let shapes = Arc::new(ShapeTracker::new());
        self.render_scoped(dsl, props, cancel, &shapes).await
    }

    /// [`ChartPipeline::render`] with a caller-owned cache-bust scope, so a
    /// change of source shape between renders busts only this caller's
    /// cached payloads.
    pub async fn render_scoped(
        &self,
        dsl: &str,
        props: Option<&Value>,
        cancel: &CancelSignal,
        shapes: &Arc<ShapeTracker>,
    ) -> ChartResult<ChartDescription> {
        let compiled = self.compile(dsl, props);
        let descriptor = compiled.descriptor()?;

        let mut ctx = FetchContext::new()
            .with_cancel(cancel.clone())
            .with_shapes(Arc::clone(shapes));
        if let Some(props) = props {
            ctx = ctx.with_props(props.clone());
        }
        if let Some(table) = compiled.field_map.clone() {
            ctx = ctx.with_field_map(table);
        }

        let payload = self.sources.fetch_json(&descriptor, &ctx).await?;

        let mut validation_issues = compiled.validation_issues;
        for issue in validate_response(&payload) {
            tracing::warn!(path = %issue.path, message = %issue.message, "Response validation issue");
            validation_issues.push(issue);
        }
        let response = ChartResponse::from_value_lossy(&payload);

        Ok(ChartDescription {
            config: compiled.config,
            descriptor,
            response,
            parse_errors: compiled.parse_errors,
            resolution_errors: compiled.resolution_errors,
            validation_issues,
            rendered_at: Utc::now(),
        })
    }

    /// How often a stream source should be re-fetched. `None` for sources
    /// that are not streams.
    pub fn stream_interval(&self, descriptor: &DataSourceDescriptor) -> Option<Duration> {
        match descriptor {
            DataSourceDescriptor::Stream(source) => Some(Duration::from_millis(
                source
                    .refresh_interval_ms
                    .unwrap_or(self.config.stream.refresh_interval_ms)
                    .max(1),
            )),
            _ => None,
        }
    }

    fn registry(&self) -> RwLockReadGuard<'_, SchemaRegistry> {
        self.registry.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn registry_mut(&self) -> RwLockWriteGuard<'_, SchemaRegistry> {
        self.registry.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ChartPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartPipeline")
            .field("config", &self.config)
            .field("schemas", &self.registry().len())
            .field("variables", &self.variables.len())
            .finish()
    }
}
