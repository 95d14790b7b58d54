//! # Resource Processor
//!
//! The `Engine` holds the collaborators and hands out one `Processor` per
//! call. A processor owns its target object and is consumed by `call`:
//!
//! 1. pre-call cascade over the submitted values (may switch variant and
//!    re-instantiate the object)
//! 2. coercion of every root field; any message fails the whole call
//! 3. the handler
//! 4. for OK responses with fields: post-call cascade over the object,
//!    hint translation, content assembly and the `self` link
//! 5. redirect location, links and attached resources requested by the
//!    handler
//!
//! The caller gets one complete response or one error.

pub mod coerce;
pub mod content;
pub mod recon;

use crate::kind::TypeRegistry;
use crate::link::{Link, LinkBuilder};
use crate::object::{ClassRegistry, ResourceObject};
use crate::ports::{
    DefinitionCache, Deserializer, Journal, NullJournal, PlaceholderTranslator, SharedStore,
    Translator, TypedDeserializer,
};
use crate::primitives::MAX_NESTING_DEPTH;
use crate::response::{Response, Status};
use crate::store::MemoryStore;
use crate::variant::{Variant, VerbSpec};
use crate::{Conditions, Record, TrellisError, Value, Verb, merge_conditions};
use coerce::Coercion;
use content::Assembler;
use recon::{ReconMode, run_cascade};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Per-engine settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Source unit all lookups are made in.
    pub unit: String,
    /// Conditions added to every lookup; they win over call conditions.
    #[serde(default)]
    pub tags: Conditions,
    #[serde(default)]
    pub base_path: String,
    /// Class prefix stripped from link paths.
    #[serde(default)]
    pub namespace: String,
}

impl EngineConfig {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_tag(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.tags.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Builds an `Engine` with reference collaborators as defaults.
pub struct EngineBuilder<D> {
    config: EngineConfig,
    cache: Arc<dyn DefinitionCache>,
    classes: ClassRegistry<D>,
    deps: D,
    store: Arc<dyn SharedStore>,
    translator: Arc<dyn Translator>,
    deserializer: Arc<dyn Deserializer>,
    journal: Arc<dyn Journal>,
    types: TypeRegistry,
}

impl<D: Send + Sync + 'static> EngineBuilder<D> {
    pub fn new(config: EngineConfig, cache: Arc<dyn DefinitionCache>, classes: ClassRegistry<D>, deps: D) -> Self {
        Self {
            config,
            cache,
            classes,
            deps,
            store: Arc::new(MemoryStore::new()),
            translator: Arc::new(PlaceholderTranslator),
            deserializer: Arc::new(TypedDeserializer),
            journal: Arc::new(NullJournal),
            types: TypeRegistry::with_builtins(),
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn SharedStore>) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    #[must_use]
    pub fn deserializer(mut self, deserializer: Arc<dyn Deserializer>) -> Self {
        self.deserializer = deserializer;
        self
    }

    #[must_use]
    pub fn journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = journal;
        self
    }

    #[must_use]
    pub fn types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn build(self) -> Engine<D> {
        let links = LinkBuilder::new(self.config.base_path.clone(), self.config.namespace.clone());
        Engine {
            config: self.config,
            cache: self.cache,
            classes: self.classes,
            deps: self.deps,
            store: self.store,
            translator: self.translator,
            deserializer: self.deserializer,
            journal: self.journal,
            types: self.types,
            links,
        }
    }
}

/// Shared, immutable entry point for resource calls.
pub struct Engine<D> {
    config: EngineConfig,
    cache: Arc<dyn DefinitionCache>,
    classes: ClassRegistry<D>,
    deps: D,
    store: Arc<dyn SharedStore>,
    translator: Arc<dyn Translator>,
    deserializer: Arc<dyn Deserializer>,
    journal: Arc<dyn Journal>,
    types: TypeRegistry,
    links: LinkBuilder,
}

impl<D> std::fmt::Debug for Engine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("classes", &self.classes)
            .finish_non_exhaustive()
    }
}

impl<D: Send + Sync + 'static> Engine<D> {
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn links(&self) -> &LinkBuilder {
        &self.links
    }

    #[must_use]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    fn lookup_key(&self, conditions: &Conditions) -> Conditions {
        merge_conditions(conditions, &self.config.tags)
    }

    fn check_resource_verb(verb: Verb) -> Result<(), TrellisError> {
        if verb.is_resource_verb() {
            Ok(())
        } else {
            Err(TrellisError::MethodNotAllowed(format!("{} not allowed.", verb)))
        }
    }

    /// Processor for the root resource of the unit.
    pub fn create_root_resource(&self, verb: Verb, conditions: Conditions) -> Result<Processor<'_, D>, TrellisError> {
        Self::check_resource_verb(verb)?;
        let variant = self
            .cache
            .resolve_root(&self.config.unit, &self.lookup_key(&conditions))
            .ok_or_else(|| TrellisError::NotFound("Root resource not found.".to_string()))?;
        Processor::new(self, variant, verb, conditions, true, 0)
    }

    /// Processor for the resource `class`.
    pub fn create_resource(
        &self,
        class: &str,
        verb: Verb,
        conditions: Conditions,
    ) -> Result<Processor<'_, D>, TrellisError> {
        Self::check_resource_verb(verb)?;
        let variant = self
            .cache
            .resolve(&self.config.unit, class, &self.lookup_key(&conditions))
            .ok_or_else(|| TrellisError::NotFound(format!("Resource {} not found.", class)))?;
        Processor::new(self, variant, verb, conditions, true, 0)
    }

    /// Processor for a resource embedded in another one.
    ///
    /// Attached resources are called with GET and no conditions and must
    /// answer OK.
    pub fn create_attached_resource(&self, class: &str) -> Result<Processor<'_, D>, TrellisError> {
        self.attached(class, 0)
    }

    fn attached(&self, class: &str, depth: usize) -> Result<Processor<'_, D>, TrellisError> {
        if depth > MAX_NESTING_DEPTH {
            return Err(TrellisError::Internal(format!(
                "Attached resource {} exceeds the maximum nesting depth of {}",
                class, MAX_NESTING_DEPTH
            )));
        }
        let variant = self
            .cache
            .resolve(&self.config.unit, class, &self.config.tags)
            .ok_or_else(|| TrellisError::NotFound(format!("Resource {} not found.", class)))?;
        let processor = Processor::new(self, variant, Verb::Get, Conditions::new(), false, depth)?;
        if processor.response.status() != Status::Ok {
            return Err(TrellisError::Internal(
                "Attached resources must return an OK status code.".to_string(),
            ));
        }
        Ok(processor)
    }

    /// Link to `class` carrying `values`, or the root link for `None`.
    ///
    /// `None` is returned when the class cannot be resolved under the tags.
    #[must_use]
    pub fn create_link(&self, class: Option<&str>, values: &Record) -> Option<Link> {
        let Some(class) = class else {
            return Some(self.links.root());
        };
        self.cache
            .resolve(&self.config.unit, class, &self.config.tags)
            .map(|variant| self.links.build(&variant, values))
    }
}

// =============================================================================
// PROCESSOR
// =============================================================================

/// Input of one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallInput {
    /// Submitted body values.
    pub values: Record,
    /// Query values, the source of meta and state fields.
    pub query: Record,
    /// Values to redisplay instead of the object's, e.g. after a failure.
    pub preserve: Option<Record>,
}

impl CallInput {
    #[must_use]
    pub fn new(values: Record, query: Record) -> Self {
        Self {
            values,
            query,
            preserve: None,
        }
    }

    #[must_use]
    pub fn with_preserve(mut self, preserve: Record) -> Self {
        self.preserve = Some(preserve);
        self
    }

    /// Body values overlaid on query values, as seen by the pre-call cascade.
    fn recon_source(&self) -> Record {
        let mut source = self.query.clone();
        source.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        source
    }
}

/// One resource call in progress.
pub struct Processor<'e, D> {
    engine: &'e Engine<D>,
    main: bool,
    depth: usize,
    verb: Verb,
    conditions: Conditions,
    variant: Arc<Variant>,
    spec: VerbSpec,
    object: Box<dyn ResourceObject<D>>,
    response: Response,
}

impl<D> std::fmt::Debug for Processor<'_, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("class", &self.variant.class())
            .field("verb", &self.verb)
            .field("method", &self.spec.method)
            .field("main", &self.main)
            .finish_non_exhaustive()
    }
}

fn verb_spec(variant: &Variant, verb: Verb) -> Result<(VerbSpec, Status), TrellisError> {
    let spec = variant
        .verb(verb)
        .cloned()
        .ok_or_else(|| TrellisError::MethodNotAllowed(format!("{} not allowed.", verb)))?;
    let status = spec
        .status()
        .ok_or_else(|| TrellisError::UnsupportedVariantStatus {
            class: format!("{}::{}", variant.class(), spec.method),
            status: spec.status,
        })?;
    Ok((spec, status))
}

fn scalar_params(attributes: &Record) -> Record {
    attributes
        .iter()
        .filter(|(_, v)| v.is_scalar())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl<'e, D: Send + Sync + 'static> Processor<'e, D> {
    fn new(
        engine: &'e Engine<D>,
        variant: Arc<Variant>,
        verb: Verb,
        conditions: Conditions,
        main: bool,
        depth: usize,
    ) -> Result<Self, TrellisError> {
        let (spec, status) = verb_spec(&variant, verb)?;
        let object = engine.classes.instantiate(variant.class())?;
        tracing::debug!(class = variant.class(), %verb, method = %spec.method, "resource created");
        Ok(Self {
            engine,
            main,
            depth,
            verb,
            conditions,
            variant,
            spec,
            object,
            response: Response::new(status),
        })
    }

    /// Class identity of the current variant.
    #[must_use]
    pub fn class(&self) -> &str {
        self.variant.class()
    }

    /// Handler method the call will run.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.spec.method
    }

    #[must_use]
    pub fn variant(&self) -> &Arc<Variant> {
        &self.variant
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.response.status()
    }

    /// Run the call.
    pub fn call(mut self, input: CallInput) -> Result<Response, TrellisError> {
        let engine = self.engine;
        self.pre_recon(&input)?;

        let coerced = Coercion::new(
            self.variant.schema(),
            &engine.types,
            engine.deserializer.as_ref(),
            engine.store.as_ref(),
            self.verb,
            self.variant.class(),
        )
        .check_table(self.variant.fields(), &input.values, &input.query)?;
        for (name, value) in coerced {
            self.object.set(&name, value);
        }

        self.object.handle(
            &self.spec.method,
            engine.journal.as_ref(),
            &mut self.response,
            &engine.deps,
        )?;

        if self.spec.fields && self.response.status() == Status::Ok {
            self.render(input.preserve.as_ref())?;
        }
        self.resolve_pending()?;
        Ok(self.response)
    }

    fn pre_recon(&mut self, input: &CallInput) -> Result<(), TrellisError> {
        let engine = self.engine;
        let outcome = run_cascade(
            engine.cache.as_ref(),
            &engine.config.unit,
            &engine.config.tags,
            &self.variant,
            &self.conditions,
            &input.recon_source(),
            ReconMode::PreCall,
        );
        if Arc::ptr_eq(&outcome.variant, &self.variant) {
            return Ok(());
        }

        let (spec, status) = verb_spec(&outcome.variant, self.verb)?;
        if outcome.variant.class() != self.variant.class() {
            tracing::debug!(
                from = self.variant.class(),
                to = outcome.variant.class(),
                "variant class changed before call"
            );
            self.object = engine.classes.instantiate(outcome.variant.class())?;
        }
        if !self.main && status != Status::Ok {
            return Err(TrellisError::Internal(
                "Attached resources must return an OK status code.".to_string(),
            ));
        }
        if status != self.response.status() {
            self.response = Response::new(status);
        }
        self.variant = outcome.variant;
        self.spec = spec;
        Ok(())
    }

    fn post_recon(&mut self, attributes: &Record) {
        let engine = self.engine;
        let outcome = run_cascade(
            engine.cache.as_ref(),
            &engine.config.unit,
            &engine.config.tags,
            &self.variant,
            &self.conditions,
            attributes,
            ReconMode::PostCall,
        );
        if let Some(spec) = outcome.variant.verb(self.verb) {
            self.spec = spec.clone();
        }
        self.variant = outcome.variant;
    }

    fn render(&mut self, preserve: Option<&Record>) -> Result<(), TrellisError> {
        let engine = self.engine;
        let attributes = self.object.attributes();
        self.post_recon(&attributes);

        let params = scalar_params(&attributes);
        let mut hints = self
            .response
            .take_hints()
            .unwrap_or_else(|| self.variant.hints().to_vec());
        if let Some(first) = hints.first_mut() {
            *first = engine.translator.translate(first, &params);
        }

        let content = Assembler::new(
            self.variant.schema(),
            &engine.types,
            engine.translator.as_ref(),
            engine.store.as_ref(),
            &self.response,
            params,
        )
        .assemble(self.variant.table(), &attributes, preserve)?;

        let self_link = (self.main && self.spec.self_link)
            .then(|| engine.links.build(&self.variant, &content.state));

        if let Some(document) = self.response.document_mut() {
            document.hints = hints;
            document.meta = content.meta;
            document.data = content.data;
            document.state = (!content.state.is_empty()).then_some(content.state);
            document.fields = content.fields;
            if let Some(link) = self_link {
                document.links.insert("self".to_string(), link);
            }
        }
        Ok(())
    }

    fn resolve_pending(&mut self) -> Result<(), TrellisError> {
        let engine = self.engine;

        if let Some(target) = self.response.take_pending_location() {
            let link = engine
                .create_link(Some(&target.class), &target.values)
                .ok_or_else(|| TrellisError::Internal(format!("Resource {} not found.", target.class)))?;
            self.response.resolve_location(link.href);
        }

        for (rel, target) in self.response.take_pending_links() {
            match engine.create_link(Some(&target.class), &target.values) {
                Some(link) => {
                    if let Some(document) = self.response.document_mut() {
                        document.links.insert(rel, link);
                    }
                }
                None => tracing::debug!(rel = %rel, class = %target.class, "link target not resolvable, omitted"),
            }
        }

        for (rel, class) in self.response.take_attachments() {
            let attached = engine.attached(&class, self.depth + 1)?;
            let embedded = attached.call(CallInput::default())?.into_document();
            if let (Some(document), Some(embedded)) = (self.response.document_mut(), embedded) {
                document.embedded.insert(rel, embedded);
            }
        }
        Ok(())
    }
}
