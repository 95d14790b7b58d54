//! # Resource Definitions
//!
//! Loads a TOML definitions file into a `Catalog`, the engine settings and
//! the type registry.
//!
//! ```toml
//! unit = "shop"
//! root = "shop.Home"
//! namespace = "shop"
//!
//! [tags]
//! channel = "web"
//!
//! [[kinds]]
//! name = "city"
//! template = "/cities/{city}"
//!
//! [structures.Address]
//! fields = [
//!     { name = "street", type = "string", flags = ["required"] },
//!     { name = "city", type = "city" },
//! ]
//!
//! [[resources]]
//! name = "shop.Contact"
//!
//! [[resources.variants]]
//! class = "shop.Contact"
//! hints = ["Contact us"]
//! fields = [{ name = "email", type = "email", flags = ["required"] }]
//! verbs.GET = { method = "show" }
//! verbs.POST = { method = "submit", status = 303 }
//! ```
//!
//! Structures may reference each other and themselves. Every check the
//! core runs at definition time runs here, plus unknown flags, verbs,
//! structures and scalar kinds.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use trellis_core::{
    Catalog, CatalogBuilder, Conditions, EngineConfig, FieldDescriptor, FieldFlags, TableId,
    TrellisError, TypeRef, TypeRegistry, UriTemplateKind, Value, VariantDef, Verb, VerbSpec,
};

/// Maximum definitions file size (4 MB).
const MAX_DEFINITIONS_FILE_SIZE: u64 = 4 * 1024 * 1024;

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DefinitionsFile {
    unit: String,
    root: Option<String>,
    #[serde(default)]
    base_path: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    tags: Conditions,
    #[serde(default)]
    kinds: Vec<KindDef>,
    #[serde(default)]
    structures: BTreeMap<String, StructureDef>,
    #[serde(default)]
    resources: Vec<ResourceDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KindDef {
    name: String,
    template: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StructureDef {
    #[serde(default)]
    fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceDef {
    name: String,
    variants: Vec<VariantFileDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantFileDef {
    class: String,
    #[serde(default)]
    hints: Vec<String>,
    #[serde(default)]
    when: Conditions,
    #[serde(default)]
    fields: Vec<FieldDef>,
    #[serde(default)]
    verbs: BTreeMap<String, VerbDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VerbDef {
    method: String,
    status: Option<u16>,
    #[serde(default = "default_true")]
    fields: bool,
    #[serde(default = "default_true")]
    self_link: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    object: Option<String>,
    tuple: Option<String>,
    #[serde(default)]
    flags: Vec<String>,
    default: Option<Value>,
    label: Option<String>,
    icon: Option<String>,
    autocomplete: Option<String>,
    pool: Option<String>,
}

// =============================================================================
// LOADED DEFINITIONS
// =============================================================================

/// Everything an engine needs from a definitions file.
#[derive(Debug)]
pub struct Definitions {
    pub config: EngineConfig,
    pub catalog: Catalog,
    pub types: TypeRegistry,
}

impl Definitions {
    /// Read and load a definitions file.
    pub fn load(path: &Path) -> Result<Self, TrellisError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            TrellisError::Configuration(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_DEFINITIONS_FILE_SIZE {
            return Err(TrellisError::Configuration(format!(
                "Definitions file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_DEFINITIONS_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            TrellisError::Configuration(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        let definitions = Self::parse(&text)?;
        tracing::info!(
            path = %path.display(),
            unit = %definitions.config.unit,
            variants = definitions.catalog.variant_count(),
            "definitions loaded"
        );
        Ok(definitions)
    }

    /// Load definitions from TOML text.
    pub fn parse(text: &str) -> Result<Self, TrellisError> {
        let file: DefinitionsFile =
            toml::from_str(text).map_err(|e| TrellisError::Serialization(e.to_string()))?;
        file.into_definitions()
    }

    /// Class identities declared for the unit, resources and variants.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.catalog.classes(&self.config.unit)
    }
}

impl DefinitionsFile {
    fn into_definitions(self) -> Result<Definitions, TrellisError> {
        if self.unit.trim().is_empty() {
            return Err(TrellisError::InvalidDefinition("unit must not be empty".to_string()));
        }

        let mut types = TypeRegistry::with_builtins();
        for kind in &self.kinds {
            if types.contains(&kind.name) {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Kind '{}' is already defined",
                    kind.name
                )));
            }
            types.register(UriTemplateKind::new(kind.name.clone(), kind.template.clone()));
        }

        let mut builder = CatalogBuilder::new();

        // Reserve first so structures can reference each other.
        let structures: BTreeMap<&str, TableId> = self
            .structures
            .keys()
            .map(|name| (name.as_str(), builder.reserve_table()))
            .collect();
        for (name, structure) in &self.structures {
            let fields = descriptors(&structure.fields, &structures)?;
            let id = structures.get(name.as_str()).copied().ok_or_else(|| {
                TrellisError::InvalidDefinition(format!("Unknown structure '{}'", name))
            })?;
            builder.define_table(id, fields)?;
        }

        for resource in &self.resources {
            if resource.variants.is_empty() {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Resource '{}' has no variants",
                    resource.name
                )));
            }
            for variant in &resource.variants {
                let table = builder.table(descriptors(&variant.fields, &structures)?)?;
                let mut def = VariantDef::new(variant.class.clone(), table);
                def.hints = variant.hints.clone();
                def.when = variant.when.clone();
                for (name, spec) in &variant.verbs {
                    let verb: Verb = name.parse().map_err(|_| {
                        TrellisError::InvalidDefinition(format!(
                            "Unknown verb '{}' in {}",
                            name, variant.class
                        ))
                    })?;
                    def = def.verb(verb, spec.to_spec());
                }
                builder.variant(self.unit.clone(), resource.name.clone(), def);
            }
        }
        if let Some(root) = &self.root {
            builder.root(self.unit.clone(), root.clone());
        }

        let catalog = builder.build()?;
        types.verify_schema(catalog.schema())?;

        let mut config = EngineConfig::new(self.unit)
            .with_base_path(self.base_path)
            .with_namespace(self.namespace);
        config.tags = self.tags;

        Ok(Definitions {
            config,
            catalog,
            types,
        })
    }
}

impl VerbDef {
    fn to_spec(&self) -> VerbSpec {
        let mut spec = VerbSpec::new(self.method.clone());
        if let Some(status) = self.status {
            spec = spec.with_status(status);
        }
        spec.fields = self.fields;
        spec.self_link = self.self_link;
        spec
    }
}

fn descriptors(
    fields: &[FieldDef],
    structures: &BTreeMap<&str, TableId>,
) -> Result<Vec<FieldDescriptor>, TrellisError> {
    fields.iter().map(|f| f.to_descriptor(structures)).collect()
}

impl FieldDef {
    fn to_descriptor(&self, structures: &BTreeMap<&str, TableId>) -> Result<FieldDescriptor, TrellisError> {
        let structure = |name: &str| {
            structures.get(name).copied().ok_or_else(|| {
                TrellisError::InvalidDefinition(format!(
                    "Field '{}' references unknown structure '{}'",
                    self.name, name
                ))
            })
        };
        let type_ref = match (&self.kind, &self.object, &self.tuple) {
            (Some(kind), None, None) => TypeRef::scalar(kind.clone()),
            (None, Some(object), None) => TypeRef::Object(structure(object)?),
            (None, None, Some(tuple)) => TypeRef::Tuple(structure(tuple)?),
            _ => {
                return Err(TrellisError::InvalidDefinition(format!(
                    "Field '{}' needs exactly one of type, object or tuple",
                    self.name
                )));
            }
        };

        let mut descriptor = FieldDescriptor::new(self.name.clone(), type_ref)
            .with_flags(FieldFlags::parse_names(self.flags.as_slice())?);
        descriptor.default = self.default.clone().unwrap_or_default();
        descriptor.label = self.label.clone();
        descriptor.icon = self.icon.clone();
        descriptor.autocomplete = self.autocomplete.clone();
        descriptor.pool = self.pool.clone();
        Ok(descriptor)
    }
}

// =============================================================================
// TESTS
// =============================================================================
