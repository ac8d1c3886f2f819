//! `$ref` resolution over whole spec documents.
//!
//! [`resolve`] produces either a fully inlined copy of a spec or a flattened
//! one where every referenced schema, parameter and response lives in the
//! root's shared maps under a marshaled key. Local structure refs left in a
//! flattened OpenAPI 3 document are followed with [`ResolveReference`].

use crate::error::SpecError;
use crate::spec::document::{DocumentStore, SchemaFormat, SpecDocument};
use crate::spec::reference::{
    escape_pointer_segment, lookup_fragment, marshal_target, RefTarget, ReferenceKind,
};
use crate::spec::walker::{walk, CollectedKind, Context, Dialect, RefHandler};
use indexmap::{IndexMap, IndexSet};
use openapiv3::{Components, OpenAPI, ReferenceOr};
use serde_json::{Map, Value};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Substitute every ref with a copy of its target.
    Inline,
    /// Move referenced objects into the root's shared maps.
    Flatten,
}

/// Resolves every `$ref` reachable from `document`.
///
/// `store` serves the referenced documents and caches them; the root document
/// is registered in it first.
pub fn resolve(
    document: &SpecDocument,
    store: &mut DocumentStore,
    mode: ResolveMode,
) -> Result<Value, SpecError> {
    let dialect = Dialect::detect(document.value())?;
    store.insert(document);
    match mode {
        ResolveMode::Inline => {
            let mut inliner = Inliner {
                store,
                dialect,
                root: document.origin().clone(),
                root_dir: root_directory(document.origin())?,
                stack: Vec::new(),
                collected: Collected::default(),
            };
            let mut output = walk(&mut inliner, document.value(), document.origin(), Context::Root)?;
            for kind in CollectedKind::ALL {
                let entries = inliner.collected.take(kind)?;
                if !entries.is_empty() {
                    insert_collection(&mut output, dialect.collection_path(kind), entries);
                }
            }
            Ok(output)
        }
        ResolveMode::Flatten => flatten(document, store, dialect),
    }
}

/// Directory of the root document; marshaled file paths are relative to it.
pub fn root_directory(origin: &Url) -> Result<Url, SpecError> {
    origin
        .join("./")
        .map_err(|e| SpecError::load(origin, format!("cannot compute base directory: {}", e)))
}

fn load_target(store: &mut DocumentStore, target: &RefTarget) -> Result<Value, SpecError> {
    let document = store.fetch(&target.location).map_err(|e| match e {
        SpecError::SpecLoad { message, .. } => SpecError::invalid_target(target.display(), message),
        other => other,
    })?;
    lookup_fragment(&document, &target.fragment)
        .cloned()
        .ok_or_else(|| SpecError::invalid_target(target.display(), "fragment not found"))
}

struct Inliner<'s> {
    store: &'s mut DocumentStore,
    dialect: Dialect,
    root: Url,
    root_dir: Url,
    stack: Vec<(RefTarget, String)>,
    /// Cyclic targets that cannot be inlined, kept once under a marshaled key.
    collected: Collected,
}

impl RefHandler for Inliner<'_> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn handle_ref(
        &mut self,
        reference: &str,
        _node: &Map<String, Value>,
        origin: &Url,
        context: Context,
    ) -> Result<Value, SpecError> {
        let chain: Vec<String> = self.stack.iter().map(|(_, r)| r.clone()).collect();
        let target = RefTarget::resolve(origin, reference).map_err(|e| e.with_chain(&chain))?;
        if target.location == self.root {
            // Root targets stay in the output, so a local ref keeps cycles finite.
            return Ok(serde_json::json!({ "$ref": target.local_ref() }));
        }

        let key = marshal_target(&target, &self.root_dir).map_err(|e| e.with_chain(&chain))?;
        if let Some(kind) = context.collected_kind() {
            if self.collected.get_mut(kind).contains_key(&key) {
                return Ok(serde_json::json!({ "$ref": local_pointer(self.dialect, kind, &key) }));
            }
        }

        if self.stack.iter().any(|(seen, _)| *seen == target) {
            let mut chain = chain;
            chain.push(reference.to_string());
            let Some(kind) = context.collected_kind() else {
                return Err(SpecError::invalid_target(
                    target.display(),
                    "circular reference outside a schema, parameter or response",
                )
                .with_chain(&chain));
            };
            tracing::debug!(reference, key = %key, "keeping cyclic reference as a shared object");
            self.collected.get_mut(kind).insert(key.clone(), None);
            return Ok(serde_json::json!({ "$ref": local_pointer(self.dialect, kind, &key) }));
        }

        let value = load_target(self.store, &target).map_err(|e| e.with_chain(&chain))?;
        let location = target.location.clone();
        self.stack.push((target, reference.to_string()));
        let result = walk(self, &value, &location, context);
        let chain: Vec<String> = self.stack.iter().map(|(_, r)| r.clone()).collect();
        self.stack.pop();
        let walked = result.map_err(|e| e.with_chain(&chain))?;

        // A target that referred back to itself becomes a shared object.
        for kind in CollectedKind::ALL {
            if let Some(slot) = self.collected.get_mut(kind).get_mut(&key) {
                if slot.is_none() {
                    *slot = Some(walked);
                    return Ok(serde_json::json!({ "$ref": local_pointer(self.dialect, kind, &key) }));
                }
            }
        }
        Ok(walked)
    }
}

fn local_pointer(dialect: Dialect, kind: CollectedKind, key: &str) -> String {
    let mut pointer = String::from("#");
    for segment in dialect.collection_path(kind) {
        pointer.push('/');
        pointer.push_str(segment);
    }
    pointer.push('/');
    pointer.push_str(&escape_pointer_segment(key));
    pointer
}

/// Collected objects; `None` marks an entry whose target is still being walked.
#[derive(Default)]
struct Collected {
    schemas: IndexMap<String, Option<Value>>,
    parameters: IndexMap<String, Option<Value>>,
    responses: IndexMap<String, Option<Value>>,
}

impl Collected {
    fn get_mut(&mut self, kind: CollectedKind) -> &mut IndexMap<String, Option<Value>> {
        match kind {
            CollectedKind::Schema => &mut self.schemas,
            CollectedKind::Parameter => &mut self.parameters,
            CollectedKind::Response => &mut self.responses,
        }
    }

    fn take(&mut self, kind: CollectedKind) -> Result<Map<String, Value>, SpecError> {
        std::mem::take(self.get_mut(kind))
            .into_iter()
            .map(|(key, value)| match value {
                Some(value) => Ok((key, value)),
                None => Err(SpecError::invalid_target(key, "reference was never resolved")),
            })
            .collect()
    }
}

struct Flattener<'s> {
    store: &'s mut DocumentStore,
    dialect: Dialect,
    root_dir: Url,
    collected: Collected,
    chain: Vec<String>,
    inlining: Vec<RefTarget>,
}

impl Flattener<'_> {
    fn descend(
        &mut self,
        reference: &str,
        target: &RefTarget,
        context: Context,
    ) -> Result<Value, SpecError> {
        let value = load_target(self.store, target).map_err(|e| e.with_chain(&self.chain))?;
        self.chain.push(reference.to_string());
        let result = walk(self, &value, &target.location, context);
        let result = result.map_err(|e| e.with_chain(&self.chain));
        self.chain.pop();
        result
    }
}

impl RefHandler for Flattener<'_> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn handle_ref(
        &mut self,
        reference: &str,
        _node: &Map<String, Value>,
        origin: &Url,
        context: Context,
    ) -> Result<Value, SpecError> {
        let target =
            RefTarget::resolve(origin, reference).map_err(|e| e.with_chain(&self.chain))?;

        let Some(kind) = context.collected_kind() else {
            if self.inlining.contains(&target) {
                let mut chain = self.chain.clone();
                chain.push(reference.to_string());
                return Err(SpecError::invalid_target(
                    target.display(),
                    "circular reference outside a schema, parameter or response",
                )
                .with_chain(&chain));
            }
            self.inlining.push(target.clone());
            let result = self.descend(reference, &target, context);
            self.inlining.pop();
            return result;
        };

        let key = marshal_target(&target, &self.root_dir).map_err(|e| e.with_chain(&self.chain))?;
        if !self.collected.get_mut(kind).contains_key(&key) {
            tracing::debug!(reference, key = %key, "collecting referenced object");
            self.collected.get_mut(kind).insert(key.clone(), None);
            let walked = self.descend(reference, &target, context)?;
            self.collected.get_mut(kind).insert(key.clone(), Some(walked));
        }
        Ok(serde_json::json!({ "$ref": local_pointer(self.dialect, kind, &key) }))
    }
}

fn collection_context(kind: CollectedKind) -> Context {
    match kind {
        CollectedKind::Schema => Context::Schema,
        CollectedKind::Parameter => Context::Parameter,
        CollectedKind::Response => Context::Response,
    }
}

fn flatten(
    document: &SpecDocument,
    store: &mut DocumentStore,
    dialect: Dialect,
) -> Result<Value, SpecError> {
    let origin = document.origin();
    let mut flattener = Flattener {
        store,
        dialect,
        root_dir: root_directory(origin)?,
        collected: Collected::default(),
        chain: Vec::new(),
        inlining: Vec::new(),
    };

    // The root's own shared maps are re-registered under marshaled keys.
    let mut stripped = document.value().clone();
    for kind in CollectedKind::ALL {
        let path = dialect.collection_path(kind);
        let Some(entries) = take_collection(&mut stripped, path) else {
            continue;
        };
        let prefix: String = path.iter().map(|s| format!("/{}", s)).collect();
        for name in entries.keys() {
            let reference = format!("#{}/{}", prefix, escape_pointer_segment(name));
            flattener.handle_ref(&reference, &Map::new(), origin, collection_context(kind))?;
        }
    }

    let mut output = walk(&mut flattener, &stripped, origin, Context::Root)?;
    for kind in CollectedKind::ALL {
        let entries = flattener.collected.take(kind)?;
        if !entries.is_empty() {
            insert_collection(&mut output, dialect.collection_path(kind), entries);
        }
    }
    Ok(output)
}

fn take_collection(document: &mut Value, path: &[&str]) -> Option<Map<String, Value>> {
    let (last, parents) = path.split_last()?;
    let mut node = document;
    for segment in parents {
        node = node.get_mut(*segment)?;
    }
    match node.as_object_mut()?.shift_remove(*last)? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn insert_collection(document: &mut Value, path: &[&str], entries: Map<String, Value>) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = document;
    for segment in parents {
        let Some(map) = node.as_object_mut() else {
            return;
        };
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Some(map) = node.as_object_mut() else {
        return;
    };
    match map
        .entry(last.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
    {
        Value::Object(existing) => existing.extend(entries),
        other => *other = Value::Object(entries),
    }
}

/// Lists every file referenced through a file path, relative to the root
/// document's directory. The root file comes first.
pub fn collect_ref_files(
    document: &SpecDocument,
    store: &mut DocumentStore,
) -> Result<Vec<String>, SpecError> {
    store.insert(document);
    let root_dir = root_directory(document.origin())?;
    let mut collector = FileCollector {
        store,
        dialect: Dialect::detect(document.value()).unwrap_or(Dialect::Swagger2),
        visited: IndexSet::new(),
    };
    collector.visited.insert(document.origin().clone());
    walk(&mut collector, document.value(), document.origin(), Context::Root)?;

    Ok(collector
        .visited
        .iter()
        .map(|location| {
            root_dir
                .make_relative(location)
                .unwrap_or_else(|| location.path().to_string())
        })
        .collect())
}

struct FileCollector<'s> {
    store: &'s mut DocumentStore,
    dialect: Dialect,
    visited: IndexSet<Url>,
}

impl RefHandler for FileCollector<'_> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn handle_ref(
        &mut self,
        reference: &str,
        node: &Map<String, Value>,
        origin: &Url,
        _context: Context,
    ) -> Result<Value, SpecError> {
        let kind = ReferenceKind::classify(reference);
        if matches!(kind, ReferenceKind::RelativeFile | ReferenceKind::AbsoluteFile) {
            let target = RefTarget::resolve(origin, reference)?;
            if target.location.scheme() == "file" && self.visited.insert(target.location.clone()) {
                let document = self.store.fetch(&target.location)?;
                walk(self, &document, &target.location, Context::Other)?;
            }
        }
        Ok(Value::Object(node.clone()))
    }
}

/// Rewrites relative file refs in `document` to point at the `format`
/// rendition of the referenced file.
pub fn rewrite_ref_extensions(document: &SpecDocument, format: SchemaFormat) -> Value {
    let mut rewriter = ExtensionRewriter {
        dialect: Dialect::detect(document.value()).unwrap_or(Dialect::Swagger2),
        extension: format.extension(),
    };
    walk(&mut rewriter, document.value(), document.origin(), Context::Root)
        .unwrap_or_else(|_| document.value().clone())
}

struct ExtensionRewriter {
    dialect: Dialect,
    extension: &'static str,
}

impl RefHandler for ExtensionRewriter {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn handle_ref(
        &mut self,
        reference: &str,
        node: &Map<String, Value>,
        _origin: &Url,
        _context: Context,
    ) -> Result<Value, SpecError> {
        let mut node = node.clone();
        if ReferenceKind::classify(reference) == ReferenceKind::RelativeFile {
            let (path, fragment) = match reference.split_once('#') {
                Some((path, fragment)) => (path, Some(fragment)),
                None => (reference, None),
            };
            let rewritten = ["json", "yaml", "yml"]
                .iter()
                .find_map(|ext| path.strip_suffix(&format!(".{}", ext)))
                .map(|stem| format!("{}.{}", stem, self.extension));
            if let Some(path) = rewritten {
                let reference = match fragment {
                    Some(fragment) => format!("{}#{}", path, fragment),
                    None => path,
                };
                node.insert("$ref".to_string(), Value::String(reference));
            }
        }
        Ok(Value::Object(node))
    }
}

/// Follows a local `#/components/...` ref in a flattened OpenAPI 3 document.
pub trait ResolveReference<T> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a T, SpecError>;
}

fn resolve_component<'a, T, F>(
    ref_or: &'a ReferenceOr<T>,
    spec: &'a OpenAPI,
    prefix: &str,
    selector: F,
) -> Result<&'a T, SpecError>
where
    F: Fn(&'a Components) -> &'a IndexMap<String, ReferenceOr<T>>,
{
    let mut current = ref_or;
    // Component entries may themselves be refs to other entries.
    for _ in 0..16 {
        let reference = match current {
            ReferenceOr::Item(item) => return Ok(item),
            ReferenceOr::Reference { reference } => reference,
        };
        let name = reference
            .strip_prefix(prefix)
            .ok_or_else(|| SpecError::invalid_target(reference.clone(), format!("expected prefix {}", prefix)))?;
        let name = name.replace("~1", "/").replace("~0", "~");
        current = spec
            .components
            .as_ref()
            .map(&selector)
            .and_then(|map| map.get(&name))
            .ok_or_else(|| SpecError::invalid_target(reference.clone(), "component not found"))?;
    }
    Err(SpecError::invalid_target(prefix, "too many nested component references"))
}

impl ResolveReference<openapiv3::Parameter> for ReferenceOr<openapiv3::Parameter> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::Parameter, SpecError> {
        resolve_component(self, spec, "#/components/parameters/", |c| &c.parameters)
    }
}

impl ResolveReference<openapiv3::RequestBody> for ReferenceOr<openapiv3::RequestBody> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::RequestBody, SpecError> {
        resolve_component(self, spec, "#/components/requestBodies/", |c| &c.request_bodies)
    }
}

impl ResolveReference<openapiv3::Response> for ReferenceOr<openapiv3::Response> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::Response, SpecError> {
        resolve_component(self, spec, "#/components/responses/", |c| &c.responses)
    }
}

impl ResolveReference<openapiv3::Header> for ReferenceOr<openapiv3::Header> {
    fn resolve<'a>(&'a self, spec: &'a OpenAPI) -> Result<&'a openapiv3::Header, SpecError> {
        resolve_component(self, spec, "#/components/headers/", |c| &c.headers)
    }
}
