mod common;

use common::{fixture, load_fixture};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use swagger_guard::spec::RefTarget;
use swagger_guard::{
    load_spec_document, marshal_target, resolve, DocumentStore, FileLoader, HttpMethod,
    MatchResult, MemoryLoader, ResolveMode, SchemaFormat, SpecDocument, SpecError, SwaggerSpec,
};
use url::Url;

fn fixture_dir(relative: &str) -> Url {
    Url::from_directory_path(fixture(relative)).unwrap()
}

fn definition_key(root_dir: &Url, reference: &str) -> String {
    let target = RefTarget::resolve(&root_dir.join("swagger.yaml").unwrap(), reference).unwrap();
    marshal_target(&target, root_dir).unwrap()
}

#[test]
fn test_multi_file_spec_is_flattened_into_one_document() {
    let spec = load_fixture("multi_file/swagger.yaml");
    let root_dir = fixture_dir("multi_file");
    let flattened = spec.flattened();

    let pet_key = definition_key(&root_dir, "definitions/pet.json#/Pet");
    let owner_key = definition_key(&root_dir, "owner.yaml#/Owner");
    let definitions = flattened["definitions"].as_object().unwrap();
    assert_eq!(definitions.len(), 2);
    assert_eq!(
        definitions[&pet_key]["properties"]["owner"]["$ref"],
        format!("#/definitions/{}", owner_key)
    );
    assert_eq!(
        definitions[&owner_key]["properties"]["pets"]["items"]["$ref"],
        format!("#/definitions/{}", pet_key)
    );

    let parameter_key = definition_key(&root_dir, "parameters.yaml#/petId");
    assert_eq!(flattened["parameters"][&parameter_key]["name"], "petId");
    let response_key = definition_key(&root_dir, "responses.yaml#/NotFound");
    assert_eq!(flattened["responses"][&response_key]["description"], "not found");

    assert_eq!(spec.index().len(), 3);
}

#[test]
fn test_multi_file_ref_files_are_relative_to_root() {
    let spec = load_fixture("multi_file/swagger.yaml");
    let files = spec.ref_files().unwrap();
    assert_eq!(files[0], "swagger.yaml");

    let mut rest: Vec<&str> = files[1..].iter().map(String::as_str).collect();
    rest.sort_unstable();
    assert_eq!(
        rest,
        vec!["definitions/pet.json", "owner.yaml", "parameters.yaml", "responses.yaml"]
    );
}

#[test]
fn test_cross_document_cycle_is_served_self_contained() {
    let spec = load_fixture("multi_file/swagger.yaml");
    let root_dir = fixture_dir("multi_file");
    let pet_key = definition_key(&root_dir, "definitions/pet.json#/Pet");

    let served: Value = serde_json::from_str(spec.rendered(SchemaFormat::Json).unwrap()).unwrap();
    assert_eq!(&served, spec.flattened());
    assert!(spec.rendered(SchemaFormat::Yaml).unwrap().contains(&pet_key));

    let dereferenced = spec.dereferenced().unwrap();
    let pet_ref = format!("#/definitions/{}", pet_key);
    assert_eq!(
        dereferenced["paths"]["/pets/{petId}"]["get"]["responses"]["200"]["schema"]["$ref"],
        pet_ref
    );
    assert_eq!(
        dereferenced["definitions"][&pet_key]["properties"]["owner"]["properties"]["pets"]["items"]["$ref"],
        pet_ref
    );
}

#[test]
fn test_recursive_definitions_survive_both_modes() {
    let spec = load_fixture("recursive/swagger.json");
    let definitions = spec.flattened()["definitions"].as_object().unwrap();
    assert_eq!(definitions.len(), 1);
    let (key, node) = definitions.iter().next().unwrap();
    assert_eq!(node["properties"]["children"]["items"]["$ref"], format!("#/definitions/{}", key));

    let dereferenced = spec.dereferenced().unwrap();
    assert_eq!(
        dereferenced["definitions"]["Node"]["properties"]["children"]["items"]["$ref"],
        "#/definitions/Node"
    );
    assert_eq!(
        dereferenced["paths"]["/trees/{treeId}"]["get"]["responses"]["200"]["schema"]["$ref"],
        "#/definitions/Node"
    );
}

#[test]
fn test_remote_refs_through_memory_loader() {
    let common = Url::parse("https://schemas.example.com/common.json").unwrap();
    let loader = MemoryLoader::new().with_document(
        &common,
        json!({"Error": {"type": "object", "required": ["code"],
                          "properties": {"code": {"type": "integer"}}}}),
    );
    let root = SpecDocument::new(
        json!({
            "swagger": "2.0",
            "info": {"title": "remote", "version": "1"},
            "paths": {"/ping": {"get": {"responses": {
                "500": {"description": "boom", "schema": {
                    "$ref": "https://schemas.example.com/common.json#/Error"
                }}
            }}}}
        }),
        Url::parse("file:///srv/api/swagger.json").unwrap(),
    );
    let spec = SwaggerSpec::from_document(root, Arc::new(loader), true).unwrap();

    let root_dir = Url::parse("file:///srv/api/").unwrap();
    let target = RefTarget::resolve(&root_dir, "https://schemas.example.com/common.json#/Error").unwrap();
    let key = marshal_target(&target, &root_dir).unwrap();
    assert!(key.starts_with("https"));
    assert_eq!(spec.flattened()["definitions"][&key]["required"], json!(["code"]));
    assert_eq!(
        spec.dereferenced().unwrap()["paths"]["/ping"]["get"]["responses"]["500"]["schema"]["type"],
        "object"
    );
}

#[test]
fn test_missing_ref_target_fails_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swagger.json");
    std::fs::write(
        &path,
        serde_json::to_string(&json!({
            "swagger": "2.0",
            "info": {"title": "broken", "version": "1"},
            "paths": {"/a": {"get": {"responses": {"200": {
                "description": "ok", "schema": {"$ref": "missing.json#/Thing"}
            }}}}}
        }))
        .unwrap(),
    )
    .unwrap();

    let root = load_spec_document(&path).unwrap();
    let err = SwaggerSpec::from_document(root, Arc::new(FileLoader), true).unwrap_err();
    match err {
        SpecError::InvalidReferenceTarget { target, .. } => assert!(target.contains("missing.json")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_resolve_matches_ingested_flattened_form() {
    let document = load_spec_document(&fixture("recursive/swagger.json")).unwrap();
    let mut store = DocumentStore::new(Arc::new(FileLoader));
    let flattened: Value = resolve(&document, &mut store, ResolveMode::Flatten).unwrap();
    assert_eq!(&flattened, load_fixture("recursive/swagger.json").flattened());
}

#[test]
fn test_openapi3_fixture_is_indexed() {
    let spec = load_fixture("openapi3.yaml");
    assert_eq!(spec.index().len(), 2);
    match spec.index().find_operation("/orders/12", HttpMethod::PUT) {
        MatchResult::Matched(operation) => {
            assert_eq!(operation.operation_id.as_deref(), Some("updateOrder"));
            assert!(operation.body.is_required());
        }
        MatchResult::Unmatched => panic!("PUT /orders/12 should match"),
    }
}
