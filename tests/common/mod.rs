#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use swagger_guard::{Dispatcher, SwaggerSpec, ValidationConfig, ValidationSettings};

pub fn fixture(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(relative)
}

pub fn load_fixture(relative: &str) -> Arc<SwaggerSpec> {
    let path = fixture(relative);
    let config = ValidationConfig {
        schema_directory: path.parent().expect("fixture has a parent").to_path_buf(),
        schema_file: path
            .file_name()
            .and_then(|name| name.to_str())
            .expect("fixture has a file name")
            .to_string(),
        ..ValidationConfig::default()
    };
    Arc::new(SwaggerSpec::from_config(&config).expect("fixture spec loads"))
}

pub fn dispatcher_for(relative: &str) -> Dispatcher {
    Dispatcher::new(load_fixture(relative), ValidationSettings::default())
}
