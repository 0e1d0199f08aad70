//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use gateway_configgen::service::ServiceConfig;
use gateway_configgen::ServiceInfo;
use serde_json::{json, Value};

pub const BOOKSTORE_API: &str = "endpoints.examples.bookstore.Bookstore";

/// A gRPC bookstore with one authenticated method, telemetry, a descriptor
/// and one backend-authenticated method.
pub fn bookstore_json() -> Value {
    json!({
        "name": "bookstore.endpoints.project123.cloud.goog",
        "id": "2019-03-02r0",
        "producer_project_id": "project123",
        "apis": [{
            "name": BOOKSTORE_API,
            "methods": [{"name": "ListShelves"}, {"name": "CreateShelf"}, {"name": "GetShelf"}]
        }],
        "http": {"rules": [
            {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves", "get": "/v1/shelves"},
            {"selector": "endpoints.examples.bookstore.Bookstore.CreateShelf", "post": "/v1/shelves", "body": "shelf"},
            {"selector": "endpoints.examples.bookstore.Bookstore.GetShelf", "get": "/v1/shelves/{shelf_id}"}
        ]},
        "authentication": {
            "providers": [{
                "id": "firebase",
                "issuer": "https://securetoken.google.com/project123",
                "jwks_uri": "https://www.googleapis.com/service_accounts/v1/metadata/x509/securetoken@system.gserviceaccount.com",
                "audiences": "project123"
            }],
            "rules": [{
                "selector": "endpoints.examples.bookstore.Bookstore.CreateShelf",
                "requirements": [{"provider_id": "firebase"}]
            }]
        },
        "usage": {"rules": [
            {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves", "allow_unregistered_calls": true}
        ]},
        "control": {"environment": "servicecontrol.googleapis.com"},
        "backend": {"rules": [
            {"selector": "endpoints.examples.bookstore.Bookstore.GetShelf",
             "address": "https://shelves.run.app/shelves", "path_translation": "CONSTANT_ADDRESS",
             "jwt_audience": "https://shelves.run.app"},
            {"selector": "endpoints.examples.bookstore.Bookstore.ListShelves",
             "address": "https://shelves.run.app", "path_translation": "APPEND_PATH_TO_ADDRESS",
             "jwt_audience": "https://shelves.run.app"}
        ]},
        "source_info": {"source_files": [
            {"file_path": "api_descriptor.pb", "file_contents": "cmF3RGVzY3JpcHRvcg==",
             "file_type": "FILE_DESCRIPTOR_SET_PROTO"}
        ]}
    })
}

pub fn service_info(value: Value) -> ServiceInfo {
    let config: ServiceConfig = serde_json::from_value(value).unwrap();
    ServiceInfo::from_service_config(config).unwrap()
}

pub fn bookstore() -> ServiceInfo {
    service_info(bookstore_json())
}

/// Write `contents` to `name` inside `dir` and return the full path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}
