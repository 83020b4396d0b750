//! # Kubernetes Secret Rendering
//!
//! Builds `v1/Secret` objects from compiled secrets. Text values go to
//! `stringData`, raw bytes to `data`, and deferred (generated) fields are
//! left out since they only exist inside vault.

use super::CompiledSecret;
use crate::resolver::SecretValue;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

/// Render `compiled` into `namespace`
#[must_use]
pub fn render_secret(compiled: &CompiledSecret, namespace: &str) -> Secret {
    let mut string_data = BTreeMap::new();
    let mut data = BTreeMap::new();

    for (name, value) in &compiled.fields {
        match value {
            Some(SecretValue::Text(text)) => {
                string_data.insert(name.clone(), text.clone());
            }
            Some(SecretValue::Binary(bytes)) => {
                data.insert(name.clone(), ByteString(bytes.clone()));
            }
            None => {}
        }
    }

    Secret {
        metadata: ObjectMeta {
            name: Some(compiled.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(compiled.labels.clone()),
            annotations: Some(compiled.annotations.clone()),
            ..ObjectMeta::default()
        },
        type_: Some(compiled.secret_type.clone()),
        string_data: Some(string_data),
        data: (!data.is_empty()).then_some(data),
        ..Secret::default()
    }
}
