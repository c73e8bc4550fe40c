//! Multipart form collection.
//!
//! Deploy and lifecycle endpoints take `multipart/form-data` with a mix of
//! text fields and file parts; some fields (`nginx_config`) may arrive as
//! either. Everything is collected up front so handlers can authenticate
//! against the `site` field before touching anything else.

use std::collections::HashMap;

use axum::extract::Multipart;
use bytes::Bytes;

use crate::error::ApiError;

/// All fields of one multipart request.
#[derive(Default)]
pub struct FormData {
    values: HashMap<String, String>,
    files: HashMap<String, Bytes>,
}

impl FormData {
    /// Drain an axum multipart stream.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = FormData::default();
        loop {
            let field = multipart.next_field().await.map_err(|e| {
                ApiError::with_detail(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_request",
                    format!("failed to parse multipart form: {e}"),
                )
            })?;
            let Some(field) = field else { break };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            if field.file_name().is_some() {
                let data = field.bytes().await.map_err(|e| {
                    ApiError::with_detail(
                        axum::http::StatusCode::BAD_REQUEST,
                        "invalid_request",
                        format!("failed to read field {name}: {e}"),
                    )
                })?;
                form.files.insert(name, data);
            } else {
                let text = field.text().await.map_err(|e| {
                    ApiError::with_detail(
                        axum::http::StatusCode::BAD_REQUEST,
                        "invalid_request",
                        format!("failed to read field {name}: {e}"),
                    )
                })?;
                form.values.insert(name, text);
            }
        }
        Ok(form)
    }

    /// A text field value.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A required text field, or the given error tag as 400.
    pub fn require(&self, name: &str, tag: &'static str) -> Result<&str, ApiError> {
        self.value(name).ok_or_else(|| ApiError::bad_request(tag))
    }

    /// An uploaded file's bytes.
    pub fn file(&self, name: &str) -> Option<&Bytes> {
        self.files.get(name)
    }

    /// A field that may arrive as either a value or a file
    /// (`nginx_config`). Empty strings count as absent.
    pub fn value_or_file(&self, name: &str) -> Option<String> {
        if let Some(value) = self.value(name) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
        self.files
            .get(name)
            .map(|data| String::from_utf8_lossy(data).into_owned())
            .filter(|s| !s.is_empty())
    }

    /// Truthy form flags: "true" or "1".
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.value(name), Some("true") | Some("1"))
    }
}
