use async_trait::async_trait;
use reqwest::header::{ACCEPT, COOKIE};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use shared_types::{Category, Note, NoteId, NoteInput, NotePatch};

use super::{FetchError, NoteStore, CREATE_NOTE, FETCH_CATEGORIES, FETCH_NOTES, UPDATE_NOTE};
use crate::config::Config;

/// `NoteStore` backed by the notes REST API
#[derive(Debug, Clone)]
pub struct HttpNoteStore {
    client: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
    csrf_token: Option<String>,
}

impl HttpNoteStore {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                action: "build http client",
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            session_id: config.session_id.clone(),
            csrf_token: config.csrf_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mutating = method != Method::GET;
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACCEPT, "application/json");

        let mut cookies = Vec::new();
        if let Some(session_id) = &self.session_id {
            cookies.push(format!("sessionid={session_id}"));
        }
        if let Some(token) = &self.csrf_token {
            cookies.push(format!("csrftoken={token}"));
            if mutating {
                req = req.header("X-CSRFToken", token);
            }
        }
        if !cookies.is_empty() {
            req = req.header(COOKIE, cookies.join("; "));
        }
        req
    }

    async fn send_json<T: DeserializeOwned>(
        req: RequestBuilder,
        action: &'static str,
    ) -> Result<T, FetchError> {
        let response = req.send().await.map_err(|e| FetchError::Transport {
            action,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(action, status = status.as_u16(), "notes API returned error status");
            return Err(FetchError::Status {
                action,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|e| FetchError::Decode {
            action,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl NoteStore for HttpNoteStore {
    async fn list_notes(&self) -> Result<Vec<Note>, FetchError> {
        Self::send_json(self.request(Method::GET, "/api/notes/"), FETCH_NOTES).await
    }

    async fn list_categories(&self) -> Result<Vec<Category>, FetchError> {
        Self::send_json(self.request(Method::GET, "/api/categories/"), FETCH_CATEGORIES).await
    }

    async fn create_note(&self, input: &NoteInput) -> Result<Note, FetchError> {
        let req = self.request(Method::POST, "/api/notes/").json(input);
        Self::send_json(req, CREATE_NOTE).await
    }

    async fn update_note(&self, id: NoteId, patch: &NotePatch) -> Result<Note, FetchError> {
        let req = self
            .request(Method::PATCH, &format!("/api/notes/{id}/"))
            .json(patch);
        Self::send_json(req, UPDATE_NOTE).await
    }
}
