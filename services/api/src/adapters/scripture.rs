//! services/api/src/adapters/scripture.rs
//!
//! This module contains the adapter for the external scripture provider
//! (https://scripture.api.bible). It implements the `ScriptureService` port.

use async_trait::async_trait;
use devotion_core::domain::{ScripturePassage, ScriptureQuery};
use devotion_core::ports::{PortError, PortResult, ScriptureService};
use regex::Regex;
use serde::Deserialize;

const API_BASE: &str = "https://api.scripture.api.bible/v1";

/// An adapter that implements `ScriptureService` against the api.bible REST API.
#[derive(Clone)]
pub struct BibleApiAdapter {
    http: reqwest::Client,
    api_key: String,
    bible_id: String,
    blank_lines: Regex,
}

impl BibleApiAdapter {
    /// Creates a new `BibleApiAdapter`.
    pub fn new(http: reqwest::Client, api_key: String, bible_id: String) -> Self {
        Self {
            http,
            api_key,
            bible_id,
            blank_lines: Regex::new(r"\n{2,}").unwrap(),
        }
    }

    /// Collapses runs of blank lines; the provider's plain-text rendering
    /// separates every verse block with several.
    fn clean(&self, raw: &str) -> String {
        self.blank_lines.replace_all(raw.trim(), "\n").to_string()
    }

    async fn get_content(&self, url: &str) -> PortResult<String> {
        let response = self
            .http
            .get(url)
            .header("api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Scripture request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body: ApiErrorBody = response.json().await.unwrap_or_default();
            let detail = body
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("Scripture lookup failed ({status})"));
            return if status == reqwest::StatusCode::NOT_FOUND {
                Err(PortError::NotFound(detail))
            } else {
                Err(PortError::Unexpected(detail))
            };
        }

        let body: ContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Bad scripture response: {e}")))?;

        let data = body
            .data
            .ok_or_else(|| PortError::Unexpected("Scripture response had no data".to_string()))?;
        // Chapter lookups put the text in `content`; passage lookups may nest
        // it under `passages` instead.
        let content = data
            .content
            .or_else(|| data.passages.and_then(|p| p.into_iter().next()?.content))
            .unwrap_or_default();
        Ok(content)
    }
}

//=========================================================================================
// Response Payload Structs
//=========================================================================================

#[derive(Deserialize)]
struct ContentResponse {
    data: Option<ContentData>,
}

#[derive(Deserialize)]
struct ContentData {
    content: Option<String>,
    passages: Option<Vec<PassagePayload>>,
}

#[derive(Deserialize)]
struct PassagePayload {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ApiErrorBody {
    error: Option<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

//=========================================================================================
// `ScriptureService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ScriptureService for BibleApiAdapter {
    /// Looks up a whole chapter (`verse_from == None`) or a verse range and
    /// returns it as a single passage with a rendered reference.
    async fn fetch_passage(&self, query: &ScriptureQuery) -> PortResult<ScripturePassage> {
        let (url, reference) = match query.verse_from {
            None => {
                let chapter_id = format!("{}.{}", query.book_id, query.chapter);
                (
                    format!(
                        "{API_BASE}/bibles/{}/chapters/{chapter_id}\
                         ?content-type=text&include-verse-numbers=false&include-chapter-numbers=false",
                        self.bible_id
                    ),
                    format!("{} {}", query.book_name, query.chapter),
                )
            }
            Some(from) => {
                let passage_id = match query.verse_to {
                    Some(to) if to >= from => format!(
                        "{book}.{ch}.{from}-{book}.{ch}.{to}",
                        book = query.book_id,
                        ch = query.chapter
                    ),
                    _ => format!("{}.{}.{}", query.book_id, query.chapter, from),
                };
                let reference = match query.verse_to {
                    Some(to) if to >= from => {
                        format!("{} {}:{}-{}", query.book_name, query.chapter, from, to)
                    }
                    _ => format!("{} {}:{}", query.book_name, query.chapter, from),
                };
                (
                    format!(
                        "{API_BASE}/bibles/{}/passages/{passage_id}\
                         ?content-type=text&include-verse-numbers=false&include-chapter-numbers=false",
                        self.bible_id
                    ),
                    reference,
                )
            }
        };

        let raw = self.get_content(&url).await?;
        let text = self.clean(&raw);
        Ok(ScripturePassage {
            reference,
            text: if text.is_empty() {
                "(this range has no scripture text)".to_string()
            } else {
                text
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> BibleApiAdapter {
        BibleApiAdapter::new(
            reqwest::Client::new(),
            "test-key".to_string(),
            "test-bible".to_string(),
        )
    }

    #[test]
    fn clean_collapses_blank_line_runs() {
        let cleaned = adapter().clean("  Be still,\n\n\nand know\n\nthat I am God.  ");
        assert_eq!(cleaned, "Be still,\nand know\nthat I am God.");
    }
}
