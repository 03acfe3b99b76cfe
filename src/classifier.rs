//! Content-type and original-language classification for media files.

use crate::arr::{ArrEntity, ArrRegistry};
use async_trait::async_trait;
use remuxcode_av::language::normalize_language;
use remuxcode_av::ContentType;
use std::path::Path;

const ANIME_PATH_MARKERS: &[&str] = &[
    "/anime/",
    "/アニメ/",
    "/anime]",
    "[anime]",
    "/animeseries/",
    "/anime series/",
    "/animation/japanese/",
    "/japanese animation/",
    "/japanimation/",
];

const LANGUAGE_PATH_HINTS: &[(&[&str], &str)] = &[
    (&["korean", "k-drama", "kdrama"], "kor"),
    (&["chinese", "c-drama", "cdrama", "mandarin"], "chi"),
    (&["spanish", "telenovela"], "spa"),
];

const DEFAULT_LANGUAGE: &str = "eng";

#[async_trait]
pub trait ContentClassifier: Send + Sync {
    async fn classify(&self, path: &Path) -> ContentType;
}

#[async_trait]
pub trait LanguageClassifier: Send + Sync {
    /// ISO 639-2/B code of the file's original language.
    async fn original_language(&self, path: &Path) -> String;
}

/// Classifies by well-known folder names.
#[derive(Debug, Clone, Default)]
pub struct PathContentClassifier {
    extra_markers: Vec<String>,
}

impl PathContentClassifier {
    /// `extra_markers` are additional path fragments (matched
    /// case-insensitively) that mark anime.
    pub fn new(extra_markers: &[String]) -> Self {
        Self {
            extra_markers: extra_markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn detect(&self, path: &Path) -> ContentType {
        let lower = path.to_string_lossy().to_lowercase();
        let builtin = ANIME_PATH_MARKERS.iter().any(|m| lower.contains(m));
        let extra = self.extra_markers.iter().any(|m| lower.contains(m.as_str()));
        if builtin || extra {
            ContentType::Anime
        } else {
            ContentType::LiveAction
        }
    }
}

#[async_trait]
impl ContentClassifier for PathContentClassifier {
    async fn classify(&self, path: &Path) -> ContentType {
        self.detect(path)
    }
}

/// Guesses the original language from folder names, defaulting to English.
#[derive(Debug, Clone, Default)]
pub struct PathLanguageClassifier {
    content: PathContentClassifier,
}

impl PathLanguageClassifier {
    pub fn new(content: PathContentClassifier) -> Self {
        Self { content }
    }

    pub fn detect(&self, path: &Path) -> &'static str {
        if self.content.detect(path).is_anime() {
            return "jpn";
        }

        let lower = path.to_string_lossy().to_lowercase();
        LANGUAGE_PATH_HINTS
            .iter()
            .find(|(hints, _)| hints.iter().any(|h| lower.contains(h)))
            .map(|(_, code)| *code)
            .unwrap_or(DEFAULT_LANGUAGE)
    }
}

#[async_trait]
impl LanguageClassifier for PathLanguageClassifier {
    async fn original_language(&self, path: &Path) -> String {
        self.detect(path).to_string()
    }
}

/// Asks Radarr/Sonarr first and falls back to path heuristics.
#[derive(Clone)]
pub struct ArrClassifier {
    arrs: ArrRegistry,
    content: PathContentClassifier,
    language: PathLanguageClassifier,
}

impl ArrClassifier {
    pub fn new(arrs: ArrRegistry, content: PathContentClassifier) -> Self {
        Self {
            arrs,
            language: PathLanguageClassifier::new(content.clone()),
            content,
        }
    }

    async fn lookup(&self, path: &Path) -> Option<ArrEntity> {
        let arr = self.arrs.for_path(path)?;
        match arr.client.find_entity(path).await {
            Ok(entity) => entity,
            Err(e) => {
                tracing::warn!("Lookup in '{}' failed for {:?}: {:#}", arr.name, path, e);
                None
            }
        }
    }
}

#[async_trait]
impl ContentClassifier for ArrClassifier {
    async fn classify(&self, path: &Path) -> ContentType {
        if self.content.detect(path).is_anime() {
            return ContentType::Anime;
        }
        match self.lookup(path).await {
            Some(entity) if entity.is_anime() => ContentType::Anime,
            _ => ContentType::LiveAction,
        }
    }
}

#[async_trait]
impl LanguageClassifier for ArrClassifier {
    async fn original_language(&self, path: &Path) -> String {
        let from_arr = self
            .lookup(path)
            .await
            .and_then(|e| e.original_language)
            .map(|name| normalize_language(&name))
            .filter(|code| *code != "und");

        match from_arr {
            Some(code) => {
                tracing::debug!("Original language of {:?} from Arr: {}", path, code);
                code.to_string()
            }
            None => self.language.detect(path).to_string(),
        }
    }
}
