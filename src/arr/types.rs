use serde::{Deserialize, Serialize};

/// Webhook payload from Radarr or Sonarr.
///
/// Radarr sends `movie` and `movieFile`; Sonarr sends `series`, `episodes`
/// and `episodeFile`. Fields that one side never sends stay `None`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrWebhook {
    #[serde(default)]
    pub event_type: String,
    pub movie: Option<WebhookMovie>,
    pub movie_file: Option<WebhookFile>,
    pub series: Option<WebhookSeries>,
    pub episodes: Option<Vec<WebhookEpisode>>,
    pub episode_file: Option<WebhookFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMovie {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    pub folder_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSeries {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEpisode {
    pub id: Option<i64>,
    pub season_number: Option<i32>,
    pub episode_number: Option<i32>,
    pub episode_file: Option<WebhookFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookFile {
    pub id: Option<i64>,
    pub path: Option<String>,
}

/// Which library manager sent a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOrigin {
    Radarr,
    Sonarr,
}

impl ArrWebhook {
    pub fn is_test(&self) -> bool {
        self.event_type.eq_ignore_ascii_case("test")
    }

    pub fn origin(&self) -> Option<WebhookOrigin> {
        if self.movie.is_some() {
            Some(WebhookOrigin::Radarr)
        } else if self.series.is_some() || self.episodes.is_some() {
            Some(WebhookOrigin::Sonarr)
        } else {
            None
        }
    }

    pub fn title(&self) -> &str {
        self.movie
            .as_ref()
            .map(|m| m.title.as_str())
            .or_else(|| self.series.as_ref().map(|s| s.title.as_str()))
            .unwrap_or("unknown")
    }

    /// Every file path the event refers to, untranslated and deduplicated.
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        let mut push = |path: Option<&String>| {
            if let Some(p) = path.filter(|p| !p.is_empty()) {
                if !paths.contains(p) {
                    paths.push(p.clone());
                }
            }
        };

        match self.origin() {
            Some(WebhookOrigin::Radarr) => {
                push(self.movie_file.as_ref().and_then(|f| f.path.as_ref()));
            }
            Some(WebhookOrigin::Sonarr) => {
                for episode in self.episodes.iter().flatten() {
                    push(episode.episode_file.as_ref().and_then(|f| f.path.as_ref()));
                }
                push(self.episode_file.as_ref().and_then(|f| f.path.as_ref()));
            }
            None => {}
        }

        paths
    }
}

/// `originalLanguage` as returned by the v3 API.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Language {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
}

/// Movie resource from Radarr's `/api/v3/movie`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub original_language: Option<Language>,
    pub movie_file: Option<MovieFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFile {
    pub id: i64,
    #[serde(default)]
    pub path: String,
}

/// Series resource from Sonarr's `/api/v3/series`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub series_type: String,
    pub original_language: Option<Language>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeFile {
    pub id: i64,
    #[serde(default)]
    pub path: String,
    pub season_number: Option<i32>,
}

/// Command resource returned by `POST /api/v3/command` and
/// `GET /api/v3/command/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandResource {
    pub id: i64,
    #[serde(default)]
    pub status: String,
}

/// Coarse state of a queued Arr command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Pending,
    Completed,
    Failed,
}

impl CommandState {
    pub fn from_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" => CommandState::Completed,
            "failed" | "aborted" | "cancelled" | "orphaned" => CommandState::Failed,
            _ => CommandState::Pending,
        }
    }
}

/// A movie or series matched to a local file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArrEntity {
    pub id: i64,
    pub title: String,
    pub path: String,
    pub genres: Vec<String>,
    /// Sonarr series type (`standard`, `daily`, `anime`); empty for movies.
    pub series_type: String,
    pub original_language: Option<String>,
}

impl From<Movie> for ArrEntity {
    fn from(m: Movie) -> Self {
        Self {
            id: m.id,
            title: m.title,
            path: m.path,
            genres: m.genres,
            series_type: String::new(),
            original_language: m.original_language.map(|l| l.name).filter(|n| !n.is_empty()),
        }
    }
}

impl From<Series> for ArrEntity {
    fn from(s: Series) -> Self {
        Self {
            id: s.id,
            title: s.title,
            path: s.path,
            genres: s.genres,
            series_type: s.series_type,
            original_language: s.original_language.map(|l| l.name).filter(|n| !n.is_empty()),
        }
    }
}

impl ArrEntity {
    /// Anime by genre, Sonarr series type, or Japanese-language animation.
    pub fn is_anime(&self) -> bool {
        let has_genre = |g: &str| self.genres.iter().any(|x| x.eq_ignore_ascii_case(g));
        if has_genre("anime") || self.series_type.eq_ignore_ascii_case("anime") {
            return true;
        }
        has_genre("animation")
            && self
                .original_language
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains("japanese"))
    }
}
