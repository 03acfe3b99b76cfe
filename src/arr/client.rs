use super::types::{ArrEntity, CommandResource, CommandState, EpisodeFile, Movie, Series};
use crate::config::{ArrConfig, ArrType};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Component, Path};
use std::time::Duration;

/// Request timeout for Arr API calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations the service needs from Radarr or Sonarr.
#[async_trait::async_trait]
pub trait ArrClient: Send + Sync {
    /// Find the movie or series that owns `path`.
    async fn find_entity(&self, path: &Path) -> Result<Option<ArrEntity>>;

    /// Queue a metadata refresh, returning the command id.
    async fn refresh(&self, entity_id: i64) -> Result<i64>;

    async fn command_status(&self, command_id: i64) -> Result<CommandState>;

    /// Id of the tracked file named `file_name` under the entity.
    async fn find_file_id(&self, entity_id: i64, file_name: &str) -> Result<Option<i64>>;

    /// Queue a rename, scoped to one file when its id is known.
    async fn rename(&self, entity_id: i64, file_id: Option<i64>) -> Result<()>;

    /// Paths of the entity's files, optionally limited to one season.
    async fn file_paths(&self, entity_id: i64, season: Option<i32>) -> Result<Vec<String>>;
}

/// Create an appropriate client based on config
pub fn create_client(config: &ArrConfig) -> Box<dyn ArrClient> {
    match config.arr_type {
        ArrType::Radarr => Box::new(RadarrClient::new(config)),
        ArrType::Sonarr => Box::new(SonarrClient::new(config)),
    }
}

struct BaseArrClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl BaseArrClient {
    fn new(config: &ArrConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v3{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Api-Key", &self.api_key)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to GET {}", path))?;

        let response = response
            .error_for_status()
            .with_context(|| format!("GET {} returned an error", path))?;

        response
            .json()
            .await
            .with_context(|| format!("Invalid response from {}", path))
    }

    async fn post_command<T: Serialize>(&self, command: &T, context_msg: &str) -> Result<i64> {
        let context_msg = context_msg.to_string();
        let response = self
            .client
            .post(self.url("/command"))
            .header("X-Api-Key", &self.api_key)
            .json(command)
            .send()
            .await
            .context(context_msg.clone())?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            anyhow::bail!("{}: {}", context_msg, error);
        }

        let resource: CommandResource = response.json().await.context(context_msg)?;
        Ok(resource.id)
    }

    async fn command_status(&self, command_id: i64) -> Result<CommandState> {
        let resource: CommandResource = self.get(&format!("/command/{}", command_id), &[]).await?;
        Ok(CommandState::from_status(&resource.status))
    }
}

fn path_parts(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

fn folder_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

fn same_file_name(path: &str, file_name: &str) -> bool {
    folder_name(path).is_some_and(|n| n == file_name)
}

pub struct RadarrClient(BaseArrClient);

impl RadarrClient {
    pub fn new(config: &ArrConfig) -> Self {
        Self(BaseArrClient::new(config))
    }
}

#[async_trait::async_trait]
impl ArrClient for RadarrClient {
    async fn find_entity(&self, path: &Path) -> Result<Option<ArrEntity>> {
        let movies: Vec<Movie> = self.0.get("/movie", &[]).await?;
        let parts = path_parts(path);

        Ok(movies
            .into_iter()
            .find(|m| folder_name(&m.path).is_some_and(|f| parts.contains(&f)))
            .map(ArrEntity::from))
    }

    async fn refresh(&self, movie_id: i64) -> Result<i64> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshCommand {
            name: &'static str,
            movie_ids: Vec<i64>,
        }

        let command = RefreshCommand {
            name: "RefreshMovie",
            movie_ids: vec![movie_id],
        };

        self.0
            .post_command(&command, "Failed to trigger Radarr refresh")
            .await
    }

    async fn command_status(&self, command_id: i64) -> Result<CommandState> {
        self.0.command_status(command_id).await
    }

    async fn find_file_id(&self, movie_id: i64, file_name: &str) -> Result<Option<i64>> {
        let files: Vec<super::types::MovieFile> = self
            .0
            .get("/moviefile", &[("movieId", movie_id.to_string())])
            .await?;

        Ok(files
            .into_iter()
            .find(|f| same_file_name(&f.path, file_name))
            .map(|f| f.id))
    }

    async fn rename(&self, movie_id: i64, file_id: Option<i64>) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RenameCommand {
            name: &'static str,
            movie_ids: Vec<i64>,
            #[serde(skip_serializing_if = "Option::is_none")]
            movie_file_ids: Option<Vec<i64>>,
        }

        let command = RenameCommand {
            name: "RenameMovie",
            movie_ids: vec![movie_id],
            movie_file_ids: file_id.map(|id| vec![id]),
        };

        self.0
            .post_command(&command, "Failed to trigger Radarr rename")
            .await
            .map(|_| ())
    }

    async fn file_paths(&self, movie_id: i64, _season: Option<i32>) -> Result<Vec<String>> {
        let movie: Movie = self.0.get(&format!("/movie/{}", movie_id), &[]).await?;
        Ok(movie
            .movie_file
            .map(|f| f.path)
            .filter(|p| !p.is_empty())
            .into_iter()
            .collect())
    }
}

pub struct SonarrClient(BaseArrClient);

impl SonarrClient {
    pub fn new(config: &ArrConfig) -> Self {
        Self(BaseArrClient::new(config))
    }

    async fn episode_files(&self, series_id: i64) -> Result<Vec<EpisodeFile>> {
        self.0
            .get("/episodefile", &[("seriesId", series_id.to_string())])
            .await
    }
}

#[async_trait::async_trait]
impl ArrClient for SonarrClient {
    async fn find_entity(&self, path: &Path) -> Result<Option<ArrEntity>> {
        let parts = path_parts(path);
        if !parts.iter().any(|p| p.contains("Season")) {
            return Ok(None);
        }

        let series: Vec<Series> = self.0.get("/series", &[]).await?;
        Ok(series
            .into_iter()
            .find(|s| folder_name(&s.path).is_some_and(|f| parts.contains(&f)))
            .map(ArrEntity::from))
    }

    async fn refresh(&self, series_id: i64) -> Result<i64> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RefreshCommand {
            name: &'static str,
            series_id: i64,
        }

        let command = RefreshCommand {
            name: "RefreshSeries",
            series_id,
        };

        self.0
            .post_command(&command, "Failed to trigger Sonarr refresh")
            .await
    }

    async fn command_status(&self, command_id: i64) -> Result<CommandState> {
        self.0.command_status(command_id).await
    }

    async fn find_file_id(&self, series_id: i64, file_name: &str) -> Result<Option<i64>> {
        Ok(self
            .episode_files(series_id)
            .await?
            .into_iter()
            .find(|f| same_file_name(&f.path, file_name))
            .map(|f| f.id))
    }

    async fn rename(&self, series_id: i64, file_id: Option<i64>) -> Result<()> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct RenameCommand {
            name: &'static str,
            series_id: i64,
            #[serde(skip_serializing_if = "Option::is_none")]
            files: Option<Vec<i64>>,
        }

        let command = RenameCommand {
            name: "RenameFiles",
            series_id,
            files: file_id.map(|id| vec![id]),
        };

        self.0
            .post_command(&command, "Failed to trigger Sonarr rename")
            .await
            .map(|_| ())
    }

    async fn file_paths(&self, series_id: i64, season: Option<i32>) -> Result<Vec<String>> {
        Ok(self
            .episode_files(series_id)
            .await?
            .into_iter()
            .filter(|f| season.is_none() || f.season_number == season)
            .map(|f| f.path)
            .filter(|p| !p.is_empty())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(arr_type: ArrType, url: &str) -> ArrConfig {
        ArrConfig {
            name: arr_type.to_string(),
            arr_type,
            url: url.to_string(),
            api_key: "test-key".to_string(),
            enabled: true,
            auto_rename: true,
        }
    }

    #[tokio::test]
    async fn test_radarr_find_entity_by_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/movie"))
            .and(header("X-Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "title": "Other", "path": "/movies/Other (2001)"},
                {"id": 2, "title": "Inception", "path": "/data/movies/Inception (2010)",
                 "genres": ["Action"], "originalLanguage": {"id": 1, "name": "English"}}
            ])))
            .mount(&server)
            .await;

        let client = RadarrClient::new(&config(ArrType::Radarr, &server.uri()));
        let entity = client
            .find_entity(Path::new("/mnt/media/movies/Inception (2010)/Inception.mkv"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(entity.id, 2);
        assert_eq!(entity.original_language.as_deref(), Some("English"));
    }

    #[tokio::test]
    async fn test_sonarr_requires_season_folder() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 9, "title": "Show", "path": "/tv/Show", "seriesType": "anime"}
            ])))
            .mount(&server)
            .await;

        let client = SonarrClient::new(&config(ArrType::Sonarr, &server.uri()));
        assert!(client
            .find_entity(Path::new("/tv/Show/extras/clip.mkv"))
            .await
            .unwrap()
            .is_none());

        let entity = client
            .find_entity(Path::new("/tv/Show/Season 01/e1.mkv"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entity.id, 9);
        assert!(entity.is_anime());
    }

    #[tokio::test]
    async fn test_radarr_rename_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_json(serde_json::json!({
                "name": "RenameMovie", "movieIds": [2], "movieFileIds": [7]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 55, "status": "queued"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RadarrClient::new(&config(ArrType::Radarr, &server.uri()));
        client.rename(2, Some(7)).await.unwrap();
    }

    #[tokio::test]
    async fn test_sonarr_file_paths_season_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/episodefile"))
            .and(query_param("seriesId", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "path": "/tv/Show/Season 01/e1.mkv", "seasonNumber": 1},
                {"id": 2, "path": "/tv/Show/Season 02/e1.mkv", "seasonNumber": 2}
            ])))
            .mount(&server)
            .await;

        let client = SonarrClient::new(&config(ArrType::Sonarr, &server.uri()));
        assert_eq!(client.file_paths(9, None).await.unwrap().len(), 2);
        assert_eq!(
            client.file_paths(9, Some(2)).await.unwrap(),
            vec!["/tv/Show/Season 02/e1.mkv".to_string()]
        );
    }

    #[tokio::test]
    async fn test_refresh_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = RadarrClient::new(&config(ArrType::Radarr, &server.uri()));
        let err = client.refresh(1).await.unwrap_err();
        assert!(err.to_string().contains("Radarr refresh"));
    }
}
