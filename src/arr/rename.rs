use super::{ArrClient, ArrRegistry, CommandState};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

/// How a rename handshake ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// No Arr instance handles this kind of path, or renaming is disabled.
    Skipped,
    /// The Arr does not track this file's folder.
    EntityNotFound,
    /// The Arr reported the refresh as failed; no rename was sent.
    RefreshFailed { entity_id: i64 },
    /// Rename was requested. `refresh_completed` is false when polling hit
    /// the deadline first.
    Renamed {
        entity_id: i64,
        file_id: Option<i64>,
        refresh_completed: bool,
    },
}

/// Refresh, wait for the refresh, then rename.
#[derive(Debug, Clone)]
pub struct RenameProtocol {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for RenameProtocol {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl RenameProtocol {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// Run the handshake against one client.
    pub async fn run(&self, client: &dyn ArrClient, path: &Path) -> Result<RenameOutcome> {
        let Some(entity) = client.find_entity(path).await? else {
            tracing::warn!("No Arr entry found for {:?}, skipping rename", path);
            return Ok(RenameOutcome::EntityNotFound);
        };

        let command_id = client.refresh(entity.id).await?;
        tracing::info!(
            "Triggered refresh for '{}' (id {}, command {})",
            entity.title,
            entity.id,
            command_id
        );

        let refresh_completed = match self.wait_for(client, command_id).await? {
            CommandState::Completed => true,
            CommandState::Failed => {
                tracing::warn!("Refresh failed for '{}', not renaming", entity.title);
                return Ok(RenameOutcome::RefreshFailed {
                    entity_id: entity.id,
                });
            }
            CommandState::Pending => {
                tracing::debug!(
                    "Refresh for '{}' still running after {:?}, renaming anyway",
                    entity.title,
                    self.max_wait
                );
                false
            }
        };

        let file_id = match path.file_name() {
            Some(name) => client
                .find_file_id(entity.id, &name.to_string_lossy())
                .await
                .unwrap_or_else(|e| {
                    tracing::debug!("Could not resolve file id for {:?}: {}", path, e);
                    None
                }),
            None => None,
        };

        client.rename(entity.id, file_id).await?;
        tracing::info!("Triggered rename for '{}' (file {:?})", entity.title, file_id);

        Ok(RenameOutcome::Renamed {
            entity_id: entity.id,
            file_id,
            refresh_completed,
        })
    }

    /// Poll until the command finishes or the deadline passes.
    async fn wait_for(&self, client: &dyn ArrClient, command_id: i64) -> Result<CommandState> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(CommandState::Pending);
            }
            tokio::time::sleep_until((now + self.poll_interval).min(deadline)).await;

            match client.command_status(command_id).await? {
                CommandState::Pending => continue,
                done => return Ok(done),
            }
        }
    }

    /// Pick the Arr for `path` and run the handshake, logging instead of
    /// returning errors.
    pub async fn trigger(&self, registry: &ArrRegistry, path: &Path) -> RenameOutcome {
        let Some(arr) = registry.for_path(path) else {
            tracing::debug!("No Arr configured for {:?}, skipping rename", path);
            return RenameOutcome::Skipped;
        };
        if !arr.auto_rename {
            tracing::debug!("Auto-rename disabled for '{}'", arr.name);
            return RenameOutcome::Skipped;
        }

        match self.run(arr.client.as_ref(), path).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Rename via '{}' failed for {:?}: {:#}", arr.name, path, e);
                RenameOutcome::Skipped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arr::{RadarrClient, SonarrClient};
    use crate::config::{ArrConfig, ArrType};
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast() -> RenameProtocol {
        RenameProtocol::new(Duration::from_millis(10), Duration::from_millis(200))
    }

    async fn radarr(server: &MockServer) -> RadarrClient {
        Mock::given(method("GET"))
            .and(path("/api/v3/movie"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 4, "title": "Film", "path": "/movies/Film (1999)"}
            ])))
            .mount(server)
            .await;

        RadarrClient::new(&ArrConfig {
            name: "radarr".into(),
            arr_type: ArrType::Radarr,
            url: server.uri(),
            api_key: "k".into(),
            enabled: true,
            auto_rename: true,
        })
    }

    #[tokio::test]
    async fn test_refresh_failed_skips_rename() {
        let server = MockServer::start().await;
        let client = radarr(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_partial_json(serde_json::json!({"name": "RefreshMovie"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/command/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 1, "status": "failed"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_partial_json(serde_json::json!({"name": "RenameMovie"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 2})))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = fast()
            .run(&client, Path::new("/movies/Film (1999)/film.mkv"))
            .await
            .unwrap();
        assert_eq!(outcome, RenameOutcome::RefreshFailed { entity_id: 4 });
    }

    #[tokio::test]
    async fn test_slow_refresh_still_renames_after_deadline() {
        let server = MockServer::start().await;
        let client = radarr(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_partial_json(serde_json::json!({"name": "RefreshMovie"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/command/1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 1, "status": "started"})),
            )
            .expect(1..)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/moviefile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 9, "path": "/movies/Film (1999)/film.mkv"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_partial_json(serde_json::json!({
                "name": "RenameMovie",
                "movieIds": [4],
                "movieFileIds": [9]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = fast()
            .run(&client, Path::new("/movies/Film (1999)/film.mkv"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                entity_id: 4,
                file_id: Some(9),
                refresh_completed: false,
            }
        );
    }

    #[tokio::test]
    async fn test_unresolved_file_renames_whole_series() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/series"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 5, "title": "Show", "path": "/tv/Show"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_partial_json(serde_json::json!({"name": "RefreshSeries"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 3})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/command/3"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": 3, "status": "completed"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/episodefile"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v3/command"))
            .and(body_json(serde_json::json!({"name": "RenameFiles", "seriesId": 5})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 4})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SonarrClient::new(&ArrConfig {
            name: "sonarr".into(),
            arr_type: ArrType::Sonarr,
            url: server.uri(),
            api_key: "k".into(),
            enabled: true,
            auto_rename: true,
        });
        let outcome = fast()
            .run(&client, Path::new("/tv/Show/Season 01/S01E01.mkv"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenameOutcome::Renamed {
                entity_id: 5,
                file_id: None,
                refresh_completed: true,
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_folder() {
        let server = MockServer::start().await;
        let client = radarr(&server).await;

        let outcome = fast()
            .run(&client, Path::new("/movies/Another/another.mkv"))
            .await
            .unwrap();
        assert_eq!(outcome, RenameOutcome::EntityNotFound);
    }
}
