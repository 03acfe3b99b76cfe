//! Radarr/Sonarr integration: webhook payloads, the v3 API client, and the
//! refresh-then-rename handshake run after a successful conversion.

mod client;
mod rename;
mod types;

pub use client::*;
pub use rename::*;
pub use types::*;

use crate::config::{ArrConfig, ArrType};
use std::path::Path;
use std::sync::Arc;

/// A configured Arr instance.
#[derive(Clone)]
pub struct RegisteredArr {
    pub name: String,
    pub kind: ArrType,
    pub auto_rename: bool,
    pub client: Arc<dyn ArrClient>,
}

/// The enabled Arr instances, in configuration order.
#[derive(Clone, Default)]
pub struct ArrRegistry {
    arrs: Vec<RegisteredArr>,
}

impl ArrRegistry {
    pub fn new(arrs: Vec<RegisteredArr>) -> Self {
        Self { arrs }
    }

    pub fn from_config(configs: &[ArrConfig]) -> Self {
        let arrs = configs
            .iter()
            .filter(|c| c.enabled)
            .map(|c| RegisteredArr {
                name: c.name.clone(),
                kind: c.arr_type,
                auto_rename: c.auto_rename,
                client: Arc::from(create_client(c)),
            })
            .collect();
        Self { arrs }
    }

    pub fn is_empty(&self) -> bool {
        self.arrs.is_empty()
    }

    /// First instance of the given kind.
    pub fn first(&self, kind: ArrType) -> Option<&RegisteredArr> {
        self.arrs.iter().find(|a| a.kind == kind)
    }

    /// The instance that manages `path`: Radarr for movie folders, Sonarr
    /// otherwise.
    pub fn for_path(&self, path: &Path) -> Option<&RegisteredArr> {
        self.first(media_kind(path))
    }
}

/// Guess which kind of library a path belongs to.
pub fn media_kind(path: &Path) -> ArrType {
    let lower = path.to_string_lossy().to_lowercase();
    if lower.contains("/movies/") || lower.contains("/films/") {
        ArrType::Radarr
    } else {
        ArrType::Sonarr
    }
}
