// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The scene loader facade.

use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use duality_cache::{CacheEvent, CacheStore, DataCache, FsStore, ProviderIdentity};
use duality_config::{CachePolicy, ClientSettings};
use duality_scene::{
    parse_metadata, parse_scene, InitialView, RenderParameters2D, RenderParameters3D, Scene,
    SceneMetadata, SceneWarning,
};
use duality_transport::{RemoteLink, StreamTransport, Transport};
use tracing::{debug, info, instrument, warn};

use crate::ClientError;

struct LoadedScene {
    scene: Scene,
    initial_view: InitialView,
    warnings: Vec<SceneWarning>,
    notify: Sender<CacheEvent>,
    events: Receiver<CacheEvent>,
}

impl LoadedScene {
    fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            applied += usize::from(self.scene.apply_event(&event));
        }
        applied
    }
}

/// Loads scenes from a server and keeps their payloads up to date.
pub struct SceneLoader {
    link: RemoteLink,
    cache: DataCache,
    settings: ClientSettings,
    loaded: Option<LoadedScene>,
}

impl std::fmt::Debug for SceneLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLoader")
            .field("link", &self.link)
            .field("cache", &self.cache)
            .field("settings", &self.settings)
            .field(
                "scene",
                &self.loaded.as_ref().map(|l| &l.scene.metadata().name),
            )
            .finish()
    }
}

impl SceneLoader {
    /// Loader talking through `link`, with a cache built from `settings`.
    ///
    /// A configured `cache_dir` adds a persistent payload tier there.
    pub fn new(link: RemoteLink, settings: ClientSettings) -> Result<Self, ClientError> {
        let store = match &settings.cache_dir {
            Some(dir) => Some(Arc::new(FsStore::new(dir)?) as Arc<dyn CacheStore>),
            None => None,
        };
        let cache = DataCache::build(store, settings.max_cache_bytes);
        Ok(Self::with_cache(link, cache, settings))
    }

    /// Loader sharing an existing cache.
    pub fn with_cache(link: RemoteLink, cache: DataCache, settings: ClientSettings) -> Self {
        Self {
            link,
            cache,
            settings,
            loaded: None,
        }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Payload cache.
    pub fn cache(&self) -> &DataCache {
        &self.cache
    }

    /// Remote link shared with every provider.
    pub fn link(&self) -> &RemoteLink {
        &self.link
    }

    /// Swap the transport behind the link. Providers of a loaded scene use
    /// the new transport for their next fetch.
    pub fn update_endpoint<T: Transport + 'static>(&self, transport: T) -> Result<(), ClientError> {
        self.link.replace(transport)?;
        info!("endpoint updated");
        Ok(())
    }

    /// Connect to `address` over TCP and make it the endpoint.
    pub fn connect(&self, address: &str) -> Result<(), ClientError> {
        let stream = TcpStream::connect(address).map_err(|source| ClientError::Connect {
            address: address.to_owned(),
            source,
        })?;
        self.update_endpoint(StreamTransport::new(stream))
    }

    /// Metadata of every scene on the server. Descriptions without readable
    /// metadata are skipped.
    pub fn list_metadata(&self) -> Result<Vec<SceneMetadata>, ClientError> {
        let descriptions = self.link.list_scenes()?;
        Ok(descriptions
            .iter()
            .filter_map(|d| match parse_metadata(d) {
                Ok(metadata) => Some(metadata),
                Err(err) => {
                    warn!(%err, "skipping scene with unreadable metadata");
                    None
                }
            })
            .collect())
    }

    /// Fetch, parse and install the scene called `name`.
    ///
    /// On any error the previously loaded scene stays in place. Returns the
    /// parser's warnings.
    #[instrument(skip(self))]
    pub fn load_scene(&mut self, name: &str) -> Result<Vec<SceneWarning>, ClientError> {
        let descriptions = self.link.list_scenes()?;
        let description = descriptions
            .iter()
            .find(|d| parse_metadata(d).is_ok_and(|m| m.name == name))
            .ok_or_else(|| ClientError::UnknownScene(name.to_owned()))?;
        let parsed = parse_scene(description, &self.link)?;

        if self.settings.cache_policy == CachePolicy::RefetchOnLoad {
            debug!("dropping cached payloads before load");
            self.cache.clear();
        }
        self.cache.clear_observers();
        let (notify, events) = mpsc::channel();
        info!(
            nodes = parsed.scene.nodes().len(),
            warnings = parsed.warnings.len(),
            "scene loaded"
        );
        let warnings = parsed.warnings.clone();
        self.loaded = Some(LoadedScene {
            scene: parsed.scene,
            initial_view: parsed.initial_view,
            warnings: parsed.warnings,
            notify,
            events,
        });
        Ok(warnings)
    }

    /// Drop the loaded scene and its pending subscriptions.
    ///
    /// Under [`CachePolicy::RefetchOnLoad`] cached payloads go too; otherwise
    /// they stay for the next scene.
    pub fn unload_scene(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            info!(scene = %loaded.scene.metadata().name, "scene unloaded");
        }
        if self.settings.cache_policy == CachePolicy::RefetchOnLoad {
            debug!("dropping cached payloads on unload");
            self.cache.clear();
        }
        self.cache.clear_observers();
    }

    /// Returns `true` if a scene is loaded.
    pub fn is_scene_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The loaded scene.
    pub fn scene(&self) -> Option<&Scene> {
        self.loaded.as_ref().map(|l| &l.scene)
    }

    /// Metadata of the loaded scene.
    pub fn metadata(&self) -> Result<&SceneMetadata, ClientError> {
        Ok(self.loaded()?.scene.metadata())
    }

    /// Web-view URL of the loaded scene.
    pub fn web_view_url(&self) -> Result<Option<&str>, ClientError> {
        Ok(self.loaded()?.scene.web_view_url())
    }

    /// Warnings raised while parsing the loaded scene.
    pub fn warnings(&self) -> Result<&[SceneWarning], ClientError> {
        Ok(&self.loaded()?.warnings)
    }

    /// Starting 3D camera of the loaded scene.
    pub fn initial_parameters_3d(&self) -> Result<RenderParameters3D, ClientError> {
        Ok(self.loaded()?.initial_view.params_3d())
    }

    /// Starting 2D camera of the loaded scene.
    pub fn initial_parameters_2d(&self) -> Result<RenderParameters2D, ClientError> {
        Ok(self.loaded()?.initial_view.params_2d())
    }

    /// Drop every cached payload, in memory and on disk.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Request payloads for every dataset that lacks one. Returns the number
    /// of requests made.
    pub fn update_datasets(&mut self) -> Result<usize, ClientError> {
        let loaded = self.loaded.as_mut().ok_or(ClientError::NoSceneLoaded)?;
        Ok(loaded.scene.update_datasets(&self.cache, &loaded.notify))
    }

    /// Apply every completed fetch without blocking. Returns the number of
    /// events that changed a dataset.
    pub fn pump(&mut self) -> Result<usize, ClientError> {
        Ok(self.loaded_mut()?.drain())
    }

    /// Apply completed fetches until no dataset is pending or `timeout`
    /// elapses. Returns `true` if everything settled.
    pub fn pump_until_settled(&mut self, timeout: Duration) -> Result<bool, ClientError> {
        let deadline = Instant::now() + timeout;
        let loaded = self.loaded_mut()?;
        loop {
            loaded.drain();
            if loaded.scene.pending_count() == 0 {
                return Ok(true);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match loaded.events.recv_timeout(remaining) {
                Ok(event) => {
                    loaded.scene.apply_event(&event);
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                    return Ok(false);
                }
            }
        }
    }

    /// Give failed datasets another chance and request them again.
    pub fn retry_unavailable(&mut self) -> Result<usize, ClientError> {
        self.loaded_mut()?.scene.reset_unavailable();
        self.update_datasets()
    }

    /// Set a float variable and request the payloads it affects.
    pub fn set_float_variable(
        &mut self,
        node: &str,
        variable: &str,
        value: f32,
    ) -> Result<usize, ClientError> {
        let stale = self
            .loaded_mut()?
            .scene
            .set_float_variable(node, variable, value)?;
        self.replace_stale(&stale)
    }

    /// Set an enum variable and request the payloads it affects.
    pub fn set_enum_variable(
        &mut self,
        node: &str,
        variable: &str,
        value: &str,
    ) -> Result<usize, ClientError> {
        let stale = self
            .loaded_mut()?
            .scene
            .set_enum_variable(node, variable, value)?;
        self.replace_stale(&stale)
    }

    fn replace_stale(&mut self, stale: &[ProviderIdentity]) -> Result<usize, ClientError> {
        for identity in stale {
            debug!(%identity, "dropping payload of previous variable values");
            self.cache.invalidate(identity);
        }
        self.update_datasets()
    }

    fn loaded(&self) -> Result<&LoadedScene, ClientError> {
        self.loaded.as_ref().ok_or(ClientError::NoSceneLoaded)
    }

    fn loaded_mut(&mut self) -> Result<&mut LoadedScene, ClientError> {
        self.loaded.as_mut().ok_or(ClientError::NoSceneLoaded)
    }
}
