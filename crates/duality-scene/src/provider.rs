// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Payload sources of datasets and transfer functions.

use duality_cache::{FetchError, ProviderIdentity, SnapshotValue};
use duality_transport::{LinkError, RemoteLink};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::{VariableError, VariableRegistry};

/// A static file of a scene, fetched with the `download` method.
#[derive(Debug, Clone)]
pub struct DownloadProvider {
    link: RemoteLink,
    scene: String,
    filename: String,
}

impl DownloadProvider {
    /// Provider for `filename` of `scene`.
    pub fn new(link: RemoteLink, scene: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            link,
            scene: scene.into(),
            filename: filename.into(),
        }
    }

    /// Cache identity: `(scene, filename)`.
    pub fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::download(&self.scene, &self.filename)
    }

    /// Fetch the file synchronously.
    pub fn fetch(&self) -> Result<Vec<u8>, FetchError> {
        self.link
            .download(&self.scene, &self.filename)
            .map_err(fetch_error)
    }
}

/// A server-computed file, fetched with the `python` method and keyed by the
/// current values of the variables it declared.
///
/// The variables live in the owning node's registry entry, which a volume
/// node shares between its dataset and its transfer function; each provider
/// only reads and sends its own.
#[derive(Debug, Clone)]
pub struct ParametrizedProvider {
    link: RemoteLink,
    scene: String,
    filename: String,
    node: String,
    variables: Vec<String>,
}

impl ParametrizedProvider {
    /// Provider for script `filename` of `scene`, parametrized by the named
    /// `variables` of `node`.
    pub fn new(
        link: RemoteLink,
        scene: impl Into<String>,
        filename: impl Into<String>,
        node: impl Into<String>,
        variables: Vec<String>,
    ) -> Self {
        Self {
            link,
            scene: scene.into(),
            filename: filename.into(),
            node: node.into(),
            variables,
        }
    }

    /// Node whose variables parametrize this provider.
    pub fn node(&self) -> &str {
        &self.node
    }

    /// Names of the variables this provider declared.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Cache identity: `(scene, filename, snapshot of this provider's
    /// variables)`.
    pub fn identity(&self, registry: &VariableRegistry) -> Result<ProviderIdentity, VariableError> {
        Ok(ProviderIdentity::parametrized(
            &self.scene,
            &self.filename,
            registry.snapshot_of(&self.node, &self.variables)?,
        ))
    }

    /// Fetch the file for `snapshot` synchronously.
    pub fn fetch(&self, snapshot: &[(String, SnapshotValue)]) -> Result<Vec<u8>, FetchError> {
        self.link
            .compute(&self.scene, &self.filename, variables_json(snapshot))
            .map_err(fetch_error)
    }
}

/// Source of one payload.
#[derive(Debug, Clone)]
pub enum DataProvider {
    /// Static file.
    Download(DownloadProvider),
    /// Server-computed file.
    Parametrized(ParametrizedProvider),
}

impl DataProvider {
    /// Server-side file name.
    pub fn filename(&self) -> &str {
        match self {
            Self::Download(p) => &p.filename,
            Self::Parametrized(p) => &p.filename,
        }
    }

    /// Current cache identity. Parametrized providers read their node's
    /// variables from `registry`.
    pub fn identity(&self, registry: &VariableRegistry) -> Result<ProviderIdentity, VariableError> {
        match self {
            Self::Download(p) => Ok(p.identity()),
            Self::Parametrized(p) => p.identity(registry),
        }
    }

    /// A self-contained fetch of `identity` suitable for a cache worker.
    ///
    /// The job carries its own provider handle and the snapshot recorded in
    /// `identity`, so later variable edits cannot change what it requests.
    pub fn fetch_job(
        &self,
        identity: &ProviderIdentity,
    ) -> impl FnOnce() -> Result<Vec<u8>, FetchError> + Send + 'static {
        let provider = self.clone();
        let snapshot = match identity {
            ProviderIdentity::Parametrized { snapshot, .. } => snapshot.clone(),
            ProviderIdentity::Download { .. } => Vec::new(),
        };
        let identity = identity.clone();
        move || {
            debug!(%identity, "fetching payload");
            match &provider {
                Self::Download(p) => p.fetch(),
                Self::Parametrized(p) => p.fetch(&snapshot),
            }
        }
    }
}

/// `{name: value}` object sent with `python` requests.
fn variables_json(snapshot: &[(String, SnapshotValue)]) -> Map<String, Value> {
    snapshot
        .iter()
        .map(|(name, value)| {
            let json = match value {
                SnapshotValue::Float(v) => {
                    Number::from_f64(f64::from(*v)).map_or(Value::Null, Value::Number)
                }
                SnapshotValue::Enum(v) => Value::String(v.clone()),
            };
            (name.clone(), json)
        })
        .collect()
}

fn fetch_error(err: LinkError) -> FetchError {
    match err {
        LinkError::NotFound(message) => FetchError::NotFound(message),
        other => FetchError::Remote(other.to_string()),
    }
}
