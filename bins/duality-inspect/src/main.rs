// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `duality-inspect`: parse scene descriptions and report what they contain.
//!
//! Reports are JSON on stdout; logs go to stderr.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use duality_client::SceneLoader;
use duality_config::{ClientSettings, ConfigService, FsConfigStore, SETTINGS_KEY};
use duality_scene::{
    parse_scene, DataProvider, Dataset, DatasetStatus, InitialView, Scene, SceneNode,
    SceneWarning, Variable,
};
use duality_transport::RemoteLink;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect Duality scene descriptions")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a description file without contacting a server
    Parse {
        /// Path to a JSON scene description
        file: PathBuf,
    },
    /// List the scenes a server offers
    List {
        /// Server address (host:port); defaults to the stored client settings
        #[arg(long)]
        server: Option<String>,
    },
    /// Load a scene from a server and fetch all of its payloads
    Fetch {
        /// Scene name
        scene: String,
        /// Server address (host:port); defaults to the stored client settings
        #[arg(long)]
        server: Option<String>,
        /// Seconds to wait for payloads
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SceneSummary<'a> {
    name: &'a str,
    description: &'a str,
    web_view_url: Option<&'a str>,
    nodes: Vec<NodeSummary<'a>>,
    warnings: Vec<String>,
    initial_view: ViewSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NodeSummary<'a> {
    name: &'a str,
    kind: &'static str,
    visibility: String,
    source: &'static str,
    filename: &'a str,
    transforms: usize,
    color: Option<[f32; 4]>,
    transfer_function: Option<&'a str>,
    status: String,
    variables: Vec<VariableSummary<'a>>,
}

#[derive(Serialize)]
struct VariableSummary<'a> {
    index: usize,
    name: &'a str,
    label: Option<&'a str>,
    kind: String,
    value: Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViewSummary {
    translation_3d: [f32; 3],
    translation_2d: [f32; 2],
    zoom_2d: f32,
    axis_2d: &'static str,
    depth_2d: f32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    match args.cmd {
        Command::Parse { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("read {}", file.display()))?;
            let root: Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not JSON", file.display()))?;
            let parsed = parse_scene(&root, &RemoteLink::offline())
                .with_context(|| format!("parse {}", file.display()))?;
            emit(&summarize(&parsed.scene, &parsed.warnings, &parsed.initial_view))
        }
        Command::List { server } => {
            let loader = connect(server)?;
            let scenes = loader.list_metadata().context("list scenes")?;
            let names: Vec<_> = scenes
                .iter()
                .map(|m| serde_json::json!({ "name": m.name, "description": m.description }))
                .collect();
            emit(&names)
        }
        Command::Fetch {
            scene,
            server,
            timeout,
        } => {
            let mut loader = connect(server)?;
            loader
                .load_scene(&scene)
                .with_context(|| format!("load scene '{scene}'"))?;
            let requested = loader.update_datasets()?;
            info!(requested, "payloads requested");
            if !loader.pump_until_settled(Duration::from_secs(timeout))? {
                warn!(timeout, "payloads still pending");
            }
            let loaded = loader
                .scene()
                .ok_or_else(|| anyhow!("scene '{scene}' vanished after loading"))?;
            let view = InitialView {
                three_d: Some(loader.initial_parameters_3d()?),
                two_d: Some(loader.initial_parameters_2d()?),
            };
            emit(&summarize(loaded, loader.warnings()?, &view))
        }
    }
}

/// Build a loader connected to `server`, or to the address in the stored
/// settings.
fn connect(server: Option<String>) -> Result<SceneLoader> {
    let settings = load_settings();
    let address = server
        .or_else(|| settings.server_address.clone())
        .ok_or_else(|| anyhow!("no server address given and none stored in settings"))?;
    let loader =
        SceneLoader::new(RemoteLink::offline(), settings).context("open payload cache")?;
    loader
        .connect(&address)
        .with_context(|| format!("connect to {address}"))?;
    info!(%address, "connected");
    Ok(loader)
}

/// Stored settings, or defaults when none can be read.
fn load_settings() -> ClientSettings {
    let service = match FsConfigStore::new() {
        Ok(store) => ConfigService::new(store),
        Err(err) => {
            warn!(%err, "config directory unavailable, using default settings");
            return ClientSettings::default();
        }
    };
    service
        .load_or_default(SETTINGS_KEY)
        .unwrap_or_else(|err| {
            warn!(%err, "stored settings unreadable, using defaults");
            ClientSettings::default()
        })
}

fn summarize<'a>(
    scene: &'a Scene,
    warnings: &[SceneWarning],
    view: &InitialView,
) -> SceneSummary<'a> {
    let three_d = view.params_3d();
    let two_d = view.params_2d();
    SceneSummary {
        name: &scene.metadata().name,
        description: &scene.metadata().description,
        web_view_url: scene.web_view_url(),
        nodes: scene.nodes().iter().map(|n| summarize_node(scene, n)).collect(),
        warnings: warnings.iter().map(ToString::to_string).collect(),
        initial_view: ViewSummary {
            translation_3d: three_d.translation.to_array(),
            translation_2d: two_d.translation.to_array(),
            zoom_2d: two_d.zoom,
            axis_2d: two_d.axis.tag(),
            depth_2d: two_d.depth,
        },
    }
}

fn summarize_node<'a>(scene: &'a Scene, node: &'a SceneNode) -> NodeSummary<'a> {
    let (kind, transforms, color): (_, _, Option<[f32; 4]>) = match node.dataset() {
        Dataset::Geometry(g) => ("geometry", g.transforms().len(), g.color().map(Into::into)),
        Dataset::Volume(v) => ("volume", v.transforms().len(), None),
    };
    let provider = node.dataset().provider();
    let source = match provider {
        DataProvider::Download(_) => "download",
        DataProvider::Parametrized(_) => "python",
    };
    let variables = scene
        .variables()
        .node(node.name())
        .map(|vars| vars.iter().map(summarize_variable).collect())
        .unwrap_or_default();
    NodeSummary {
        name: node.name(),
        kind,
        visibility: format!("{:?}", node.visibility()),
        source,
        filename: provider.filename(),
        transforms,
        color,
        transfer_function: node
            .transfer_function()
            .and_then(|tf| tf.provider())
            .map(DataProvider::filename),
        status: status_label(node.dataset().status()),
        variables,
    }
}

fn summarize_variable(var: &Variable) -> VariableSummary<'_> {
    let value = match var {
        Variable::Float(f) => serde_json::json!(f.value()),
        Variable::Enum(e) => Value::String(e.value().to_owned()),
    };
    VariableSummary {
        index: var.index(),
        name: var.name(),
        label: var.label(),
        kind: var.kind().to_string(),
        value,
    }
}

fn status_label(status: &DatasetStatus) -> String {
    match status {
        DatasetStatus::Empty => "empty".to_owned(),
        DatasetStatus::Pending(key) => format!("pending {key}"),
        DatasetStatus::Ready => "ready".to_owned(),
        DatasetStatus::Unavailable(reason) => format!("unavailable: {reason}"),
    }
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).context("write report")?;
    writeln!(out).context("write report")?;
    Ok(())
}
