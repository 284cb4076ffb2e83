// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Description tree to [`Scene`].
//!
//! Parsing is all-or-nothing: the first malformed field aborts with a
//! [`SceneError`] naming its path and no scene is built.

use std::collections::HashSet;

use duality_transport::RemoteLink;
use glam::{Mat4, Vec2, Vec3, Vec4};
use serde_json::Value;
use tracing::{debug, warn};

use crate::description::Field;
use crate::transform::matrix_from_elements;
use crate::{
    CoordinateAxis, DataProvider, Dataset, DownloadProvider, GeometryDataset, InitialView,
    ParametrizedProvider, RenderParameters2D, RenderParameters3D, Scene, SceneError, SceneMetadata,
    SceneNode, SceneWarning, TransferFunction, TransformTable, VariableError, VariableRegistry,
    Visibility, VolumeDataset,
};

/// Result of a successful parse.
#[derive(Debug)]
pub struct ParsedScene {
    /// The scene graph.
    pub scene: Scene,
    /// Recoverable findings.
    pub warnings: Vec<SceneWarning>,
    /// Cameras declared under `initialView`.
    pub initial_view: InitialView,
}

/// Parse a scene description. Providers talk to the server through `link`.
pub fn parse_scene(root: &Value, link: &RemoteLink) -> Result<ParsedScene, SceneError> {
    SceneParser::new(link).parse(&Field::root(root))
}

/// Read only the `metadata` block of a description.
pub fn parse_metadata(root: &Value) -> Result<SceneMetadata, SceneError> {
    read_metadata(&Field::root(root).get("metadata")?)
}

struct SceneParser<'l> {
    link: &'l RemoteLink,
    scene_name: String,
    transforms: TransformTable,
    variables: VariableRegistry,
    warnings: Vec<SceneWarning>,
}

impl<'l> SceneParser<'l> {
    fn new(link: &'l RemoteLink) -> Self {
        Self {
            link,
            scene_name: String::new(),
            transforms: TransformTable::new(),
            variables: VariableRegistry::new(),
            warnings: Vec::new(),
        }
    }

    fn parse(mut self, root: &Field<'_>) -> Result<ParsedScene, SceneError> {
        let metadata = read_metadata(&root.get("metadata")?)?;
        self.scene_name.clone_from(&metadata.name);
        let web_view_url = root
            .opt("webViewURL")?
            .map(|f| f.str().map(str::to_owned))
            .transpose()?;

        if let Some(table) = root.opt("transforms")? {
            for (name, field) in table.entries()? {
                let matrix = field.floats::<16>("matrix")?;
                if self
                    .transforms
                    .define(name, matrix_from_elements(&matrix))
                    .is_some()
                {
                    debug!(transform = name, "transform redefined");
                }
            }
        }

        let mut names = HashSet::new();
        let mut nodes = Vec::new();
        for field in root.get("scene")?.items()? {
            nodes.push(self.parse_node(&field, &mut names)?);
        }

        let initial_view = root
            .opt("initialView")?
            .map(|f| parse_initial_view(&f))
            .transpose()?
            .unwrap_or_default();

        let scene = Scene::new(metadata, web_view_url, nodes, self.variables)?;
        debug!(
            scene = %scene.metadata().name,
            nodes = scene.nodes().len(),
            warnings = self.warnings.len(),
            "scene parsed"
        );
        Ok(ParsedScene {
            scene,
            warnings: self.warnings,
            initial_view,
        })
    }

    fn parse_node(
        &mut self,
        node: &Field<'_>,
        names: &mut HashSet<String>,
    ) -> Result<SceneNode, SceneError> {
        let kind_field = node.get("type")?;
        let kind = kind_field.str()?;
        if kind != "geometry" && kind != "volume" {
            return Err(kind_field.error(format!("unknown node type '{kind}'")));
        }
        let name_field = node.get("name")?;
        let name = name_field.str()?.to_owned();
        if !names.insert(name.clone()) {
            return Err(name_field.error(format!("duplicate node name '{name}'")));
        }
        let visibility = self.parse_visibility(node, &name)?;
        self.variables.register_node(name.as_str());

        let dataset_field = node.get("dataset")?;
        let provider = self.parse_provider(&dataset_field.get("source")?, &name)?;
        let transforms = self.parse_transforms(&dataset_field)?;

        let (dataset, transfer_function) = if kind == "geometry" {
            let color = dataset_field
                .opt("color")?
                .map(|f| f.floats::<4>("color").map(Vec4::from_array))
                .transpose()?;
            if node.opt("tf")?.is_some() {
                warn!(node = %name, "transfer function on a geometry node ignored");
            }
            let dataset = GeometryDataset::new(provider, transforms, color);
            (Dataset::Geometry(dataset), None)
        } else {
            let tf = match node.opt("tf")? {
                Some(tf) => TransferFunction::new(self.parse_provider(&tf.get("source")?, &name)?),
                None => TransferFunction::identity(),
            };
            (Dataset::Volume(VolumeDataset::new(provider, transforms)), Some(tf))
        };
        Ok(SceneNode::new(name, visibility, dataset, transfer_function))
    }

    fn parse_visibility(&mut self, node: &Field<'_>, name: &str) -> Result<Visibility, SceneError> {
        let flag = |key: &str| -> Result<bool, SceneError> {
            node.opt(key)?.map_or(Ok(true), |f| f.bool())
        };
        let visibility = Visibility::from_flags(flag("view2d")?, flag("view3d")?);
        if visibility == Visibility::VisibleNone {
            warn!(node = %name, "node is invisible in both views");
            self.warnings.push(SceneWarning::Visibility {
                node: name.to_owned(),
            });
        }
        Ok(visibility)
    }

    fn parse_provider(&mut self, source: &Field<'_>, node: &str) -> Result<DataProvider, SceneError> {
        let kind_field = source.get("type")?;
        let filename = source.get("filename")?.str()?;
        match kind_field.str()? {
            "download" => {
                if source.opt("variables")?.is_some() {
                    return Err(SceneError::Format {
                        path: format!("{}.variables", source.path()),
                        reason: "download sources take no variables".to_owned(),
                    });
                }
                Ok(DataProvider::Download(DownloadProvider::new(
                    self.link.clone(),
                    self.scene_name.as_str(),
                    filename,
                )))
            }
            "python" => {
                let mut variables = Vec::new();
                if let Some(vars) = source.opt("variables")? {
                    for var in vars.items()? {
                        variables.push(self.parse_variable(&var, node)?);
                    }
                }
                Ok(DataProvider::Parametrized(ParametrizedProvider::new(
                    self.link.clone(),
                    self.scene_name.as_str(),
                    filename,
                    node,
                    variables,
                )))
            }
            other => Err(kind_field.error(format!("unknown source type '{other}'"))),
        }
    }

    /// Declare one variable of `node` and return its name.
    fn parse_variable(&mut self, var: &Field<'_>, node: &str) -> Result<String, SceneError> {
        let kind_field = var.get("type")?;
        let name = var.get("name")?.str()?;
        let label = var
            .opt("label")?
            .map(|f| f.str().map(str::to_owned))
            .transpose()?;
        let declared = match kind_field.str()? {
            "float" => self.variables.declare_float(
                node,
                name,
                label,
                var.get("lowerBound")?.f32()?,
                var.get("upperBound")?.f32()?,
                var.get("stepSize")?.f32()?,
                var.get("defaultValue")?.f32()?,
            ),
            "enum" => {
                let values = var
                    .get("values")?
                    .items()?
                    .iter()
                    .map(|v| v.str().map(str::to_owned))
                    .collect::<Result<Vec<_>, _>>()?;
                let default_value = var.get("defaultValue")?.str()?.to_owned();
                self.variables
                    .declare_enum(node, name, label, values, default_value)
            }
            other => return Err(kind_field.error(format!("unknown variable type '{other}'"))),
        };
        declared
            .map(|_| name.to_owned())
            .map_err(|err: VariableError| var.error(err.to_string()))
    }

    fn parse_transforms(&self, dataset: &Field<'_>) -> Result<Vec<Mat4>, SceneError> {
        let Some(list) = dataset.opt("transforms")? else {
            return Ok(Vec::new());
        };
        list.items()?
            .iter()
            .map(|item| {
                let reference = item.transform_ref()?;
                self.transforms
                    .resolve(&reference)
                    .map_err(|err| SceneError::UnresolvedTransform {
                        path: item.path().to_owned(),
                        name: err.name,
                    })
            })
            .collect()
    }
}

fn read_metadata(field: &Field<'_>) -> Result<SceneMetadata, SceneError> {
    let name = field.get("name")?.str()?.to_owned();
    if name.is_empty() {
        return Err(field.get("name")?.error("scene name is empty"));
    }
    let description = field
        .opt("description")?
        .map(|f| f.str().map(str::to_owned))
        .transpose()?
        .unwrap_or_default();
    Ok(SceneMetadata { name, description })
}

fn parse_initial_view(field: &Field<'_>) -> Result<InitialView, SceneError> {
    let three_d = field
        .opt("3d")?
        .map(|f| -> Result<RenderParameters3D, SceneError> {
            Ok(RenderParameters3D {
                translation: Vec3::from_array(f.get("translation")?.floats::<3>("translation")?),
                rotation: rotation_matrix(&f.get("rotation")?)?,
            })
        })
        .transpose()?;
    let two_d = field
        .opt("2d")?
        .map(|f| -> Result<RenderParameters2D, SceneError> {
            let axis_field = f.get("axis")?;
            let tag = axis_field.str()?;
            let axis = CoordinateAxis::from_tag(tag)
                .ok_or_else(|| axis_field.error(format!("unknown axis '{tag}'")))?;
            Ok(RenderParameters2D {
                translation: Vec2::from_array(f.get("translation")?.floats::<2>("translation")?),
                rotation: f.get("rotation")?.f32()?,
                zoom: f.get("zoom")?.f32()?,
                axis,
                depth: f.get("depth")?.f32()?,
            })
        })
        .transpose()?;
    Ok(InitialView { three_d, two_d })
}

/// Initial-view rotations are inline matrices only; the transform table
/// belongs to datasets.
fn rotation_matrix(field: &Field<'_>) -> Result<Mat4, SceneError> {
    Ok(matrix_from_elements(&field.floats::<16>("rotation")?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(doc: &Value) -> Result<ParsedScene, SceneError> {
        parse_scene(doc, &RemoteLink::offline())
    }

    fn doc(scene: Value) -> Value {
        json!({ "metadata": { "name": "demo" }, "scene": scene })
    }

    fn geometry(name: &str) -> Value {
        json!({
            "type": "geometry",
            "name": name,
            "dataset": { "source": { "type": "download", "filename": "a.g3d" } }
        })
    }

    #[test]
    fn minimal_description_parses() {
        let parsed = parse(&doc(json!([geometry("a")]))).unwrap();
        assert_eq!(parsed.scene.metadata().name, "demo");
        assert_eq!(parsed.scene.metadata().description, "");
        assert!(parsed.scene.web_view_url().is_none());
        assert!(parsed.warnings.is_empty());
        assert_eq!(parsed.initial_view, InitialView::default());
    }

    #[test]
    fn unknown_node_type_is_fatal() {
        let mut node = geometry("a");
        node["type"] = json!("mesh");
        let err = parse(&doc(json!([node]))).unwrap_err();
        assert_eq!(err.path(), "scene[0].type");
    }

    #[test]
    fn duplicate_node_names_are_fatal() {
        let err = parse(&doc(json!([geometry("a"), geometry("a")]))).unwrap_err();
        assert_eq!(err.path(), "scene[1].name");
    }

    #[test]
    fn unknown_source_and_variable_types_are_fatal() {
        let mut node = geometry("a");
        node["dataset"]["source"]["type"] = json!("ftp");
        let err = parse(&doc(json!([node]))).unwrap_err();
        assert_eq!(err.path(), "scene[0].dataset.source.type");

        let mut node = geometry("a");
        node["dataset"]["source"] = json!({
            "type": "python",
            "filename": "gen.py",
            "variables": [{ "type": "int", "name": "n" }]
        });
        let err = parse(&doc(json!([node]))).unwrap_err();
        assert_eq!(err.path(), "scene[0].dataset.source.variables[0].type");
    }

    #[test]
    fn visibility_flags_must_be_booleans() {
        let mut node = geometry("a");
        node["view2d"] = json!("no");
        let err = parse(&doc(json!([node]))).unwrap_err();
        assert_eq!(err.path(), "scene[0].view2d");
    }

    #[test]
    fn variable_with_default_out_of_bounds_is_fatal() {
        let mut node = geometry("a");
        node["dataset"]["source"] = json!({
            "type": "python",
            "filename": "gen.py",
            "variables": [{
                "type": "float", "name": "t",
                "lowerBound": 0.0, "upperBound": 1.0, "stepSize": 0.1, "defaultValue": 2.0
            }]
        });
        let err = parse(&doc(json!([node]))).unwrap_err();
        assert_eq!(err.path(), "scene[0].dataset.source.variables[0]");
    }

    #[test]
    fn initial_view_is_read() {
        let mut root = doc(json!([geometry("a")]));
        let identity = Mat4::IDENTITY.to_cols_array().to_vec();
        root["initialView"] = json!({
            "3d": { "translation": [1, 2, 3], "rotation": identity },
            "2d": { "translation": [4, 5], "rotation": 0.5, "zoom": 2, "axis": "x", "depth": 0.25 }
        });
        let view = parse(&root).unwrap().initial_view;
        assert_eq!(view.params_3d().translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(view.params_3d().rotation, Mat4::IDENTITY);
        let two_d = view.params_2d();
        assert_eq!(two_d.translation, Vec2::new(4.0, 5.0));
        assert_eq!(two_d.axis, CoordinateAxis::X);
        assert!((two_d.zoom - 2.0).abs() < f32::EPSILON);

        root["initialView"]["2d"]["axis"] = json!("w");
        assert_eq!(parse(&root).unwrap_err().path(), "initialView.2d.axis");
    }

    #[test]
    fn named_and_inline_matrices_share_element_order() {
        let shifted: Vec<f32> = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            .to_cols_array()
            .to_vec();
        let mut root = doc(json!([geometry("a")]));
        root["transforms"] = json!({ "shift": { "matrix": shifted } });
        root["scene"][0]["dataset"]["transforms"] = json!(["shift", shifted]);
        let parsed = parse(&root).unwrap();
        let Dataset::Geometry(dataset) = parsed.scene.nodes()[0].dataset() else {
            panic!("expected a geometry dataset");
        };
        assert_eq!(dataset.transforms()[0], dataset.transforms()[1]);
        assert_eq!(dataset.transforms()[0].w_axis, Vec4::new(1.0, 2.0, 3.0, 1.0));
    }

    #[test]
    fn volume_without_tf_uses_identity_table() {
        let node = json!({
            "type": "volume",
            "name": "v",
            "dataset": { "source": { "type": "download", "filename": "v.i3m" } }
        });
        let parsed = parse(&doc(json!([node]))).unwrap();
        let tf = parsed.scene.nodes()[0].transfer_function().unwrap();
        assert!(tf.provider().is_none());
        assert_eq!(tf.table().entries().len(), 256);
    }
}
