//! glTF / GLB decoding
//!
//! The node hierarchy of the chosen scene is flattened: every primitive is
//! transformed into the model's root space, so the resulting [`Model`] is a
//! flat list of meshes under a single root transform.

use std::path::Path;

use cgmath::{InnerSpace, Matrix, Matrix3, Matrix4, SquareMatrix, Vector3, Vector4};
use gltf::mesh::Mode;

use crate::error::{Result, ViewerError};
use crate::gfx::resources::material::Material;
use crate::gfx::scene::object::{Mesh, Model, TextureData};
use crate::gfx::scene::vertex::Vertex3D;

/// Reads a `.gltf` or `.glb` file together with its buffers and images.
pub fn load_model(path: &Path) -> Result<Model> {
    let (document, buffers, images) =
        gltf::import(path).map_err(|source| ViewerError::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;
    build_model(path, &document, &buffers, &images)
}

/// Decodes a model held in memory. `path` only names it in errors and logs.
pub fn decode_model(bytes: &[u8], path: &Path) -> Result<Model> {
    let (document, buffers, images) =
        gltf::import_slice(bytes).map_err(|source| ViewerError::ModelLoad {
            path: path.to_path_buf(),
            source,
        })?;
    build_model(path, &document, &buffers, &images)
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

fn build_model(
    path: &Path,
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    images: &[gltf::image::Data],
) -> Result<Model> {
    // Image index in the file -> index in `textures`.
    let mut textures = Vec::new();
    let mut texture_slots = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        match convert_image(image) {
            Some(texture) => {
                texture_slots.push(Some(textures.len()));
                textures.push(texture);
            }
            None => {
                log::warn!(
                    "{}: image {} has unsupported format {:?}, ignoring it",
                    path.display(),
                    i,
                    image.format
                );
                texture_slots.push(None);
            }
        }
    }

    let mut materials: Vec<Material> = document
        .materials()
        .map(|m| convert_material(&m, &texture_slots))
        .collect();
    let mut default_material = None;

    let mut builder = MeshCollector {
        buffers,
        meshes: Vec::new(),
    };

    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next());
    match scene {
        Some(scene) => {
            for node in scene.nodes() {
                builder.visit_node(&node, Matrix4::identity());
            }
        }
        None => {
            for mesh in document.meshes() {
                builder.add_mesh(&mesh, Matrix4::identity());
            }
        }
    }

    let mut meshes = builder.meshes;
    for (mesh, material) in meshes.iter_mut() {
        mesh.material = match material {
            Some(index) => *index,
            None => *default_material.get_or_insert_with(|| {
                materials.push(Material::default());
                materials.len() - 1
            }),
        };
    }
    let meshes: Vec<Mesh> = meshes.into_iter().map(|(mesh, _)| mesh).collect();

    if meshes.is_empty() {
        return Err(ViewerError::EmptyModel {
            path: path.to_path_buf(),
        });
    }

    log::info!(
        "decoded {}: {} meshes, {} materials, {} textures",
        path.display(),
        meshes.len(),
        materials.len(),
        textures.len()
    );

    Ok(Model::new(model_name(path), meshes, materials).with_textures(textures))
}

struct MeshCollector<'a> {
    buffers: &'a [gltf::buffer::Data],
    /// Meshes with the material index from the file, if any.
    meshes: Vec<(Mesh, Option<usize>)>,
}

impl MeshCollector<'_> {
    fn visit_node(&mut self, node: &gltf::Node<'_>, parent: Matrix4<f32>) {
        let world = parent * Matrix4::from(node.transform().matrix());
        if let Some(mesh) = node.mesh() {
            self.add_mesh(&mesh, world);
        }
        for child in node.children() {
            self.visit_node(&child, world);
        }
    }

    fn add_mesh(&mut self, mesh: &gltf::Mesh<'_>, transform: Matrix4<f32>) {
        let linear = Matrix3::from_cols(
            transform.x.truncate(),
            transform.y.truncate(),
            transform.z.truncate(),
        );
        let normal_matrix = linear
            .invert()
            .map(|m| m.transpose())
            .unwrap_or_else(Matrix3::identity);
        let mirrored = linear.determinant() < 0.0;
        let buffers = self.buffers;

        for primitive in mesh.primitives() {
            if primitive.mode() != Mode::Triangles {
                log::debug!(
                    "skipping {:?} primitive {} of mesh {}",
                    primitive.mode(),
                    primitive.index(),
                    mesh.index()
                );
                continue;
            }

            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let Some(positions) = reader.read_positions() else {
                continue;
            };
            let positions: Vec<[f32; 3]> = positions
                .map(|p| {
                    let v = transform * Vector4::new(p[0], p[1], p[2], 1.0);
                    [v.x, v.y, v.z]
                })
                .collect();
            if positions.is_empty() {
                continue;
            }

            let mut indices: Vec<u32> = match reader.read_indices() {
                Some(indices) => indices.into_u32().collect(),
                None => (0..positions.len() as u32).collect(),
            };
            indices.truncate(indices.len() - indices.len() % 3);
            if mirrored {
                for triangle in indices.chunks_exact_mut(3) {
                    triangle.swap(1, 2);
                }
            }

            let normals: Vec<[f32; 3]> = match reader.read_normals() {
                Some(normals) => normals
                    .map(|n| {
                        let v = normal_matrix * Vector3::from(n);
                        let v = if v.magnitude2() > 0.0 { v.normalize() } else { v };
                        [v.x, v.y, v.z]
                    })
                    .collect(),
                None => Mesh::calculate_face_normals(&positions, &indices),
            };

            let uvs: Vec<[f32; 2]> = reader
                .read_tex_coords(0)
                .map(|uvs| uvs.into_f32().collect())
                .unwrap_or_default();

            let vertices = positions
                .iter()
                .enumerate()
                .map(|(i, &position)| Vertex3D {
                    position,
                    normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
                    uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
                })
                .collect();

            self.meshes.push((
                Mesh::new(vertices, indices, 0),
                primitive.material().index(),
            ));
        }
    }
}

fn convert_material(material: &gltf::Material<'_>, texture_slots: &[Option<usize>]) -> Material {
    let pbr = material.pbr_metallic_roughness();
    let name = material
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("material {}", material.index().unwrap_or(0)));
    let [er, eg, eb] = material.emissive_factor();
    let texture = pbr
        .base_color_texture()
        .and_then(|info| texture_slots.get(info.texture().source().index()).copied())
        .flatten();

    Material::new(
        &name,
        pbr.base_color_factor(),
        pbr.metallic_factor(),
        pbr.roughness_factor(),
    )
    .with_emission(er, eg, eb)
    .with_texture(texture)
    .with_double_sided(material.double_sided())
}

fn convert_image(image: &gltf::image::Data) -> Option<TextureData> {
    use gltf::image::Format;

    let (width, height) = (image.width, image.height);
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    match image.format {
        Format::R8G8B8A8 => pixels.extend_from_slice(&image.pixels),
        Format::R8G8B8 => {
            for c in image.pixels.chunks_exact(3) {
                pixels.extend_from_slice(&[c[0], c[1], c[2], 255]);
            }
        }
        Format::R8G8 => {
            for c in image.pixels.chunks_exact(2) {
                pixels.extend_from_slice(&[c[0], c[1], 0, 255]);
            }
        }
        Format::R8 => {
            for &r in &image.pixels {
                pixels.extend_from_slice(&[r, r, r, 255]);
            }
        }
        _ => return None,
    }

    Some(TextureData {
        pixels,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs a JSON document and a binary buffer into a GLB container.
    fn glb(json: &str, bin: &[u8]) -> Vec<u8> {
        let mut json = json.as_bytes().to_vec();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = bin.to_vec();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let mut out = Vec::new();
        let total = 12 + 8 + json.len() + if bin.is_empty() { 0 } else { 8 + bin.len() };
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        if !bin.is_empty() {
            out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
            out.extend_from_slice(b"BIN\0");
            out.extend_from_slice(&bin);
        }
        out
    }

    fn triangle_bytes() -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        bytemuck::cast_slice(&positions).to_vec()
    }

    const TRIANGLE_ACCESSORS: &str = r#"
        "buffers": [{ "byteLength": 36 }],
        "bufferViews": [{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }],
        "accessors": [{
            "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
            "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
        }]"#;

    #[test]
    fn test_decode_bakes_node_transforms() {
        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "scene": 0,
                "scenes": [{{ "nodes": [0] }}],
                "nodes": [
                    {{ "translation": [0.0, 0.0, 2.0], "children": [1] }},
                    {{ "scale": [2.0, 2.0, 2.0], "mesh": 0 }}
                ],
                "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "material": 0 }}] }}],
                "materials": [{{
                    "name": "stone",
                    "pbrMetallicRoughness": {{ "baseColorFactor": [0.5, 0.5, 0.5, 1.0], "metallicFactor": 0.0 }}
                }}],
                {TRIANGLE_ACCESSORS}
            }}"#
        );
        let model = decode_model(&glb(&json, &triangle_bytes()), Path::new("rock.glb")).unwrap();

        assert_eq!(model.name, "rock");
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[1].position, [2.0, 0.0, 2.0]);
        assert_eq!(mesh.vertices[2].position, [0.0, 2.0, 2.0]);
        // Normals are derived from the faces when the file has none.
        for v in &mesh.vertices {
            assert!((v.normal[2] - 1.0).abs() < 1e-6);
        }

        assert_eq!(model.materials.len(), 1);
        let material = &model.materials[0];
        assert_eq!(material.name, "stone");
        assert_eq!(material.base_color, [0.5, 0.5, 0.5, 1.0]);
        assert_eq!(material.metallic, 0.0);
        assert!(!material.double_sided);
        assert!(model.textures.is_empty());
    }

    #[test]
    fn test_primitive_without_material_gets_default() {
        let json = format!(
            r#"{{
                "asset": {{ "version": "2.0" }},
                "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }} }}] }}],
                {TRIANGLE_ACCESSORS}
            }}"#
        );
        let model = decode_model(&glb(&json, &triangle_bytes()), Path::new("bare.glb")).unwrap();

        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.meshes[0].material, 0);
        assert_eq!(model.materials[0].name, "Default");
    }

    #[test]
    fn test_document_without_geometry_is_empty_model() {
        let json = r#"{ "asset": { "version": "2.0" }, "scenes": [{ "nodes": [] }] }"#;
        let err = decode_model(&glb(json, &[]), Path::new("empty.glb")).unwrap_err();
        assert!(matches!(err, ViewerError::EmptyModel { .. }));
    }

    #[test]
    fn test_malformed_bytes_are_a_model_error() {
        let err = decode_model(b"definitely not a model", Path::new("bad.glb")).unwrap_err();
        assert!(matches!(err, ViewerError::ModelLoad { .. }));
    }

    #[test]
    fn test_image_conversion_expands_to_rgba() {
        let image = gltf::image::Data {
            pixels: vec![10, 20, 30, 40, 50, 60],
            format: gltf::image::Format::R8G8B8,
            width: 2,
            height: 1,
        };
        let texture = convert_image(&image).unwrap();
        assert_eq!(texture.pixels, vec![10, 20, 30, 255, 40, 50, 60, 255]);

        let unsupported = gltf::image::Data {
            pixels: vec![0; 8],
            format: gltf::image::Format::R16G16B16A16,
            width: 1,
            height: 1,
        };
        assert!(convert_image(&unsupported).is_none());
    }
}
