/// Loading files from disk: scenes, environment maps and the dialogs to pick them.
use std::io::{BufReader, Cursor};
use std::path::{Path, PathBuf};

use cgmath::{Vector2, Vector3};

use crate::context::RenderContext;
use crate::model;
use crate::resource_manager::ENVIRONMENT_MAP;
use crate::texture::{ChannelUsages, Texel, TextureDesc, TextureHandle, UPLOAD_FORMAT};

/// The build script copies `res/` next to the build output, look there as
/// well as relative to the working directory.
pub fn find_file_in_data_directories(file_name: &Path) -> Option<PathBuf> {
    let candidates = [
        file_name.to_path_buf(),
        Path::new("res").join(file_name),
        Path::new(env!("OUT_DIR")).join("res").join(file_name),
    ];
    candidates.into_iter().find(|p| p.is_file())
}

pub async fn load_string(path: &Path) -> anyhow::Result<String> {
    log::debug!("loading text file {:?}", path);
    let txt = std::fs::read_to_string(path)?;
    Ok(txt)
}

pub async fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    log::debug!("loading binary file {:?}", path);
    let data = std::fs::read(path)?;
    Ok(data)
}

/// Load all the meshes of an OBJ file.
pub async fn load_obj_meshes(path: &Path) -> anyhow::Result<Vec<model::Mesh>> {
    let obj_text = load_string(path).await?;
    let obj_cursor = Cursor::new(obj_text);
    let mut obj_reader = BufReader::new(obj_cursor);
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let (models, _materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| {
            let mtl_path = base_dir.join(p);
            async move {
                match load_string(&mtl_path).await {
                    Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                    Err(_) => Err(tobj::LoadError::OpenFileFailed),
                }
            }
        },
    )
    .await?;

    let file_name = path.display().to_string();
    let meshes = models
        .into_iter()
        .enumerate()
        .map(|(o, m)| {
            let vertex_count = m.mesh.positions.len() / 3;
            // we always load the position of the vertices, the rest only if
            // there is one entry per vertex
            let has_texcoords = m.mesh.texcoords.len() / 2 == vertex_count;
            let has_normals = m.mesh.normals.len() / 3 == vertex_count;
            let vertices = (0..vertex_count)
                .map(|i| model::Vertex {
                    position: Vector3::new(
                        m.mesh.positions[i * 3],
                        m.mesh.positions[i * 3 + 1],
                        m.mesh.positions[i * 3 + 2],
                    ),
                    texture_coords: if has_texcoords {
                        Vector2::new(m.mesh.texcoords[i * 2], m.mesh.texcoords[i * 2 + 1])
                    } else {
                        Vector2::new(0.0, 0.0)
                    },
                    normal: if has_normals {
                        Vector3::new(m.mesh.normals[i * 3], m.mesh.normals[i * 3 + 1], m.mesh.normals[i * 3 + 2])
                    } else {
                        Vector3::new(0.0, 0.0, 0.0)
                    },
                })
                .collect::<Vec<_>>();
            let name = if m.name.is_empty() { format!("{} surface no {}", file_name, o) } else { m.name };
            model::Mesh {
                name,
                vertices,
                indices: m.mesh.indices,
                material_id: m.mesh.material_id,
            }
        })
        .collect::<Vec<_>>();
    Ok(meshes)
}

/// Load an image file as an environment map.
pub fn load_environment_map(ctx: &mut dyn RenderContext, file_name: &Path) -> anyhow::Result<TextureHandle> {
    let Some(path) = find_file_in_data_directories(file_name) else {
        anyhow::bail!("environment map {:?} not found", file_name);
    };
    let bytes = pollster::block_on(load_binary(&path))?;
    let img = image::load_from_memory(&bytes)?.into_rgba32f();
    let (width, height) = img.dimensions();
    let texels: Vec<Texel> = img.pixels().map(|p| p.0).collect();
    let desc = TextureDesc::new(ENVIRONMENT_MAP, width, height, UPLOAD_FORMAT, ChannelUsages::SHADER_RESOURCE);
    ctx.upload_texture(&desc, &texels)
}

/// Ask the user for a scene file. `None` if the dialog was cancelled.
pub fn pick_scene_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load scene")
        .add_filter("Wavefront OBJ", &["obj"])
        .pick_file()
}

/// Ask the user for a texture, e.g. a new environment map.
pub fn pick_texture_file() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Load environment map")
        .add_filter("All supported formats", &["hdr", "exr", "png", "jpg", "jpeg", "bmp"])
        .pick_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_scene_is_found_in_data_directories() {
        assert!(find_file_in_data_directories(Path::new("cube.obj")).is_some());
        assert!(find_file_in_data_directories(Path::new("no-such-file.obj")).is_none());
    }

    #[test]
    fn cube_loads_with_normals() {
        let path = find_file_in_data_directories(Path::new("cube.obj")).unwrap();
        let meshes = pollster::block_on(load_obj_meshes(&path)).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 12);
        assert!(meshes[0].vertices.iter().all(|v| v.normal != Vector3::new(0.0, 0.0, 0.0)));
    }
}
