/// Define the data structures that hold the geometry of a scene.
///
/// The geometry is kept on the CPU side. Passes that rasterize or ray trace
/// a scene upload what they need themselves when they get `init_scene`.
use cgmath::*;

/// The vertex is the thing that is a node in our mesh. It's what we build
/// meshes out of.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub position: Vector3<f32>,
    pub texture_coords: Vector2<f32>,
    pub normal: Vector3<f32>,
}

/// A list of vertices together with the indices that build triangles out of them.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    /// Many vertices are used multiple times in different triangles
    /// so to save memory the vertices are stored only once and the
    /// triangles reference them by index, three per triangle.
    pub indices: Vec<u32>,
    pub material_id: Option<usize>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// An axis aligned bounding box
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Bounds {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Bounds {
    /// The bounds of all the vertices of all the meshes, `None` if there are no vertices
    pub fn of_meshes<'a>(meshes: impl IntoIterator<Item = &'a Mesh>) -> Option<Self> {
        let mut bounds: Option<Bounds> = None;
        for vertex in meshes.into_iter().flat_map(|m| m.vertices.iter()) {
            let p = Point3::from_vec(vertex.position);
            bounds = Some(match bounds {
                None => Bounds { min: p, max: p },
                Some(b) => Bounds {
                    min: Point3::new(b.min.x.min(p.x), b.min.y.min(p.y), b.min.z.min(p.z)),
                    max: Point3::new(b.max.x.max(p.x), b.max.y.max(p.y), b.max.z.max(p.z)),
                },
            });
        }
        bounds
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    /// Radius of the bounding sphere around the center
    pub fn radius(&self) -> f32 {
        (self.max - self.min).magnitude() * 0.5
    }
}
