use crate::{
    error::{ExtractError, Result},
    CellId, CellOctree,
};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub type MeshVertexId = u32;
pub const NULL_MESH_VERTEX_ID: MeshVertexId = MeshVertexId::MAX;

/// Most vertices a 16-bit index buffer can address.
pub const MAX_MESH_VERTICES: usize = u16::MAX as usize + 1;

/// One vertex of the output mesh, laid out for direct GPU upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from_array(self.normal)
    }
}

/// Indexed triangle list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceMesh {
    pub vertices: Vec<MeshVertex>,
    /// Three indices per triangle, counter-clockwise when seen from outside.
    pub indices: Vec<u16>,
}

impl SurfaceMesh {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn triangles(&self) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Repair normals for vertices on sharp edges.
    ///
    /// Any triangle corner whose normal points more than
    /// `normal_similarity_threshold` (a cosine) away from the triangle's own
    /// normal gets a new vertex at the same position carrying the triangle
    /// normal.
    pub fn repair_sharp_normals(&mut self, normal_similarity_threshold: f32) -> Result<()> {
        let vertices = &mut self.vertices;
        for t in self.indices.chunks_exact_mut(3) {
            let mut tri = [t[0], t[1], t[2]];
            let n = tri.map(|v| vertices[v as usize].normal());
            let p = tri.map(|v| vertices[v as usize].position());

            let tri_normal = (p[1] - p[0]).cross(p[2] - p[0]).normalize_or_zero();
            if tri_normal == Vec3::ZERO {
                continue;
            }

            // Force dissident normals to use the triangle's normal.
            for ti in 0..3 {
                if n[ti].dot(tri_normal) < normal_similarity_threshold {
                    let new_vert = u16::try_from(vertices.len())
                        .map_err(|_| ExtractError::TooManyVertices(vertices.len() + 1))?;
                    vertices.push(MeshVertex::new(p[ti], tri_normal));
                    tri[ti] = new_vert;
                }
            }

            t.copy_from_slice(&tri);
        }
        Ok(())
    }
}

/// Turns a finished octree into a [`SurfaceMesh`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    mesh: SurfaceMesh,
}

impl MeshBuilder {
    /// Depth-first walk from the root assigning consecutive mesh vertex ids
    /// to every leaf with a vertex. All other cells keep
    /// [`NULL_MESH_VERTEX_ID`].
    pub fn generate_vertex_indices(octree: &mut CellOctree) -> Result<Self> {
        let mut vertices = Vec::new();
        let mut stack = vec![octree.root_id];
        while let Some(cell_id) = stack.pop() {
            let cell = &mut octree.all_cells[cell_id as usize];
            cell.mesh_vertex_id = NULL_MESH_VERTEX_ID;
            if cell.is_leaf {
                if cell.has_vertex() {
                    cell.mesh_vertex_id = vertices.len() as MeshVertexId;
                    vertices.push(MeshVertex::new(cell.draw_pos, cell.average_normal));
                }
            } else {
                // Reversed so that octant 0 is visited first.
                stack.extend(cell.children.iter().rev().flatten());
            }
        }

        if vertices.len() > MAX_MESH_VERTICES {
            return Err(ExtractError::TooManyVertices(vertices.len()));
        }

        Ok(Self {
            mesh: SurfaceMesh {
                vertices,
                indices: Vec::new(),
            },
        })
    }

    /// Appends triangles given as octree cell ids, translating them to mesh
    /// vertex indices. Triangles touching a cell without a vertex are dropped.
    pub fn push_cell_triangles(&mut self, octree: &CellOctree, cell_triangles: &[CellId]) {
        for tri in cell_triangles.chunks_exact(3) {
            let ids = [tri[0], tri[1], tri[2]].map(|c| octree.cell(c).mesh_vertex_id);
            let Ok(indices) = ids
                .into_iter()
                .map(u16::try_from)
                .collect::<std::result::Result<Vec<_>, _>>()
            else {
                continue;
            };
            self.mesh.indices.extend_from_slice(&indices);
        }
    }

    pub fn finish(self) -> SurfaceMesh {
        self.mesh
    }

    /// Assigns vertex ids, runs dual contouring and collects the mesh.
    pub fn contour(octree: &mut CellOctree) -> Result<SurfaceMesh> {
        let mut builder = Self::generate_vertex_indices(octree)?;

        let mut quad_indices = Vec::new();
        let mut tri_indices = Vec::new();
        octree.dual_contour(
            |q| quad_indices.extend_from_slice(&[q[0], q[2], q[1], q[1], q[2], q[3]]),
            |t| tri_indices.extend_from_slice(&t),
        );
        tri_indices.append(&mut quad_indices);

        builder.push_cell_triangles(octree, &tri_indices);
        let mesh = builder.finish();
        log::debug!(
            "contoured {} vertices, {} triangles",
            mesh.vertices.len(),
            mesh.num_triangles()
        );
        Ok(mesh)
    }
}
