use crate::{
    cell_octree::{Edge, Face},
    tables::*,
    Cell, CellId, CellOctree,
};

impl CellOctree {
    /// Visits every bipolar edge shared by leaves of the tree.
    ///
    /// Each edge surrounded by 4 distinct leaves with vertices produces a
    /// quad, given in the edge's Z order and already oriented so that
    /// triangulating it as `[q0, q2, q1], [q1, q2, q3]` faces outward. Edges
    /// where a leaf repeats (neighbors of different size) or lacks a vertex
    /// produce up to 2 triangles instead. Fewer than 3 usable leaves produce
    /// nothing.
    pub fn dual_contour(
        &mut self,
        mut visit_quad: impl FnMut([CellId; 4]),
        mut visit_triangle: impl FnMut([CellId; 3]),
    ) {
        self.clear_stacks();

        // Cells expand into faces and edges, faces into edges, and only
        // minimal edges emit geometry. Draining the stacks in that order
        // visits every leaf edge inside the root exactly once.

        self.cell_stack.push(self.root_id);
        while let Some(cell) = self.cell_stack.pop() {
            contour_cell_interior(self, cell);
        }

        while let Some(face) = self.face_stack.pop() {
            contour_face_interior(self, face);
        }

        while let Some(edge) = self.edge_stack.pop() {
            contour_edge_interior(self, edge, &mut visit_quad, &mut visit_triangle);
        }
    }
}

/// A branch hands its 8 children, its 12 inner faces and its 6 inner edges
/// to the next stages. Faces and edges touching a pruned child are skipped.
#[inline]
fn contour_cell_interior(octree: &mut CellOctree, cell_id: CellId) {
    let cell = &octree.all_cells[cell_id as usize];

    if cell.is_leaf {
        return;
    }

    for &child in cell.children.iter().flatten() {
        octree.cell_stack.push(child);
    }

    for axis in 0..3 {
        for face in 0..4 {
            let face_cell_ids =
                FACE_ADJACENT_OCTANTS[axis][face].map(|o| cell.children[o as usize]);
            if let [Some(f0), Some(f1)] = face_cell_ids {
                octree.face_stack.push(Face {
                    axis,
                    cells: [f0, f1],
                });
            }
        }

        for edge in 0..2 {
            let edge_cells = EDGE_ADJACENT_OCTANTS[axis][edge].map(|o| cell.children[o as usize]);
            if let [Some(e0), Some(e1), Some(e2), Some(e3)] = edge_cells {
                octree.edge_stack.push(Edge {
                    axis,
                    cells: [e0, e1, e2, e3],
                });
            }
        }
    }
}

/// A leaf keeps standing in for all of its would-be children.
#[inline]
fn child_or_leaf(cells: &[Cell], parent: CellId, octant: u8) -> Option<CellId> {
    let cell = &cells[parent as usize];
    if cell.is_leaf {
        Some(parent)
    } else {
        cell.children[octant as usize]
    }
}

/// Splits a face into its 4 sub-faces and the 4 edges lying in it.
///
/// `face.cells` is ordered from the minus side to the plus side.
#[inline]
fn contour_face_interior(octree: &mut CellOctree, face: Face) {
    let cells = &octree.all_cells;
    let face_cells = face.cells.map(|i| &cells[i as usize]);

    if face_cells[0].is_leaf && face_cells[1].is_leaf {
        return;
    }

    // The minus cell contributes its plus-side octant and vice versa.
    for face_i in 0..4 {
        let o = FACE_ADJACENT_OCTANTS[face.axis][face_i];
        if let [Some(f0), Some(f1)] = [
            child_or_leaf(cells, face.cells[0], o[1]),
            child_or_leaf(cells, face.cells[1], o[0]),
        ] {
            octree.face_stack.push(Face {
                axis: face.axis,
                cells: [f0, f1],
            });
        }
    }

    for edge_i in 0..4 {
        let o = FACE_TO_EDGE_ADJACENT_OCTANTS[face.axis][edge_i];

        // Edges along the first in-face axis take quartet rows from one side
        // each; edges along the second take columns.
        let order = FACE_TO_EDGE_NODE_ORDERS[edge_i];
        let mirror = FACE_TO_EDGE_MIRRORS[edge_i];
        let next_edge =
            [0, 1, 2, 3].map(|i| child_or_leaf(cells, face.cells[order[i]], o[mirror[i]]));

        if let [Some(e0), Some(e1), Some(e2), Some(e3)] = next_edge {
            octree.edge_stack.push(Edge {
                axis: FACE_TO_EDGE_AXIS[face.axis][edge_i],
                cells: [e0, e1, e2, e3],
            });
        }
    }
}

/// Emits geometry for an edge between leaves, or splits it in two halves
/// along its axis.
#[inline]
fn contour_edge_interior(
    octree: &mut CellOctree,
    edge: Edge,
    visit_quad: &mut impl FnMut([CellId; 4]),
    visit_triangle: &mut impl FnMut([CellId; 3]),
) {
    // `edge.cells` are in Z order around the edge.
    let cells = &octree.all_cells;
    let edge_cells = edge.cells.map(|i| &cells[i as usize]);
    if edge_cells.iter().all(|c| c.is_leaf) {
        visit_leaf_edge(edge, edge_cells, visit_quad, visit_triangle);
        return;
    }

    // Cell `i` touches the edge with its octant at quartet position `3 - i`.
    for half in EDGE_ADJACENT_OCTANTS[edge.axis] {
        let next_edge = [0, 1, 2, 3].map(|i| child_or_leaf(cells, edge.cells[i], half[3 - i]));
        if let [Some(e0), Some(e1), Some(e2), Some(e3)] = next_edge {
            octree.edge_stack.push(Edge {
                axis: edge.axis,
                cells: [e0, e1, e2, e3],
            });
        }
    }
}

fn visit_leaf_edge(
    edge: Edge,
    edge_cells: [&Cell; 4],
    visit_quad: &mut impl FnMut([CellId; 4]),
    visit_triangle: &mut impl FnMut([CellId; 3]),
) {
    // Only the deepest cell has this exact edge among its own corners.
    let deepest = (0..4).fold(0, |best, i| {
        if edge_cells[i].depth > edge_cells[best].depth {
            i
        } else {
            best
        }
    });
    let [minus_end, plus_end] = EDGE_ADJACENT_OCTANTS[edge.axis].map(|half| half[3 - deepest]);
    let mask = edge_cells[deepest].sign_mask;
    let outside0 = mask & (1 << minus_end) != 0;
    let outside1 = mask & (1 << plus_end) != 0;

    // Inside at the minus end means the surface faces along +axis.
    let flip = match (outside0, outside1) {
        (false, true) => true,
        (true, false) => false,
        _ => return, // Not a bipolar edge.
    };

    let usable = edge_cells.map(Cell::has_vertex);
    let is_distinct = |a: usize, b: usize| edge.cells[a] != edge.cells[b];
    let all_distinct = is_distinct(0, 1) && is_distinct(0, 2) && is_distinct(1, 3) && is_distinct(2, 3);

    if all_distinct && usable.iter().all(|&u| u) {
        if flip {
            visit_quad([edge.cells[2], edge.cells[3], edge.cells[0], edge.cells[1]]);
        } else {
            visit_quad(edge.cells);
        }
        return;
    }

    // A repeated leaf (a larger neighbor) or a leaf without a vertex makes one
    // or both triangles of the quad degenerate. The triangles share the 1-2
    // diagonal, and diagonal cells are never the same leaf, so each repeat
    // only spoils one of them.
    for tri in [[0, 2, 1], [1, 2, 3]] {
        let [a, b, c] = tri;
        if !(usable[a] && usable[b] && usable[c]) {
            continue;
        }
        if !(is_distinct(a, b) && is_distinct(b, c) && is_distinct(a, c)) {
            continue;
        }
        let tri = if flip { [a, c, b] } else { tri };
        visit_triangle(tri.map(|i| edge.cells[i]));
    }
}
