//! Octant adjacency tables.
//!
//! Octant (and corner) `i` has its x, y and z offsets in bits 0, 1 and 2.
//! Quartets of cells around an edge along axis `a` are listed in Z order
//! over the two remaining axes `(u, v)`, taken cyclically: x → (y, z),
//! y → (z, x), z → (x, y). Position `k` in a quartet is `(k & 1, k >> 1)`
//! in `(u, v)`, so a cell at position `k` touches the edge with its corner at
//! position `3 - k`.

/// Octant pairs `[minus, plus]` sharing a face, 4 per axis.
pub const FACE_ADJACENT_OCTANTS: [[[u8; 2]; 4]; 3] = [
    [[0b000, 0b001], [0b010, 0b011], [0b100, 0b101], [0b110, 0b111]],
    [[0b000, 0b010], [0b001, 0b011], [0b100, 0b110], [0b101, 0b111]],
    [[0b000, 0b100], [0b001, 0b101], [0b010, 0b110], [0b011, 0b111]],
];

const X_EDGE_MINUS: [u8; 4] = [0b000, 0b010, 0b100, 0b110];
const X_EDGE_PLUS: [u8; 4] = [0b001, 0b011, 0b101, 0b111];
const Y_EDGE_MINUS: [u8; 4] = [0b000, 0b100, 0b001, 0b101];
const Y_EDGE_PLUS: [u8; 4] = [0b010, 0b110, 0b011, 0b111];
const Z_EDGE_MINUS: [u8; 4] = [0b000, 0b001, 0b010, 0b011];
const Z_EDGE_PLUS: [u8; 4] = [0b100, 0b101, 0b110, 0b111];

/// Octant quartets around the central edge along each axis, split into the
/// minus and plus halves of that edge.
pub const EDGE_ADJACENT_OCTANTS: [[[u8; 4]; 2]; 3] = [
    [X_EDGE_MINUS, X_EDGE_PLUS],
    [Y_EDGE_MINUS, Y_EDGE_PLUS],
    [Z_EDGE_MINUS, Z_EDGE_PLUS],
];

/// The 4 half-edges lying in the plane of a face, per face axis.
pub const FACE_TO_EDGE_ADJACENT_OCTANTS: [[[u8; 4]; 4]; 3] = [
    [Y_EDGE_MINUS, Y_EDGE_PLUS, Z_EDGE_MINUS, Z_EDGE_PLUS],
    [Z_EDGE_MINUS, Z_EDGE_PLUS, X_EDGE_MINUS, X_EDGE_PLUS],
    [X_EDGE_MINUS, X_EDGE_PLUS, Y_EDGE_MINUS, Y_EDGE_PLUS],
];

/// Axis of each in-face half-edge above.
pub const FACE_TO_EDGE_AXIS: [[usize; 4]; 3] = [[1, 1, 2, 2], [2, 2, 0, 0], [0, 0, 1, 1]];

/// Which side of the face (0 = minus cell, 1 = plus cell) supplies each
/// quartet position.
pub const FACE_TO_EDGE_NODE_ORDERS: [[usize; 4]; 4] =
    [[0, 0, 1, 1], [0, 0, 1, 1], [0, 1, 0, 1], [0, 1, 0, 1]];

/// Quartet position of the octant to take from the supplying cell, mirrored
/// across the face.
pub const FACE_TO_EDGE_MIRRORS: [[usize; 4]; 4] =
    [[2, 3, 0, 1], [2, 3, 0, 1], [1, 0, 3, 2], [1, 0, 3, 2]];

/// Integer offset of octant (or corner) `i` within its parent, in units of
/// the child size.
pub fn octant_offset(octant: usize) -> [i32; 3] {
    [
        (octant & 1) as i32,
        ((octant >> 1) & 1) as i32,
        ((octant >> 2) & 1) as i32,
    ]
}
