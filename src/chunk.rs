use glam::Vec3;

use crate::world::{CHUNK_SIZE, GRID_DIVISIONS, HEIGHT_SCALE, HeightField};

/// Integer grid index of a chunk. Structural equality is the cache key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the given world position. Floors, so negative
    /// positions land in negative chunks rather than all mapping to zero.
    pub fn from_world(x: f32, z: f32) -> Self {
        Self {
            x: (x / CHUNK_SIZE).floor() as i32,
            z: (z / CHUNK_SIZE).floor() as i32,
        }
    }

    /// World-space origin corner of this chunk.
    pub fn origin(&self) -> Vec3 {
        Vec3::new(
            self.x as f32 * CHUNK_SIZE,
            0.0,
            self.z as f32 * CHUNK_SIZE,
        )
    }

    pub fn chebyshev(&self, other: ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// One tile of terrain: a crossed wireframe grid draped over the height
/// field. Vertices are chunk-local in x/z (placement is a translation to
/// `coord.origin()`), but heights are always sampled at absolute world
/// coordinates so neighbouring chunks meet exactly at their shared edge.
///
/// Built once per coordinate and immutable afterwards; rebuilding the same
/// coordinate reproduces identical vertices.
pub struct Chunk {
    pub coord: ChunkCoord,
    pub vertices: Vec<LineVertex>,
}

impl Chunk {
    /// Line-list vertices per chunk: two polyline families of
    /// `GRID_DIVISIONS + 1` lines, each with `GRID_DIVISIONS` segments.
    pub const VERTEX_COUNT: usize =
        (4 * GRID_DIVISIONS * (GRID_DIVISIONS + 1)) as usize;

    pub fn build(coord: ChunkCoord, field: &HeightField) -> Self {
        let origin = coord.origin();
        let mut vertices = Vec::with_capacity(Self::VERTEX_COUNT);

        let local = |i: u32| i as f32 / GRID_DIVISIONS as f32 * CHUNK_SIZE;

        for i in 0..=GRID_DIVISIONS {
            let line = local(i);
            for j in 0..GRID_DIVISIONS {
                let a = local(j);
                let b = local(j + 1);
                // sweep x at constant z, then the transposed sweep
                vertices.push(sample(origin, a, line, field));
                vertices.push(sample(origin, b, line, field));
                vertices.push(sample(origin, line, a, field));
                vertices.push(sample(origin, line, b, field));
            }
        }

        Self { coord, vertices }
    }
}

fn sample(origin: Vec3, local_x: f32, local_z: f32, field: &HeightField) -> LineVertex {
    let height = field.height_at(origin.x + local_x, origin.z + local_z);
    LineVertex {
        position: [local_x, height, local_z],
        color: line_color(height),
    }
}

/// Dim the wire in valleys and brighten it on ridges so relief reads even
/// without shading.
fn line_color(height: f32) -> [f32; 3] {
    let t = (height / HEIGHT_SCALE * 0.5 + 0.5).clamp(0.0, 1.0);
    [0.1 + 0.15 * t, 0.45 + 0.5 * t, 0.2 + 0.25 * t]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn from_world_floors_negative_positions() {
        assert_eq!(ChunkCoord::from_world(0.0, 0.0), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world(9.99, 9.99), ChunkCoord::new(0, 0));
        assert_eq!(ChunkCoord::from_world(10.0, 0.0), ChunkCoord::new(1, 0));
        assert_eq!(ChunkCoord::from_world(-0.1, -0.1), ChunkCoord::new(-1, -1));
        assert_eq!(ChunkCoord::from_world(25.0, -25.0), ChunkCoord::new(2, -3));
    }

    #[test]
    fn origin_round_trips_through_from_world() {
        for &(x, z) in &[(0, 0), (3, -2), (-7, 11)] {
            let coord = ChunkCoord::new(x, z);
            let origin = coord.origin();
            assert_eq!(ChunkCoord::from_world(origin.x, origin.z), coord);
        }
    }

    #[test]
    fn chebyshev_takes_the_larger_axis() {
        let a = ChunkCoord::new(0, 0);
        assert_eq!(a.chebyshev(ChunkCoord::new(3, -1)), 3);
        assert_eq!(a.chebyshev(ChunkCoord::new(-2, -5)), 5);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn chunk_has_expected_vertex_count() {
        let field = HeightField::default();
        let chunk = Chunk::build(ChunkCoord::new(0, 0), &field);
        assert_eq!(chunk.vertices.len(), Chunk::VERTEX_COUNT);
        // line list: segments come in pairs
        assert_eq!(chunk.vertices.len() % 2, 0);
    }

    #[test]
    fn vertices_stay_chunk_local() {
        let field = HeightField::default();
        let chunk = Chunk::build(ChunkCoord::new(-4, 9), &field);
        for v in &chunk.vertices {
            assert!((0.0..=CHUNK_SIZE).contains(&v.position[0]));
            assert!((0.0..=CHUNK_SIZE).contains(&v.position[2]));
        }
    }

    #[test]
    fn vertex_heights_come_from_the_height_field() {
        let field = HeightField::default();
        let coord = ChunkCoord::new(2, -1);
        let origin = coord.origin();
        let chunk = Chunk::build(coord, &field);
        for v in &chunk.vertices {
            let expected = field.height_at(origin.x + v.position[0], origin.z + v.position[2]);
            assert_eq!(v.position[1], expected);
        }
    }

    #[test]
    fn rebuilding_a_coordinate_is_bit_identical() {
        let field = HeightField::default();
        let coord = ChunkCoord::new(-3, 5);
        let a = Chunk::build(coord, &field);
        let b = Chunk::build(coord, &field);
        assert_eq!(a.vertices, b.vertices);
    }

    /// Heights along the edge shared by two adjacent chunks, keyed by the
    /// bit pattern of the local z coordinate.
    fn edge_heights(chunk: &Chunk, edge_x: f32) -> BTreeMap<u32, f32> {
        chunk
            .vertices
            .iter()
            .filter(|v| v.position[0] == edge_x)
            .map(|v| (v.position[2].to_bits(), v.position[1]))
            .collect()
    }

    #[test]
    fn adjacent_chunks_share_edge_heights() {
        let field = HeightField::default();
        let left = Chunk::build(ChunkCoord::new(0, 0), &field);
        let right = Chunk::build(ChunkCoord::new(1, 0), &field);

        let left_edge = edge_heights(&left, CHUNK_SIZE);
        let right_edge = edge_heights(&right, 0.0);

        assert_eq!(left_edge.len(), (GRID_DIVISIONS + 1) as usize);
        assert_eq!(left_edge, right_edge);
    }
}
