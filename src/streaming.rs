use std::collections::HashMap;

use crate::chunk::{Chunk, ChunkCoord, LineVertex};
use crate::world::{HeightField, RENDER_DISTANCE};

/// Where chunks get displayed. The streamer decides *which* chunks exist and
/// mirrors every creation and eviction into this collaborator; how they are
/// drawn (GPU buffers, materials) is the implementor's business.
pub trait ChunkScene {
    fn add_chunk(&mut self, coord: ChunkCoord, vertices: &[LineVertex]);
    fn remove_chunk(&mut self, coord: ChunkCoord);
}

/// Owns the chunk cache and keeps it synchronized with the player position.
///
/// After every [`update`](TerrainStreamer::update) the resident set is
/// exactly the `(2 * RENDER_DISTANCE + 1)²` square of chunk coordinates
/// around the reference chunk, which bounds memory without any explicit
/// accounting. Single-threaded: called once per frame from the frame loop,
/// which is the sole mutator of chunk state.
pub struct TerrainStreamer {
    field: HeightField,
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl TerrainStreamer {
    pub fn new(field: HeightField) -> Self {
        Self {
            field,
            chunks: HashMap::new(),
        }
    }

    /// Terrain elevation under a world position. The movement code uses this
    /// to keep the character's feet on the ground; chunk geometry samples
    /// the same field.
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        self.field.height_at(x, z)
    }

    pub fn resident_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_resident(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// One streaming tick: build every missing chunk within
    /// `RENDER_DISTANCE` of the reference position and evict every resident
    /// chunk outside it. Creation and eviction both use the reference chunk
    /// computed at the top of the call, so a reference sitting exactly on a
    /// chunk boundary cannot load and unload the same chunk in one tick.
    pub fn update(&mut self, reference_x: f32, reference_z: f32, scene: &mut impl ChunkScene) {
        let center = ChunkCoord::from_world(reference_x, reference_z);

        for z in (center.z - RENDER_DISTANCE)..=(center.z + RENDER_DISTANCE) {
            for x in (center.x - RENDER_DISTANCE)..=(center.x + RENDER_DISTANCE) {
                let coord = ChunkCoord::new(x, z);
                if !self.chunks.contains_key(&coord) {
                    log::trace!("loading chunk ({}, {})", coord.x, coord.z);
                    let chunk = Chunk::build(coord, &self.field);
                    scene.add_chunk(chunk.coord, &chunk.vertices);
                    self.chunks.insert(chunk.coord, chunk);
                }
            }
        }

        self.chunks.retain(|&coord, _| {
            if coord.chebyshev(center) > RENDER_DISTANCE {
                log::trace!("evicting chunk ({}, {})", coord.x, coord.z);
                scene.remove_chunk(coord);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::CHUNK_SIZE;
    use std::collections::HashSet;

    /// Stand-in display set: records the add/remove traffic and keeps the
    /// currently displayed coordinates, like the renderer's buffer map does.
    #[derive(Default)]
    struct RecordingScene {
        added: Vec<ChunkCoord>,
        removed: Vec<ChunkCoord>,
        displayed: HashSet<ChunkCoord>,
    }

    impl ChunkScene for RecordingScene {
        fn add_chunk(&mut self, coord: ChunkCoord, _vertices: &[LineVertex]) {
            self.added.push(coord);
            self.displayed.insert(coord);
        }

        fn remove_chunk(&mut self, coord: ChunkCoord) {
            self.removed.push(coord);
            self.displayed.remove(&coord);
        }
    }

    fn streamer() -> TerrainStreamer {
        TerrainStreamer::new(HeightField::default())
    }

    fn window_around(center: ChunkCoord) -> HashSet<ChunkCoord> {
        let mut set = HashSet::new();
        for z in (center.z - RENDER_DISTANCE)..=(center.z + RENDER_DISTANCE) {
            for x in (center.x - RENDER_DISTANCE)..=(center.x + RENDER_DISTANCE) {
                set.insert(ChunkCoord::new(x, z));
            }
        }
        set
    }

    fn side() -> usize {
        (2 * RENDER_DISTANCE + 1) as usize
    }

    #[test]
    fn first_update_fills_the_window() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(0.0, 0.0, &mut scene);

        assert_eq!(streamer.resident_count(), side() * side());
        for coord in window_around(ChunkCoord::new(0, 0)) {
            assert!(streamer.is_resident(coord), "missing {coord:?}");
        }
        assert_eq!(scene.added.len(), side() * side());
        assert!(scene.removed.is_empty());
    }

    #[test]
    fn update_is_idempotent() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(4.2, -7.9, &mut scene);
        let resident = streamer.resident_count();

        let mut second = RecordingScene::default();
        streamer.update(4.2, -7.9, &mut second);

        assert_eq!(streamer.resident_count(), resident);
        assert!(second.added.is_empty());
        assert!(second.removed.is_empty());
    }

    #[test]
    fn moving_within_a_chunk_changes_nothing() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(0.0, 0.0, &mut scene);

        let mut second = RecordingScene::default();
        streamer.update(CHUNK_SIZE * 0.9, CHUNK_SIZE * 0.9, &mut second);

        assert!(second.added.is_empty());
        assert!(second.removed.is_empty());
    }

    #[test]
    fn crossing_chunks_shifts_the_window() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(0.0, 0.0, &mut scene);

        // Two chunks east: (25, 0) lies in chunk (2, 0).
        let mut second = RecordingScene::default();
        streamer.update(25.0, 0.0, &mut second);

        let expected = window_around(ChunkCoord::new(2, 0));
        assert_eq!(streamer.resident_count(), expected.len());
        for coord in &expected {
            assert!(streamer.is_resident(*coord), "missing {coord:?}");
        }

        // The two westmost columns of the old window fell out of range.
        let evicted: HashSet<ChunkCoord> = second.removed.iter().copied().collect();
        let mut expected_evicted = HashSet::new();
        for z in -RENDER_DISTANCE..=RENDER_DISTANCE {
            expected_evicted.insert(ChunkCoord::new(-RENDER_DISTANCE, z));
            expected_evicted.insert(ChunkCoord::new(-RENDER_DISTANCE + 1, z));
        }
        assert_eq!(evicted, expected_evicted);
        assert_eq!(second.added.len(), 2 * side());
    }

    #[test]
    fn reference_on_a_chunk_boundary_is_stable() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(CHUNK_SIZE, 0.0, &mut scene);

        assert_eq!(streamer.resident_count(), side() * side());
        for coord in window_around(ChunkCoord::new(1, 0)) {
            assert!(streamer.is_resident(coord), "missing {coord:?}");
        }

        // Re-running on the exact boundary must not oscillate.
        let mut second = RecordingScene::default();
        streamer.update(CHUNK_SIZE, 0.0, &mut second);
        assert!(second.added.is_empty());
        assert!(second.removed.is_empty());
    }

    #[test]
    fn display_set_mirrors_the_cache() {
        let mut streamer = streamer();
        let mut scene = RecordingScene::default();
        streamer.update(0.0, 0.0, &mut scene);
        streamer.update(-35.0, 18.0, &mut scene);
        streamer.update(60.0, -60.0, &mut scene);

        assert_eq!(scene.displayed.len(), streamer.resident_count());
        for coord in &scene.displayed {
            assert!(streamer.is_resident(*coord));
        }
    }

    #[test]
    fn height_query_delegates_to_the_field() {
        let streamer = streamer();
        let field = HeightField::default();
        assert_eq!(streamer.height_at(17.5, -3.0), field.height_at(17.5, -3.0));
    }
}
