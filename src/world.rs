use noise::{NoiseFn, Perlin};

/// World units covered by one terrain chunk along each axis.
pub const CHUNK_SIZE: f32 = 10.0;
/// Chunk radius (Chebyshev) kept resident around the player.
pub const RENDER_DISTANCE: i32 = 3;
/// Grid subdivisions per chunk edge.
pub const GRID_DIVISIONS: u32 = 15;
/// Terrain elevation amplitude.
pub const HEIGHT_SCALE: f32 = 2.5;
/// Noise feature frequency; lower is smoother.
pub const NOISE_SCALE: f32 = 0.1;

/// Seed for the terrain noise. Fixed so the same world comes back every run.
pub const TERRAIN_SEED: u32 = 0x5eed;

/// Elevation as a pure function of world (x, z).
///
/// Samples a 3-D Perlin generator on the y = 0 plane in absolute world
/// coordinates, so any two callers asking about the same spot get the same
/// answer and chunk meshes line up at their edges.
pub struct HeightField {
    noise: Perlin,
}

impl HeightField {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: Perlin::new(seed),
        }
    }

    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let sample = self.noise.get([
            (x * NOISE_SCALE) as f64,
            0.0,
            (z * NOISE_SCALE) as f64,
        ]);
        HEIGHT_SCALE * sample as f32
    }
}

impl Default for HeightField {
    fn default() -> Self {
        Self::new(TERRAIN_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_is_deterministic() {
        let field = HeightField::default();
        for &(x, z) in &[(0.0, 0.0), (3.7, -12.9), (1.0e4, 1.0e4), (-250.5, 88.1)] {
            assert_eq!(field.height_at(x, z), field.height_at(x, z));
        }
    }

    #[test]
    fn same_seed_yields_same_terrain() {
        let a = HeightField::new(7);
        let b = HeightField::new(7);
        assert_eq!(a.height_at(12.5, -3.25), b.height_at(12.5, -3.25));
        assert_eq!(a.height_at(-9.0, 41.75), b.height_at(-9.0, 41.75));
    }

    #[test]
    fn amplitude_stays_within_scale() {
        let field = HeightField::default();
        for i in -40..40 {
            for j in -40..40 {
                let h = field.height_at(i as f32 * 1.7, j as f32 * 2.3);
                assert!(h.abs() <= HEIGHT_SCALE * 1.01, "height {h} out of range");
            }
        }
    }
}
