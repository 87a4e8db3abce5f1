//! Seeded 3D gradient noise for planet terrain.
//!
//! Classic improved Perlin noise with the permutation table shuffled by a
//! ChaCha RNG, so the same seed always gives the same field on every
//! platform. Output is roughly in [-1, 1].

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Gradient directions: the 12 cube edge midpoints
const GRADIENTS: [[f32; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// A 3D noise field fixed by its seed
#[derive(Clone)]
pub struct Perlin3 {
    /// Permutation repeated twice so lookups never wrap
    perm: [u8; 512],
}

impl std::fmt::Debug for Perlin3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Perlin3").finish_non_exhaustive()
    }
}

impl Perlin3 {
    pub fn new(seed: u64) -> Self {
        let mut table: Vec<u8> = (0..=255).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        table.shuffle(&mut rng);

        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().enumerate() {
            *slot = table[i & 255];
        }
        Self { perm }
    }

    fn hash(&self, x: usize, y: usize, z: usize) -> usize {
        let p = &self.perm;
        p[p[p[x] as usize + y] as usize + z] as usize
    }

    /// Sample the field
    pub fn sample(&self, x: f32, y: f32, z: f32) -> f32 {
        let (xf, yf, zf) = (x.floor(), y.floor(), z.floor());
        let xi = (xf as i32 & 255) as usize;
        let yi = (yf as i32 & 255) as usize;
        let zi = (zf as i32 & 255) as usize;
        let (x, y, z) = (x - xf, y - yf, z - zf);
        let (u, v, w) = (fade(x), fade(y), fade(z));

        let corner = |dx: usize, dy: usize, dz: usize| {
            let g = GRADIENTS[self.hash(xi + dx, yi + dy, zi + dz) % 12];
            g[0] * (x - dx as f32) + g[1] * (y - dy as f32) + g[2] * (z - dz as f32)
        };

        let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), u);
        let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), u);
        let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), u);
        let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), u);

        lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Stable 64-bit FNV-1a, used to give each planet its own seed
pub fn seed_for(base: u64, key: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = OFFSET ^ base;
    for byte in key.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_field() {
        let a = Perlin3::new(7);
        let b = Perlin3::new(7);
        for i in 0..100 {
            let t = i as f32 * 0.37;
            assert_eq!(a.sample(t, t * 0.5, -t), b.sample(t, t * 0.5, -t));
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = Perlin3::new(1);
        let b = Perlin3::new(2);
        let differs = (0..100).any(|i| {
            let t = i as f32 * 0.37 + 0.1;
            a.sample(t, 0.3, t) != b.sample(t, 0.3, t)
        });
        assert!(differs);
    }

    #[test]
    fn test_zero_at_lattice_points() {
        let noise = Perlin3::new(3);
        assert_eq!(noise.sample(0.0, 0.0, 0.0), 0.0);
        assert_eq!(noise.sample(4.0, -2.0, 9.0), 0.0);
    }

    #[test]
    fn test_output_bounded() {
        let noise = Perlin3::new(11);
        for i in 0..2000 {
            let t = i as f32 * 0.013;
            let n = noise.sample(t * 3.1, t * 1.7 - 4.0, t * 2.3 + 1.0);
            assert!((-1.5..=1.5).contains(&n), "sample {n} out of range");
        }
    }

    #[test]
    fn test_seed_for_is_stable_and_key_dependent() {
        assert_eq!(seed_for(0, "a.mp3"), seed_for(0, "a.mp3"));
        assert_ne!(seed_for(0, "a.mp3"), seed_for(0, "b.mp3"));
        assert_ne!(seed_for(0, "a.mp3"), seed_for(1, "a.mp3"));
    }
}
