use glam::Vec3A;

/// Number of octaves summed by [`GradientNoise::noise3`].
pub const NOISE_OCTAVES: u32 = 3;

/// Seeded 3D gradient (Perlin) noise.
///
/// The permutation table is the only state; it is built once from the seed
/// and only read afterward, so a shared reference can be sampled from any
/// number of threads.
#[derive(Clone)]
pub struct GradientNoise {
    perm: [u8; 512],
}

impl std::fmt::Debug for GradientNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradientNoise").finish_non_exhaustive()
    }
}

impl GradientNoise {
    pub fn new(seed: u32) -> Self {
        let mut table = [0u8; 256];
        for (i, t) in table.iter_mut().enumerate() {
            *t = i as u8;
        }

        // Fisher-Yates with a xorshift stream, so every seed maps to one table.
        let mut state = seed as u64 ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 1;
        }
        for i in (1..table.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            table.swap(i, j);
        }

        let mut perm = [0u8; 512];
        for (i, p) in perm.iter_mut().enumerate() {
            *p = table[i & 255];
        }
        Self { perm }
    }

    /// Single octave of noise, roughly in `[-1, 1]`. Zero at every lattice point.
    pub fn sample(&self, p: Vec3A) -> f32 {
        let floor = p.floor();
        let xi = (floor.x as i32 & 255) as usize;
        let yi = (floor.y as i32 & 255) as usize;
        let zi = (floor.z as i32 & 255) as usize;
        let f = p - floor;

        let u = fade(f.x);
        let v = fade(f.y);
        let w = fade(f.z);

        let perm = &self.perm;
        let a = perm[xi] as usize + yi;
        let aa = perm[a] as usize + zi;
        let ab = perm[a + 1] as usize + zi;
        let b = perm[xi + 1] as usize + yi;
        let ba = perm[b] as usize + zi;
        let bb = perm[b + 1] as usize + zi;

        let (x, y, z) = (f.x, f.y, f.z);
        lerp(
            lerp(
                lerp(grad(perm[aa], x, y, z), grad(perm[ba], x - 1.0, y, z), u),
                lerp(
                    grad(perm[ab], x, y - 1.0, z),
                    grad(perm[bb], x - 1.0, y - 1.0, z),
                    u,
                ),
                v,
            ),
            lerp(
                lerp(
                    grad(perm[aa + 1], x, y, z - 1.0),
                    grad(perm[ba + 1], x - 1.0, y, z - 1.0),
                    u,
                ),
                lerp(
                    grad(perm[ab + 1], x, y - 1.0, z - 1.0),
                    grad(perm[bb + 1], x - 1.0, y - 1.0, z - 1.0),
                    u,
                ),
                v,
            ),
            w,
        )
    }

    /// Sum of [`NOISE_OCTAVES`] octaves, each at twice the frequency and half
    /// the amplitude of the previous one.
    pub fn noise3(&self, p: Vec3A) -> f32 {
        let mut value = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        for _ in 0..NOISE_OCTAVES {
            value += amplitude * self.sample(p * frequency);
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        value
    }
}

#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

#[inline]
fn grad(hash: u8, x: f32, y: f32, z: f32) -> f32 {
    let h = hash & 15;
    let u = if h < 8 { x } else { y };
    let v = if h < 4 {
        y
    } else if h == 12 || h == 14 {
        x
    } else {
        z
    };
    let u = if h & 1 == 0 { u } else { -u };
    let v = if h & 2 == 0 { v } else { -v };
    u + v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_on_lattice_points() {
        let noise = GradientNoise::new(7);
        for p in [
            Vec3A::ZERO,
            Vec3A::new(3.0, -2.0, 5.0),
            Vec3A::new(-17.0, 4.0, 250.0),
        ] {
            assert_eq!(noise.sample(p), 0.0);
        }
    }

    #[test]
    fn bounded_and_deterministic() {
        let a = GradientNoise::new(42);
        let b = GradientNoise::new(42);
        for i in 0..1000 {
            let t = i as f32;
            let p = Vec3A::new(t * 0.37, t * 0.11 - 20.0, t * 0.73);
            let n = a.noise3(p);
            assert_eq!(n, b.noise3(p));
            assert!(n.abs() <= 1.75 * 1.5, "noise3 out of range: {n}");
        }
    }

    #[test]
    fn seeds_change_the_field() {
        let a = GradientNoise::new(1);
        let b = GradientNoise::new(2);
        let p = Vec3A::new(0.3, 1.7, 2.2);
        let differs = (0..16).any(|i| {
            let q = p + Vec3A::splat(i as f32 * 0.61);
            a.sample(q) != b.sample(q)
        });
        assert!(differs);
    }
}
