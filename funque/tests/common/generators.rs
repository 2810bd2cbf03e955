//! Deterministic synthetic frames for funque tests.
//!
//! Everything is driven by an LCG PRNG so inputs are identical across
//! platforms.

use funque::{Frame, Plane};

// ============================================================================
// LCG PRNG
// ============================================================================

/// LCG pseudo-random number generator (deterministic)
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub const fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u8(&mut self) -> u8 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((self.state >> 33) & 0xFF) as u8
    }

    /// Uniform in `[0, 1]`.
    pub fn next_unit(&mut self) -> f64 {
        f64::from(self.next_u8()) / 255.0
    }
}

// ============================================================================
// Planes
// ============================================================================

/// Diagonal ramp in `[offset, 0.9 + offset]`, clipped to `[0, 1]`.
pub fn ramp(width: usize, height: usize, offset: f64) -> Plane {
    let wx = 0.5 / (width.max(2) - 1) as f64;
    let wy = 0.4 / (height.max(2) - 1) as f64;
    Plane::from_fn(width, height, |x, y| {
        (x as f64 * wx + y as f64 * wy + offset).clamp(0.0, 1.0)
    })
}

/// Smooth sinusoidal texture with mild noise; `phase` shifts the pattern.
pub fn texture(width: usize, height: usize, phase: f64, seed: u64) -> Plane {
    let mut rng = Lcg::new(seed);
    Plane::from_fn(width, height, |x, y| {
        let base = 0.5
            + 0.2 * ((x as f64 + phase) * 0.45).sin() * ((y as f64) * 0.3 + phase * 0.5).cos()
            + 0.1 * ((x + y) as f64 * 0.12).sin();
        (base + 0.04 * (rng.next_unit() - 0.5)).clamp(0.0, 1.0)
    })
}

/// Adds LCG noise of the given amplitude and clips to `[0, 1]`.
pub fn add_noise(plane: &Plane, amplitude: f64, seed: u64) -> Plane {
    let mut rng = Lcg::new(seed);
    Plane::from_fn(plane.width(), plane.height(), |x, y| {
        (plane.get(x, y) + amplitude * (rng.next_unit() - 0.5)).clamp(0.0, 1.0)
    })
}

// ============================================================================
// Sequences
// ============================================================================

/// Luma-only frames with a pattern drifting one sample per frame.
pub fn luma_sequence(width: usize, height: usize, frames: usize, seed: u64) -> Vec<Frame> {
    (0..frames)
        .map(|i| Frame::luma(texture(width, height, i as f64, seed)))
        .collect()
}

/// 4:2:0 frames with drifting luma and smooth chroma.
pub fn yuv_sequence(width: usize, height: usize, frames: usize, seed: u64) -> Vec<Frame> {
    let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
    (0..frames)
        .map(|i| {
            let phase = i as f64;
            Frame::yuv(
                texture(width, height, phase, seed),
                texture(cw, ch, phase * 0.5, seed ^ 0x55),
                texture(cw, ch, phase * 0.25 + 3.0, seed ^ 0xAA),
            )
        })
        .collect()
}

/// Noisy copy of every plane of every frame.
pub fn distort(frames: &[Frame], amplitude: f64, seed: u64) -> Vec<Frame> {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| {
            let s = seed.wrapping_add(i as u64 * 7919);
            let y = add_noise(frame.plane(funque::Channel::Y).unwrap(), amplitude, s);
            match (frame.plane(funque::Channel::U), frame.plane(funque::Channel::V)) {
                (Some(u), Some(v)) => Frame::yuv(
                    y,
                    add_noise(u, amplitude, s ^ 1),
                    add_noise(v, amplitude, s ^ 2),
                ),
                _ => Frame::luma(y),
            }
        })
        .collect()
}

// ============================================================================
// Packed 8-bit buffers
// ============================================================================

/// Packed 8-bit 4:2:0 frames (`Y`, then `U`, then `V`) with a moving
/// gradient and LCG noise.
pub fn yuv420_bytes(width: usize, height: usize, frames: usize, seed: u64) -> Vec<Vec<u8>> {
    let (cw, ch) = (width.div_ceil(2), height.div_ceil(2));
    let mut rng = Lcg::new(seed);
    (0..frames)
        .map(|i| {
            let mut data = Vec::with_capacity(width * height + 2 * cw * ch);
            for y in 0..height {
                for x in 0..width {
                    let base = ((x + 2 * y + 3 * i) * 255 / (width + 2 * height + 3 * frames)) as u8;
                    data.push(base.saturating_add(rng.next_u8() / 16));
                }
            }
            for _ in 0..2 * cw * ch {
                data.push(112 + rng.next_u8() / 8);
            }
            data
        })
        .collect()
}
