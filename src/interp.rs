use glam::DVec3;
use serde::Deserialize;

/// Interpolation kernel used when resampling staggered fields.
///
/// Lerp, Hat and CatmullRom are interpolating (weight 1 at distance 0 and 0 at
/// every other integer), so sampling exactly on a data point reproduces it.
/// Gaussian is a smoothing kernel; normalization still reproduces constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Kernel {
    #[default]
    Lerp,
    Hat,
    Gaussian,
    CatmullRom,
}

impl Kernel {
    /// Support radius in cells. The gather window along each axis is
    /// `floor(x) - radius + 1 ..= floor(x) + radius`.
    pub fn radius(self) -> i64 {
        match self {
            Kernel::Lerp | Kernel::Hat => 1,
            Kernel::Gaussian | Kernel::CatmullRom => 2,
        }
    }

    /// Weight at signed distance `t` (in cells) from a sample point.
    pub fn weight(self, t: f64) -> f64 {
        let a = t.abs();
        match self {
            // Tent. Lerp keeps a direct fast path in `sample`, the weights
            // here only serve the shared gather.
            Kernel::Lerp | Kernel::Hat => (1.0 - a).max(0.0),
            Kernel::Gaussian => {
                if a >= 2.0 {
                    0.0
                } else {
                    (-t * t).exp()
                }
            }
            Kernel::CatmullRom => {
                if a < 1.0 {
                    ((1.5 * a - 2.5) * a) * a + 1.0
                } else if a < 2.0 {
                    ((-0.5 * a + 2.5) * a - 4.0) * a + 2.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl std::str::FromStr for Kernel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lerp" => Ok(Kernel::Lerp),
            "hat" => Ok(Kernel::Hat),
            "gaussian" => Ok(Kernel::Gaussian),
            "catmull-rom" => Ok(Kernel::CatmullRom),
            other => Err(format!(
                "unknown interpolation kernel '{other}' (expected lerp | hat | gaussian | catmull-rom)"
            )),
        }
    }
}

/// Sample `field` (row-major, x fastest, extents `size`) at grid-space
/// position `g` with the given kernel. `g` is expressed in the field's own
/// index space; callers map world positions there first. Components outside
/// `[0, size-1]` are clamped, as are gathered indices, so boundary samples
/// stay well-defined.
pub fn sample(field: &[f64], size: (usize, usize, usize), g: DVec3, kernel: Kernel) -> f64 {
    let (sx, sy, sz) = size;
    let gx = g.x.clamp(0.0, (sx - 1) as f64);
    let gy = g.y.clamp(0.0, (sy - 1) as f64);
    let gz = g.z.clamp(0.0, (sz - 1) as f64);

    if kernel == Kernel::Lerp {
        return trilinear(field, size, gx, gy, gz);
    }

    let r = kernel.radius();
    let bx = gx.floor() as i64;
    let by = gy.floor() as i64;
    let bz = gz.floor() as i64;

    let mut acc = 0.0;
    let mut wsum = 0.0;
    for kk in (bz - r + 1)..=(bz + r) {
        let wz = kernel.weight(gz - kk as f64);
        if wz == 0.0 {
            continue;
        }
        let ck = kk.clamp(0, sz as i64 - 1) as usize;
        for jj in (by - r + 1)..=(by + r) {
            let wy = kernel.weight(gy - jj as f64);
            if wy == 0.0 {
                continue;
            }
            let cj = jj.clamp(0, sy as i64 - 1) as usize;
            let row = (ck * sy + cj) * sx;
            for ii in (bx - r + 1)..=(bx + r) {
                let wx = kernel.weight(gx - ii as f64);
                if wx == 0.0 {
                    continue;
                }
                let ci = ii.clamp(0, sx as i64 - 1) as usize;
                let w = wx * wy * wz;
                acc += w * field[row + ci];
                wsum += w;
            }
        }
    }
    if wsum == 0.0 {
        0.0
    } else {
        acc / wsum
    }
}

/// Direct trilinear gather, the common fast path.
fn trilinear(field: &[f64], size: (usize, usize, usize), gx: f64, gy: f64, gz: f64) -> f64 {
    let (sx, sy, sz) = size;
    let i0 = (gx.floor() as usize).min(sx - 1);
    let j0 = (gy.floor() as usize).min(sy - 1);
    let k0 = (gz.floor() as usize).min(sz - 1);
    let i1 = (i0 + 1).min(sx - 1);
    let j1 = (j0 + 1).min(sy - 1);
    let k1 = (k0 + 1).min(sz - 1);
    let tx = gx - i0 as f64;
    let ty = gy - j0 as f64;
    let tz = gz - k0 as f64;

    let at = |i: usize, j: usize, k: usize| field[(k * sy + j) * sx + i];

    let c00 = at(i0, j0, k0) * (1.0 - tx) + at(i1, j0, k0) * tx;
    let c10 = at(i0, j1, k0) * (1.0 - tx) + at(i1, j1, k0) * tx;
    let c01 = at(i0, j0, k1) * (1.0 - tx) + at(i1, j0, k1) * tx;
    let c11 = at(i0, j1, k1) * (1.0 - tx) + at(i1, j1, k1) * tx;
    let c0 = c00 * (1.0 - ty) + c10 * ty;
    let c1 = c01 * (1.0 - ty) + c11 * ty;
    c0 * (1.0 - tz) + c1 * tz
}
