use std::mem;

use rayon::prelude::*;

use crate::error::ParameterError;
use crate::grid2::Grid2D;

// downward acceleration driving water through the pipes
pub const GRAVITY: f32 = 9.81;

// neighbor offsets and the flux component pointing at each: x-1, x+1,
// y-1, y+1
const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const XM: usize = 0;
const XP: usize = 1;
const YM: usize = 2;
const YP: usize = 3;
// direction pointing back at a cell from the neighbor on that side
const OPPOSITE: [usize; 4] = [XP, XM, YP, YM];

pub(crate) fn positive(name: &'static str, value: f32) -> Result<(), ParameterError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ParameterError::NonPositive { name, value })
    }
}

pub(crate) fn non_negative(name: &'static str, value: f32) -> Result<(), ParameterError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ParameterError::Negative { name, value })
    }
}

// Parameters of the virtual-pipe shallow-water model. pipe_area and
// pipe_length shape the flow acceleration, the dissolve/deposition pair
// exchanges material between the bed and the suspended sediment, and
// tilt_limit keeps the carry capacity from collapsing on flat ground.
#[derive(Debug, Clone, Copy)]
pub struct HydraulicParams {
    pub pipe_area: f32,
    pub pipe_length: f32,
    pub max_sediment_capacity: f32,
    pub max_erosion_depth: f32,
    pub dissolve_speed: f32,
    pub deposition_speed: f32,
    pub evaporation: f32,
    pub tilt_limit: f32,
    pub dt: f32,
    pub cycles_per_iteration: u32,
}

impl HydraulicParams {
    fn validate(&self) -> Result<(), ParameterError> {
        positive("pipe_area", self.pipe_area)?;
        positive("pipe_length", self.pipe_length)?;
        positive("max_sediment_capacity", self.max_sediment_capacity)?;
        positive("max_erosion_depth", self.max_erosion_depth)?;
        positive("dt", self.dt)?;
        non_negative("dissolve_speed", self.dissolve_speed)?;
        non_negative("deposition_speed", self.deposition_speed)?;
        non_negative("evaporation", self.evaporation)?;
        non_negative("tilt_limit", self.tilt_limit)?;
        if self.cycles_per_iteration == 0 {
            return Err(ParameterError::ZeroCycles);
        }
        if self.evaporation * self.dt >= 1.0 {
            return Err(ParameterError::EvaporationTooLarge(self.evaporation * self.dt));
        }
        Ok(())
    }
}

// Hydraulic erosion: rainfall fills a water layer whose pipe outflow
// carves the bed, suspends sediment, advects it along the flow and drops
// it where the water slows down.
pub struct HydraulicErosion2D {
    params: HydraulicParams,
}

impl HydraulicErosion2D {
    pub fn new(params: HydraulicParams) -> Self {
        Self { params }
    }

    // Start a run over a copy of the supplied fields; the caller's grids
    // are never touched. Parameters are checked before any working state
    // is allocated, so a failed call leaves nothing behind.
    pub fn simulate(
        &self,
        terrain: &Grid2D,
        rain: &Grid2D,
        iterations: u32,
    ) -> Result<HydraulicSimulation, ParameterError> {
        self.params.validate()?;
        if terrain.size() != rain.size() {
            return Err(ParameterError::FieldSizeMismatch(
                terrain.size(),
                rain.size(),
            ));
        }

        let size = terrain.size();
        tracing::debug!(size, iterations, "starting hydraulic erosion");

        let total = size * size;
        Ok(HydraulicSimulation {
            size,
            params: self.params,
            remaining: iterations,
            terrain: terrain.to_buffer(),
            rain: rain.to_buffer(),
            water: vec![0.0; total],
            sediment: vec![0.0; total],
            flux: vec![[0.0; 4]; total],
            velocity: vec![[0.0; 2]; total],
            scratch: vec![0.0; total],
            flux_next: vec![[0.0; 4]; total],
        })
    }
}

// One yielded simulation step.
pub struct HydraulicSnapshot {
    pub terrain: Grid2D,
    pub water: Grid2D,
    pub sediment: Grid2D,
}

// A running simulation: a lazy, finite, forward-only sequence of
// snapshots. Consuming it advances the internal state irreversibly; the
// working buffers live inside this struct and drop with it, so a
// partially-consumed run releases everything on scope exit.
pub struct HydraulicSimulation {
    size: usize,
    params: HydraulicParams,
    remaining: u32,
    terrain: Vec<f32>,
    rain: Vec<f32>,
    water: Vec<f32>,
    sediment: Vec<f32>,
    flux: Vec<[f32; 4]>,
    velocity: Vec<[f32; 2]>,
    // per-pass output buffer; each pass fills it from the previous pass's
    // completed state, then swaps it in (no cell ever reads a same-pass
    // write, so sweep order cannot matter)
    scratch: Vec<f32>,
    flux_next: Vec<[f32; 4]>,
}

// bilinear fetch with edge clamping, for the advection back-trace
fn sample_clamped(buf: &[f32], size: usize, x: f32, y: f32) -> f32 {
    let max = (size - 1) as f32;
    let x = x.clamp(0.0, max);
    let y = y.clamp(0.0, max);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(size - 1);
    let y1 = (y0 + 1).min(size - 1);
    let tx = x - x0 as f32;
    let ty = y - y0 as f32;

    buf[x0 * size + y0] * (1.0 - tx) * (1.0 - ty)
        + buf[x1 * size + y0] * tx * (1.0 - ty)
        + buf[x0 * size + y1] * (1.0 - tx) * ty
        + buf[x1 * size + y1] * tx * ty
}

impl HydraulicSimulation {
    fn cycle(&mut self) {
        self.apply_rain();
        self.update_flux();
        self.update_water();
        self.update_velocity();
        self.erode_deposit();
        self.advect_sediment();
        self.evaporate();
    }

    fn apply_rain(&mut self) {
        let dt = self.params.dt;
        let rain = &self.rain;
        self.water
            .par_iter_mut()
            .zip(rain.par_iter())
            .for_each(|(w, r)| *w += dt * r);
    }

    // outflow flux per direction, accelerated by the total-height drop and
    // scaled back so a cell never ships more water than it holds
    fn update_flux(&mut self) {
        let size = self.size;
        let p = self.params;
        let accel = p.dt * p.pipe_area * GRAVITY / p.pipe_length;
        let area = p.pipe_length * p.pipe_length;
        let terrain = &self.terrain;
        let water = &self.water;
        let flux = &self.flux;

        self.flux_next.par_iter_mut().enumerate().for_each(|(i, out)| {
            let x = (i / size) as isize;
            let y = (i % size) as isize;
            let h = terrain[i] + water[i];
            let mut f = [0.0f32; 4];
            for (d, &(dx, dy)) in NEIGHBORS.iter().enumerate() {
                let nx = x + dx;
                let ny = y + dy;
                // the boundary is closed: flux off the grid stays zero
                if nx < 0 || ny < 0 || nx >= size as isize || ny >= size as isize {
                    continue;
                }
                let ni = nx as usize * size + ny as usize;
                let dh = h - terrain[ni] - water[ni];
                f[d] = (flux[i][d] + accel * dh).max(0.0);
            }
            let total = f[0] + f[1] + f[2] + f[3];
            let available = water[i] * area;
            if total > 0.0 && total * p.dt > available {
                let k = available / (total * p.dt);
                for v in &mut f {
                    *v *= k;
                }
            }
            *out = f;
        });

        mem::swap(&mut self.flux, &mut self.flux_next);
    }

    fn update_water(&mut self) {
        let size = self.size;
        let p = self.params;
        let area = p.pipe_length * p.pipe_length;
        let water = &self.water;
        let flux = &self.flux;

        self.scratch.par_iter_mut().enumerate().for_each(|(i, out)| {
            let x = (i / size) as isize;
            let y = (i % size) as isize;
            let outflow: f32 = flux[i].iter().sum();
            let mut inflow = 0.0;
            for (d, &(dx, dy)) in NEIGHBORS.iter().enumerate() {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || ny < 0 || nx >= size as isize || ny >= size as isize {
                    continue;
                }
                let ni = nx as usize * size + ny as usize;
                inflow += flux[ni][OPPOSITE[d]];
            }
            // the outflow limiter keeps this non-negative up to float
            // residue; clamp the residue away
            *out = (water[i] + p.dt * (inflow - outflow) / area).max(0.0);
        });

        mem::swap(&mut self.water, &mut self.scratch);
        // scratch now holds the pre-update depths; update_velocity averages
        // them with the new ones
    }

    fn update_velocity(&mut self) {
        let size = self.size;
        let p = self.params;
        let flux = &self.flux;
        let water = &self.water;
        let water_prev = &self.scratch;

        self.velocity.par_iter_mut().enumerate().for_each(|(i, out)| {
            let x = i / size;
            let y = i % size;

            // net volume crossing the cell along each axis, averaged over
            // the two faces
            let in_xm = if x > 0 { flux[i - size][XP] } else { 0.0 };
            let in_xp = if x + 1 < size { flux[i + size][XM] } else { 0.0 };
            let net_x = (in_xm - flux[i][XM] + flux[i][XP] - in_xp) / 2.0;

            let in_ym = if y > 0 { flux[i - 1][YP] } else { 0.0 };
            let in_yp = if y + 1 < size { flux[i + 1][YM] } else { 0.0 };
            let net_y = (in_ym - flux[i][YM] + flux[i][YP] - in_yp) / 2.0;

            let depth = (water_prev[i] + water[i]) / 2.0;
            *out = if depth > 1e-6 {
                [
                    net_x / (p.pipe_length * depth),
                    net_y / (p.pipe_length * depth),
                ]
            } else {
                [0.0, 0.0]
            };
        });
    }

    // exchange material between the bed and the suspended load depending
    // on how much the local flow can carry
    fn erode_deposit(&mut self) {
        let size = self.size;
        let p = self.params;
        let terrain = &self.terrain;
        let water = &self.water;
        let velocity = &self.velocity;

        self.scratch
            .par_iter_mut()
            .zip(self.sediment.par_iter_mut())
            .enumerate()
            .for_each(|(i, (bed, s))| {
                let x = (i / size) as isize;
                let y = (i % size) as isize;
                let max = (size - 1) as isize;
                let cell = |xx: isize, yy: isize| {
                    terrain[(xx.clamp(0, max) * size as isize + yy.clamp(0, max)) as usize]
                };

                let gx = (cell(x + 1, y) - cell(x - 1, y)) / (2.0 * p.pipe_length);
                let gy = (cell(x, y + 1) - cell(x, y - 1)) / (2.0 * p.pipe_length);
                let grade = (gx * gx + gy * gy).sqrt();
                let sin_alpha = grade / (1.0 + grade * grade).sqrt();

                let speed = (velocity[i][0] * velocity[i][0]
                    + velocity[i][1] * velocity[i][1])
                    .sqrt();
                // deep water shields the bed from further carving
                let shield = (1.0 - water[i] / p.max_erosion_depth).clamp(0.0, 1.0);
                let capacity =
                    p.max_sediment_capacity * sin_alpha.max(p.tilt_limit) * speed * shield;

                let s0 = *s;
                if capacity > s0 {
                    let amount = p.dt * p.dissolve_speed * (capacity - s0);
                    *bed = terrain[i] - amount;
                    *s = s0 + amount;
                } else {
                    let amount = p.dt * p.deposition_speed * (s0 - capacity);
                    *bed = terrain[i] + amount;
                    *s = s0 - amount;
                }
            });

        mem::swap(&mut self.terrain, &mut self.scratch);
    }

    // semi-Lagrangian transport: each cell fetches the sediment that the
    // flow carries into it
    fn advect_sediment(&mut self) {
        let size = self.size;
        let p = self.params;
        let sediment = &self.sediment;
        let velocity = &self.velocity;

        self.scratch.par_iter_mut().enumerate().for_each(|(i, out)| {
            let x = (i / size) as f32;
            let y = (i % size) as f32;
            let px = x - velocity[i][0] * p.dt / p.pipe_length;
            let py = y - velocity[i][1] * p.dt / p.pipe_length;
            *out = sample_clamped(sediment, size, px, py);
        });

        mem::swap(&mut self.sediment, &mut self.scratch);
    }

    fn evaporate(&mut self) {
        let keep = (1.0 - self.params.evaporation * self.params.dt).max(0.0);
        self.water.par_iter_mut().for_each(|w| *w *= keep);
    }
}

impl Iterator for HydraulicSimulation {
    type Item = HydraulicSnapshot;

    fn next(&mut self) -> Option<HydraulicSnapshot> {
        if self.remaining == 0 {
            return None;
        }
        for _ in 0..self.params.cycles_per_iteration {
            self.cycle();
        }
        self.remaining -= 1;

        Some(HydraulicSnapshot {
            terrain: Grid2D::from_parts(self.terrain.clone(), self.size),
            water: Grid2D::from_parts(self.water.clone(), self.size),
            sediment: Grid2D::from_parts(self.sediment.clone(), self.size),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for HydraulicSimulation {}

#[cfg(test)]
mod tests {
    use super::{HydraulicErosion2D, HydraulicParams};
    use crate::error::ParameterError;
    use crate::grid2::Grid2D;

    fn params() -> HydraulicParams {
        HydraulicParams {
            pipe_area: 1.0,
            pipe_length: 1.0,
            max_sediment_capacity: 1.0,
            max_erosion_depth: 1.0,
            dissolve_speed: 0.1,
            deposition_speed: 0.1,
            evaporation: 0.02,
            tilt_limit: 0.1,
            dt: 0.02,
            cycles_per_iteration: 1,
        }
    }

    #[test]
    fn hydraulic2_rejects_bad_parameters() {
        let terrain = Grid2D::zeros(8);
        let rain = Grid2D::zeros(8);

        let mut p = params();
        p.pipe_area = 0.0;
        assert!(matches!(
            HydraulicErosion2D::new(p).simulate(&terrain, &rain, 1),
            Err(ParameterError::NonPositive { name: "pipe_area", .. })
        ));

        let mut p = params();
        p.dt = -0.5;
        assert!(matches!(
            HydraulicErosion2D::new(p).simulate(&terrain, &rain, 1),
            Err(ParameterError::NonPositive { name: "dt", .. })
        ));

        let mut p = params();
        p.cycles_per_iteration = 0;
        assert!(matches!(
            HydraulicErosion2D::new(p).simulate(&terrain, &rain, 1),
            Err(ParameterError::ZeroCycles)
        ));
    }

    #[test]
    fn hydraulic2_rejects_mismatched_fields() {
        let terrain = Grid2D::zeros(8);
        let rain = Grid2D::zeros(16);
        assert!(matches!(
            HydraulicErosion2D::new(params()).simulate(&terrain, &rain, 1),
            Err(ParameterError::FieldSizeMismatch(8, 16))
        ));
    }

    #[test]
    fn hydraulic2_yields_exactly_iterations_snapshots() {
        let terrain = Grid2D::gaussian(64, (1.0, 1.0));
        let rain = Grid2D::ones(64).mul_scalar(0.01);
        let sim = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 10)
            .unwrap();
        assert_eq!(sim.len(), 10);
        assert_eq!(sim.count(), 10);
    }

    #[test]
    fn hydraulic2_water_stays_finite_and_bounded() {
        let terrain = Grid2D::gaussian(64, (1.0, 1.0));
        let rain = Grid2D::ones(64).mul_scalar(0.01);
        let p = params();
        let sim = HydraulicErosion2D::new(p)
            .simulate(&terrain, &rain, 10)
            .unwrap();

        let last = sim.last().unwrap();
        for &w in last.water.as_slice() {
            assert!(w.is_finite());
            assert!(w >= 0.0);
        }
        // the boundary is closed, so water can only enter through rain and
        // leave through evaporation
        let injected = 10.0 * p.dt * rain.sum();
        assert!(last.water.sum() <= injected + 1e-3);
    }

    #[test]
    fn hydraulic2_inputs_are_copied() {
        let terrain = Grid2D::gaussian(32, (1.0, 1.0));
        let rain = Grid2D::ones(32).mul_scalar(0.01);
        let before = terrain.clone();
        let sim = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 5)
            .unwrap();
        let _ = sim.last();
        assert_eq!(terrain, before);
    }

    #[test]
    fn hydraulic2_abandoning_early_is_clean() {
        let terrain = Grid2D::gaussian(32, (1.0, 1.0));
        let rain = Grid2D::ones(32).mul_scalar(0.01);
        let sim = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 10)
            .unwrap();
        // take 3 of 10 and drop the rest; the working buffers go with it
        assert_eq!(sim.take(3).count(), 3);
    }

    #[test]
    fn hydraulic2_determinism() {
        let terrain = Grid2D::gaussian(32, (1.0, 1.0));
        let rain = Grid2D::ones(32).mul_scalar(0.01);
        let a = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 4)
            .unwrap()
            .last()
            .unwrap();
        let b = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 4)
            .unwrap()
            .last()
            .unwrap();
        assert_eq!(a.terrain.to_buffer(), b.terrain.to_buffer());
        assert_eq!(a.water.to_buffer(), b.water.to_buffer());
        assert_eq!(a.sediment.to_buffer(), b.sediment.to_buffer());
    }

    #[test]
    fn hydraulic2_erosion_carves_a_slope() {
        // a steep gaussian under steady rain must lose material somewhere
        let terrain = Grid2D::gaussian(32, (0.2, 0.2)).mul_scalar(10.0);
        let rain = Grid2D::ones(32).mul_scalar(0.05);
        let last = HydraulicErosion2D::new(params())
            .simulate(&terrain, &rain, 20)
            .unwrap()
            .last()
            .unwrap();
        let lowered = terrain
            .as_slice()
            .iter()
            .zip(last.terrain.as_slice())
            .any(|(&a, &b)| b < a - 1e-6);
        assert!(lowered);
    }
}
