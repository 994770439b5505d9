//! Binary checkpoint formats.
//!
//! All values are little-endian. A network record stores one network at one
//! point in simulated time; the parameter header is written once per output
//! directory and describes every record in it.

use std::io::{self, Read, Write};

use crate::compute::Pattern;
use crate::schema::{
    MutationScheme, NetworkInit, NetworkType, Parameters, PatternInit, RobustParameters,
    SchemeError,
};

/// Current parameter header version.
pub const PARAMETER_VERSION: u16 = 6;

/// Older header version whose time slot holds a copy of the error threshold.
pub const LEGACY_PARAMETER_VERSION: u16 = 5;

/// Errors reading or writing checkpoints.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Unsupported parameter header version {0}")]
    UnsupportedVersion(u16),
    #[error(transparent)]
    Scheme(#[from] SchemeError),
    #[error("Stored pattern is {got:?} but the layout expects {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("Stored edge {src} -> {tar} exceeds network size {total}")]
    EdgeOutOfRange { src: usize, tar: usize, total: usize },
}

fn read_array<R: Read, const N: usize>(r: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u16<R: Read>(r: &mut R) -> io::Result<u16> {
    read_array(r).map(u16::from_le_bytes)
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    read_array(r).map(u32::from_le_bytes)
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    read_array(r).map(u64::from_le_bytes)
}

fn read_f64<R: Read>(r: &mut R) -> io::Result<f64> {
    read_array(r).map(f64::from_le_bytes)
}

/// One network at one point in simulated time.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkRecord {
    pub iteration: u64,
    /// Seed of the run that produced the network.
    pub seed: u32,
    /// Connectivity the run was initialised with.
    pub connectivity: f64,
    pub flow_error: f64,
    /// Links ordered by source, then target.
    pub edges: Vec<(u32, u32)>,
    /// `nodes_out x nodes_in` ideal pattern.
    pub ideal: Pattern,
    /// Present for robust network types only.
    pub robustness: Option<f64>,
}

impl NetworkRecord {
    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        8 + 4
            + 8
            + 8
            + 4
            + self.edges.len() * 8
            + self.ideal.len() * 8
            + self.robustness.map_or(0, |_| 8)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.iteration.to_le_bytes())?;
        w.write_all(&self.seed.to_le_bytes())?;
        w.write_all(&self.connectivity.to_le_bytes())?;
        w.write_all(&self.flow_error.to_le_bytes())?;
        w.write_all(&(self.edges.len() as u32).to_le_bytes())?;
        for &(src, tar) in &self.edges {
            w.write_all(&src.to_le_bytes())?;
            w.write_all(&tar.to_le_bytes())?;
        }
        // row-major
        for value in self.ideal.iter() {
            w.write_all(&value.to_le_bytes())?;
        }
        if let Some(robustness) = self.robustness {
            w.write_all(&robustness.to_le_bytes())?;
        }
        Ok(())
    }

    /// Read a record of a network with the given pattern `shape`
    /// (`nodes_out`, `nodes_in`). `robust` selects whether a robustness
    /// value follows the pattern.
    pub fn read_from<R: Read>(r: &mut R, shape: (usize, usize), robust: bool) -> io::Result<Self> {
        let iteration = read_u64(r)?;
        let seed = read_u32(r)?;
        let connectivity = read_f64(r)?;
        let flow_error = read_f64(r)?;

        let edge_count = read_u32(r)? as usize;
        let mut edges = Vec::with_capacity(edge_count.min(1 << 16));
        for _ in 0..edge_count {
            let src = read_u32(r)?;
            let tar = read_u32(r)?;
            edges.push((src, tar));
        }

        let mut values = Vec::with_capacity(shape.0 * shape.1);
        for _ in 0..shape.0 * shape.1 {
            values.push(read_f64(r)?);
        }
        let ideal = Pattern::from_shape_vec(shape, values)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let robustness = if robust { Some(read_f64(r)?) } else { None };

        Ok(Self {
            iteration,
            seed,
            connectivity,
            flow_error,
            edges,
            ideal,
            robustness,
        })
    }
}

/// Contents of the 8-byte slot after the annealing factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeSlot {
    /// Maximum evolution time (current format).
    MaxTime(u64),
    /// Version 5 headers repeated the error threshold here.
    LegacyThreshold(f64),
}

/// Parameters shared by every network record in an output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterHeader {
    pub nodes_in: u16,
    pub nodes_middle: u16,
    pub nodes_out: u16,
    pub activated_k: u16,
    pub error_threshold: f64,
    pub annealing_factor: f64,
    pub time_slot: TimeSlot,
    pub snapshots: u16,
    /// Connectivity used by every run of the directory.
    pub connectivity: f64,
    pub add_probability: f64,
    pub network_type: NetworkType,
    pub network_init: NetworkInit,
    pub pattern_init: PatternInit,
    pub mutation: MutationScheme,
    /// Present for robust network types only.
    pub robust: Option<RobustParameters>,
}

impl ParameterHeader {
    /// Header for runs of `params` wired with `connectivity`.
    ///
    /// `connectivity` is the resolved value, which differs from the
    /// configured one when that was left unset.
    pub fn from_parameters(params: &Parameters, connectivity: f64) -> Self {
        Self {
            nodes_in: params.nodes_in,
            nodes_middle: params.nodes_middle,
            nodes_out: params.nodes_out,
            activated_k: params.activated_k,
            error_threshold: params.error_threshold,
            annealing_factor: params.annealing_factor,
            time_slot: TimeSlot::MaxTime(params.max_time),
            snapshots: params.snapshots,
            connectivity,
            add_probability: params.add_probability,
            network_type: params.network_type,
            network_init: params.network_init,
            pattern_init: params.pattern_init,
            mutation: params.mutation,
            robust: params
                .network_type
                .is_robust()
                .then(|| params.robust.clone()),
        }
    }

    /// Format version implied by the time slot.
    pub fn version(&self) -> u16 {
        match self.time_slot {
            TimeSlot::MaxTime(_) => PARAMETER_VERSION,
            TimeSlot::LegacyThreshold(_) => LEGACY_PARAMETER_VERSION,
        }
    }

    pub fn max_time(&self) -> Option<u64> {
        match self.time_slot {
            TimeSlot::MaxTime(t) => Some(t),
            TimeSlot::LegacyThreshold(_) => None,
        }
    }

    /// Shape of the patterns in matching network records.
    pub fn pattern_shape(&self) -> (usize, usize) {
        (self.nodes_out as usize, self.nodes_in as usize)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.version().to_le_bytes())?;
        w.write_all(&self.nodes_in.to_le_bytes())?;
        w.write_all(&self.nodes_middle.to_le_bytes())?;
        w.write_all(&self.nodes_out.to_le_bytes())?;
        w.write_all(&self.activated_k.to_le_bytes())?;
        w.write_all(&self.error_threshold.to_le_bytes())?;
        w.write_all(&self.annealing_factor.to_le_bytes())?;
        match self.time_slot {
            TimeSlot::MaxTime(t) => w.write_all(&t.to_le_bytes())?,
            TimeSlot::LegacyThreshold(v) => w.write_all(&v.to_le_bytes())?,
        }
        w.write_all(&self.snapshots.to_le_bytes())?;
        w.write_all(&self.connectivity.to_le_bytes())?;
        w.write_all(&self.add_probability.to_le_bytes())?;
        w.write_all(&self.network_type.code().to_le_bytes())?;
        w.write_all(&self.network_init.code().to_le_bytes())?;
        w.write_all(&self.pattern_init.code().to_le_bytes())?;
        w.write_all(&self.mutation.code().to_le_bytes())?;
        if let Some(robust) = &self.robust {
            w.write_all(&robust.min_robustness.to_le_bytes())?;
            w.write_all(&robust.robust_threshold.to_le_bytes())?;
            w.write_all(&robust.robust_factor.to_le_bytes())?;
        }
        if let Some(level) = self.network_type.noise_level() {
            w.write_all(&level.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, CheckpointError> {
        let version = read_u16(r)?;
        if version != PARAMETER_VERSION && version != LEGACY_PARAMETER_VERSION {
            return Err(CheckpointError::UnsupportedVersion(version));
        }

        let nodes_in = read_u16(r)?;
        let nodes_middle = read_u16(r)?;
        let nodes_out = read_u16(r)?;
        let activated_k = read_u16(r)?;
        let error_threshold = read_f64(r)?;
        let annealing_factor = read_f64(r)?;

        let slot: [u8; 8] = read_array(r)?;
        let time_slot = if version == LEGACY_PARAMETER_VERSION {
            let value = f64::from_le_bytes(slot);
            log::warn!(
                "Version {} parameter header: maximum evolution time was not stored",
                version
            );
            TimeSlot::LegacyThreshold(value)
        } else {
            TimeSlot::MaxTime(u64::from_le_bytes(slot))
        };

        let snapshots = read_u16(r)?;
        let connectivity = read_f64(r)?;
        let add_probability = read_f64(r)?;
        let network_code = read_u16(r)?;
        let network_init = NetworkInit::from_code(read_u16(r)?)?;
        let pattern_init = PatternInit::from_code(read_u16(r)?)?;
        let mutation = MutationScheme::from_code(read_u16(r)?)?;

        // validate the code before reading any variant-specific tail
        let network_type = NetworkType::from_code(network_code, 0.0)?;
        let robust = if network_type.is_robust() {
            Some(RobustParameters {
                min_robustness: read_f64(r)?,
                robust_threshold: read_f64(r)?,
                robust_factor: read_f64(r)?,
            })
        } else {
            None
        };
        let network_type = if network_type.noise_level().is_some() {
            NetworkType::NoiseRobust {
                noise_level: read_f64(r)?,
            }
        } else {
            network_type
        };

        Ok(Self {
            nodes_in,
            nodes_middle,
            nodes_out,
            activated_k,
            error_threshold,
            annealing_factor,
            time_slot,
            snapshots,
            connectivity,
            add_probability,
            network_type,
            network_init,
            pattern_init,
            mutation,
            robust,
        })
    }
}
