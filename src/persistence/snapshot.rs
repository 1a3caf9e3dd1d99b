use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::state::SimulationState;

/// Version of the snapshot format
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Magic bytes to identify snapshot files
const SNAPSHOT_MAGIC: [u8; 4] = *b"FLSN";

pub const SNAPSHOT_EXTENSION: &str = "flsnap";

/// Fixed-size header in front of the bincode payload
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    magic: [u8; 4],
    version: u32,
    payload_len: u64,
    checksum: u32,
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Write `data` to a temporary sibling, then rename over `path`
pub fn atomic_write(path: &Path, data: &[u8]) -> EngineResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn encode(state: &SimulationState) -> EngineResult<Vec<u8>> {
    let payload = bincode::serialize(state)?;
    let header = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        version: SNAPSHOT_FORMAT_VERSION,
        payload_len: payload.len() as u64,
        checksum: checksum(&payload),
    };

    let mut bytes = bincode::serialize(&header)?;
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

fn decode(data: &[u8]) -> EngineResult<SimulationState> {
    let probe = SnapshotHeader {
        magic: SNAPSHOT_MAGIC,
        version: 0,
        payload_len: 0,
        checksum: 0,
    };
    let header_size = bincode::serialized_size(&probe)? as usize;
    if data.len() < header_size {
        return Err(EngineError::CorruptedSnapshot(
            "Data too small for snapshot header".to_string(),
        ));
    }

    let header: SnapshotHeader = bincode::deserialize(&data[..header_size])?;
    if header.magic != SNAPSHOT_MAGIC {
        return Err(EngineError::CorruptedSnapshot("Invalid snapshot magic".to_string()));
    }
    if header.version != SNAPSHOT_FORMAT_VERSION {
        return Err(EngineError::CorruptedSnapshot(format!(
            "Unsupported snapshot version {} (expected {})",
            header.version, SNAPSHOT_FORMAT_VERSION
        )));
    }

    let payload = &data[header_size..];
    if payload.len() as u64 != header.payload_len {
        return Err(EngineError::CorruptedSnapshot(format!(
            "Payload is {} bytes, header says {}",
            payload.len(),
            header.payload_len
        )));
    }
    if checksum(payload) != header.checksum {
        return Err(EngineError::CorruptedSnapshot("Checksum mismatch".to_string()));
    }

    let state: SimulationState = bincode::deserialize(payload)?;
    state.particles().validate()?;
    Ok(state)
}

/// Save a state snapshot atomically
pub fn save_snapshot<P: AsRef<Path>>(path: P, state: &SimulationState) -> EngineResult<()> {
    let path = path.as_ref();
    let bytes = encode(state)?;
    atomic_write(path, &bytes)?;
    log::info!(
        "Saved snapshot of {} particles to {} ({} bytes)",
        state.particle_count(),
        path.display(),
        bytes.len()
    );
    Ok(())
}

/// Load a state snapshot
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> EngineResult<SimulationState> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    let state = decode(&data)?;
    log::info!(
        "Loaded snapshot of {} particles from {}",
        state.particle_count(),
        path.display()
    );
    Ok(state)
}

/// Load a snapshot, falling back to an empty state on any failure
pub fn load_snapshot_or_default<P: AsRef<Path>>(path: P) -> SimulationState {
    let path = path.as_ref();
    match load_snapshot(path) {
        Ok(state) => state,
        Err(e) => {
            log::warn!("Failed to load snapshot {}: {}; starting empty", path.display(), e);
            SimulationState::default()
        }
    }
}
