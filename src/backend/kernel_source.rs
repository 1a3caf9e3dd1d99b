use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{EngineError, EngineResult};

/// Neighbor pass plus the shared prelude; must come first
pub const NEIGHBOR_BUILD: &str = "neighbor_build.wgsl";
/// Force and integration pass
pub const FORCE_INTEGRATE: &str = "force_integrate.wgsl";

/// WGSL entry points in the combined module
pub const NEIGHBOR_ENTRY: &str = "build_neighbors";
pub const FORCE_ENTRY: &str = "integrate";

/// Where a kernel source was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelOrigin {
    Embedded,
    Directory(PathBuf),
}

/// Combined WGSL source for both compute passes
#[derive(Debug, Clone)]
pub struct KernelSource {
    source: String,
    origin: KernelOrigin,
}

impl KernelSource {
    /// Kernels compiled into the binary
    pub fn embedded() -> Self {
        Self {
            source: Self::combine(
                include_str!("shaders/neighbor_build.wgsl"),
                include_str!("shaders/force_integrate.wgsl"),
            ),
            origin: KernelOrigin::Embedded,
        }
    }

    /// Load both kernel files from `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> EngineResult<Self> {
        let dir = dir.as_ref();
        let neighbor = Self::read_kernel(&dir.join(NEIGHBOR_BUILD))?;
        let force = Self::read_kernel(&dir.join(FORCE_INTEGRATE))?;
        log::info!("Loaded compute kernels from {}", dir.display());

        Ok(Self {
            source: Self::combine(&neighbor, &force),
            origin: KernelOrigin::Directory(dir.to_path_buf()),
        })
    }

    fn read_kernel(path: &Path) -> EngineResult<String> {
        fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => EngineError::KernelSourceMissing {
                path: path.to_path_buf(),
            },
            _ => EngineError::Io(e),
        })
    }

    fn combine(neighbor: &str, force: &str) -> String {
        format!("{}\n{}", neighbor, force)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn origin(&self) -> &KernelOrigin {
        &self.origin
    }
}

impl Default for KernelSource {
    fn default() -> Self {
        Self::embedded()
    }
}
