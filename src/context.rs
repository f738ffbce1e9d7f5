//! RuntimeContext (C1) and ScratchSpace (C2): the immutable per-invocation
//! bundle engines read, and the tmp-directory lifecycle it owns.

use crate::config::RuntimeConfig;
use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing::{info, warn};

const DEFAULT_RAMDISK_BYTES: u64 = 1024 * 1024 * 1024;

/// Immutable bundle of resolved paths and concurrency parameters bound to one
/// logical run. Frozen after construction; a process may hold several.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub books_dir: PathBuf,
    pub ollama_url: String,
    pub ollama_model: String,
    /// Where `ollama_model` came from, kept for provenance when a per-job
    /// override is applied on top of the top-level setting.
    pub ollama_model_source: ModelSource,
    pub thread_count: usize,
    pub queue_size: usize,
    pub pipeline_mode: bool,
    pub use_ramdisk: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    TopLevelConfig,
    PerJobOverride,
}

impl RuntimeContext {
    /// Resolves directories with the documented fallback sequence: the
    /// user-supplied value, then the configured value, then a default
    /// relative to the program root. Each candidate first clears a broken
    /// symlink or non-directory at the target path, then creates it. The
    /// first writable candidate wins.
    pub fn build(config: &RuntimeConfig, overrides: &DirectoryOverrides) -> Result<Self> {
        let program_root = std::env::current_dir()?;
        let working_dir = resolve_directory(
            overrides.working_dir.as_deref(),
            config.working_dir.as_deref(),
            &program_root.join("work"),
        )?;
        let output_dir = resolve_directory(
            overrides.output_dir.as_deref(),
            config.output_dir.as_deref(),
            &program_root.join("output"),
        )?;
        let tmp_dir = resolve_directory(
            overrides.tmp_dir.as_deref(),
            config.tmp_dir.as_deref(),
            &program_root.join("tmp"),
        )?;
        let books_dir = resolve_directory(
            overrides.books_dir.as_deref(),
            config.books_dir.as_deref(),
            &program_root.join("books"),
        )?;

        Ok(Self {
            working_dir,
            output_dir,
            tmp_dir,
            books_dir,
            ollama_url: config.ollama_url.clone(),
            ollama_model: config.ollama_model.clone(),
            ollama_model_source: ModelSource::TopLevelConfig,
            thread_count: config.thread_count,
            queue_size: config.queue_size,
            pipeline_mode: config.pipeline_mode,
            use_ramdisk: config.use_ramdisk,
        })
    }

    /// Applies a per-job `ollama_model` override on top of the top-level
    /// setting. The override wins when present; `ollama_model_source`
    /// records which one is in effect so callers can log provenance.
    pub fn with_job_model_override(&self, job_override: Option<&str>) -> Self {
        match job_override {
            Some(model) if !model.is_empty() => {
                info!(
                    top_level = %self.ollama_model,
                    job_override = %model,
                    "per-job ollama_model override takes precedence"
                );
                Self {
                    ollama_model: model.to_string(),
                    ollama_model_source: ModelSource::PerJobOverride,
                    ..self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectoryOverrides {
    pub working_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub tmp_dir: Option<PathBuf>,
    pub books_dir: Option<PathBuf>,
}

fn resolve_directory(
    preferred: Option<&Path>,
    configured: Option<&Path>,
    default: &Path,
) -> Result<PathBuf> {
    let mut last_error = None;
    for candidate in [preferred, configured, Some(default)].into_iter().flatten() {
        match try_prepare_directory(candidate) {
            Ok(path) => return Ok(path),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.expect("at least the default candidate was attempted"))
}

fn try_prepare_directory(path: &Path) -> Result<PathBuf> {
    if path.is_symlink() && std::fs::read_link(path).map(|t| !t.exists()).unwrap_or(true) {
        std::fs::remove_file(path)?;
    } else if path.exists() && !path.is_dir() {
        std::fs::remove_file(path)?;
    }
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

/// Tracks which context identities have already registered a cleanup handler,
/// so teardown runs at most once per distinct context and is safe to invoke
/// twice regardless.
static CLEANED_UP: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

/// Manages the tmp directory, optionally backed by a memory-resident
/// filesystem, and registers idempotent cleanup.
pub struct ScratchSpace {
    path: PathBuf,
    ramdisk_mounted: bool,
}

impl ScratchSpace {
    /// If `use_ramdisk` is set and the platform supports one, mounts a
    /// RAM-backed filesystem at `path` when it lacks sufficient capacity. On
    /// mount failure, falls back to on-disk scratch and logs at info level
    /// rather than failing the run.
    pub fn prepare(path: &Path, use_ramdisk: bool) -> Self {
        std::fs::create_dir_all(path).ok();

        let ramdisk_mounted = if use_ramdisk {
            match ramdisk::ensure_ramdisk(path, DEFAULT_RAMDISK_BYTES) {
                Ok(mounted) => mounted,
                Err(e) => {
                    info!("RAM-backed scratch unavailable ({e}), falling back to on-disk scratch");
                    false
                }
            }
        } else {
            false
        };

        let registry = CLEANED_UP.get_or_init(|| Mutex::new(HashSet::new()));
        registry.lock().unwrap().insert(path.to_path_buf());

        Self {
            path: path.to_path_buf(),
            ramdisk_mounted,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_ramdisk(&self) -> bool {
        self.ramdisk_mounted
    }

    /// Idempotent teardown: safe to call twice, a pure function of the
    /// context's path.
    pub fn cleanup(&self) {
        let registry = CLEANED_UP.get_or_init(|| Mutex::new(HashSet::new()));
        let mut guard = registry.lock().unwrap();
        if !guard.remove(&self.path) {
            return;
        }
        drop(guard);
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            warn!("failed to remove scratch directory {:?}: {e}", self.path);
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Platform RAM-disk mount/capacity detection, mirroring the mount-table
/// parsing a ramdisk manager needs to do without shelling out unnecessarily.
mod ramdisk {
    use std::io;
    use std::path::Path;

    /// Returns `true` if a RAM-backed filesystem ends up mounted at `path`
    /// (either already mounted, or freshly mounted by this call).
    pub fn ensure_ramdisk(path: &Path, size_bytes: u64) -> io::Result<bool> {
        if is_ramdisk(path)? {
            return Ok(true);
        }
        if !has_required_capacity(path, size_bytes)? {
            return Ok(false);
        }
        mount_ramdisk(path, size_bytes)
    }

    #[cfg(target_os = "linux")]
    pub fn is_ramdisk(path: &Path) -> io::Result<bool> {
        let mounts = std::fs::read_to_string("/proc/self/mounts")?;
        let target = path.to_string_lossy();
        for line in mounts.lines() {
            let mut fields = line.split_whitespace();
            let (_, mount_point, fs_type) = match (fields.next(), fields.next(), fields.next()) {
                (Some(a), Some(b), Some(c)) => (a, b, c),
                _ => continue,
            };
            if decode_mount_token(mount_point) == *target && fs_type == "tmpfs" {
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn is_ramdisk(_path: &Path) -> io::Result<bool> {
        Ok(false)
    }

    /// Mount-table entries escape whitespace as `\040`; undo that.
    fn decode_mount_token(token: &str) -> String {
        token.replace("\\040", " ").replace("\\011", "\t")
    }

    #[cfg(target_os = "linux")]
    fn has_required_capacity(path: &Path, size_bytes: u64) -> io::Result<bool> {
        let output = std::process::Command::new("df")
            .arg("-k")
            .arg(path)
            .output()?;
        if !output.status.success() {
            return Ok(false);
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let Some(data_line) = text.lines().nth(1) else {
            return Ok(false);
        };
        let available_kb: u64 = data_line
            .split_whitespace()
            .nth(3)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(available_kb * 1024 >= size_bytes)
    }

    #[cfg(not(target_os = "linux"))]
    fn has_required_capacity(_path: &Path, _size_bytes: u64) -> io::Result<bool> {
        Ok(false)
    }

    #[cfg(target_os = "linux")]
    fn mount_ramdisk(path: &Path, size_bytes: u64) -> io::Result<bool> {
        let size_opt = format!("size={}", format_size(size_bytes));
        let status = std::process::Command::new("mount")
            .args(["-t", "tmpfs", "-o", &size_opt, "tmpfs"])
            .arg(path)
            .status()?;
        Ok(status.success())
    }

    #[cfg(not(target_os = "linux"))]
    fn mount_ramdisk(_path: &Path, _size_bytes: u64) -> io::Result<bool> {
        Ok(false)
    }

    #[cfg(target_os = "linux")]
    fn format_size(bytes: u64) -> String {
        if bytes % (1024 * 1024 * 1024) == 0 {
            format!("{}g", bytes / (1024 * 1024 * 1024))
        } else if bytes % (1024 * 1024) == 0 {
            format!("{}m", bytes / (1024 * 1024))
        } else {
            format!("{bytes}")
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn decodes_escaped_whitespace_in_mount_tokens() {
            assert_eq!(decode_mount_token("/mnt/my\\040disk"), "/mnt/my disk");
        }

        #[cfg(target_os = "linux")]
        #[test]
        fn formats_gigabyte_aligned_sizes_with_g_suffix() {
            assert_eq!(format_size(2 * 1024 * 1024 * 1024), "2g");
            assert_eq!(format_size(512 * 1024 * 1024), "512m");
            assert_eq!(format_size(123), "123");
        }
    }
}
