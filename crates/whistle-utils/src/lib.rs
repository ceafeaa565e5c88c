use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub struct RuntimePaths {
    pub runtime_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
}

/// Namespace under the runtime dir so the daemon never collides with other tools.
const APP_ID: &str = "whistled";

pub fn runtime_paths() -> RuntimePaths {
    runtime_paths_from(|key| std::env::var_os(key))
}

/// Resolve runtime paths with an injected environment lookup.
pub fn runtime_paths_from<F>(lookup: F) -> RuntimePaths
where
    F: Fn(&str) -> Option<OsString>,
{
    // Explicit override wins (containers mount a shared runtime volume here).
    if let Some(dir) = lookup("WHISTLE_RUNTIME_DIR").filter(|v| !v.is_empty()) {
        return mk(PathBuf::from(dir));
    }

    // Linux: prefer XDG_RUNTIME_DIR if present.
    if let Some(xdg) = lookup("XDG_RUNTIME_DIR").filter(|v| !v.is_empty()) {
        return mk(PathBuf::from(xdg).join(APP_ID));
    }

    // macOS: use TMPDIR. (Also fine as Linux fallback.)
    if let Some(tmp) = lookup("TMPDIR").filter(|v| !v.is_empty()) {
        return mk(PathBuf::from(tmp).join(APP_ID));
    }

    mk(std::env::temp_dir().join(APP_ID))
}

fn mk(runtime_dir: PathBuf) -> RuntimePaths {
    RuntimePaths {
        socket_path: runtime_dir.join("whistled.sock"),
        lock_path: runtime_dir.join("whistled.lock"),
        runtime_dir,
    }
}

pub fn ensure_dir(p: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(p)
}

pub fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_dir_is_used_verbatim() {
        let paths = runtime_paths_from(|key| match key {
            "WHISTLE_RUNTIME_DIR" => Some("/run/whistle".into()),
            "XDG_RUNTIME_DIR" => Some("/run/user/1000".into()),
            _ => None,
        });
        assert_eq!(paths.runtime_dir, PathBuf::from("/run/whistle"));
        assert_eq!(paths.socket_path, PathBuf::from("/run/whistle/whistled.sock"));
        assert_eq!(paths.lock_path, PathBuf::from("/run/whistle/whistled.lock"));
    }

    #[test]
    fn xdg_runtime_dir_is_namespaced() {
        let paths = runtime_paths_from(|key| match key {
            "XDG_RUNTIME_DIR" => Some("/run/user/1000".into()),
            "TMPDIR" => Some("/tmp".into()),
            _ => None,
        });
        assert_eq!(paths.runtime_dir, PathBuf::from("/run/user/1000/whistled"));
    }

    #[test]
    fn empty_values_fall_through() {
        let paths = runtime_paths_from(|key| match key {
            "WHISTLE_RUNTIME_DIR" => Some("".into()),
            "XDG_RUNTIME_DIR" => Some("".into()),
            "TMPDIR" => Some("/var/tmp".into()),
            _ => None,
        });
        assert_eq!(paths.runtime_dir, PathBuf::from("/var/tmp/whistled"));
    }
}
