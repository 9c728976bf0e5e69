//! Configuration model for vise.
//!
//! The config file lives inside the lock directory (`{lock_dir}/vise.yaml`)
//! so every host sharing the directory shares one policy: the same CAD
//! extension set, the same process allow-list, the same staleness windows.
//! Unknown fields are ignored for forward compatibility and every field has
//! a default, so an absent file simply means "defaults".

use crate::error::{Result, ViseError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a vise lock directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CAD file extensions that may be locked (with leading dots).
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Process names the monitor watches for open CAD files.
    #[serde(default = "default_processes")]
    pub processes: Vec<String>,

    /// Reconciliation poll interval in milliseconds.
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Hours after which a lock with no heartbeat is evicted.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u32,

    /// Hours of inactivity after which analytics count a lock as stale.
    ///
    /// This is a reporting threshold only; eviction uses
    /// `stale_after_hours`.
    #[serde(default = "default_inactive_after_hours")]
    pub inactive_after_hours: u32,

    /// Default bind host for `vise serve`.
    #[serde(default = "default_serve_host")]
    pub serve_host: String,

    /// Default bind port for `vise serve`.
    #[serde(default = "default_serve_port")]
    pub serve_port: u16,
}

fn default_extensions() -> Vec<String> {
    [
        ".sldprt", ".sldasm", ".slddrw", // SolidWorks
        ".prt", ".asm", ".drw", // Pro/Engineer, Creo
        ".ipt", ".iam", ".idw", // Inventor
        ".dwg", ".dxf", // AutoCAD
        ".f3d", ".f3z", // Fusion 360
        ".step", ".stp", ".iges", ".igs", // Neutral formats
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_processes() -> Vec<String> {
    [
        "SLDWORKS.exe",  // SolidWorks
        "Inventor.exe",  // Inventor
        "acad.exe",      // AutoCAD
        "proe.exe",      // Pro/Engineer
        "creo.exe",      // Creo
        "fusion360.exe", // Fusion 360
        "nx.exe",        // Siemens NX
        "catia.exe",     // CATIA
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_check_interval_ms() -> u64 {
    2000
}

fn default_stale_after_hours() -> u32 {
    24
}

fn default_inactive_after_hours() -> u32 {
    4
}

fn default_serve_host() -> String {
    "127.0.0.1".to_string()
}

fn default_serve_port() -> u16 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            processes: default_processes(),
            check_interval_ms: default_check_interval_ms(),
            stale_after_hours: default_stale_after_hours(),
            inactive_after_hours: default_inactive_after_hours(),
            serve_host: default_serve_host(),
            serve_port: default_serve_port(),
        }
    }
}

impl Config {
    /// Load config from a YAML file, falling back to defaults when the file
    /// does not exist.
    ///
    /// A present-but-unparseable file is an error: silently reverting to
    /// defaults would let one host run with a different extension set than
    /// its peers.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ViseError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// Unknown fields are silently ignored for forward compatibility.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| ViseError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to a YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| ViseError::UserError(format!("failed to serialize config to YAML: {}", e)))
    }

    /// Validate config values and return an error on invalid values.
    ///
    /// Validation rules:
    /// - `check_interval_ms` must be positive
    /// - `stale_after_hours` and `inactive_after_hours` must be positive
    /// - `extensions` must be non-empty; entries need a leading dot
    /// - `processes` must be non-empty
    pub fn validate(&self) -> Result<()> {
        if self.check_interval_ms == 0 {
            return Err(ViseError::UserError(
                "config validation failed: check_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.stale_after_hours == 0 {
            return Err(ViseError::UserError(
                "config validation failed: stale_after_hours must be greater than 0".to_string(),
            ));
        }

        if self.inactive_after_hours == 0 {
            return Err(ViseError::UserError(
                "config validation failed: inactive_after_hours must be greater than 0".to_string(),
            ));
        }

        if self.extensions.is_empty() {
            return Err(ViseError::UserError(
                "config validation failed: extensions must not be empty".to_string(),
            ));
        }

        for ext in &self.extensions {
            if !ext.starts_with('.') || ext.len() < 2 {
                return Err(ViseError::UserError(format!(
                    "config validation failed: extensions entries must start with a dot (found '{}'). Use '.{}' instead.",
                    ext,
                    ext.trim_start_matches('.')
                )));
            }
        }

        if self.processes.is_empty() {
            return Err(ViseError::UserError(
                "config validation failed: processes must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get `extensions` normalized to lowercase.
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions.iter().map(|s| s.to_lowercase()).collect()
    }

    /// Check whether a path has a recognized CAD extension.
    ///
    /// This is the single extension test shared by the lock store and the
    /// process scanner.
    pub fn is_cad_file(&self, path: &str) -> bool {
        has_cad_extension(path, &self.normalized_extensions())
    }
}

/// Extension membership test against an already-normalized extension set.
pub fn has_cad_extension(path: &str, normalized_extensions: &[String]) -> bool {
    // Final path segment, tolerating Windows separators recorded by other
    // hosts.
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);

    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = name[idx..].to_lowercase();
            normalized_extensions.iter().any(|e| e == &ext)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_interval_ms, 2000);
        assert_eq!(config.stale_after_hours, 24);
        assert_eq!(config.inactive_after_hours, 4);
        assert_eq!(config.serve_port, 5000);
        assert!(config.extensions.contains(&".sldprt".to_string()));
        assert!(config.processes.contains(&"SLDWORKS.exe".to_string()));
    }

    #[test]
    fn partial_yaml_uses_defaults_for_missing_fields() {
        let config = Config::from_yaml("check_interval_ms: 500\n").unwrap();
        assert_eq!(config.check_interval_ms, 500);
        assert_eq!(config.stale_after_hours, 24);
        assert_eq!(config.extensions, default_extensions());
    }

    #[test]
    fn unknown_yaml_fields_are_ignored() {
        let config = Config::from_yaml("future_option: true\nstale_after_hours: 48\n").unwrap();
        assert_eq!(config.stale_after_hours, 48);
    }

    #[test]
    fn zero_interval_fails_validation() {
        let result = Config::from_yaml("check_interval_ms: 0\n");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("check_interval_ms")
        );
    }

    #[test]
    fn extension_without_dot_fails_validation() {
        let result = Config::from_yaml("extensions: [\"sldprt\"]\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains(".sldprt"));
    }

    #[test]
    fn empty_processes_fail_validation() {
        let result = Config::from_yaml("processes: []\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("processes"));
    }

    #[test]
    fn normalized_extensions_are_lowercase() {
        let config = Config {
            extensions: vec![".SLDPRT".to_string(), ".DwG".to_string()],
            ..Config::default()
        };
        assert_eq!(config.normalized_extensions(), vec![".sldprt", ".dwg"]);
    }

    #[test]
    fn recognizes_cad_files_case_insensitively() {
        let config = Config::default();

        for path in [
            "part.sldprt",
            "/shared/projects/ASSEMBLY.SLDASM",
            "drawing.dwg",
            "bracket.IPT",
            "C:\\vault\\gear.iam",
        ] {
            assert!(config.is_cad_file(path), "expected CAD file: {}", path);
        }

        for path in ["notes.txt", "render.pdf", "part.sldprt.bak", "no_extension"] {
            assert!(!config.is_cad_file(path), "expected non-CAD file: {}", path);
        }
    }

    #[test]
    fn dotfiles_are_not_cad_files() {
        let config = Config::default();
        assert!(!config.is_cad_file(".sldprt"));
        assert!(!config.is_cad_file("/tmp/.sldprt"));
    }

    #[test]
    fn load_or_default_handles_missing_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(temp_dir.path().join("vise.yaml")).unwrap();
        assert_eq!(config.check_interval_ms, 2000);
    }

    #[test]
    fn load_or_default_rejects_malformed_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("vise.yaml");
        std::fs::write(&path, "extensions: {not: [valid\n").unwrap();

        let result = Config::load_or_default(&path);
        assert!(result.is_err());
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.extensions, config.extensions);
        assert_eq!(parsed.processes, config.processes);
        assert_eq!(parsed.check_interval_ms, config.check_interval_ms);
    }
}
