use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Runtime settings of a pipeline run
///
/// Built once by the binary and handed to the components that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Path to the directory to hold bgpsnap's data
    pub data_dir: String,

    /// Directory collectors write raw batch files into
    pub raw_data_dir: String,

    /// SQLite database file, by default `{data_dir}/bgpsnap.sqlite3`
    pub database_path: Option<String>,

    /// Sources collected when none are given on the command line
    pub default_sources: Vec<String>,
}

const DEFAULT_SOURCES: &str = "ixp_df,global";

const EMPTY_CONFIG: &str = r#"### bgpsnap configuration file

### directory for the snapshot database and raw files
# data_dir = "~/.bgpsnap"

### directory collectors write raw batches into (default: <data_dir>/raw)
# raw_data_dir = "data/raw"

### SQLite database file (default: <data_dir>/bgpsnap.sqlite3)
# database_path = "/var/lib/bgpsnap/bgpsnap.sqlite3"

### comma-separated sources collected by default
# bgp_sources = "ixp_df,global"
"#;

fn home_dir() -> String {
    dirs::home_dir()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|| ".".to_string())
}

fn split_sources(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self::from_map(&HashMap::new(), &home_dir())
    }
}

impl SnapshotConfig {
    /// Load the configuration
    ///
    /// Sources, later ones overriding earlier ones:
    /// 1. the TOML file at `path`, or `$HOME/.bgpsnap/bgpsnap.toml` (created when missing)
    /// 2. environment variables prefixed with `BGPSNAP_`, including those from a `.env` file
    pub fn new(path: &Option<String>) -> Result<SnapshotConfig> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();

        let home = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        let config_file = match path {
            Some(p) => p.clone(),
            None => {
                let dir = format!("{}/.bgpsnap", home);
                std::fs::create_dir_all(&dir)
                    .map_err(|e| anyhow!("Unable to create bgpsnap directory: {}", e))?;
                format!("{}/bgpsnap.toml", dir)
            }
        };

        if Path::new(&config_file).exists() {
            builder = builder.add_source(config::File::with_name(&config_file));
        } else {
            std::fs::write(&config_file, EMPTY_CONFIG)
                .map_err(|e| anyhow!("Unable to create config file {}: {}", config_file, e))?;
        }

        // E.g., `BGPSNAP_DATA_DIR=/tmp/bgpsnap bgpsnap run` sets the data directory
        builder = builder.add_source(config::Environment::with_prefix("BGPSNAP"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let map = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Ok(Self::from_map(&map, &home))
    }

    fn from_map(map: &HashMap<String, String>, home: &str) -> Self {
        let expand_home = |p: &str| match p.strip_prefix("~/") {
            Some(rest) => format!("{}/{}", home, rest),
            None => p.to_string(),
        };

        let data_dir = map
            .get("data_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| format!("{}/.bgpsnap", home));

        let raw_data_dir = map
            .get("raw_data_dir")
            .map(|p| expand_home(p))
            .unwrap_or_else(|| format!("{}/raw", data_dir.trim_end_matches('/')));

        let default_sources =
            split_sources(map.get("bgp_sources").map(String::as_str).unwrap_or(DEFAULT_SOURCES));

        SnapshotConfig {
            data_dir,
            raw_data_dir,
            database_path: map.get("database_path").map(|p| expand_home(p)),
            default_sources,
        }
    }

    /// Get the path to the SQLite database file
    pub fn sqlite_path(&self) -> String {
        match &self.database_path {
            Some(p) => p.clone(),
            None => format!("{}/bgpsnap.sqlite3", self.data_dir.trim_end_matches('/')),
        }
    }

    pub fn raw_dir(&self) -> PathBuf {
        PathBuf::from(&self.raw_data_dir)
    }

    /// Create the data and raw directories
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.data_dir.as_str(), self.raw_data_dir.as_str()] {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow!("Failed to create directory '{}': {}", dir, e))?;
        }
        if let Some(parent) = self.database_path.as_deref().and_then(|p| Path::new(p).parent()) {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow!("Failed to create directory '{}': {}", parent.display(), e)
                })?;
            }
        }
        Ok(())
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        [
            format!("Data Directory:     {}", self.data_dir),
            format!("Raw Data Directory: {}", self.raw_data_dir),
            format!("SQLite Path:        {}", self.sqlite_path()),
            format!("Default Sources:    {}", self.default_sources.join(",")),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = SnapshotConfig::from_map(&HashMap::new(), "/home/test");
        assert_eq!(config.data_dir, "/home/test/.bgpsnap");
        assert_eq!(config.raw_data_dir, "/home/test/.bgpsnap/raw");
        assert_eq!(config.sqlite_path(), "/home/test/.bgpsnap/bgpsnap.sqlite3");
        assert_eq!(config.default_sources, vec!["ixp_df", "global"]);
    }

    #[test]
    fn test_overrides() {
        let config = SnapshotConfig::from_map(
            &map(&[
                ("data_dir", "~/snap/"),
                ("database_path", "/tmp/snap.sqlite3"),
                ("bgp_sources", " ixp_sp , ,global "),
            ]),
            "/home/test",
        );
        assert_eq!(config.data_dir, "/home/test/snap/");
        assert_eq!(config.raw_data_dir, "/home/test/snap/raw");
        assert_eq!(config.sqlite_path(), "/tmp/snap.sqlite3");
        assert_eq!(config.default_sources, vec!["ixp_sp", "global"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bgpsnap.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &file,
            format!(
                "data_dir = \"{}\"\nbgp_sources = \"all\"\n",
                data_dir.to_str().unwrap()
            ),
        )
        .unwrap();

        let config = SnapshotConfig::new(&Some(file.to_str().unwrap().to_string())).unwrap();
        assert_eq!(config.data_dir, data_dir.to_str().unwrap());
        assert_eq!(config.default_sources, vec!["all"]);

        config.ensure_directories().unwrap();
        assert!(config.raw_dir().exists());
    }

    #[test]
    fn test_missing_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.toml");

        SnapshotConfig::new(&Some(file.to_str().unwrap().to_string())).unwrap();
        let content = std::fs::read_to_string(&file).unwrap();
        assert!(content.contains("bgpsnap configuration file"));
    }
}
