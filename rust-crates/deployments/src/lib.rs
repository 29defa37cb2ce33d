use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Local,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 3] =
        [DeploymentEnv::Dev, DeploymentEnv::Test, DeploymentEnv::Local];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Local => "local",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_id: String,
    pub network_url: String,
    /// sha256 of the interface description the contract was deployed with
    pub abi_hash: String,
    #[serde(default)]
    pub deployment_block_height: Option<u64>,
}

impl DeploymentRecord {
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.abi_hash == hash
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::in_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn in_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }
}

pub fn ensure_structure() -> Result<()> {
    ensure_structure_in(DEPLOYMENTS_ROOT)
}

pub fn ensure_structure_in(root: impl AsRef<Path>) -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(root.as_ref(), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.is_empty() || data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    // older files kept every deployment; the newest one is last
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

pub fn record_deployment(
    store: &DeploymentStore,
    contract_id: impl AsRef<str>,
    network_url: impl AsRef<str>,
    abi_hash: impl AsRef<str>,
    deployment_block_height: Option<u64>,
) -> Result<DeploymentRecord> {
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_id: contract_id.as_ref().to_string(),
        network_url: network_url.as_ref().to_string(),
        abi_hash: abi_hash.as_ref().to_string(),
        deployment_block_height,
    };
    store.save(record.clone())?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    fn sample_record(hash: &str) -> DeploymentRecord {
        DeploymentRecord {
            deployed_at: "2025-01-01T00:00:00+00:00".to_string(),
            contract_id: "0x".to_string() + &"ab".repeat(32),
            network_url: "http://localhost:4000/".to_string(),
            abi_hash: hash.to_string(),
            deployment_block_height: Some(12),
        }
    }

    #[test]
    fn ensure_structure_in__creates_empty_file_per_env() {
        // given
        let dir = TempDir::new("deployments").unwrap();

        // when
        ensure_structure_in(dir.path()).unwrap();

        // then
        for env in DeploymentEnv::ALL {
            let file = dir.path().join(env.dir_name()).join(DEPLOYMENTS_FILE);
            assert!(file.exists(), "missing {}", file.display());
        }
    }

    #[test]
    fn load__returns_none_for_fresh_store() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Local).unwrap();

        // when
        let loaded = store.load().unwrap();

        // then
        assert!(loaded.is_none());
    }

    #[test]
    fn load__returns_saved_record() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Test).unwrap();
        let record = sample_record("aa");

        // when
        store.save(record.clone()).unwrap();

        // then
        assert_eq!(store.load().unwrap(), Some(record));
    }

    #[test]
    fn load__takes_last_entry_of_legacy_list() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Dev).unwrap();
        let records = vec![sample_record("old"), sample_record("new")];
        fs::write(store.path(), serde_json::to_vec(&records).unwrap()).unwrap();

        // when
        let loaded = store.load().unwrap().unwrap();

        // then
        assert_eq!(loaded.abi_hash, "new");
    }

    #[test]
    fn load__rejects_garbage() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Dev).unwrap();
        fs::write(store.path(), b"{ not json").unwrap();

        // when
        let result = store.load();

        // then
        assert!(result.is_err());
    }

    #[test]
    fn record_deployment__persists_and_checks_hash() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::in_root(dir.path(), DeploymentEnv::Local).unwrap();

        // when
        let record =
            record_deployment(&store, "0x01", "http://localhost:4000/", "cafe", None)
                .unwrap();

        // then
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(loaded.is_compatible_with_hash("cafe"));
        assert!(!loaded.is_compatible_with_hash("beef"));
    }
}
