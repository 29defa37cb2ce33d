use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::{
    crypto::SecretKey,
    prelude::{
        Provider,
        Wallet,
        derivation::DEFAULT_DERIVATION_PATH,
        private_key::PrivateKeySigner,
    },
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".fuel").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Decrypts the keystore. Both raw secret keys and mnemonic phrases are accepted.
pub fn decrypt_secret(descriptor: &WalletDescriptor, password: &str) -> Result<SecretKey> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        return Ok(secret_key);
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            let private_key = SecretKey::new_from_mnemonic_phrase_with_path(
                mnemonic,
                DEFAULT_DERIVATION_PATH,
            )?;
            return Ok(private_key);
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

pub fn unlock_wallet(
    descriptor: &WalletDescriptor,
    password: &str,
    provider: &Provider,
) -> Result<Wallet> {
    let secret_key = decrypt_secret(descriptor, password)?;
    Ok(Wallet::new(PrivateKeySigner::new(secret_key), provider.clone()))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn list_wallets__returns_sorted_wallet_files_only() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("zoe.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("amy.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.wallet")).unwrap();

        // when
        let wallets = list_wallets(dir.path()).unwrap();

        // then
        let names: Vec<_> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["amy", "zoe"]);
    }

    #[test]
    fn list_wallets__missing_dir_is_empty() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        let missing = dir.path().join("absent");

        // when
        let wallets = list_wallets(&missing).unwrap();

        // then
        assert!(wallets.is_empty());
    }

    #[test]
    fn find_wallet__errors_for_unknown_name() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("amy.wallet"), b"{}").unwrap();

        // when
        let found = find_wallet(dir.path(), "amy").unwrap();
        let missing = find_wallet(dir.path(), "bob");

        // then
        assert_eq!(found.path, dir.path().join("amy.wallet"));
        assert!(missing.is_err());
    }

    #[test]
    fn decrypt_secret__rejects_non_keystore_file() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        let path = dir.path().join("broken.wallet");
        fs::write(&path, b"{}").unwrap();
        let descriptor = WalletDescriptor::new("broken", path);

        // when
        let result = decrypt_secret(&descriptor, "hunter2");

        // then
        let message = result.unwrap_err().to_string();
        assert!(message.contains("broken"), "{message}");
    }

    #[test]
    fn resolve_wallet_dir__uses_explicit_path() {
        // when
        let dir = resolve_wallet_dir(Some("/tmp/wallets")).unwrap();

        // then
        assert_eq!(dir, PathBuf::from("/tmp/wallets"));
    }
}
