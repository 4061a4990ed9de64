use std::path::Path;

use voting_crypto::Keypair;

use crate::errors::WalletError;

/// Generates a fresh keypair the way every demo actor in the original
/// source did ad hoc (`rsa.newkeys(512)` in `examples.py`/`nodes.py`/
/// `PoET_example.py`), restored here as a single reusable entry point.
/// Production nodes should prefer `voting_crypto::Keypair::generate_default`
/// (2048 bits); this crate exists for saving/loading that keypair across
/// process restarts, not for picking its size.
pub fn generate(bits: usize) -> Result<Keypair, WalletError> {
    Keypair::generate(bits).map_err(WalletError::from)
}

/// Saves `keypair`'s private key as a PKCS#1 PEM file. The public key is
/// always recoverable from the private key, so only one file is written.
pub fn save_to_file(keypair: &Keypair, path: impl AsRef<Path>) -> Result<(), WalletError> {
    let path = path.as_ref();
    let pem = keypair.private_key().to_pem()?;
    std::fs::write(path, pem).map_err(|source| WalletError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Loads a keypair back from a PKCS#1 PEM file written by `save_to_file`.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Keypair, WalletError> {
    let path = path.as_ref();
    let pem = std::fs::read_to_string(path).map_err(|source| WalletError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let private_key = voting_crypto::PrivateKey::from_pem(&pem)?;
    Ok(Keypair::from_private_key(private_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_keypair_through_a_pem_file() {
        let keypair = generate(512).unwrap();
        let dir = std::env::temp_dir().join(format!("voting-wallet-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("keypair.pem");

        save_to_file(&keypair, &path).unwrap();
        let restored = load_from_file(&path).unwrap();

        assert_eq!(keypair.public_key(), restored.public_key());
        std::fs::remove_file(&path).unwrap();
    }
}
