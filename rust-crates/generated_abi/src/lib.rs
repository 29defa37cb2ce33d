use fuels::{
    accounts::wallet::Wallet,
    macros::abigen,
    types::ContractId,
};
use sha2::{
    Digest,
    Sha256,
};

pub mod higher_lower_types {
    use super::*;

    abigen!(Contract(
        name = "HigherLowerContract",
        abi = "rust-crates/generated_abi/abi/higher-lower-abi.json"
    ));
}

const HIGHER_LOWER_ABI: &str = include_str!("../abi/higher-lower-abi.json");

/// Hex sha256 of the interface description the bindings were generated from.
pub fn abi_hash() -> String {
    let mut hasher = Sha256::new();
    hasher.update(HIGHER_LOWER_ABI.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn contract_instance(
    id: ContractId,
    wallet: Wallet,
) -> higher_lower_types::HigherLowerContract<Wallet> {
    higher_lower_types::HigherLowerContract::new(id, wallet)
}
