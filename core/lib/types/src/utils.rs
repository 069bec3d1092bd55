//! Small helpers shared across the domain model.

use safe_history_basic_types::{Address, H256};
use tiny_keccak::keccak256;

/// Renders an address in EIP-55 mixed-case checksum form.
pub fn checksum_address(address: &Address) -> String {
    let lowercase = hex::encode(address.as_bytes());
    let hash = keccak256(lowercase.as_bytes());

    let checksummed: String = lowercase
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();

    format!("0x{}", checksummed)
}

/// Renders a byte slice as a `0x`-prefixed hex string.
pub fn to_hex_string(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parses a `0x`-prefixed (or bare) hex string into bytes.
pub fn from_hex_string(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(stripped)
}

/// Keccak-256 wrapped into `H256`.
pub fn keccak256_hash(data: &[u8]) -> H256 {
    H256::from(keccak256(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn checksum_matches_eip55_reference_vectors() {
        for fixture in &[
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address = Address::from_str(&fixture[2..]).unwrap();
            assert_eq!(&checksum_address(&address), fixture);
        }
    }

    #[test]
    fn hex_round_trip() {
        let bytes = vec![0xde, 0xad, 0xbe, 0xef];
        let encoded = to_hex_string(&bytes);
        assert_eq!(encoded, "0xdeadbeef");
        assert_eq!(from_hex_string(&encoded).unwrap(), bytes);
        assert_eq!(from_hex_string("deadbeef").unwrap(), bytes);
    }
}
