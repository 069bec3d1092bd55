//! Conversions between the in-memory domain types and their SQL shapes.

// Built-in deps
use std::str::FromStr;
// External imports
use anyhow::format_err;
use bigdecimal::BigDecimal;
// Workspace imports
use safe_history_types::{Address, H256, U256};

pub fn u256_to_big_decimal(value: U256) -> BigDecimal {
    BigDecimal::from_str(&value.to_string()).expect("decimal rendering of U256 is always valid")
}

pub fn big_decimal_to_u256(value: &BigDecimal) -> Result<U256, anyhow::Error> {
    U256::from_dec_str(&value.with_scale(0).to_string())
        .map_err(|err| format_err!("cannot restore U256 from decimal: {:?}", err))
}

pub fn address_to_bytes(address: &Address) -> Vec<u8> {
    address.as_bytes().to_vec()
}

pub fn bytes_to_address(bytes: &[u8]) -> Result<Address, anyhow::Error> {
    if bytes.len() != 20 {
        return Err(format_err!("stored address has length {}", bytes.len()));
    }
    Ok(Address::from_slice(bytes))
}

pub fn hash_to_bytes(hash: &H256) -> Vec<u8> {
    hash.as_bytes().to_vec()
}

pub fn bytes_to_hash(bytes: &[u8]) -> Result<H256, anyhow::Error> {
    if bytes.len() != 32 {
        return Err(format_err!("stored hash has length {}", bytes.len()));
    }
    Ok(H256::from_slice(bytes))
}

pub fn trace_address_to_sql(trace_address: &[u64]) -> Vec<i64> {
    trace_address.iter().map(|ix| *ix as i64).collect()
}

pub fn trace_address_from_sql(trace_address: &[i64]) -> Vec<u64> {
    trace_address.iter().map(|ix| *ix as u64).collect()
}
