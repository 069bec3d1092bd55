//! Embedded ABIs of the contracts the indexer understands: the Safe master
//! copies (one per released interface version), the proxy factory that
//! deploys Safes, and the token standards watched by the event indexer.
//!
//! The artifacts are compiled into the binary so the decoder registry does
//! not depend on any deployment directory being present at runtime.

use ethabi::Contract;

const SAFE_CONTRACT_V0_0_1: &str = include_str!("../abi/GnosisSafeV0_0_1.json");
const SAFE_CONTRACT_V1_0_0: &str = include_str!("../abi/GnosisSafeV1_0_0.json");
const SAFE_CONTRACT_V1_1_1: &str = include_str!("../abi/GnosisSafeV1_1_1.json");
const PROXY_FACTORY_CONTRACT: &str = include_str!("../abi/ProxyFactory.json");
const ERC20_CONTRACT: &str = include_str!("../abi/ERC20.json");
const ERC721_CONTRACT: &str = include_str!("../abi/ERC721.json");

pub fn safe_contract_v0_0_1() -> Contract {
    Contract::load(SAFE_CONTRACT_V0_0_1.as_bytes()).expect("safe contract v0.0.1 abi")
}

pub fn safe_contract_v1_0_0() -> Contract {
    Contract::load(SAFE_CONTRACT_V1_0_0.as_bytes()).expect("safe contract v1.0.0 abi")
}

pub fn safe_contract_v1_1_1() -> Contract {
    Contract::load(SAFE_CONTRACT_V1_1_1.as_bytes()).expect("safe contract v1.1.1 abi")
}

pub fn proxy_factory_contract() -> Contract {
    Contract::load(PROXY_FACTORY_CONTRACT.as_bytes()).expect("proxy factory abi")
}

pub fn erc20_contract() -> Contract {
    Contract::load(ERC20_CONTRACT.as_bytes()).expect("erc20 abi")
}

pub fn erc721_contract() -> Contract {
    Contract::load(ERC721_CONTRACT.as_bytes()).expect("erc721 abi")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_abis_load() {
        for contract in &[
            safe_contract_v0_0_1(),
            safe_contract_v1_0_0(),
            safe_contract_v1_1_1(),
        ] {
            assert!(contract.function("execTransaction").is_ok());
            assert!(contract.function("setup").is_ok());
        }
        // `baseGas` replaced `dataGas` starting from v1.0.0; the selector is
        // unchanged because only the argument name differs.
        let old = safe_contract_v0_0_1();
        let new = safe_contract_v1_1_1();
        let old_exec = old.function("execTransaction").unwrap();
        let new_exec = new.function("execTransaction").unwrap();
        assert_eq!(old_exec.short_signature(), new_exec.short_signature());
        assert_eq!(old_exec.inputs[5].name, "dataGas");
        assert_eq!(new_exec.inputs[5].name, "baseGas");
    }

    #[test]
    fn transfer_topic_is_shared_between_token_standards() {
        let erc20_topic = erc20_contract().event("Transfer").unwrap().signature();
        let erc721_topic = erc721_contract().event("Transfer").unwrap().signature();
        assert_eq!(erc20_topic, erc721_topic);
    }

    #[test]
    fn proxy_factory_abi_loads() {
        let factory = proxy_factory_contract();
        assert!(factory.event("ProxyCreation").is_ok());
    }
}
