// Built-in deps
use std::convert::TryFrom;
// External deps
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use web3::types::Log;
// Workspace deps
use safe_history_basic_types::{Address, H256, U256};
use safe_history_contracts::erc20_contract;
// Local deps
use crate::utils::checksum_address;

/// `keccak256("Transfer(address,address,uint256)")`, shared by ERC-20 and
/// ERC-721; the standards are told apart by the amount of indexed topics.
pub static TRANSFER_TOPIC: Lazy<H256> =
    Lazy::new(|| erc20_contract().event("Transfer").unwrap().signature());

/// `keccak256("Approval(address,address,uint256)")`.
pub static APPROVAL_TOPIC: Lazy<H256> =
    Lazy::new(|| erc20_contract().event("Approval").unwrap().signature());

#[derive(Debug, Error, PartialEq)]
pub enum TokenEventError {
    #[error("log has no topics")]
    NoTopics,
    #[error("unknown event topic {0:?}")]
    UnknownTopic(H256),
    #[error("log has unexpected topic count {0}")]
    UnexpectedTopicCount(usize),
    #[error("log is missing its transaction context")]
    MissingTransactionContext,
    #[error("log data does not hold a 32-byte word")]
    MalformedData,
}

/// A decoded token-standard event observed on a monitored address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenEvent {
    Erc20Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Erc721Transfer {
        from: Address,
        to: Address,
        token_id: U256,
    },
    Erc20Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
    Erc721Approval {
        owner: Address,
        approved: Address,
        token_id: U256,
    },
}

impl TokenEvent {
    /// The structured argument map persisted with the event. ERC-20 rows
    /// carry a `value` key, ERC-721 rows a `tokenId` key; readers rely on
    /// that shape to discriminate the standards.
    pub fn to_arguments(&self) -> serde_json::Value {
        match self {
            TokenEvent::Erc20Transfer { from, to, value } => json!({
                "from": checksum_address(from),
                "to": checksum_address(to),
                "value": value.to_string(),
            }),
            TokenEvent::Erc721Transfer { from, to, token_id } => json!({
                "from": checksum_address(from),
                "to": checksum_address(to),
                "tokenId": token_id.to_string(),
            }),
            TokenEvent::Erc20Approval { owner, spender, value } => json!({
                "owner": checksum_address(owner),
                "spender": checksum_address(spender),
                "value": value.to_string(),
            }),
            TokenEvent::Erc721Approval { owner, approved, token_id } => json!({
                "owner": checksum_address(owner),
                "approved": checksum_address(approved),
                "tokenId": token_id.to_string(),
            }),
        }
    }
}

/// An event row as persisted by the event indexer.
#[derive(Debug, Clone, PartialEq)]
pub struct EthereumEvent {
    pub ethereum_tx_hash: H256,
    pub block_number: u64,
    pub log_index: u64,
    /// Address of the token contract that emitted the log.
    pub address: Address,
    pub topic: H256,
    pub event: TokenEvent,
}

impl EthereumEvent {
    pub fn arguments(&self) -> serde_json::Value {
        self.event.to_arguments()
    }
}

impl TryFrom<&Log> for EthereumEvent {
    type Error = TokenEventError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let topic = *log.topics.first().ok_or(TokenEventError::NoTopics)?;
        let ethereum_tx_hash = log
            .transaction_hash
            .ok_or(TokenEventError::MissingTransactionContext)?;
        let block_number = log
            .block_number
            .ok_or(TokenEventError::MissingTransactionContext)?
            .as_u64();
        let log_index = log
            .log_index
            .ok_or(TokenEventError::MissingTransactionContext)?
            .as_u64();

        let event = if topic == *TRANSFER_TOPIC {
            match log.topics.len() {
                // ERC-20: two indexed addresses, value in the data word.
                3 => TokenEvent::Erc20Transfer {
                    from: address_from_topic(&log.topics[1]),
                    to: address_from_topic(&log.topics[2]),
                    value: data_word(log)?,
                },
                // ERC-721: everything indexed, including the token id.
                4 => TokenEvent::Erc721Transfer {
                    from: address_from_topic(&log.topics[1]),
                    to: address_from_topic(&log.topics[2]),
                    token_id: U256::from_big_endian(log.topics[3].as_bytes()),
                },
                count => return Err(TokenEventError::UnexpectedTopicCount(count)),
            }
        } else if topic == *APPROVAL_TOPIC {
            match log.topics.len() {
                3 => TokenEvent::Erc20Approval {
                    owner: address_from_topic(&log.topics[1]),
                    spender: address_from_topic(&log.topics[2]),
                    value: data_word(log)?,
                },
                4 => TokenEvent::Erc721Approval {
                    owner: address_from_topic(&log.topics[1]),
                    approved: address_from_topic(&log.topics[2]),
                    token_id: U256::from_big_endian(log.topics[3].as_bytes()),
                },
                count => return Err(TokenEventError::UnexpectedTopicCount(count)),
            }
        } else {
            return Err(TokenEventError::UnknownTopic(topic));
        };

        Ok(EthereumEvent {
            ethereum_tx_hash,
            block_number,
            log_index,
            address: log.address,
            topic,
            event,
        })
    }
}

fn address_from_topic(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

fn data_word(log: &Log) -> Result<U256, TokenEventError> {
    if log.data.0.len() != 32 {
        return Err(TokenEventError::MalformedData);
    }
    Ok(U256::from_big_endian(&log.data.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use web3::types::{Bytes, U64};

    fn transfer_log(topics: Vec<H256>, data: Vec<u8>) -> Log {
        Log {
            address: Address::from_low_u64_be(0x70ce),
            topics,
            data: Bytes(data),
            block_hash: None,
            block_number: Some(U64::from(100u64)),
            transaction_hash: Some(H256::from_low_u64_be(1)),
            transaction_index: None,
            log_index: Some(U256::from(7u64)),
            transaction_log_index: None,
            log_type: None,
            removed: None,
        }
    }

    fn topic_for(address: Address) -> H256 {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_bytes());
        H256::from(word)
    }

    #[test]
    fn erc20_transfer_is_discriminated_by_topic_count() {
        let from = Address::from_low_u64_be(1);
        let to = Address::from_low_u64_be(2);
        let mut value = [0u8; 32];
        U256::from(1234u64).to_big_endian(&mut value);

        let log = transfer_log(
            vec![*TRANSFER_TOPIC, topic_for(from), topic_for(to)],
            value.to_vec(),
        );
        let event = EthereumEvent::try_from(&log).unwrap();
        assert_eq!(
            event.event,
            TokenEvent::Erc20Transfer {
                from,
                to,
                value: U256::from(1234u64)
            }
        );
        assert_eq!(event.arguments()["value"], "1234");
    }

    #[test]
    fn erc721_transfer_takes_token_id_from_the_third_topic() {
        let from = Address::from_low_u64_be(1);
        let to = Address::from_low_u64_be(2);
        let token_id = H256::from_low_u64_be(77);

        let log = transfer_log(
            vec![*TRANSFER_TOPIC, topic_for(from), topic_for(to), token_id],
            vec![],
        );
        let event = EthereumEvent::try_from(&log).unwrap();
        assert_eq!(
            event.event,
            TokenEvent::Erc721Transfer {
                from,
                to,
                token_id: U256::from(77u64)
            }
        );
        assert_eq!(event.arguments()["tokenId"], "77");
    }

    #[test]
    fn unknown_topics_are_rejected() {
        let log = transfer_log(vec![H256::from_low_u64_be(0xbad)], vec![]);
        assert!(matches!(
            EthereumEvent::try_from(&log),
            Err(TokenEventError::UnknownTopic(_))
        ));
    }
}
