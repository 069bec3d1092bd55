//! Derives current NFT ownership of a wallet from the indexed transfer
//! history, verified against the chain, and resolves token metadata.

// Built-in deps
use std::collections::HashMap;
use std::str::FromStr;
// External deps
use ethabi::{Function, Token};
use once_cell::sync::Lazy;
use serde_json::Value;
use thiserror::Error;
// Workspace deps
use safe_history_contracts::erc721_contract;
use safe_history_eth_client::{ContractCall, EthereumGateway};
use safe_history_types::{Address, U256};
// Local deps
use crate::storage_interactor::StorageInteractor;

/// CryptoKitties predates `tokenURI`; its metadata endpoint is well known.
static CRYPTO_KITTIES_ADDRESSES: Lazy<Vec<Address>> = Lazy::new(|| {
    vec![
        // Mainnet
        Address::from_str("06012c8cf97bead5deae237070f9587f8e7a266d").unwrap(),
        // Rinkeby
        Address::from_str("16baf0de678e52367adc69fd067e5edd1d33e3bf").unwrap(),
    ]
});

/// The ENS registrar reports no token info on-chain.
static ENS_ADDRESSES: Lazy<Vec<Address>> = Lazy::new(|| {
    vec![Address::from_str("57f1887a8bf19b14fc0df6fd9b2acc9af147ea85").unwrap()]
});

#[derive(Debug, Error, PartialEq)]
pub enum CollectiblesError {
    #[error("cannot retrieve metadata from `{0}`")]
    MetadataRetrieval(String),
}

/// An NFT currently owned by a wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct Collectible {
    pub token_name: String,
    pub token_symbol: String,
    pub address: Address,
    pub token_id: U256,
    pub uri: Option<String>,
}

/// A collectible with its off-chain metadata dereferenced.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectibleWithMetadata {
    pub collectible: Collectible,
    pub metadata: Value,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_uri: Option<String>,
}

impl CollectibleWithMetadata {
    fn new(collectible: Collectible, metadata: Value) -> Self {
        let name = metadata
            .get("name")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let description = metadata
            .get("description")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let image_uri = extract_image(&metadata);
        Self {
            collectible,
            metadata,
            name,
            description,
            image_uri,
        }
    }
}

/// Picks the image link out of a metadata document: the well-known keys
/// first, then any `image*` key holding a link.
fn extract_image(metadata: &Value) -> Option<String> {
    for key in &["image", "image_url", "image_uri", "imageUri", "imageUrl"] {
        if let Some(value) = metadata.get(*key).and_then(|value| value.as_str()) {
            return Some(value.to_string());
        }
    }

    let object = metadata.as_object()?;
    for (key, value) in object {
        if let Some(text) = value.as_str() {
            if key.to_lowercase().starts_with("image") && text.starts_with("http") {
                return Some(text.to_string());
            }
        }
    }
    None
}

pub struct CollectiblesService<W> {
    client: W,
    http: reqwest::Client,
    token_info_cache: HashMap<Address, (String, String)>,
}

impl<W: EthereumGateway> CollectiblesService<W> {
    pub fn new(client: W) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            token_info_cache: HashMap::new(),
        }
    }

    /// Current collectibles of `owner`: the tokens ever transferred to it
    /// whose `ownerOf` still reports the wallet, with their URIs.
    pub async fn get_collectibles<I: StorageInteractor>(
        &mut self,
        interactor: &mut I,
        owner: Address,
    ) -> anyhow::Result<Vec<Collectible>> {
        let candidates = interactor.erc721_tokens_transferred_to(owner).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let owner_of = erc721_function("ownerOf");
        let ownership_calls: Vec<ContractCall> = candidates
            .iter()
            .map(|(token_address, token_id)| {
                encode_call(&owner_of, *token_address, &[Token::Uint(*token_id)])
            })
            .collect::<Result<_, _>>()?;
        let owners = self.client.batch_call(&ownership_calls, false).await?;

        // Leave out tokens the wallet no longer holds.
        let holdings: Vec<(Address, U256)> = candidates
            .into_iter()
            .zip(owners)
            .filter_map(|(candidate, output)| {
                let output = output?;
                let current_owner = decode_address(&owner_of, &output)?;
                if current_owner == owner {
                    Some(candidate)
                } else {
                    None
                }
            })
            .collect();
        if holdings.is_empty() {
            return Ok(Vec::new());
        }

        let token_uri = erc721_function("tokenURI");
        let uri_calls: Vec<ContractCall> = holdings
            .iter()
            .map(|(token_address, token_id)| {
                encode_call(&token_uri, *token_address, &[Token::Uint(*token_id)])
            })
            .collect::<Result<_, _>>()?;
        let uris = self.client.batch_call(&uri_calls, false).await?;

        let mut collectibles = Vec::with_capacity(holdings.len());
        for ((token_address, token_id), uri_output) in holdings.into_iter().zip(uris) {
            let mut uri = uri_output.and_then(|output| decode_string(&token_uri, &output));
            if uri.is_none() {
                if CRYPTO_KITTIES_ADDRESSES.contains(&token_address) {
                    uri = Some(format!("https://api.cryptokitties.co/kitties/{}", token_id));
                } else {
                    vlog::warn!(
                        "cannot get token uri for token {:?} with id {} owned by {:?}",
                        token_address,
                        token_id,
                        owner
                    );
                }
            }

            let (token_name, token_symbol) = self.get_token_info(token_address).await;
            collectibles.push(Collectible {
                token_name,
                token_symbol,
                address: token_address,
                token_id,
                uri,
            });
        }
        Ok(collectibles)
    }

    pub async fn get_collectibles_with_metadata<I: StorageInteractor>(
        &mut self,
        interactor: &mut I,
        owner: Address,
    ) -> anyhow::Result<Vec<CollectibleWithMetadata>> {
        let mut result = Vec::new();
        for collectible in self.get_collectibles(interactor, owner).await? {
            let metadata = match &collectible.uri {
                Some(uri) => match self.get_metadata(uri).await {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        vlog::warn!(
                            "cannot retrieve metadata for token {:?}: {}",
                            collectible.address,
                            err
                        );
                        Value::Object(Default::default())
                    }
                },
                None => Value::Object(Default::default()),
            };
            result.push(CollectibleWithMetadata::new(collectible, metadata));
        }
        Ok(result)
    }

    /// Dereferences an `http(s)` token URI into its JSON metadata.
    pub async fn get_metadata(&self, uri: &str) -> Result<Value, CollectiblesError> {
        if !uri.starts_with("http") {
            return Err(CollectiblesError::MetadataRetrieval(uri.to_string()));
        }

        let response = self
            .http
            .get(uri)
            .send()
            .await
            .map_err(|_| CollectiblesError::MetadataRetrieval(uri.to_string()))?;
        if !response.status().is_success() {
            return Err(CollectiblesError::MetadataRetrieval(uri.to_string()));
        }
        response
            .json()
            .await
            .map_err(|_| CollectiblesError::MetadataRetrieval(uri.to_string()))
    }

    /// `(name, symbol)` of a token contract, cached per service instance.
    async fn get_token_info(&mut self, token_address: Address) -> (String, String) {
        if let Some(info) = self.token_info_cache.get(&token_address) {
            return info.clone();
        }
        if ENS_ADDRESSES.contains(&token_address) {
            return ("Ethereum Name Service".to_string(), "ENS".to_string());
        }

        let name_function = erc721_function("name");
        let symbol_function = erc721_function("symbol");
        let calls = match (
            encode_call(&name_function, token_address, &[]),
            encode_call(&symbol_function, token_address, &[]),
        ) {
            (Ok(name_call), Ok(symbol_call)) => vec![name_call, symbol_call],
            _ => return (String::new(), String::new()),
        };

        let outputs = match self.client.batch_call(&calls, false).await {
            Ok(outputs) => outputs,
            Err(err) => {
                vlog::warn!(
                    "cannot get token info for token {:?}: {}",
                    token_address,
                    err
                );
                return (String::new(), String::new());
            }
        };

        let mut name = outputs
            .get(0)
            .and_then(|output| output.as_deref())
            .and_then(|output| decode_string(&name_function, output))
            .unwrap_or_default();
        let mut symbol = outputs
            .get(1)
            .and_then(|output| output.as_deref())
            .and_then(|output| decode_string(&symbol_function, output))
            .unwrap_or_default();

        // If the symbol is way bigger than the name they are most likely
        // swapped on-chain (e.g. POAP).
        if (name.len() as i64) - (symbol.len() as i64) < -5 {
            std::mem::swap(&mut name, &mut symbol);
        }

        self.token_info_cache
            .insert(token_address, (name.clone(), symbol.clone()));
        (name, symbol)
    }
}

fn erc721_function(name: &str) -> Function {
    erc721_contract()
        .function(name)
        .expect("erc721 abi")
        .clone()
}

fn encode_call(
    function: &Function,
    to: Address,
    tokens: &[Token],
) -> anyhow::Result<ContractCall> {
    let data = function.encode_input(tokens)?;
    Ok(ContractCall::new(to, data))
}

fn decode_address(function: &Function, output: &[u8]) -> Option<Address> {
    match function.decode_output(output).ok()?.into_iter().next()? {
        Token::Address(address) => Some(address),
        _ => None,
    }
}

fn decode_string(function: &Function, output: &[u8]) -> Option<String> {
    match function.decode_output(output).ok()?.into_iter().next()? {
        Token::String(value) => Some(value),
        _ => None,
    }
}
