//! Deployment of the `StateChannel` contract.
//!
//! The migration deploys one instance bound to the first two accounts of the
//! target network. That instance only exists so the network has the contract
//! installed, channels are opened later through it.

use crate::{
    contract::{StateChannel, CONTRACT_NAME},
    types::Address,
};
use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::fmt::Display;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, PartialEq, Eq)]
pub enum DeployError {
    /// The network does not have enough accounts to pass as constructor
    /// arguments.
    NotEnoughAccounts { required: usize, available: usize },
    UnknownContract(String),
    /// The deployment targets a network the deployer is not connected to.
    WrongNetwork { expected: String, actual: String },
    InvalidArguments { expected: usize, actual: usize },
}

impl Display for DeployError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DeployError::NotEnoughAccounts {
                required,
                available,
            } => write!(f, "need {} accounts, network has {}", required, available),
            DeployError::UnknownContract(name) => write!(f, "unknown contract {}", name),
            DeployError::WrongNetwork { expected, actual } => {
                write!(f, "connected to {}, not {}", expected, actual)
            }
            DeployError::InvalidArguments { expected, actual } => {
                write!(f, "expected {} constructor arguments, got {}", expected, actual)
            }
        }
    }
}

/// Host side of a deployment, installs a named contract with constructor
/// arguments on the network called `network`.
pub trait Deployer {
    fn deploy(&mut self, network: &str, contract: &str, args: &[Address])
        -> Result<(), DeployError>;
}

/// Target network of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // Local development chain
        Self {
            name: "development".to_string(),
            chain_id: 1337,
        }
    }
}

/// Deploy `StateChannel` with Alice (`accounts[0]`) and Bob (`accounts[1]`)
/// as constructor arguments.
pub fn migrate<D: Deployer>(
    deployer: &mut D,
    network: &str,
    accounts: &[Address],
) -> Result<(), DeployError> {
    let (alice, bob) = match accounts {
        [alice, bob, ..] => (*alice, *bob),
        _ => {
            return Err(DeployError::NotEnoughAccounts {
                required: 2,
                available: accounts.len(),
            })
        }
    };
    info!(network, contract = CONTRACT_NAME, ?alice, ?bob, "deploying");
    deployer.deploy(network, CONTRACT_NAME, &[alice, bob])
}

/// Record of one deployment on a [LocalNetwork].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub name: String,
    pub network: String,
    pub args: Vec<Address>,
}

/// In-process network that instantiates deployed contracts directly.
#[derive(Debug, Default)]
pub struct LocalNetwork {
    config: NetworkConfig,
    deployments: Vec<Deployment>,
    contracts: Vec<StateChannel>,
}

impl LocalNetwork {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    pub fn contracts(&self) -> &[StateChannel] {
        &self.contracts
    }

    pub fn contract_mut(&mut self, idx: usize) -> Option<&mut StateChannel> {
        self.contracts.get_mut(idx)
    }
}

impl Deployer for LocalNetwork {
    fn deploy(
        &mut self,
        network: &str,
        contract: &str,
        args: &[Address],
    ) -> Result<(), DeployError> {
        if network != self.config.name {
            return Err(DeployError::WrongNetwork {
                expected: self.config.name.clone(),
                actual: network.to_string(),
            });
        }
        if contract != CONTRACT_NAME {
            return Err(DeployError::UnknownContract(contract.to_string()));
        }
        let instance = match args {
            [alice, bob] => StateChannel::new(*alice, *bob),
            _ => {
                return Err(DeployError::InvalidArguments {
                    expected: 2,
                    actual: args.len(),
                })
            }
        };

        self.deployments.push(Deployment {
            name: contract.to_string(),
            network: network.to_string(),
            args: args.to_vec(),
        });
        self.contracts.push(instance);
        info!(network, contract, "deployed");
        Ok(())
    }
}
