/// Compiled contract artifacts as written by Hardhat
/// (`artifacts/contracts/<Source>.sol/<Name>.json`)

use ethers::abi::Abi;
use ethers::types::Bytes;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Failed to read artifact {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid artifact: {0}")]
    Invalid(String),
    #[error("Artifact for {0} has no creation bytecode (abstract contract or interface?)")]
    EmptyBytecode(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub contract_name: String,
    #[serde(default)]
    pub source_name: Option<String>,
    pub abi: Abi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ArtifactError> {
        let artifact: ContractArtifact =
            serde_json::from_str(raw).map_err(|e| ArtifactError::Invalid(e.to_string()))?;

        if artifact.bytecode.is_empty() {
            return Err(ArtifactError::EmptyBytecode(artifact.contract_name));
        }

        Ok(artifact)
    }

    /// Whether the constructor takes arguments; the deployer only supports
    /// argument-free constructors.
    pub fn has_constructor_args(&self) -> bool {
        self.abi
            .constructor()
            .map(|ctor| !ctor.inputs.is_empty())
            .unwrap_or(false)
    }
}
