pub mod artifact;
pub mod cli;
pub mod deploy;
pub mod explorer;

pub use artifact::{ArtifactError, ContractArtifact};
pub use deploy::{deploy, DeployError, DeployTarget, Deployment};
pub use explorer::{ExplorerClient, ExplorerError, VerificationRequest, VerificationStatus};
