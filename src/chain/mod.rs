//! Chain oracles
//!
//! Read-only, point-in-time views of external chain state:
//! - ChainResolver: transaction id -> collateral output (Blockbook)
//! - RegistryClient: address -> active-node membership (node JSON-RPC)

pub mod blockbook;
pub mod mock;
pub mod registry;
pub mod traits;

pub use blockbook::{BlockbookResolver, DEFAULT_COLLATERAL_SATS};
pub use mock::{MockChainResolver, MockRegistry};
pub use registry::NodeRpcRegistry;
pub use traits::{
    ChainResolver, CollateralProblem, CollateralResolution, OracleError, OracleResult,
    RegistryClient,
};
