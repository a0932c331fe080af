//! In-memory collaborators for exercising the protocol end to end without a
//! real ledger: a mock token ledger and a pre-wired deployment fixture.

mod fixtures;
mod mock_ledger;

pub use fixtures::TestDeployment;
pub use mock_ledger::MockTokenLedger;
