/*!
# Dockyard DevKit - Test doubles and helpers

Shared by the master and agent test suites:
- `MockWorker`: a real loopback worker API that records what it receives
- `StaticRuntime`: in-memory container runtime
- Fixtures for wire payloads
- Signed / operator request builders and tracing init for tests
*/

pub mod fixtures;
pub mod mock_worker;
pub mod test_utils;

pub use mock_worker::{MockRequest, MockWorker, MockWorkerBuilder};
pub use test_utils::{init_tracing, operator_request, signed_request, StaticRuntime};
