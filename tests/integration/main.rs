//! Integration tests: full engine cycles against an in-memory contract.

mod engine_flow;
mod mock_gateway;
