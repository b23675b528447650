//! Integration tests for InMemoryGateway using the gateway test harness.
//!
//! This file invokes `gateway_contract_tests!` to validate that
//! InMemoryGateway fully conforms to the CollectionGateway<T> contract, and
//! that the scripted wrapper used by the view tests does too.

#[macro_use]
mod gateway_harness;

use gateway_harness::*;

gateway_contract_tests!(patient_store());

mod scripted {
    use super::*;

    gateway_contract_tests!(ScriptedGateway::new(patient_store()));
}
