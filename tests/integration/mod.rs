//! Integration tests for the apigit replica engine

mod conflict_resolution;
mod push_scenarios;
mod replica_files;
mod storage_backends;
