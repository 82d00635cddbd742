//! Infrastructure layer - Solana RPC and HTTP implementations of the domain ports

pub mod api_clients;
pub mod blockchain;
