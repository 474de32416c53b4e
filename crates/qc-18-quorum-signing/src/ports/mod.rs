//! Ports module for the Quorum Signing subsystem

pub mod inbound;
pub mod outbound;

pub use inbound::{
    CleanupReport, QuorumSelection, QuorumSigningApi, ShareDisposition, SignOptions, VerifyRequest,
};
pub use outbound::{
    ChainIndex, DealtKeys, KeyDealer, ShareTransport, SystemTimeSource, ThresholdCrypto, TimeSource,
};
