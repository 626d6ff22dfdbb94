//! Report packing — one packer per wire format.
//!
//! The packer turns a signed report into the destination's payload bytes.
//! The JSON packer is provided here; the EVM premium-legacy packer is
//! format-specific enough to live with its codec and is injected by the
//! caller.

use cairn_core::AttributedSignature;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PackError {
    /// No packer exists for this wire format value. Terminal for the
    /// record: the send attempt fails without a network round-trip.
    #[error("don't know how to pack unsupported report format {0}")]
    UnsupportedFormat(u32),
    #[error("report serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait ReportPacker: Send + Sync {
    fn pack(
        &self,
        config_digest: &[u8; 32],
        seq_nr: u64,
        report: &[u8],
        sigs: &[AttributedSignature],
    ) -> Result<Vec<u8>, PackError>;
}

/// Packs reports as a JSON document with hex-encoded binary fields.
pub struct JsonReportPacker;

#[derive(Serialize)]
struct JsonReport {
    config_digest: String,
    seq_nr: u64,
    report: String,
    sigs: Vec<JsonSignature>,
}

#[derive(Serialize)]
struct JsonSignature {
    signer: u8,
    signature: String,
}

impl ReportPacker for JsonReportPacker {
    fn pack(
        &self,
        config_digest: &[u8; 32],
        seq_nr: u64,
        report: &[u8],
        sigs: &[AttributedSignature],
    ) -> Result<Vec<u8>, PackError> {
        let doc = JsonReport {
            config_digest: hex::encode(config_digest),
            seq_nr,
            report: hex::encode(report),
            sigs: sigs
                .iter()
                .map(|s| JsonSignature {
                    signer: s.signer,
                    signature: hex::encode(&s.signature),
                })
                .collect(),
        };
        Ok(serde_json::to_vec(&doc)?)
    }
}
