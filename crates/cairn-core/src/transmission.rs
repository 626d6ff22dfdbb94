//! Transmission record — the unit of work for the delivery pipeline.
//!
//! A transmission is a finalized, signed report plus the routing metadata
//! needed to deliver it to one destination server. Its BLAKE3 content hash
//! is the record's identity everywhere downstream: queueing, server-side
//! deduplication, and deletion after confirmed delivery.

/// Network peer identifier — a 32-byte public key.
pub type PeerId = [u8; 32];

/// Wire format of the packed report payload.
///
/// The wire value is carried losslessly: an unrecognized value survives as
/// `Unknown` until the pack step, where it becomes a terminal encoding
/// error rather than a silent drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Json,
    EvmPremiumLegacy,
    Unknown(u32),
}

impl ReportFormat {
    pub fn from_wire(value: u32) -> Self {
        match value {
            1 => ReportFormat::EvmPremiumLegacy,
            2 => ReportFormat::Json,
            other => ReportFormat::Unknown(other),
        }
    }

    pub fn wire_value(&self) -> u32 {
        match self {
            ReportFormat::EvmPremiumLegacy => 1,
            ReportFormat::Json => 2,
            ReportFormat::Unknown(other) => *other,
        }
    }
}

/// A single oracle signature over the report, attributed to its signer's
/// index within the signing committee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributedSignature {
    pub signature: Vec<u8>,
    pub signer: u8,
}

/// A signed report queued for delivery to one destination server.
///
/// Exclusively owned by that server's durable queue until either deletion
/// is requested after confirmed delivery, or the queue is closed during
/// shutdown and ownership is abandoned.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// Destination server URL. Not part of report content, but part of the
    /// record's identity — the same report bound for two servers is two
    /// distinct records.
    pub server_url: String,
    /// Digest of the protocol configuration the report was produced under.
    pub config_digest: [u8; 32],
    /// Report sequence number within the config's epoch.
    pub seq_nr: u64,
    pub report_format: ReportFormat,
    /// Opaque report bytes, already encoded and signed upstream.
    pub report: Vec<u8>,
    pub sigs: Vec<AttributedSignature>,
}

impl Transmission {
    /// Content hash identifying this record.
    ///
    /// BLAKE3 over a length-prefixed encoding of every field, so two
    /// records differing anywhere hash differently and repeated calls are
    /// byte-identical. This is the key used for deduplication and for
    /// deletion from persistent storage after delivery.
    pub fn hash(&self) -> [u8; 32] {
        let mut h = blake3::Hasher::new();
        h.update(&(self.server_url.len() as u64).to_le_bytes());
        h.update(self.server_url.as_bytes());
        h.update(&self.config_digest);
        h.update(&self.seq_nr.to_le_bytes());
        h.update(&self.report_format.wire_value().to_le_bytes());
        h.update(&(self.report.len() as u64).to_le_bytes());
        h.update(&self.report);
        h.update(&(self.sigs.len() as u64).to_le_bytes());
        for sig in &self.sigs {
            h.update(&(sig.signature.len() as u64).to_le_bytes());
            h.update(&sig.signature);
            h.update(&[sig.signer]);
        }
        *h.finalize().as_bytes()
    }
}
