/// A successfully decoded PDF417 symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdf417Barcode {
    /// Decoded payload. Byte compaction output is mapped through Latin-1,
    /// so the original bytes can be recovered with [`bytes`](Self::bytes).
    pub text: String,
    /// Error correction level the symbol was encoded with (0..=8)
    pub ec_level: u8,
    /// Number of symbol errors fixed by error correction
    pub errors_corrected: usize,
    /// Number of grid cells that had no detected codeword
    pub erasures: usize,
    /// Macro PDF417 control block, if the symbol carried one
    pub macro_metadata: Option<MacroMetadata>,
}

impl Pdf417Barcode {
    /// Payload as raw bytes (Latin-1 inverse of [`text`](Self::text)).
    /// Characters above U+00FF (possible only via exotic byte-shift
    /// codewords) are dropped.
    pub fn bytes(&self) -> Vec<u8> {
        self.text
            .chars()
            .filter(|&c| (c as u32) <= 0xFF)
            .map(|c| c as u8)
            .collect()
    }
}

/// Metadata of a Macro PDF417 control block (segmented symbols)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroMetadata {
    /// Zero-based index of this segment
    pub segment_index: u32,
    /// File id shared by all segments of the distributed representation
    pub file_id: String,
    /// Total number of segments, if the optional field was present
    pub segment_count: Option<u32>,
    /// Optional file name field
    pub file_name: Option<String>,
    /// Optional sender field
    pub sender: Option<String>,
    /// Optional addressee field
    pub addressee: Option<String>,
    /// Optional timestamp field (seconds since epoch, as encoded)
    pub timestamp: Option<u64>,
    /// Optional file size field
    pub file_size: Option<u64>,
    /// Optional checksum field (CCITT-16 of the whole file)
    pub checksum: Option<u32>,
    /// True when this segment carried the terminator codeword
    pub is_last_segment: bool,
}
