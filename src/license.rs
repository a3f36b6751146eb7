//! Normalization of provider-specific license codes.
//!
//! Providers report photo licenses as small numeric codes. Everything the
//! rest of the application sees is the canonical license string produced
//! here; raw codes never leave the provider layer.

/// The safe default for photos with no or an unrecognized license code.
pub const ALL_RIGHTS_RESERVED: &str = "all rights reserved";

/// Decodes a provider license code into its canonical license string.
///
/// The mapping is total: any code outside the known table, including a
/// missing or non-numeric one, falls back to "all rights reserved". A
/// permissive license is never assumed.
pub fn decode(code: Option<&str>) -> &'static str {
    let parsed = code.and_then(|c| c.trim().parse::<u8>().ok());
    match parsed {
        Some(1) => "CC BY-NC-SA",
        Some(2) => "CC BY-NC",
        Some(3) => "CC BY-NC-ND",
        Some(4) => "CC BY",
        Some(5) => "CC SA",
        Some(6) => "CC ND",
        Some(7) => "PD",
        Some(8) => "United States Government Work",
        _ => ALL_RIGHTS_RESERVED,
    }
}
