//! Pipeline options

use serde::Deserialize;

/// Which demosaicing method to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// Adaptive homogeneity-directed. The quality path.
    Ahd,
    /// Weighted neighbor averaging. The fast path.
    Bilinear,
}

/// Options for one run of the development pipeline.
///
/// Deserializable so drivers can load them from a file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DevelopOptions {
    pub interpolation: Interpolation,

    /// Gamma exponent of the output curve.
    pub gamma_power: f64,

    /// Slope of the output curve's linear toe.
    pub gamma_toe_slope: f64,

    /// Honor the linearization table's split row by re-keying the Huffman
    /// tree there. Off by default: the available reference renderings
    /// were produced without the split, and bit parity with them wins
    /// until re-verified against in-camera output.
    pub honor_linearization_split: bool,
}

impl Default for DevelopOptions {
    fn default() -> Self {
        DevelopOptions {
            interpolation: Interpolation::Ahd,
            gamma_power: 0.45,
            gamma_toe_slope: 4.5,
            honor_linearization_split: false,
        }
    }
}
