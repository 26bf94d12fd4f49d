//! Pipeline parameters and the regression feature bitmask.
//!
//! Jobs carry their pipeline options as a string map. The estimator turns the
//! boolean options into a single numeric feature: bit 0 is always set as a
//! bias term and bits 1–6 hold the flags. Trained models are only meaningful
//! if every caller packs the bits in exactly this order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

pub const INPUT_CONTIGS_CUTOFF: &str = "InputContigsCutoff";
pub const USE_BLAST_UNIREF50: &str = "UseBlastUniref50";
pub const USE_INTERPRO_SCAN5: &str = "UseInterproScan5";
pub const USE_PRIAM: &str = "UsePriam";
pub const REMOVE_NON_COMPLETE_GENES: &str = "RemoveNonCompleteGenes";
pub const EXPORT_MERGED_GENBANK: &str = "ExportMergedGenbank";
pub const USE_BLAST_MAR_REF: &str = "UseBlastMarRef";

/// Typed view of a job's pipeline options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineParameters {
    pub input_contigs_cutoff: i64,
    pub use_blast_uniref50: bool,
    pub use_interpro_scan5: bool,
    pub use_priam: bool,
    pub remove_non_complete_genes: bool,
    pub export_merged_genbank: bool,
    pub use_blast_mar_ref: bool,
}

/// Packed boolean features. Bit 0 is the bias bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureMask(u8);

const BIAS: u8 = 1;

impl FeatureMask {
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn as_feature(self) -> f64 {
        f64::from(self.0)
    }

    fn flag(self, position: u8) -> bool {
        self.0 & (1 << position) != 0
    }
}

impl PipelineParameters {
    /// Decode from a job's string map. Missing keys default to `false` / `0`.
    pub fn from_job_parameters(params: &BTreeMap<String, String>) -> ConfigResult<Self> {
        let flag = |key: &str| -> ConfigResult<bool> {
            match params.get(key) {
                None => Ok(false),
                Some(v) if v.is_empty() => Ok(false),
                Some(v) => v.parse::<bool>().map_err(|_| ConfigError::InvalidParameter {
                    key: key.to_string(),
                    value: v.clone(),
                }),
            }
        };

        let input_contigs_cutoff = match params.get(INPUT_CONTIGS_CUTOFF) {
            None => 0,
            Some(v) if v.is_empty() => 0,
            Some(v) => v.parse::<i64>().map_err(|_| ConfigError::InvalidParameter {
                key: INPUT_CONTIGS_CUTOFF.to_string(),
                value: v.clone(),
            })?,
        };

        Ok(Self {
            input_contigs_cutoff,
            use_blast_uniref50: flag(USE_BLAST_UNIREF50)?,
            use_interpro_scan5: flag(USE_INTERPRO_SCAN5)?,
            use_priam: flag(USE_PRIAM)?,
            remove_non_complete_genes: flag(REMOVE_NON_COMPLETE_GENES)?,
            export_merged_genbank: flag(EXPORT_MERGED_GENBANK)?,
            use_blast_mar_ref: flag(USE_BLAST_MAR_REF)?,
        })
    }

    /// Encode as the string map stored on a `Job`.
    pub fn to_job_parameters(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (INPUT_CONTIGS_CUTOFF.to_string(), self.input_contigs_cutoff.to_string()),
            (USE_BLAST_UNIREF50.to_string(), self.use_blast_uniref50.to_string()),
            (USE_INTERPRO_SCAN5.to_string(), self.use_interpro_scan5.to_string()),
            (USE_PRIAM.to_string(), self.use_priam.to_string()),
            (
                REMOVE_NON_COMPLETE_GENES.to_string(),
                self.remove_non_complete_genes.to_string(),
            ),
            (EXPORT_MERGED_GENBANK.to_string(), self.export_merged_genbank.to_string()),
            (USE_BLAST_MAR_REF.to_string(), self.use_blast_mar_ref.to_string()),
        ])
    }

    pub fn feature_mask(&self) -> FeatureMask {
        let flags = [
            self.use_blast_mar_ref,
            self.export_merged_genbank,
            self.remove_non_complete_genes,
            self.use_priam,
            self.use_interpro_scan5,
            self.use_blast_uniref50,
        ];
        let bits = flags
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .fold(BIAS, |acc, (i, _)| acc | 1 << (i + 1));
        FeatureMask(bits)
    }

    /// Rebuild the boolean options from a mask. The cutoff is not part of
    /// the mask and is taken from the caller.
    pub fn from_feature_mask(mask: FeatureMask, input_contigs_cutoff: i64) -> Self {
        Self {
            input_contigs_cutoff,
            use_blast_mar_ref: mask.flag(1),
            export_merged_genbank: mask.flag(2),
            remove_non_complete_genes: mask.flag(3),
            use_priam: mask.flag(4),
            use_interpro_scan5: mask.flag(5),
            use_blast_uniref50: mask.flag(6),
        }
    }
}
