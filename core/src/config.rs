use crate::{
    error::{ControlError, ControlResult},
    types::{Km, Year},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RADIUS_LADDER: [Km; 6] = [0.1, 0.5, 1.0, 5.0, 10.0, 20.0];
pub const DEFAULT_DURATION_MARGIN: f64 = 0.1;
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 500;

/// Everything one matching run needs. Passed explicitly into the engine;
/// nothing is read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchConfig {
    /// Candidate search radii in km. Stored in caller order; each search
    /// mode sorts its own copy.
    pub radius_ladder:           Vec<Km>,
    /// Relative duration tolerance, as a share of the target duration.
    pub duration_margin:         f64,
    pub outcome_field:           String,
    pub purchase_duration_field: String,
    pub sale_duration_field:     String,
    pub restrict_quarter:        bool,
    pub restrict_month:          bool,
    /// Sale-side controls must also share the treated unit's purchase year.
    pub restrict_both_years:     bool,
    pub output_tag:              String,
    pub max_chunk_size:          usize,
    /// Worker pool size. `None` uses the host's available parallelism.
    pub workers:                 Option<usize>,
    /// When false, the whole treated table is one task matched against
    /// the whole control table.
    pub parallelize:             bool,
    /// Only keep treated units sold in this year.
    pub real_time_year:          Option<Year>,
    /// Only keep controls whose duration is at most the longest treated
    /// purchase duration plus this many years.
    pub control_duration_cap:    Option<f64>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            radius_ladder:           DEFAULT_RADIUS_LADDER.to_vec(),
            duration_margin:         DEFAULT_DURATION_MARGIN,
            outcome_field:           "log_price".into(),
            purchase_duration_field: "L_duration".into(),
            sale_duration_field:     "whb_duration".into(),
            restrict_quarter:        false,
            restrict_month:          false,
            restrict_both_years:     false,
            output_tag:              String::new(),
            max_chunk_size:          DEFAULT_MAX_CHUNK_SIZE,
            workers:                 None,
            parallelize:             true,
            real_time_year:          None,
            control_duration_cap:    None,
        }
    }
}

impl MatchConfig {
    /// Load from a JSON file. Missing keys take their default values.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: MatchConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Config for unit tests: small ladder, two workers, defaults otherwise.
    pub fn default_test() -> Self {
        Self {
            radius_ladder: vec![0.1, 1.0, 10.0],
            workers:       Some(2),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ControlResult<()> {
        let invalid = |reason: String| Err(ControlError::InvalidConfig { reason });

        if self.radius_ladder.is_empty() {
            return invalid("radius_ladder must not be empty".into());
        }
        if let Some(r) = self.radius_ladder.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return invalid(format!("radius {r} must be finite and non-negative"));
        }
        if !self.duration_margin.is_finite() || self.duration_margin < 0.0 {
            return invalid(format!(
                "duration_margin {} must be finite and non-negative",
                self.duration_margin
            ));
        }
        if self.restrict_quarter && self.restrict_month {
            return invalid("restrict_quarter and restrict_month are mutually exclusive".into());
        }
        if self.max_chunk_size == 0 {
            return invalid("max_chunk_size must be at least 1".into());
        }
        if self.workers == Some(0) {
            return invalid("workers must be at least 1".into());
        }
        Ok(())
    }

    /// Ladder sorted narrowest first, duplicates removed.
    pub fn ladder_ascending(&self) -> Vec<Km> {
        let mut ladder = self.radius_ladder.clone();
        ladder.sort_by(|a, b| a.total_cmp(b));
        ladder.dedup();
        ladder
    }

    /// Ladder sorted widest first, duplicates removed.
    pub fn ladder_descending(&self) -> Vec<Km> {
        let mut ladder = self.ladder_ascending();
        ladder.reverse();
        ladder
    }

    /// The statistics runs of the lease-extension study: the raw log price,
    /// three hedonic residuals, and a quarter-restricted log price.
    pub fn standard_variants(&self) -> Vec<MatchConfig> {
        let mut variants: Vec<MatchConfig> = [
            ("log_price", ""),
            ("pres_bedrooms", "_bedrooms"),
            ("pres_all", "_all"),
            ("pres_linear", "_linear"),
        ]
        .iter()
        .map(|(outcome, tag)| MatchConfig {
            outcome_field: (*outcome).into(),
            output_tag:    (*tag).into(),
            ..self.clone()
        })
        .collect();

        variants.push(MatchConfig {
            outcome_field:    "log_price".into(),
            output_tag:       "_quarterly".into(),
            restrict_quarter: true,
            restrict_month:   false,
            ..self.clone()
        });
        variants
    }
}
