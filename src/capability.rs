//! Per-model constraint tables for the remote video service.

use std::collections::HashMap;

pub const DEFAULT_MODEL: &str = "gen4_turbo";
pub const DEFAULT_RATIO: &str = "1280:720";
pub const DEFAULT_DURATION_SECS: f64 = 5.0;

pub const MIN_DURATION_SECS: u32 = 2;
pub const MAX_DURATION_SECS: u32 = 10;

/// Constraints the service enforces for one model. The API rejects requests
/// outside these sets, so they are checked before any network call.
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    /// Whether the model accepts a last-frame keyframe in addition to the first.
    pub supports_end_frame: bool,
    /// Accepted durations in seconds, or `None` for any integer in [2, 10].
    pub durations: Option<&'static [u32]>,
    /// Accepted aspect ratios, or `None` for any.
    pub ratios: Option<&'static [&'static str]>,
}

impl Capability {
    /// Fallback for models not in the table: no constraint beyond the
    /// generic duration bound.
    pub const ANY: Capability = Capability {
        supports_end_frame: true,
        durations: None,
        ratios: None,
    };

    /// Round the requested duration to whole seconds, clamp to [2, 10], then
    /// snap to the nearest allowed value when the model has a fixed set.
    /// Ties break toward the smaller value.
    pub fn resolve_duration(&self, requested: f64) -> u32 {
        let sec = requested.round() as i64;
        let sec = sec.clamp(MIN_DURATION_SECS as i64, MAX_DURATION_SECS as i64) as u32;
        match self.durations {
            None => sec,
            Some(allowed) => {
                let mut best = allowed[0];
                for &candidate in allowed {
                    let d = (candidate as i64 - sec as i64).abs();
                    if d < (best as i64 - sec as i64).abs() {
                        best = candidate;
                    }
                }
                best
            }
        }
    }
}

/// Immutable model lookup, built once at startup and passed by reference into
/// validation and generation.
#[derive(Debug)]
pub struct CapabilityTable {
    models: HashMap<&'static str, Capability>,
}

impl CapabilityTable {
    pub fn builtin() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "gen4_turbo",
            Capability {
                supports_end_frame: false,
                durations: None,
                ratios: Some(&[
                    "1280:720", "720:1280", "1104:832", "832:1104", "960:960", "1584:672",
                ]),
            },
        );
        models.insert(
            "veo3",
            Capability {
                supports_end_frame: false,
                durations: None,
                ratios: Some(&["1280:720", "720:1280"]),
            },
        );
        models.insert(
            "veo3.1",
            Capability {
                supports_end_frame: true,
                durations: Some(&[4, 6, 8]),
                ratios: Some(&["1280:720", "720:1280", "1080:1920", "1920:1080"]),
            },
        );
        models.insert(
            "veo3.1_fast",
            Capability {
                supports_end_frame: true,
                durations: Some(&[4, 6, 8]),
                ratios: Some(&["1280:720", "720:1280", "1080:1920", "1920:1080"]),
            },
        );
        models.insert(
            "gen3a_turbo",
            Capability {
                supports_end_frame: true,
                durations: Some(&[5, 10]),
                ratios: Some(&["768:1280", "1280:768"]),
            },
        );
        Self { models }
    }

    pub fn get(&self, model: &str) -> Option<Capability> {
        self.models.get(model).copied()
    }

    /// Capability for a model, falling back to the permissive default for
    /// names the table does not know.
    pub fn for_model(&self, model: &str) -> Capability {
        self.get(model).unwrap_or(Capability::ANY)
    }

    /// Model names that accept a last-frame keyframe, sorted for stable
    /// error messages.
    pub fn end_frame_models(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .models
            .iter()
            .filter(|(_, cap)| cap.supports_end_frame)
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_knows_frame_support() {
        let table = CapabilityTable::builtin();
        assert!(!table.for_model("gen4_turbo").supports_end_frame);
        assert!(!table.for_model("veo3").supports_end_frame);
        assert!(table.for_model("veo3.1").supports_end_frame);
        assert!(table.for_model("gen3a_turbo").supports_end_frame);
    }

    #[test]
    fn unknown_model_is_permissive() {
        let table = CapabilityTable::builtin();
        let cap = table.for_model("someday_model");
        assert!(cap.supports_end_frame);
        assert!(cap.durations.is_none());
        assert!(cap.ratios.is_none());
    }

    #[test]
    fn duration_snaps_to_nearest_allowed() {
        let table = CapabilityTable::builtin();
        let veo = table.for_model("veo3.1");
        // 7 is equidistant from 6 and 8; ties go to the smaller value.
        assert_eq!(veo.resolve_duration(7.0), 6);
        assert_eq!(veo.resolve_duration(4.4), 4);
        assert_eq!(veo.resolve_duration(9.0), 8);

        let gen3a = table.for_model("gen3a_turbo");
        assert_eq!(gen3a.resolve_duration(7.0), 5);
        assert_eq!(gen3a.resolve_duration(8.0), 10);
    }

    #[test]
    fn open_duration_clamps_to_bounds() {
        let table = CapabilityTable::builtin();
        let cap = table.for_model("gen4_turbo");
        assert_eq!(cap.resolve_duration(0.4), 2);
        assert_eq!(cap.resolve_duration(5.2), 5);
        assert_eq!(cap.resolve_duration(14.0), 10);
    }

    #[test]
    fn end_frame_models_are_sorted() {
        let table = CapabilityTable::builtin();
        let names = table.end_frame_models();
        assert_eq!(names, vec!["gen3a_turbo", "veo3.1", "veo3.1_fast"]);
    }
}
