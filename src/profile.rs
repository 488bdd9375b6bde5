//! Calibration profile model and persistence
//!
//! The profile is a small JSON document shared with the audio engine:
//! HRTF subject selection, headphone EQ state, and head-tracking
//! preferences. The engine only ever reads it, this crate's calibration
//! tools write it. Writers replace the file atomically (temp file plus
//! rename in the target directory) and mirror identical bytes to a second
//! well-known location so either side of a sandbox boundary can find it;
//! mirror failures are logged and swallowed.
//!
//! Field names, enum strings, and the schema tag are wire-pinned with
//! serde renames. Changing any of them breaks the engine's reader.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Schema tag stamped into every profile document
pub const PROFILE_SCHEMA: &str = "locusq-calibration-profile-v1";

/// Profile file name under the per-user app directories
pub const PROFILE_FILE_NAME: &str = "CalibrationProfile.json";

/// App directory name under the data/config roots
pub(crate) const APP_DIR_NAME: &str = "LocusQ";

// ===== Document model =====

/// Known headphone hardware families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum HeadphoneModel {
    #[serde(rename = "generic")]
    Generic,
    #[serde(rename = "airpods_pro_1")]
    AirpodsPro1,
    #[serde(rename = "airpods_pro_2")]
    AirpodsPro2,
    #[serde(rename = "airpods_pro_3")]
    AirpodsPro3,
    #[serde(rename = "sony_wh1000xm5")]
    SonyWh1000Xm5,
    #[serde(rename = "custom_sofa")]
    CustomSofa,
}

/// Active noise cancellation state the profile was measured in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum HeadphoneMode {
    #[serde(rename = "anc_on")]
    AncOn,
    #[serde(rename = "anc_off")]
    AncOff,
    #[serde(rename = "default")]
    Default,
}

/// Headphone EQ compensation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum EqMode {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "peq")]
    Peq,
    #[serde(rename = "fir")]
    Fir,
}

/// HRTF dataset selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum HrtfMode {
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "sofa")]
    Sofa,
}

/// Parametric EQ band shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum PeqBandKind {
    #[serde(rename = "PK")]
    Peaking,
    #[serde(rename = "LSC")]
    LowShelf,
    #[serde(rename = "HSC")]
    HighShelf,
}

/// One parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PeqBand {
    #[serde(rename = "type")]
    pub kind: PeqBandKind,
    pub fc_hz: f64,
    pub gain_db: f64,
    pub q: f64,
}

/// HRTF subject identity
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserSection {
    /// Subject ID in the HRTF dataset (e.g. "H3")
    pub subject_id: String,
    /// Dataset-relative path of the subject's HRIR file
    pub sofa_ref: String,
    /// Hash of the embedding that selected this subject; empty when the
    /// subject was not photo-matched
    pub embedding_hash: String,
}

/// Headphone hardware and EQ state
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HeadphoneSection {
    pub hp_model_id: HeadphoneModel,
    pub hp_mode: HeadphoneMode,
    pub hp_eq_mode: EqMode,
    pub hp_hrtf_mode: HrtfMode,
    pub hp_peq_bands: Vec<PeqBand>,
    pub hp_fir_taps: Vec<f64>,
}

/// Head-tracking preferences
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackingSection {
    pub hp_tracking_enabled: bool,
    pub hp_yaw_offset_deg: f64,
}

/// Listening-test outcomes; every score is optional until the
/// verification pass has run
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct VerificationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externalization_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub front_back_confusion_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_score: Option<f64>,
}

/// The complete personalization document
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CalibrationProfile {
    pub schema: String,
    pub user: UserSection,
    pub headphone: HeadphoneSection,
    pub tracking: TrackingSection,
    #[serde(default)]
    pub verification: VerificationSection,
}

impl CalibrationProfile {
    /// Neutral starting profile: dataset default subject, generic
    /// headphones, no EQ, tracking off
    pub fn default_profile() -> Self {
        Self {
            schema: PROFILE_SCHEMA.to_string(),
            user: UserSection {
                subject_id: "H3".to_string(),
                sofa_ref: "sadie2/H3_HRIR.sofa".to_string(),
                embedding_hash: String::new(),
            },
            headphone: HeadphoneSection {
                hp_model_id: HeadphoneModel::Generic,
                hp_mode: HeadphoneMode::Default,
                hp_eq_mode: EqMode::Off,
                hp_hrtf_mode: HrtfMode::Default,
                hp_peq_bands: Vec::new(),
                hp_fir_taps: Vec::new(),
            },
            tracking: TrackingSection {
                hp_tracking_enabled: false,
                hp_yaw_offset_deg: 0.0,
            },
            verification: VerificationSection::default(),
        }
    }

    /// Pretty-printed JSON with the document's fixed key order
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self::default_profile()
    }
}

// ===== Persistence =====

/// Ordered candidate locations for the profile document.
///
/// The first candidate is the primary write target; the rest are mirrors.
/// Readers probe in order and take the first document that parses.
pub struct ProfileStore {
    candidates: Vec<PathBuf>,
}

impl ProfileStore {
    /// Build a store over explicit candidate paths.
    ///
    /// Duplicates are removed, keeping first occurrences, so a primary and
    /// mirror that resolve to the same file never double-write.
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        let mut seen = HashSet::new();
        let mut candidates = candidates;
        candidates.retain(|path| seen.insert(path.clone()));
        Self { candidates }
    }

    /// Store over the two well-known per-user locations: the data
    /// directory (primary) and the config directory (mirror).
    ///
    /// Fails only when no home directory can be determined at all.
    pub fn at_default_locations() -> Result<Self> {
        let data_root = xdg_dir("XDG_DATA_HOME", ".local/share")?;
        let config_root = xdg_dir("XDG_CONFIG_HOME", ".config")?;
        Ok(Self::new(vec![
            data_root.join(APP_DIR_NAME).join(PROFILE_FILE_NAME),
            config_root.join(APP_DIR_NAME).join(PROFILE_FILE_NAME),
        ]))
    }

    /// Store rooted at a single explicit directory (no mirrors)
    pub fn at_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(vec![dir.as_ref().join(PROFILE_FILE_NAME)])
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Read the stored profile.
    ///
    /// Probes candidates in order; the first document that parses wins.
    /// A missing or unparsable file is skipped, and having no profile
    /// anywhere is a normal state, not an error.
    pub fn load(&self) -> Option<CalibrationProfile> {
        for path in &self.candidates {
            match fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<CalibrationProfile>(&bytes) {
                    Ok(profile) => {
                        debug!("calibration profile loaded from {}", path.display());
                        return Some(profile);
                    }
                    Err(e) => {
                        debug!("skipping unparsable profile at {}: {}", path.display(), e)
                    }
                },
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => debug!("skipping unreadable profile at {}: {}", path.display(), e),
            }
        }
        None
    }

    /// Write the profile.
    ///
    /// The primary candidate is written atomically and its failure is the
    /// caller's failure. Mirrors receive byte-identical content on a
    /// best-effort basis.
    pub fn save(&self, profile: &CalibrationProfile) -> Result<()> {
        let Some((primary, mirrors)) = self.candidates.split_first() else {
            return Err(Error::Config(
                "profile store has no candidate paths".to_string(),
            ));
        };

        let bytes = serde_json::to_vec_pretty(profile)?;
        write_atomic(primary, &bytes)?;
        info!("calibration profile saved to {}", primary.display());

        for mirror in mirrors {
            if let Err(e) = write_atomic(mirror, &bytes) {
                debug!("profile mirror write to {} failed: {}", mirror.display(), e);
            }
        }
        Ok(())
    }
}

/// Resolve an XDG base directory with its conventional `$HOME` fallback.
/// Empty environment values count as unset.
pub(crate) fn xdg_dir(var: &str, home_suffix: &str) -> Result<PathBuf> {
    if let Some(value) = env::var_os(var)
        && !value.is_empty()
    {
        return Ok(PathBuf::from(value));
    }
    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => Ok(PathBuf::from(home).join(home_suffix)),
        _ => Err(Error::Config(
            "cannot determine home directory (HOME unset)".to_string(),
        )),
    }
}

/// Write via a temp file in the target directory plus rename, so readers
/// see either the old document or the new one, never a torn write.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_default_profile_constants() {
        let profile = CalibrationProfile::default_profile();
        assert_eq!(profile.schema, PROFILE_SCHEMA);
        assert_eq!(profile.user.subject_id, "H3");
        assert_eq!(profile.user.sofa_ref, "sadie2/H3_HRIR.sofa");
        assert_eq!(profile.user.embedding_hash, "");
        assert_eq!(profile.headphone.hp_model_id, HeadphoneModel::Generic);
        assert_eq!(profile.headphone.hp_mode, HeadphoneMode::Default);
        assert_eq!(profile.headphone.hp_eq_mode, EqMode::Off);
        assert!(profile.headphone.hp_peq_bands.is_empty());
        assert!(profile.headphone.hp_fir_taps.is_empty());
        assert!(!profile.tracking.hp_tracking_enabled);
        assert_eq!(profile.tracking.hp_yaw_offset_deg, 0.0);
        assert_eq!(profile.verification.externalization_score, None);
    }

    #[test]
    fn test_enum_wire_strings() {
        assert_eq!(
            serde_json::to_value(HeadphoneModel::AirpodsPro2).unwrap(),
            json!("airpods_pro_2")
        );
        assert_eq!(
            serde_json::to_value(HeadphoneModel::SonyWh1000Xm5).unwrap(),
            json!("sony_wh1000xm5")
        );
        assert_eq!(
            serde_json::to_value(HeadphoneModel::CustomSofa).unwrap(),
            json!("custom_sofa")
        );
        assert_eq!(
            serde_json::to_value(HeadphoneMode::AncOn).unwrap(),
            json!("anc_on")
        );
        assert_eq!(serde_json::to_value(EqMode::Peq).unwrap(), json!("peq"));
        assert_eq!(serde_json::to_value(HrtfMode::Sofa).unwrap(), json!("sofa"));
        assert_eq!(
            serde_json::to_value(PeqBandKind::LowShelf).unwrap(),
            json!("LSC")
        );
    }

    #[test]
    fn test_peq_band_uses_type_key() {
        let band = PeqBand {
            kind: PeqBandKind::Peaking,
            fc_hz: 1000.0,
            gain_db: -3.5,
            q: 0.71,
        };
        let value = serde_json::to_value(band).unwrap();
        assert_eq!(value["type"], json!("PK"));
        assert_eq!(value["fc_hz"], json!(1000.0));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let profile = CalibrationProfile::default_profile();
        let first = profile.to_json_pretty().unwrap();
        let second = profile.to_json_pretty().unwrap();
        assert_eq!(first, second);
        assert!(first.contains("\"schema\": \"locusq-calibration-profile-v1\""));
    }

    #[test]
    fn test_verification_omits_unset_scores() {
        let mut profile = CalibrationProfile::default_profile();
        let rendered = profile.to_json_pretty().unwrap();
        assert!(
            !rendered.contains("externalization_score"),
            "unset scores must not appear in JSON"
        );

        profile.verification.externalization_score = Some(0.8);
        let rendered = profile.to_json_pretty().unwrap();
        assert!(rendered.contains("\"externalization_score\": 0.8"));
    }

    #[test]
    fn test_document_without_verification_section_parses() {
        let raw = json!({
            "schema": PROFILE_SCHEMA,
            "user": {"subject_id": "H7", "sofa_ref": "sadie2/H7_HRIR.sofa", "embedding_hash": ""},
            "headphone": {
                "hp_model_id": "airpods_pro_1",
                "hp_mode": "anc_on",
                "hp_eq_mode": "off",
                "hp_hrtf_mode": "default",
                "hp_peq_bands": [],
                "hp_fir_taps": []
            },
            "tracking": {"hp_tracking_enabled": true, "hp_yaw_offset_deg": 12.5}
        });
        let profile: CalibrationProfile = serde_json::from_value(raw).unwrap();
        assert_eq!(profile.user.subject_id, "H7");
        assert_eq!(profile.headphone.hp_model_id, HeadphoneModel::AirpodsPro1);
        assert_eq!(profile.verification, VerificationSection::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProfileStore::at_dir(temp_dir.path());

        let mut profile = CalibrationProfile::default_profile();
        profile.user.subject_id = "H12".to_string();
        profile.headphone.hp_peq_bands.push(PeqBand {
            kind: PeqBandKind::HighShelf,
            fc_hz: 8000.0,
            gain_db: 2.0,
            q: 0.5,
        });
        profile.tracking.hp_tracking_enabled = true;
        profile.verification.preference_score = Some(0.9);

        store.save(&profile).unwrap();
        let loaded = store.load().expect("saved profile must load");
        assert_eq!(loaded, profile);
    }

    #[test]
    fn test_load_with_no_files_is_absent_not_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProfileStore::new(vec![
            temp_dir.path().join("a").join(PROFILE_FILE_NAME),
            temp_dir.path().join("b").join(PROFILE_FILE_NAME),
        ]);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_creates_directories_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("deep").join("nested");
        let store = ProfileStore::at_dir(&target);

        store.save(&CalibrationProfile::default_profile()).unwrap();

        let entries: Vec<_> = fs::read_dir(&target)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![PROFILE_FILE_NAME.to_string()]);
    }

    #[test]
    fn test_mirror_receives_identical_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let primary = temp_dir.path().join("data").join(PROFILE_FILE_NAME);
        let mirror = temp_dir.path().join("config").join(PROFILE_FILE_NAME);
        let store = ProfileStore::new(vec![primary.clone(), mirror.clone()]);

        store.save(&CalibrationProfile::default_profile()).unwrap();

        let primary_bytes = fs::read(&primary).unwrap();
        let mirror_bytes = fs::read(&mirror).unwrap();
        assert_eq!(primary_bytes, mirror_bytes);
        assert!(!primary_bytes.is_empty());
    }

    #[test]
    fn test_mirror_failure_is_swallowed() {
        let temp_dir = TempDir::new().unwrap();
        let primary = temp_dir.path().join(PROFILE_FILE_NAME);
        // Parent of the mirror path is a regular file, so directory
        // creation for the mirror must fail
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let mirror = blocker.join(PROFILE_FILE_NAME);

        let store = ProfileStore::new(vec![primary.clone(), mirror]);
        store.save(&CalibrationProfile::default_profile()).unwrap();
        assert!(primary.exists(), "primary write must succeed regardless");
    }

    #[test]
    fn test_unparsable_primary_falls_through_to_mirror() {
        let temp_dir = TempDir::new().unwrap();
        let primary = temp_dir.path().join("a").join(PROFILE_FILE_NAME);
        let mirror = temp_dir.path().join("b").join(PROFILE_FILE_NAME);

        fs::create_dir_all(primary.parent().unwrap()).unwrap();
        fs::write(&primary, b"{ this is not json").unwrap();

        let mut profile = CalibrationProfile::default_profile();
        profile.user.subject_id = "H20".to_string();
        ProfileStore::at_dir(mirror.parent().unwrap())
            .save(&profile)
            .unwrap();

        let store = ProfileStore::new(vec![primary, mirror]);
        let loaded = store.load().expect("mirror should be picked up");
        assert_eq!(loaded.user.subject_id, "H20");
    }

    #[test]
    fn test_first_parsed_candidate_wins() {
        let temp_dir = TempDir::new().unwrap();
        let first_dir = temp_dir.path().join("first");
        let second_dir = temp_dir.path().join("second");

        let mut first = CalibrationProfile::default_profile();
        first.user.subject_id = "H1".to_string();
        ProfileStore::at_dir(&first_dir).save(&first).unwrap();

        let mut second = CalibrationProfile::default_profile();
        second.user.subject_id = "H2".to_string();
        ProfileStore::at_dir(&second_dir).save(&second).unwrap();

        let store = ProfileStore::new(vec![
            first_dir.join(PROFILE_FILE_NAME),
            second_dir.join(PROFILE_FILE_NAME),
        ]);
        assert_eq!(store.load().unwrap().user.subject_id, "H1");
    }

    #[test]
    fn test_candidate_paths_are_deduplicated() {
        let path_a = PathBuf::from("/tmp/locusq-test/a.json");
        let path_b = PathBuf::from("/tmp/locusq-test/b.json");
        let store = ProfileStore::new(vec![path_a.clone(), path_a.clone(), path_b.clone()]);
        assert_eq!(store.candidates(), &[path_a, path_b]);
    }

    #[test]
    fn test_empty_store_save_fails_load_is_absent() {
        let store = ProfileStore::new(Vec::new());
        assert!(store.load().is_none());
        let err = store.save(&CalibrationProfile::default_profile()).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    }
}
