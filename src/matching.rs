//! HRTF subject matching
//!
//! Picks the dataset subject whose stored ear-photo embedding is closest
//! to the listener's photo. The embedding is deliberately primitive: a
//! 32×32 grayscale downsample, scaled to [0,1] and L2-normalized, compared
//! by cosine similarity. Catalog quality carries the accuracy; the matcher
//! only has to be deterministic and total.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::DynamicImage;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profile::{xdg_dir, APP_DIR_NAME};

/// Downsample edge length; embeddings are SIDE×SIDE intensities
pub const EMBEDDING_SIDE: u32 = 32;
/// Embedding vector length
pub const EMBEDDING_LEN: usize = (EMBEDDING_SIDE * EMBEDDING_SIDE) as usize;

/// Catalog file name under the per-user app directories
pub const EMBEDDINGS_FILE_NAME: &str = "sadie2_embeddings.json";

/// One catalog row: a dataset subject and its reference embedding
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubjectEmbeddingEntry {
    pub subject_id: String,
    /// Reference embedding; an empty vector means "known subject, no
    /// reference photo" and never wins a match
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Explicit HRIR path; defaults to the dataset convention when absent
    #[serde(default)]
    pub sofa_ref: Option<String>,
}

impl SubjectEmbeddingEntry {
    /// HRIR path for this subject, applying the dataset naming convention
    /// when the catalog does not spell one out
    pub fn resolved_sofa_ref(&self) -> String {
        self.sofa_ref
            .clone()
            .unwrap_or_else(|| format!("sadie2/{}_HRIR.sofa", self.subject_id))
    }
}

/// Match outcome. Always produced; a degenerate input or empty catalog
/// yields the fallback subject with a zero score.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMatch {
    pub subject_id: String,
    /// Cosine similarity in [-1, 1]; 0 for degenerate comparisons
    pub similarity_score: f32,
    pub sofa_ref: String,
}

/// Embedding catalog plus the matching rule.
///
/// Construction never fails: every constructor degrades to a single
/// built-in fallback subject when no usable catalog exists.
pub struct SubjectMatcher {
    entries: Vec<SubjectEmbeddingEntry>,
}

impl SubjectMatcher {
    fn fallback_entry() -> SubjectEmbeddingEntry {
        SubjectEmbeddingEntry {
            subject_id: "H3".to_string(),
            embedding: Vec::new(),
            sofa_ref: Some("sadie2/H3_HRIR.sofa".to_string()),
        }
    }

    /// Matcher over an explicit catalog; an empty list falls back to the
    /// built-in subject
    pub fn from_catalog(entries: Vec<SubjectEmbeddingEntry>) -> Self {
        if entries.is_empty() {
            debug!("empty subject catalog, using built-in fallback entry");
            return Self {
                entries: vec![Self::fallback_entry()],
            };
        }
        Self { entries }
    }

    /// Matcher from the first candidate file that reads and parses as a
    /// non-empty catalog
    pub fn from_candidate_files(paths: &[PathBuf]) -> Self {
        for path in paths {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            match serde_json::from_slice::<Vec<SubjectEmbeddingEntry>>(&bytes) {
                Ok(entries) if !entries.is_empty() => {
                    info!(
                        "✓ Subject catalog loaded from {} ({} entries)",
                        path.display(),
                        entries.len()
                    );
                    return Self { entries };
                }
                Ok(_) => debug!("subject catalog at {} is empty", path.display()),
                Err(e) => debug!("unparsable subject catalog at {}: {}", path.display(), e),
            }
        }
        Self::from_catalog(Vec::new())
    }

    /// Matcher probing the well-known per-user catalog locations
    pub fn with_default_catalog() -> Self {
        let mut paths = Vec::new();
        if let Ok(root) = xdg_dir("XDG_DATA_HOME", ".local/share") {
            paths.push(root.join(APP_DIR_NAME).join(EMBEDDINGS_FILE_NAME));
        }
        if let Ok(root) = xdg_dir("XDG_CONFIG_HOME", ".config") {
            paths.push(root.join(APP_DIR_NAME).join(EMBEDDINGS_FILE_NAME));
        }
        Self::from_candidate_files(&paths)
    }

    pub fn entries(&self) -> &[SubjectEmbeddingEntry] {
        &self.entries
    }

    /// Match a listener photo against the catalog.
    ///
    /// Entries with empty embeddings are skipped; among the rest the first
    /// maximum cosine similarity wins. A photo that embeds to the zero
    /// vector cannot be compared and maps to the fallback subject.
    pub fn match_image(&self, image: &DynamicImage) -> SubjectMatch {
        let Some(embedding) = embed_image(image) else {
            let fallback = Self::fallback_entry();
            return SubjectMatch {
                subject_id: fallback.subject_id.clone(),
                similarity_score: 0.0,
                sofa_ref: fallback.resolved_sofa_ref(),
            };
        };

        let mut best_entry: Option<&SubjectEmbeddingEntry> = None;
        let mut best_score = f32::MIN;
        for entry in &self.entries {
            if entry.embedding.is_empty() {
                continue;
            }
            let score = cosine_similarity(&embedding, &entry.embedding);
            if score > best_score {
                best_score = score;
                best_entry = Some(entry);
            }
        }

        match best_entry {
            Some(entry) => SubjectMatch {
                subject_id: entry.subject_id.clone(),
                similarity_score: best_score,
                sofa_ref: entry.resolved_sofa_ref(),
            },
            None => {
                // Catalog holds no reference embeddings at all
                let fallback = self.entries.first().cloned().unwrap_or_else(Self::fallback_entry);
                SubjectMatch {
                    subject_id: fallback.subject_id.clone(),
                    similarity_score: 0.0,
                    sofa_ref: fallback.resolved_sofa_ref(),
                }
            }
        }
    }

    /// Load a photo from disk and match it
    pub fn match_photo_file<P: AsRef<Path>>(&self, path: P) -> Result<SubjectMatch> {
        let image = image::open(path)?;
        Ok(self.match_image(&image))
    }
}

/// Photo → normalized embedding vector.
///
/// Returns `None` for degenerate photos (all-black downsample), whose
/// zero vector has no direction to compare.
pub fn embed_image(image: &DynamicImage) -> Option<Vec<f32>> {
    let gray = image
        .resize_exact(EMBEDDING_SIDE, EMBEDDING_SIDE, FilterType::Triangle)
        .into_luma8();

    let mut embedding: Vec<f32> = gray.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
    let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for value in &mut embedding {
        *value /= norm;
    }
    Some(embedding)
}

/// Cosine similarity; 0.0 when lengths differ or either vector has no
/// magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
