//! Deterministic output-path derivation for export artifacts.
//!
//! The claim path and recovery cleanup must agree on where an artifact
//! lives, so the layout is computed by exactly one function here.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::job::{ExportRequest, JobKey};

/// Stable per-requester directory name: the first 16 hex characters of the
/// SHA-256 of the lowercased email. Keeps one folder per requester without
/// putting the raw address on disk.
pub fn requester_digest(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Derive the artifact path for a job:
/// `<export_dir>/<requester digest>/<started_at>/<sanitized file_name>.zip`.
///
/// Pure function of its arguments; the same inputs always yield the same
/// path, across claims and across process restarts.
pub fn derive_output_path(
    export_dir: &Path,
    email: &str,
    started_at: JobKey,
    request: &ExportRequest,
) -> PathBuf {
    let mut name = sanitize_file_name(&request.file_name);
    if name.is_empty() {
        name = "export".to_string();
    }
    export_dir
        .join(requester_digest(email))
        .join(started_at.to_string())
        .join(format!("{name}.zip"))
}

/// Sanitizes a candidate artifact name for safe use on Linux.
///
/// - Replaces NUL, `/`, `\`, whitespace, and control characters with `_`
/// - Trims leading/trailing spaces, dots, and underscores
/// - Collapses consecutive underscores
/// - Limits length so the name plus its `.zip` suffix stays within 255
///   bytes (Linux NAME_MAX)
pub fn sanitize_file_name(name: &str) -> String {
    const NAME_MAX: usize = 255;
    const SUFFIX_RESERVE: usize = 4; // ".zip"
    const MAX_STEM: usize = NAME_MAX - SUFFIX_RESERVE;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;

    for c in name.chars() {
        let replacement = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else if c == ' ' || c == '\t' {
            '_'
        } else {
            c
        };

        if replacement == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(replacement);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');

    if trimmed.len() > MAX_STEM {
        let mut take = MAX_STEM;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(file_name: &str) -> ExportRequest {
        ExportRequest {
            query: "*".into(),
            file_name: file_name.into(),
        }
    }

    #[test]
    fn same_inputs_same_path() {
        let dir = Path::new("/srv/exports");
        let a = derive_output_path(dir, "User@Example.org", 42, &request("birds"));
        let b = derive_output_path(dir, "user@example.org ", 42, &request("birds"));
        assert_eq!(a, b);
        assert!(a.starts_with(dir));
        assert!(a.to_string_lossy().ends_with("/42/birds.zip"));
    }

    #[test]
    fn different_requesters_different_folders() {
        let dir = Path::new("/srv/exports");
        let a = derive_output_path(dir, "a@example.org", 1, &request("x"));
        let b = derive_output_path(dir, "b@example.org", 1, &request("x"));
        assert_ne!(a, b);
    }

    #[test]
    fn digest_is_16_hex_chars() {
        let d = requester_digest("someone@example.org");
        assert_eq!(d.len(), 16);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn sanitize_replaces_separators() {
        assert_eq!(sanitize_file_name("a/b\\c records"), "a_b_c_records");
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_file_name("  ..my___export..  "), "my_export");
    }

    #[test]
    fn empty_name_falls_back() {
        let dir = Path::new("/srv/exports");
        let p = derive_output_path(dir, "a@b.c", 9, &request("///"));
        assert!(p.to_string_lossy().ends_with("/9/export.zip"));
    }

    #[test]
    fn long_names_leave_room_for_suffix() {
        let long = "x".repeat(400);
        let name = sanitize_file_name(&long);
        assert_eq!(name.len(), 251);
    }
}
