//! Zip surgery for deployment packages.
//!
//! Entries are copied raw between archives, so surviving files keep their
//! original compression and are never decompressed inside the updater.

use std::collections::BTreeSet;
use std::io::Cursor;

use glob::{MatchOptions, Pattern};
use thiserror::Error;
use zip::{ZipArchive, ZipWriter};

use fastdeploy_core::include::file_match_pattern;

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("malformed zip package: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to copy package entry '{entry}': {source}")]
    Entry {
        entry: String,
        #[source]
        source: zip::result::ZipError,
    },
}

// Entry names use `/` separators. `*` stays within one segment and hidden
// entries only match patterns that name the dot, like the build-side walk.
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, PackageError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(&file_match_pattern(pattern)).map_err(|error| PackageError::Pattern {
                pattern: pattern.clone(),
                message: error.msg.to_string(),
            })
        })
        .collect()
}

/// Rebuilds `package` without the entries matched by `patterns`. Matched
/// directory entries are dropped along with their files.
pub fn strip_matching_entries(
    package: &[u8],
    patterns: &[String],
) -> Result<Vec<u8>, PackageError> {
    let compiled = compile_patterns(patterns)?;
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        if compiled
            .iter()
            .any(|pattern| pattern.matches_with(&name, match_options()))
        {
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|source| PackageError::Entry {
                entry: name,
                source,
            })?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Merges `update` into `base`. Update entries win name collisions.
pub fn merge_packages(base: &[u8], update: &[u8]) -> Result<Vec<u8>, PackageError> {
    let mut base_archive = ZipArchive::new(Cursor::new(base))?;
    let mut update_archive = ZipArchive::new(Cursor::new(update))?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    let mut update_names: BTreeSet<String> = BTreeSet::new();
    for index in 0..update_archive.len() {
        let entry = update_archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        writer
            .raw_copy_file(entry)
            .map_err(|source| PackageError::Entry {
                entry: name.clone(),
                source,
            })?;
        update_names.insert(name);
    }

    for index in 0..base_archive.len() {
        let entry = base_archive.by_index_raw(index)?;
        let name = entry.name().to_string();
        if update_names.contains(&name) {
            continue;
        }
        writer
            .raw_copy_file(entry)
            .map_err(|source| PackageError::Entry {
                entry: name,
                source,
            })?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use zip::write::FileOptions;
    use zip::CompressionMethod;

    use super::*;

    fn make_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, body) in entries {
            writer.start_file(*name, options).expect("entry should start");
            writer.write_all(body).expect("entry should be written");
        }
        writer.finish().expect("zip should finish").into_inner()
    }

    fn entry_names(package: &[u8]) -> Vec<String> {
        let mut archive =
            ZipArchive::new(Cursor::new(package)).expect("package should be a zip");
        let mut names: Vec<String> = (0..archive.len())
            .map(|index| {
                archive
                    .by_index(index)
                    .expect("entry should be readable")
                    .name()
                    .to_string()
            })
            .collect();
        names.sort();
        names
    }

    fn read_entry(package: &[u8], name: &str) -> Vec<u8> {
        let mut archive =
            ZipArchive::new(Cursor::new(package)).expect("package should be a zip");
        let mut entry = archive.by_name(name).expect("entry should exist");
        let mut body = Vec::new();
        entry.read_to_end(&mut body).expect("entry should read");
        body
    }

    #[test]
    fn strip_removes_matches_at_every_depth() {
        let package = make_zip(&[
            ("module_one/top.py", b"top".as_ref()),
            ("module_one/pkg/deep.py", b"deep".as_ref()),
            ("requirements.txt", b"boto3".as_ref()),
        ]);

        let stripped = strip_matching_entries(&package, &["module_one/**".to_string()])
            .expect("strip should succeed");

        assert_eq!(entry_names(&stripped), vec!["requirements.txt"]);
    }

    #[test]
    fn strip_single_star_stays_in_one_segment() {
        let package = make_zip(&[
            ("a.txt", b"a".as_ref()),
            ("sub/c.txt", b"c".as_ref()),
        ]);

        let stripped = strip_matching_entries(&package, &["*.txt".to_string()])
            .expect("strip should succeed");

        assert_eq!(entry_names(&stripped), vec!["sub/c.txt"]);
    }

    #[test]
    fn strip_leaves_hidden_entries_untouched() {
        let package = make_zip(&[
            (".env", b"secret".as_ref()),
            ("app.py", b"code".as_ref()),
        ]);

        let stripped = strip_matching_entries(&package, &["**".to_string()])
            .expect("strip should succeed");

        assert_eq!(entry_names(&stripped), vec![".env"]);
    }

    #[test]
    fn strip_keeps_unmatched_bodies_intact() {
        let package = make_zip(&[
            ("app.py", b"print('hi')".as_ref()),
            ("lib/util.rb", b"ruby".as_ref()),
        ]);

        let stripped = strip_matching_entries(&package, &["**/*.rb".to_string()])
            .expect("strip should succeed");

        assert_eq!(entry_names(&stripped), vec!["app.py"]);
        assert_eq!(read_entry(&stripped, "app.py"), b"print('hi')");
    }

    #[test]
    fn merge_prefers_update_entries() {
        let base = make_zip(&[
            ("shared.py", b"old".as_ref()),
            ("base_only.py", b"base".as_ref()),
        ]);
        let update = make_zip(&[
            ("shared.py", b"new".as_ref()),
            ("update_only.py", b"update".as_ref()),
        ]);

        let merged = merge_packages(&base, &update).expect("merge should succeed");

        assert_eq!(
            entry_names(&merged),
            vec!["base_only.py", "shared.py", "update_only.py"]
        );
        assert_eq!(read_entry(&merged, "shared.py"), b"new");
        assert_eq!(read_entry(&merged, "base_only.py"), b"base");
    }

    #[test]
    fn merge_of_empty_packages_is_empty() {
        let merged =
            merge_packages(&make_zip(&[]), &make_zip(&[])).expect("merge should succeed");
        assert!(entry_names(&merged).is_empty());
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let package = make_zip(&[("a.txt", b"a".as_ref())]);

        let error = strip_matching_entries(&package, &["src/[".to_string()])
            .expect_err("pattern should be rejected");
        assert!(matches!(error, PackageError::Pattern { .. }));
    }

    #[test]
    fn malformed_package_is_reported() {
        let error = strip_matching_entries(b"not a zip", &["*.py".to_string()])
            .expect_err("bytes should be rejected");
        assert!(matches!(error, PackageError::Zip(_)));
    }
}
