//! Update artifact builder.
//!
//! Walks the resolved inclusion rules with glob matching and writes every
//! matched file into a deflate-compressed zip, keyed by its base-relative
//! entry name. The artifact is finished and synced before the path is
//! handed to the ship step.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use fastdeploy_core::include::{file_match_pattern, IncludeRule};

use crate::error::ArchiveError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entry_count: usize,
    pub byte_size: u64,
}

// `*` stays within one path segment and hidden files stay out unless a
// pattern names the dot explicitly, like the framework's own matcher.
fn walk_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    }
}

pub fn build_update_artifact(
    rules: &[IncludeRule],
    output_path: &Path,
) -> Result<ArchiveSummary, ArchiveError> {
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
            context: "create artifact directory",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = File::create(output_path).map_err(|source| ArchiveError::Io {
        context: "create artifact",
        path: output_path.to_path_buf(),
        source,
    })?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut seen_entries: BTreeSet<String> = BTreeSet::new();
    for rule in rules {
        for matched in matched_files(rule)? {
            let entry_name = entry_name_for(&matched, &rule.base);
            if !seen_entries.insert(entry_name.clone()) {
                continue;
            }
            writer
                .start_file(&entry_name, options)
                .map_err(|source| ArchiveError::Entry {
                    entry: entry_name.clone(),
                    source,
                })?;
            let mut source_file = File::open(&matched).map_err(|source| ArchiveError::Io {
                context: "read matched file",
                path: matched.clone(),
                source,
            })?;
            std::io::copy(&mut source_file, &mut writer).map_err(|source| {
                ArchiveError::Io {
                    context: "copy matched file into artifact",
                    path: matched.clone(),
                    source,
                }
            })?;
        }
    }

    let file = writer.finish().map_err(|source| ArchiveError::Entry {
        entry: "central directory".to_string(),
        source,
    })?;
    file.sync_all().map_err(|source| ArchiveError::Io {
        context: "sync artifact",
        path: output_path.to_path_buf(),
        source,
    })?;
    let byte_size = file
        .metadata()
        .map_err(|source| ArchiveError::Io {
            context: "stat artifact",
            path: output_path.to_path_buf(),
            source,
        })?
        .len();

    Ok(ArchiveSummary {
        entry_count: seen_entries.len(),
        byte_size,
    })
}

/// Files matched by one rule, sorted for a deterministic entry order.
/// The base directory is escaped before the join, so glob syntax lives
/// in the rule's pattern alone and metacharacters in the project path
/// stay literal. Symlinks are followed; anything that is not a regular
/// file after following is dropped. Unreadable paths are skipped, not
/// fatal.
fn matched_files(rule: &IncludeRule) -> Result<Vec<PathBuf>, ArchiveError> {
    let literal_base = glob::Pattern::escape(&rule.base.to_string_lossy());
    let pattern_under_base = format!(
        "{}/{}",
        literal_base.trim_end_matches('/'),
        file_match_pattern(&rule.pattern)
    );
    let paths = glob::glob_with(&pattern_under_base, walk_options()).map_err(|error| {
        ArchiveError::Pattern {
            pattern: rule.pattern.clone(),
            message: error.msg.to_string(),
        }
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => match std::fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => files.push(path),
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(path = %path.display(), %error, "skipping unreadable match");
                }
            },
            Err(error) => {
                tracing::debug!(%error, "skipping unreadable path during glob walk");
            }
        }
    }
    files.sort();
    Ok(files)
}

fn entry_name_for(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
