use crate::aspect::{build_aspects, AspectPipeline, AspectSettings, TimeRange};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Split a rotated file name into stem and numeric suffix. Accepts both
/// `solr.log.3` and `solr.log3`.
fn split_rotation(name: &str) -> Option<(&str, &str)> {
    let trimmed = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == name.len() {
        return None;
    }
    let digits = &name[trimmed.len()..];
    let stem = trimmed.strip_suffix('.').unwrap_or(trimmed);
    if stem.is_empty() {
        return None;
    }
    Some((stem, digits))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Name shared by every rotation of a log file.
pub fn instance_key(name: &str) -> String {
    match split_rotation(name) {
        Some((stem, _)) => stem.to_string(),
        None => name.to_string(),
    }
}

/// Numeric rotation suffix, if the name has one that fits in a `u64`.
pub fn rotation_suffix(name: &str) -> Option<u64> {
    split_rotation(name).and_then(|(_, digits)| digits.parse().ok())
}

/// Files belonging to one instance, oldest rotation first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceFiles {
    pub key: String,
    pub files: Vec<PathBuf>,
}

/// Group files by instance key. Instances keep the order in which their key
/// first appears in `files`; within an instance the highest rotation suffix
/// comes first and files without a suffix come last.
pub fn group_instances(files: &[PathBuf]) -> Vec<InstanceFiles> {
    let mut groups: Vec<InstanceFiles> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for path in files {
        let key = instance_key(&file_name(path));
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(InstanceFiles {
                key,
                files: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].files.push(path.clone());
    }

    for group in &mut groups {
        group
            .files
            .sort_by_key(|path| Reverse(rotation_suffix(&file_name(path))));
    }
    groups
}

/// A group of rotated files with the aspects that analyze them.
pub struct LogInstance {
    pub key: String,
    pub files: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub pipeline: Arc<AspectPipeline>,
}

impl LogInstance {
    /// Build the instance's aspect pipeline. With `output_root`, the instance
    /// writes its files into `output_root/<key>`, which is created here.
    pub fn create(
        group: InstanceFiles,
        settings: &AspectSettings,
        output_root: Option<&Path>,
        range: Option<TimeRange>,
    ) -> io::Result<Self> {
        let output_dir = match output_root {
            Some(root) => {
                let dir = root.join(&group.key);
                fs::create_dir_all(&dir)?;
                Some(dir)
            }
            None => None,
        };

        let aspects = build_aspects(settings, output_dir.as_deref())?;
        let pipeline = AspectPipeline::new(aspects).with_range(range);

        Ok(Self {
            key: group.key,
            files: group.files,
            output_dir,
            pipeline: Arc::new(pipeline),
        })
    }
}
