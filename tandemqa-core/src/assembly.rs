//! Assemblies under evaluation and their labels

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use serde::Serialize;

use crate::error::{PipelineError, PipelineResult};

/// One candidate assembly. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assembly {
    fname: PathBuf,
    name: String,
    label: String,
    alignment_bed: PathBuf,
}

impl Assembly {
    /// Build an assembly rooted in `out_dir`. Without an explicit name the
    /// file stem is used.
    pub fn new(fname: &Path, name: Option<String>, out_dir: &Path) -> Self {
        let fname = absolutize(fname);
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| default_name(&fname));
        let label = name.split_whitespace().collect::<Vec<_>>().join("_");
        let alignment_bed = out_dir.join(format!("{}_alignment.bed", label));

        Self {
            fname,
            name,
            label,
            alignment_bed,
        }
    }

    pub fn fname(&self) -> &Path {
        &self.fname
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whitespace-free name used in artifact names and tool command lines
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read-to-assembly alignment written by the mapper
    pub fn alignment_bed(&self) -> &Path {
        &self.alignment_bed
    }
}

fn default_name(fname: &Path) -> String {
    let file_name = fname
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "assembly".to_string());

    // Drop a compression suffix first so "asm.fasta.gz" becomes "asm"
    let stem = file_name.strip_suffix(".gz").unwrap_or(&file_name);
    match stem.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base.to_string(),
        _ => stem.to_string(),
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Parse a comma-separated label list, dropping quote characters
pub fn parse_labels(raw: &str) -> Vec<String> {
    raw.replace('"', "").split(',').map(|s| s.to_string()).collect()
}

fn check_label_count(labels: &[String], assembly_count: usize) -> PipelineResult<()> {
    if labels.len() != assembly_count {
        return Err(PipelineError::configuration(format!(
            "Number of labels ({}) must correspond to the number of analyzed assemblies ({})",
            labels.len(),
            assembly_count
        )));
    }
    Ok(())
}

/// Labels name alignments and reports, so two assemblies may never share one
fn check_unique_labels(assemblies: &[Assembly]) -> PipelineResult<()> {
    let mut seen = HashSet::new();
    for assembly in assemblies {
        if !seen.insert(assembly.label()) {
            return Err(PipelineError::configuration(format!(
                "Label '{}' is used by more than one assembly; pass distinct labels with -l",
                assembly.label()
            )));
        }
    }
    Ok(())
}

/// Ordered, non-empty set of assemblies in command-line order
#[derive(Debug, Clone, Serialize)]
pub struct AssemblySet {
    assemblies: Vec<Assembly>,
}

impl AssemblySet {
    pub fn iter(&self) -> impl Iterator<Item = &Assembly> {
        self.assemblies.iter()
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.assemblies.iter().map(|a| a.label()).collect()
    }

    pub fn joined_labels(&self) -> String {
        self.labels().join(",")
    }

    pub fn fnames(&self) -> Vec<&Path> {
        self.assemblies.iter().map(|a| a.fname()).collect()
    }
}

impl<'a> IntoIterator for &'a AssemblySet {
    type Item = &'a Assembly;
    type IntoIter = std::slice::Iter<'a, Assembly>;

    fn into_iter(self) -> Self::IntoIter {
        self.assemblies.iter()
    }
}

/// Builds the [`AssemblySet`] from parallel file and label lists
pub struct AssemblyRegistry;

impl AssemblyRegistry {
    /// Pure: nothing is created on disk, so every label problem surfaces
    /// before the output tree exists.
    pub fn build(fnames: &[PathBuf], labels: Option<Vec<String>>, out_dir: &Path) -> PipelineResult<AssemblySet> {
        if fnames.is_empty() {
            return Err(PipelineError::configuration(
                "You should specify at least one assembly file",
            ));
        }
        if let Some(labels) = &labels {
            check_label_count(labels, fnames.len())?;
        }

        let names: Vec<Option<String>> = match labels {
            Some(labels) => labels.into_iter().map(Some).collect(),
            None => vec![None; fnames.len()],
        };
        let assemblies: Vec<Assembly> = fnames
            .iter()
            .zip(names)
            .map(|(fname, name)| Assembly::new(fname, name, out_dir))
            .collect();
        check_unique_labels(&assemblies)?;

        Ok(AssemblySet { assemblies })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_strip_quotes() {
        assert_eq!(parse_labels("\"asm A\",asm_b"), vec!["asm A", "asm_b"]);
    }

    #[test]
    fn test_label_count_mismatch() {
        let files = vec![PathBuf::from("/data/a.fa"), PathBuf::from("/data/b.fa")];
        let err = AssemblyRegistry::build(&files, Some(parse_labels("one,two,three")), Path::new("/out")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_empty_assembly_list() {
        let err = AssemblyRegistry::build(&[], None, Path::new("/out")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_default_names_from_files() {
        let files = vec![PathBuf::from("/data/chrX_cen.fasta"), PathBuf::from("/data/t2t.v1.fa.gz")];
        let set = AssemblyRegistry::build(&files, None, Path::new("/out")).unwrap();
        assert_eq!(set.labels(), vec!["chrX_cen", "t2t.v1"]);
        assert_eq!(set.joined_labels(), "chrX_cen,t2t.v1");
    }

    #[test]
    fn test_explicit_labels_keep_order() {
        let files = vec![PathBuf::from("/data/a.fa"), PathBuf::from("/data/b.fa")];
        let set = AssemblyRegistry::build(&files, Some(parse_labels("\"first asm\",second")), Path::new("/out")).unwrap();
        let first = set.iter().next().unwrap();
        assert_eq!(first.name(), "first asm");
        assert_eq!(first.label(), "first_asm");
        assert_eq!(first.alignment_bed(), Path::new("/out/first_asm_alignment.bed"));
        assert_eq!(set.fnames(), vec![Path::new("/data/a.fa"), Path::new("/data/b.fa")]);
    }

    #[test]
    fn test_same_stem_labels_rejected() {
        let files = vec![PathBuf::from("/run1/assembly.fasta"), PathBuf::from("/run2/assembly.fasta")];
        let err = AssemblyRegistry::build(&files, None, Path::new("/out")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("assembly"));
    }

    #[test]
    fn test_labels_equal_after_whitespace_folding_rejected() {
        let files = vec![PathBuf::from("/data/a.fa"), PathBuf::from("/data/b.fa")];
        let labels = Some(parse_labels("\"asm one\",asm_one"));
        assert!(AssemblyRegistry::build(&files, labels, Path::new("/out")).is_err());
    }
}
