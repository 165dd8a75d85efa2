//! Generated tree check
//!
//! The expected Terraform layout is only requested through the prompt, so
//! after a run the tree is inspected and gaps are reported, not enforced.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::prompts::{MODULE_FILES, ROOT_FILES};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    /// Module directory names found under `modules/`
    pub modules: Vec<String>,
    /// Expected files that do not exist
    pub missing: Vec<PathBuf>,
}

impl LayoutReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Inspect `terraform_dir` for the root files and per-module files
pub fn check_layout(terraform_dir: &Path) -> LayoutReport {
    let mut report = LayoutReport::default();
    
    for file in ROOT_FILES {
        let path = terraform_dir.join(file);
        if !path.is_file() {
            report.missing.push(path);
        }
    }
    
    let modules_dir = terraform_dir.join("modules");
    if let Ok(entries) = std::fs::read_dir(&modules_dir) {
        let mut modules: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        modules.sort();
        
        for module in modules {
            for file in MODULE_FILES {
                let path = module.join(file);
                if !path.is_file() {
                    report.missing.push(path);
                }
            }
            if let Some(name) = module.file_name() {
                report.modules.push(name.to_string_lossy().into_owned());
            }
        }
    }
    
    for path in &report.missing {
        tracing::warn!(path = %path.display(), "Expected Terraform file is missing");
    }
    
    report
}
