use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use weavecore::{Result, WorkflowDefinition};

/// Read a workflow definition from a JSON file
pub fn load_workflow(path: impl AsRef<Path>) -> Result<WorkflowDefinition> {
    let path = path.as_ref();
    tracing::debug!("Loading workflow from {}", path.display());

    let reader = BufReader::new(File::open(path)?);
    let mut definition: WorkflowDefinition = serde_json::from_reader(reader)?;

    if definition.name.is_empty() {
        if let Some(stem) = path.file_stem() {
            definition.name = stem.to_string_lossy().into_owned();
        }
    }
    Ok(definition)
}

/// Write a workflow definition as pretty JSON
pub fn save_workflow(path: impl AsRef<Path>, definition: &WorkflowDefinition) -> Result<()> {
    let json = serde_json::to_string_pretty(definition)?;
    std::fs::write(path, json)?;
    Ok(())
}
