//! Agent instructions and the default seed message.
//!
//! Tool usage sections are generated from the tool registry and appended
//! by the workflow, so the prompts here only describe the task.

use std::path::Path;

use crate::config::DestinationLayout;

pub const ANALYSIS_COMPLETE: &str = "ANALYSIS_COMPLETE";
pub const SCRIPTS_GENERATED: &str = "SCRIPTS_GENERATED";
pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";

/// Files every Terraform module directory must contain
pub const MODULE_FILES: [&str; 3] = ["main.tf", "variables.tf", "outputs.tf"];

/// Files expected at the root of the generated tree
pub const ROOT_FILES: [&str; 4] = ["main.tf", "variables.tf", "outputs.tf", "terraform.tfvars"];

pub fn requirements_analyzer() -> String {
    format!(
        r#"You are an expert in Terraform and cloud infrastructure. You work out which cloud
infrastructure a project needs and write an infrastructure requirements document.

Steps:
1. Read the folder structure of the project once.
2. Read every file that may describe infrastructure: documentation, configuration,
   deployment descriptors, dependency manifests. Use only paths that appear in the
   folder structure; never guess file names.
3. Image files (png, jpg, jpeg, gif, webp, bmp, svg) may be architecture diagrams.
   Read them, or ask for a description of the infrastructure they show.
4. Ignore code that has nothing to do with infrastructure.
5. When every relevant file has been read, write the requirements document: every
   component, how components connect, region and sizing hints.

Do not write any files or Terraform code.

Request one tool per message. A message that requests a tool must not contain
{complete}. Only the message holding the finished requirements document contains
{complete}."#,
        complete = ANALYSIS_COMPLETE,
    )
}

pub fn script_generator(output_subdir: &str) -> String {
    format!(
        r#"You generate Terraform code from an infrastructure requirements document.

Rules:
- Write every file under the `{dir}/` folder of the destination repository, using paths
  relative to the destination root, for example `{dir}/main.tf`. Never write elsewhere.
- Put each component in a module under `{dir}/modules/<name>/`. Every module contains
  main.tf, variables.tf and outputs.tf.
- The root `{dir}/` folder contains main.tf, variables.tf, outputs.tf and terraform.tfvars.
  Every module variable is declared in `{dir}/variables.tf` and given a value in
  `{dir}/terraform.tfvars`.
- Assign values through variables (`machine_type = var.machine_type`), never literals.
- Keep components in one region unless the requirements say otherwise. Create a private
  network unless a default network is requested, and connect components to it.
- Existing files are overwritten. Create every file yourself; do not ask for confirmation.

Write one file per message. A message that requests a tool must not contain
{done}. When all files are written, reply with a short summary containing {done}.
If you receive a report containing {error}, fix the files it points at and finish
again with {done}."#,
        dir = output_subdir,
        done = SCRIPTS_GENERATED,
        error = EXECUTION_ERROR,
    )
}

pub const IMAGE_DESCRIBER: &str =
    "You are an assistant that recognizes and describes cloud infrastructure diagrams.";

/// User text sent with an image. A caller-supplied hint replaces the
/// default instruction.
pub fn image_request(hint: Option<&str>) -> String {
    match hint.map(str::trim).filter(|h| !h.is_empty()) {
        Some(hint) => hint.to_string(),
        None => "Describe this image in detail, assuming it is a diagram of cloud infrastructure. \
            Include the links between components. If it is not an infrastructure diagram, \
            reply exactly: it's not an infrastructure related image/diagram"
            .to_string(),
    }
}

/// Seed message used when the caller gives none
pub fn default_message(
    source: &Path,
    dest: &Path,
    layout: DestinationLayout,
    output_subdir: &str,
) -> String {
    let target = match layout {
        DestinationLayout::Separate => format!("destination project folder: {}", dest.display()),
        DestinationLayout::Shared => format!(
            "the Terraform code goes into the same repository: {}",
            dest.display()
        ),
    };
    format!(
        "I want to recognize the cloud infrastructure of the source project and create Terraform \
        scripts/modules in the destination project subfolder `{}/` to implement it. \
        Write paths are relative to the destination project folder. \
        Source project folder: {}, {}.",
        output_subdir,
        source.display(),
        target,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_message_names_both_roots() {
        let msg = default_message(Path::new("/src/app"), Path::new("/out/infra"), DestinationLayout::Separate, "terraform");
        assert!(msg.contains("/src/app"));
        assert!(msg.contains("destination project folder: /out/infra"));
        assert!(msg.contains("subfolder `terraform/`"));
        assert!(!msg.contains(" /terraform"));

        let shared = default_message(Path::new("/app"), Path::new("/app"), DestinationLayout::Shared, "infra");
        assert!(shared.contains("same repository"));
    }

    #[test]
    fn test_default_message_folder_is_writable() {
        let source = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();
        let msg = default_message(source.path(), dest.path(), DestinationLayout::Separate, "terraform");

        let start = msg.find('`').unwrap() + 1;
        let end = start + msg[start..].find('`').unwrap();
        let named = format!("{}main.tf", &msg[start..end]);

        let gateway = crate::gateway::ToolGateway::new(source.path(), dest.path()).unwrap();
        let resolved = gateway.resolve_write(&named).unwrap();
        assert!(resolved.ends_with("terraform/main.tf"));
    }

    #[test]
    fn test_prompts_mention_their_sentinels() {
        assert!(requirements_analyzer().contains(ANALYSIS_COMPLETE));
        let generator = script_generator("infra");
        assert!(generator.contains(SCRIPTS_GENERATED));
        assert!(generator.contains("`infra/main.tf`"));
    }

    #[test]
    fn test_image_hint_replaces_default() {
        assert_eq!(image_request(Some("just the network")), "just the network");
        assert!(image_request(Some("  ")).contains("cloud infrastructure"));
    }
}
