//! Tool Kit
//!
//! The four tools the tool executor serves. Each wraps a [`ToolGateway`]
//! operation and implements `agent_core::Tool`.
//!
//! [`ToolGateway`]: crate::gateway::ToolGateway

mod folder_structure;
mod file_content;
mod write_file;
mod image_extract;

pub use folder_structure::ReadFolderStructureTool;
pub use file_content::GetFileContentTool;
pub use write_file::WriteFileContentTool;
pub use image_extract::ExtractInfrastructureTool;

pub const READ_FOLDER_STRUCTURE: &str = "read_folder_structure";
pub const GET_FILE_CONTENT: &str = "get_file_content";
pub const WRITE_FILE_CONTENT: &str = "write_file_content";
pub const EXTRACT_INFRASTRUCTURE_FROM_IMAGE: &str = "extract_infrastructure_from_image";
