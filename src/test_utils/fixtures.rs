use std::path::PathBuf;

use tempfile::TempDir;

use crate::capability::Capability;

/// Isolated working directory for state files and config.
pub struct UnitTestFixture {
    pub temp_dir: TempDir,
    pub data_path: PathBuf,
}

impl Default for UnitTestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitTestFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_path = temp_dir.path().to_path_buf();

        println!("[FIXTURE] Created temp directory: {data_path:?}");

        Self {
            temp_dir,
            data_path,
        }
    }

    #[must_use]
    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.data_path.join(relative_path)
    }

    /// Create a file with content.
    #[must_use]
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.path(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        println!(
            "[FIXTURE] Created file: {:?} ({} bytes)",
            full_path,
            content.len()
        );
        full_path
    }

    /// Write a capability list as JSON.
    #[must_use]
    pub fn create_capabilities(&self, relative_path: &str, caps: &[Capability]) -> PathBuf {
        let json = serde_json::to_string_pretty(caps).expect("Failed to encode capabilities");
        self.create_file(relative_path, &json)
    }

    /// Write a `wo.toml` that points the control plane at `endpoint`.
    #[must_use]
    pub fn create_config(&self, endpoint: &str, extra: &str) -> PathBuf {
        let body = format!(
            r#"[azure]
subscription_id = "00000000-0000-0000-0000-000000000000"
resource_group = "rg-test"
location = "eastus"
endpoint = "{endpoint}"
custom_location = "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/rg-test/providers/Microsoft.ExtendedLocation/customLocations/cl"

[state]
version_file = "{version}"
capabilities_file = "{caps}"

{extra}
"#,
            version = self.path("version.txt").display(),
            caps = self.path("context-capabilities.json").display(),
        );
        self.create_file("wo.toml", &body)
    }
}

impl Drop for UnitTestFixture {
    fn drop(&mut self) {
        println!("[FIXTURE] Cleaning up temp directory: {:?}", self.data_path);
    }
}
