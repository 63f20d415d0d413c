use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestProject {
    pub root: TempDir,
    config_home: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            config_home: tempfile::tempdir().unwrap(),
        }
    }

    pub fn write_resources(&self, content: &str) {
        fs::write(self.root.path().join("meshform.kdl"), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.path().join(".meshform").join("state.json")
    }

    /// `meshform` run inside the project with no user settings or overrides
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("meshform").unwrap();
        cmd.current_dir(self.root.path())
            .env("XDG_CONFIG_HOME", self.config_home.path())
            .env_remove("MESHFORM_CONFIG_PATH")
            .env_remove("MESHFORM_CONTROLLER_URL")
            .env_remove("MESHFORM_USERNAME")
            .env_remove("MESHFORM_PASSWORD")
            .env_remove("MESHFORM_STATE_DIR")
            .env_remove("RUST_LOG");
        cmd
    }

    /// Same as `command`, pointed at a controller
    #[allow(dead_code)]
    pub fn command_with_controller(&self, url: &str) -> Command {
        let mut cmd = self.command();
        cmd.env("MESHFORM_CONTROLLER_URL", url)
            .env("MESHFORM_USERNAME", "admin")
            .env("MESHFORM_PASSWORD", "secret");
        cmd
    }
}
