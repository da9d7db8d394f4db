use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const NEXTCLOUD_STACK: &str = r#"
stack "nextcloud" {
    location "northeurope"
}
storage "nextcloudstorage" {
    share "nextcloud" quota=1024
}
scale-set "nextcloud-vmss" {
    capacity 2
    admin-user "azureuser"
    admin-password "s3cret-Passw0rd"
}
app "nextcloud:30.0.4-apache" {
    volume "nextcloud" "/var/www/html"
    volume "data" "/var/www/html/data"
}
"#;

pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        Self { root }
    }

    pub fn with_stack(content: &str) -> Self {
        let project = Self::new();
        project.write_stack_kdl(content);
        project
    }

    pub fn write_stack_kdl(&self, content: &str) {
        fs::write(self.root.path().join("stack.kdl"), content).unwrap();
    }

    #[allow(dead_code)]
    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.root.path().join(name), content).unwrap();
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    /// `cumulus` running inside the project with a clean environment
    pub fn cumulus(&self) -> Command {
        let mut cmd = Command::cargo_bin("cumulus").unwrap();
        cmd.current_dir(self.path())
            .env_remove("CUMULUS_STACK_PATH")
            .env_remove("AZURE_STORAGE_KEY")
            .env_remove("RUST_LOG");
        cmd
    }
}
