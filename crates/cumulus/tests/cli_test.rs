#![allow(deprecated)] // Command::cargo_bin

mod common;

use assert_cmd::Command;
use common::{NEXTCLOUD_STACK, TestProject};
use predicates::prelude::*;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("cumulus").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Azure VM scale set"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("script"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("cumulus").unwrap();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cumulus"));
}

#[test]
fn test_up_help_lists_flags() {
    let mut cmd = Command::cargo_bin("cumulus").unwrap();
    cmd.args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--yes"))
        .stdout(predicate::str::contains("--prune"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("cumulus").unwrap();
    cmd.arg("invalid-command").assert().failure();
}

#[test]
fn test_validate_discovers_stack_file() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stack configuration is valid"))
        .stdout(predicate::str::contains("nextcloud-rg"))
        .stdout(predicate::str::contains("nextcloud-vmss (2 x Standard_DS2_v2"));
}

#[test]
fn test_validate_with_explicit_stack_path() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);
    let elsewhere = TestProject::new();

    elsewhere
        .cumulus()
        .arg("--stack")
        .arg(project.path().join("stack.kdl"))
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("nextcloud"));
}

#[test]
fn test_validate_reports_violations() {
    let project = TestProject::with_stack(
        r#"
stack "broken"
network {
    vnet "broken-vnet" address-space="10.0.0.0/24"
    subnet "broken-subnet" prefix="10.1.0.0/24"
}
"#,
    );

    project
        .cumulus()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Stack configuration is invalid"))
        .stderr(predicate::str::contains("outside the address space"));
}

#[test]
fn test_validate_warns_without_credentials() {
    let project = TestProject::with_stack("stack \"nocreds\"\n");

    project
        .cumulus()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("cannot be deployed"));
}

#[test]
fn test_missing_stack_file_fails() {
    let project = TestProject::new();
    project
        .cumulus()
        .arg("--stack")
        .arg(project.path().join("missing.kdl"))
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack file not found"));
}

#[test]
fn test_local_override_is_applied() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);
    project.write_file(
        "stack.local.kdl",
        r#"
scale-set {
    vm-size "Standard_D2s_v5"
}
"#,
    );

    project
        .cumulus()
        .arg("--stack")
        .arg(project.path().join("stack.kdl"))
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Standard_D2s_v5"));
}

#[test]
fn test_validate_rejects_settings_on_one_line() {
    let project = TestProject::with_stack(
        "stack \"nextcloud\"\nscale-set { vm-size \"Standard_B2s\" capacity 2 }\n",
    );

    project
        .cumulus()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("takes at most 1 argument(s)"));
}

#[test]
fn test_graph_prints_waves() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .arg("graph")
        .assert()
        .success()
        .stdout(predicate::str::contains("14 resources"))
        .stdout(predicate::str::contains("Wave 1"))
        .stdout(predicate::str::contains("resource-group:nextcloud-rg"))
        .stdout(predicate::str::contains("autoscale-setting:nextcloud-autoscale"));
}

#[test]
fn test_script_uses_placeholders() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .arg("script")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("#!/bin/bash"))
        .stdout(predicate::str::contains("password=<storage-key>"))
        .stdout(predicate::str::contains("TRUSTED_PROXIES='<public-ip>'"))
        .stdout(predicate::str::contains(
            "-v /mnt/nextcloud/data:/var/www/html/data nextcloud:30.0.4-apache",
        ));
}

#[test]
fn test_script_masks_storage_key() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .args(["script", "--storage-key", "c2VjcmV0", "--public-ip", "20.1.2.3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password=***"))
        .stdout(predicate::str::contains("c2VjcmV0").not())
        .stdout(predicate::str::contains("TRUSTED_PROXIES='20.1.2.3'"));

    project
        .cumulus()
        .args(["script", "--storage-key", "c2VjcmV0", "--reveal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("password=c2VjcmV0"));
}

#[test]
fn test_script_base64_requires_reveal_with_key() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .args(["script", "--storage-key", "c2VjcmV0", "--base64"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--reveal"));

    project
        .cumulus()
        .args(["script", "--base64"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("IyEvYmluL2Jhc2gK"));
}

#[test]
fn test_status_without_state() {
    let project = TestProject::with_stack(NEXTCLOUD_STACK);

    project
        .cumulus()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No resources recorded"));
}

#[test]
fn test_up_requires_credentials() {
    let project = TestProject::with_stack("stack \"nocreds\"\n");

    project
        .cumulus()
        .args(["up", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("admin"));
}
