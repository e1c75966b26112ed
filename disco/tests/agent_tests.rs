// disco/tests/agent_tests.rs
//
// End-to-end runs of the disco binary: fixture rule/schema/source trees in
// a temp dir, shell-script handlers capturing their stdin, and the payload
// hand-off observed through the process exit.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Result;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const MYSQL_YAML: &str = "mysql:\n  host: localhost:3306\n  user: u\n  password: p\n";

const MYSQL_SCHEMA: &str = "name: mysql\n\
type: object\n\
properties:\n\
  host: {type: string}\n\
  user: {type: string}\n\
  password: {type: string}\n\
required: [host, user, password]\n";

/// Fixture layout for one agent run.
struct AgentTestEnv {
    dir: TempDir,
}

impl AgentTestEnv {
    fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir()?,
        })
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn write_handler(&self, name: &str, body: &str) -> Result<()> {
        let path = self.root().join(name);
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "#!/bin/sh\n{body}")?;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms)?;
        Ok(())
    }

    fn disco(&self, cfg: &str) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("disco"));
        // point -c at a file that does not exist so only defaults + env apply
        cmd.arg("-c").arg(self.root().join("no.conf"));
        cmd.env("DISCO_CFG", cfg);
        cmd
    }

    fn base_cfg(&self) -> String {
        format!(
            "disco.path={}|disco.interval=0.05|flat.file={}/mysql.yaml",
            self.root().display(),
            self.root().display()
        )
    }
}

#[test]
fn test_flat_source_single_rule_configures_and_execs() -> Result<()> {
    let env = AgentTestEnv::new()?;
    env.write("mysql.yaml", MYSQL_YAML)?;
    env.write("interface-mysql.schema", MYSQL_SCHEMA)?;
    env.write(
        "app.rules",
        "format: 1\nrules:\n  - rule:\n      when: mysql\n      do: mysql-configure\n",
    )?;
    let payload_file = env.root().join("payload.json");
    env.write_handler(
        "mysql-configure",
        &format!("/bin/cat > {}", payload_file.display()),
    )?;

    // the payload command replaces the agent, so its exit code is what we see
    env.disco(&env.base_cfg())
        .arg("/bin/true")
        .assert()
        .success();

    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&payload_file)?)?;
    assert_eq!(payload["host"], "localhost:3306");
    assert_eq!(payload["user"], "u");
    assert_eq!(payload["password"], "p");
    Ok(())
}

#[test]
fn test_payload_exit_code_passes_through_exec() -> Result<()> {
    let env = AgentTestEnv::new()?;
    env.write("mysql.yaml", MYSQL_YAML)?;
    env.write("interface-mysql.schema", MYSQL_SCHEMA)?;
    env.write(
        "app.rules",
        "rules:\n  - rule:\n      when: mysql\n      do: mysql-configure\n",
    )?;
    env.write_handler("mysql-configure", "/bin/cat > /dev/null")?;

    env.disco(&env.base_cfg())
        .arg("/bin/false")
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_repeatedly_failing_handler_exits_nonzero_without_exec() -> Result<()> {
    let env = AgentTestEnv::new()?;
    env.write("mysql.yaml", MYSQL_YAML)?;
    env.write("interface-mysql.schema", MYSQL_SCHEMA)?;
    env.write(
        "app.rules",
        "rules:\n  - rule:\n      when: mysql\n      do: broken-configure\n",
    )?;
    let witness = env.root().join("execed");
    env.write_handler("broken-configure", "exit 1")?;

    let cfg = format!("{}|disco.fail_limit=2", env.base_cfg());
    env.disco(&cfg)
        .args(["/bin/touch", &witness.display().to_string()])
        .assert()
        .failure();
    // the payload never ran
    assert!(!witness.exists());
    Ok(())
}

#[test]
fn test_unknown_source_kind_fails_fast() -> Result<()> {
    let env = AgentTestEnv::new()?;
    let cfg = format!("disco.path={}|zookeeper.host=z", env.root().display());
    env.disco(&cfg)
        .arg("/bin/true")
        .assert()
        .failure()
        .stderr(predicate::str::contains("zookeeper"));
    Ok(())
}

#[test]
fn test_any_rule_fires_with_one_valid_dep() -> Result<()> {
    let env = AgentTestEnv::new()?;
    env.write("mysql.yaml", MYSQL_YAML)?;
    env.write("interface-mysql.schema", MYSQL_SCHEMA)?;
    // pgsql never shows up; the any-rule fires on mysql alone
    env.write(
        "app.rules",
        "rules:\n  - rule:\n      when: \"any:pgsql,mysql\"\n      do: db-configure\n",
    )?;
    let payload_file = env.root().join("payload.json");
    env.write_handler(
        "db-configure",
        &format!("/bin/cat > {}", payload_file.display()),
    )?;

    env.disco(&env.base_cfg())
        .arg("/bin/true")
        .assert()
        .success();

    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&payload_file)?)?;
    assert_eq!(payload["host"], "localhost:3306");
    Ok(())
}
