// disco-core/src/application/engine.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use crate::application::discoverer::{DEFAULT_INTERVAL_SECS, Discoverer};
use crate::application::handler::{self, DEFAULT_FAIL_LIMIT, DEFAULT_TIMEOUT_SECS};
use crate::domain::error::DomainError;
use crate::domain::knowledge::Knowledge;
use crate::domain::rule::Rule;
use crate::error::DiscoError;
use crate::infrastructure::config::DiscoConfig;
use crate::infrastructure::rules::{find_files, parse_rules, split_search_path};

/// The reactive configuration engine. Owns the rule set and the knowledge
/// base; evaluates every rule each tick and executes the matched ones until
/// the whole set is complete or a handler proves hopeless.
pub struct Reactive {
    config: DiscoConfig,
    rules: Vec<Rule>,
    kb: Arc<RwLock<Knowledge>>,
    should_run: bool,
}

impl Reactive {
    pub fn new(config: DiscoConfig) -> Self {
        Self {
            config,
            rules: Vec::new(),
            kb: Arc::new(RwLock::new(Knowledge::new())),
            should_run: false,
        }
    }

    /// Shared handle on the knowledge base (the discoverer writes through
    /// this same lock).
    pub fn kb(&self) -> Arc<RwLock<Knowledge>> {
        Arc::clone(&self.kb)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn add_rule(&mut self, rule: Rule) {
        debug!(rule = %rule, "rule added");
        self.rules.push(rule);
    }

    /// Parse one rules document and append its rules in declaration order.
    pub fn load_rules(&mut self, text: &str) -> Result<usize, DiscoError> {
        let parsed = parse_rules(text)?;
        let count = parsed.len();
        for rule in parsed {
            self.add_rule(rule);
        }
        Ok(count)
    }

    pub async fn load_schema(&self, text: &str) -> Result<String, DiscoError> {
        Ok(self.kb.write().await.load_schema(text)?)
    }

    fn search_paths(&self) -> Vec<PathBuf> {
        match self.config.get_str("disco.path") {
            Some(path) => split_search_path(&path),
            None => vec![PathBuf::from(".")],
        }
    }

    /// Enumerate `*.rules` under every search path and load them, search
    /// path order first, then sorted walk order within a path.
    #[instrument(skip(self))]
    pub fn find_rules(&mut self) -> Result<usize, DiscoError> {
        let mut count = 0;
        for file in find_files(&self.search_paths(), "rules") {
            let text = std::fs::read_to_string(&file)?;
            debug!(file = ?file, "loading rules");
            count += self.load_rules(&text)?;
        }
        Ok(count)
    }

    /// Enumerate `*.schema` under every search path and load each into the
    /// knowledge base.
    #[instrument(skip(self))]
    pub async fn find_schemas(&self) -> Result<usize, DiscoError> {
        let mut count = 0;
        for file in find_files(&self.search_paths(), "schema") {
            let text = std::fs::read_to_string(&file)?;
            debug!(file = ?file, "loading schema");
            self.load_schema(&text).await?;
            count += 1;
        }
        Ok(count)
    }

    fn handler_path(&self) -> String {
        self.config.get_str("disco.path").unwrap_or_else(|| {
            std::env::current_dir()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|_| ".".to_string())
        })
    }

    /// One evaluation pass over the rule set, in declaration order. Returns
    /// whether every rule is complete; the flag starts true and clears on
    /// any pending or failed rule.
    pub async fn run_once(&mut self) -> Result<bool, DiscoError> {
        let fail_limit = self.config.get_u32("disco.fail_limit", DEFAULT_FAIL_LIMIT);
        let timeout = Duration::from_secs_f64(
            self.config
                .get_f64("disco.handler_timeout", DEFAULT_TIMEOUT_SECS),
        );
        let path = self.handler_path();

        let mut complete = true;
        let kb = Arc::clone(&self.kb);
        let kb = kb.read().await;
        for rule in &mut self.rules {
            if rule.complete() {
                continue;
            }
            if !rule.matches(&kb) {
                debug!(rule = %rule, "rule pending");
                complete = false;
                continue;
            }
            info!(rule = %rule, "executing");
            if !handler::execute(rule, &kb, &path, fail_limit, timeout).await? {
                complete = false;
            }
        }
        Ok(complete)
    }

    pub fn shutdown(&mut self) {
        self.should_run = false;
    }

    /// Tick until the rule set completes or a fatal handler condition stops
    /// the engine, then tear the discoverer down either way.
    pub async fn run(&mut self, discoverer: &Discoverer) -> Result<bool, DiscoError> {
        self.should_run = true;
        let interval = Duration::from_secs_f64(
            self.config
                .get_f64("disco.interval", DEFAULT_INTERVAL_SECS),
        );

        let mut complete = false;
        while self.should_run {
            complete = match self.run_once().await {
                Ok(done) => done,
                Err(DiscoError::Domain(DomainError::HandlerRepeatedlyFailing {
                    cmd,
                    attempts,
                })) => {
                    error!(cmd = %cmd, attempts, "handler failing repeatedly; giving up");
                    self.shutdown();
                    complete = false;
                    break;
                }
                Err(e) => {
                    discoverer.shutdown().await;
                    return Err(e);
                }
            };
            if complete {
                break;
            }
            tokio::time::sleep(interval).await;
        }

        // Tear down the discovery services
        discoverer.shutdown().await;
        Ok(complete)
    }

    /// Bring up discovery and the rule loop together; returns the final
    /// completion status once the engine stops. The discovery task is
    /// cancelled on the way out.
    pub async fn run_to_completion(&mut self) -> Result<bool, DiscoError> {
        let discoverer = Arc::new(Discoverer::from_config(&self.config)?);
        let watcher = {
            let discoverer = Arc::clone(&discoverer);
            let kb = self.kb();
            tokio::spawn(async move { discoverer.watch(kb).await })
        };
        let result = self.run(&discoverer).await;
        watcher.abort();
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    const MYSQL_YAML: &str = "mysql:\n  host: localhost:3306\n  user: u\n  password: p\n";

    const MYSQL_SCHEMA: &str = "name: mysql\n\
type: object\n\
properties:\n\
  host: {type: string}\n\
  user: {type: string}\n\
  password: {type: string}\n\
required: [host, user, password]\n";

    fn write_handler(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
    }

    fn engine_for(dir: &Path, extra: &str) -> Reactive {
        let env = format!("disco.path={}|disco.interval=0.02{extra}", dir.display());
        Reactive::new(DiscoConfig::from_env_str(&env))
    }

    #[tokio::test]
    async fn test_find_rules_and_schemas_across_paths() -> anyhow::Result<()> {
        let first = tempfile::tempdir()?;
        let second = tempfile::tempdir()?;
        std::fs::write(
            first.path().join("app.rules"),
            "format: 1\nrules:\n  - rule:\n      when: mysql\n      do: mysql-configure\n",
        )?;
        std::fs::write(
            second.path().join("db.rules"),
            "rules:\n  - rule:\n      when: pgsql\n      do: pgsql-configure\n",
        )?;
        std::fs::write(first.path().join("interface-mysql.schema"), MYSQL_SCHEMA)?;

        let env = format!(
            "disco.path={}:{}",
            first.path().display(),
            second.path().display()
        );
        let mut engine = Reactive::new(DiscoConfig::from_env_str(&env));
        assert_eq!(engine.find_rules()?, 2);
        assert_eq!(engine.find_schemas().await?, 1);

        // file order follows search-path order
        assert_eq!(engine.rules()[0].cmd(), "mysql-configure");
        assert_eq!(engine.rules()[1].cmd(), "pgsql-configure");
        assert!(engine.kb().read().await.get("schemas.mysql").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_once_executes_matched_rules_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let touched = dir.path().join("touched");
        write_handler(
            dir.path(),
            "mysql-configure",
            &format!("/bin/touch {}", touched.display()),
        );

        let mut engine = engine_for(dir.path(), "");
        engine.load_rules(
            "rules:\n  - rule:\n      when: mysql\n      do: mysql-configure\n  - rule:\n      when: pgsql\n      do: pgsql-configure\n",
        )?;
        engine.load_schema(MYSQL_SCHEMA).await?;
        engine.kb().write().await.load(MYSQL_YAML, None)?;

        // pgsql never arrives, so the set is not complete
        assert!(!engine.run_once().await?);
        assert!(touched.exists());
        assert!(engine.rules()[0].complete());
        assert!(!engine.rules()[1].complete());

        // completed rules are sticky; a second pass re-runs nothing
        std::fs::remove_file(&touched)?;
        assert!(!engine.run_once().await?);
        assert!(!touched.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_run_completes_against_flat_source() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("mysql.yaml"), MYSQL_YAML)?;
        std::fs::write(dir.path().join("interface-mysql.schema"), MYSQL_SCHEMA)?;
        std::fs::write(
            dir.path().join("app.rules"),
            "rules:\n  - rule:\n      when: mysql\n      do: mysql-configure\n",
        )?;
        write_handler(dir.path(), "mysql-configure", "/bin/cat > /dev/null");

        let mut engine = engine_for(
            dir.path(),
            &format!("|flat.file={}/mysql.yaml", dir.path().display()),
        );
        engine.find_rules()?;
        engine.find_schemas().await?;

        let complete = tokio::time::timeout(
            Duration::from_secs(10),
            engine.run_to_completion(),
        )
        .await??;
        assert!(complete);
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_failure_stops_the_engine() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("mysql.yaml"), MYSQL_YAML)?;
        std::fs::write(dir.path().join("interface-mysql.schema"), MYSQL_SCHEMA)?;
        std::fs::write(
            dir.path().join("app.rules"),
            "rules:\n  - rule:\n      when: mysql\n      do: broken-configure\n",
        )?;
        write_handler(dir.path(), "broken-configure", "exit 1");

        let mut engine = engine_for(
            dir.path(),
            &format!(
                "|disco.fail_limit=3|flat.file={}/mysql.yaml",
                dir.path().display()
            ),
        );
        engine.find_rules()?;
        engine.find_schemas().await?;

        let complete = tokio::time::timeout(
            Duration::from_secs(10),
            engine.run_to_completion(),
        )
        .await??;
        assert!(!complete);
        assert_eq!(engine.rules()[0].fail_count(), 3);
        Ok(())
    }
}
