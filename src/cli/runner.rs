//! Process wiring: configuration, AWS clients and the scheduler

use crate::chain::{ChainScheduler, Continuation, InvocationOutcome, JobDescriptor, LambdaContinuation, LocalRelay};
use crate::cli::args::{Args, Command};
use crate::config::MirrorConfig;
use crate::error::{MirrorError, Result};
use crate::logging::Logger;
use crate::mirror::{CredentialResolver, HttpConnector, MirrorOrchestrator};
use crate::registry::EcrRegistry;
use crate::repolist::{
    ConfiguredRepositoryList, RepositoryListProvider, SsmParameterStore, fingerprint,
};
use aws_config::{BehaviorVersion, SdkConfig};
use lambda_runtime::{LambdaEvent, service_fn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = Logger::new(args.verbose);
        Self { args, output }
    }

    pub async fn run(self) -> Result<()> {
        let config = Arc::new(
            MirrorConfig::from_env()?
                .with_dry_run(self.args.dry_run)
                .with_copy_all_tags(self.args.copy_all_tags),
        );
        let sdk = aws_config::load_defaults(BehaviorVersion::latest()).await;

        match self.args.command.clone() {
            Command::Serve => self.serve(config, &sdk).await,
            Command::Run {
                index,
                repo,
                follow,
            } => self.run_local(config, &sdk, index, repo, follow).await,
            Command::List => self.list(config, &sdk).await,
        }
    }

    fn repository_list(&self, config: Arc<MirrorConfig>, sdk: &SdkConfig) -> ConfiguredRepositoryList {
        ConfiguredRepositoryList::new(config, self.output.clone())
            .with_parameter_store(Arc::new(SsmParameterStore::new(sdk)))
    }

    fn scheduler(
        &self,
        config: Arc<MirrorConfig>,
        sdk: &SdkConfig,
        continuation: Arc<dyn Continuation>,
    ) -> ChainScheduler {
        let ecr = Arc::new(EcrRegistry::new(sdk, self.output.clone()));
        let credentials = CredentialResolver::new(config.clone(), ecr.clone(), self.output.clone());
        let connector = Arc::new(HttpConnector::new(
            Duration::from_secs(config.http_timeout_secs),
            self.output.clone(),
        ));
        let orchestrator = MirrorOrchestrator::new(
            config.clone(),
            credentials,
            connector,
            ecr,
            self.output.clone(),
        );

        ChainScheduler::new(
            Arc::new(self.repository_list(config.clone(), sdk)),
            Arc::new(orchestrator),
            continuation,
            config.start_index,
            self.output.clone(),
        )
    }

    async fn serve(&self, config: Arc<MirrorConfig>, sdk: &SdkConfig) -> Result<()> {
        let continuation = Arc::new(LambdaContinuation::new(
            sdk,
            config.function_name.clone(),
            self.output.clone(),
        ));
        let scheduler = Arc::new(self.scheduler(config, sdk, continuation));
        let output = self.output.clone();

        lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
            let scheduler = scheduler.clone();
            let output = output.clone();
            async move {
                match scheduler.handle_payload(&event.payload).await {
                    Ok(outcome) => {
                        output.info(&outcome.summary());
                        Ok::<Value, lambda_runtime::Error>(serde_json::to_value(&outcome)?)
                    }
                    Err(err) => {
                        output.error(&format!("Invocation failed: {}", err));
                        Err(err.into())
                    }
                }
            }
        }))
        .await
        .map_err(|e| MirrorError::Runtime(e.to_string()))
    }

    async fn run_local(
        &self,
        config: Arc<MirrorConfig>,
        sdk: &SdkConfig,
        index: Option<i64>,
        repo: Option<String>,
        follow: bool,
    ) -> Result<()> {
        let relay = Arc::new(LocalRelay::new());
        let scheduler = self.scheduler(config.clone(), sdk, relay.clone());

        let mut job = match (index, repo) {
            (_, Some(repo)) => JobDescriptor::for_repo(repo),
            (Some(index), None) => JobDescriptor::at_index(index),
            (None, None) => JobDescriptor::from_payload(&Value::Null, config.start_index)?,
        };

        let mut invocations = 0usize;
        loop {
            invocations += 1;
            let outcome = scheduler.handle(job).await?;
            self.print_outcome(&outcome)?;

            if !follow {
                if let Some(next) = outcome.next() {
                    self.output.info(&format!(
                        "Continuation queued locally: {}",
                        serde_json::to_string(next)?
                    ));
                }
                break;
            }
            match relay.pop()? {
                Some(next) => job = next,
                None => break,
            }
        }

        self.output.success(&format!(
            "{} invocation(s) in {}",
            invocations,
            self.output.format_duration(self.output.elapsed())
        ));
        Ok(())
    }

    async fn list(&self, config: Arc<MirrorConfig>, sdk: &SdkConfig) -> Result<()> {
        let repos = self.repository_list(config, sdk).resolve().await?;
        for (index, repo) in repos.iter().enumerate() {
            println!("{}\t{}", index, repo);
        }
        println!("fingerprint\t{}", fingerprint(&repos));
        Ok(())
    }

    fn print_outcome(&self, outcome: &InvocationOutcome) -> Result<()> {
        self.output.info(&outcome.summary());
        println!("{}", serde_json::to_string_pretty(outcome)?);
        Ok(())
    }
}
