use anyhow::{bail, Context};
use clap::Parser;
use hubsync::aha::{FieldAction, FieldOutcome};
use hubsync::github::webhook;
use hubsync::utils::{logger, validation::Validate};
use hubsync::{CliConfig, Command, HubConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let config = HubConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::AhaField {
            feature,
            name,
            action,
            value,
        } => {
            let aha = config.aha_client()?;
            let action: FieldAction = action.parse()?;

            let mut feature = aha.feature(&feature).await?;
            let product = aha.product(&feature.product_id).await?;

            let outcome = aha
                .custom_field(&product, &mut feature, &name, action, value.as_deref().unwrap_or(""))
                .await
                .with_context(|| format!("{} on {}", name, feature.reference_num))?;

            match outcome {
                FieldOutcome::Value(v) => println!("{}", v),
                FieldOutcome::Matches(m) => println!("{}", m),
                FieldOutcome::Unchanged => tracing::info!("{}: {} unchanged", feature.reference_num, name),
                FieldOutcome::Updated => tracing::info!("{}: {} updated", feature.reference_num, name),
            }
        }

        Command::IssueData {
            owner,
            repo,
            number,
            label,
            set,
            delete,
            value,
        } => {
            let github = config.github_client()?;
            let mut issue = github.issue_by_number(&owner, &repo, number).await?;

            match (label, set) {
                (Some(label), Some(set)) => {
                    github.set_issue_data(&mut issue, &label, &set).await?;
                    tracing::info!("#{}: {} = {}", number, label, set);
                }
                (Some(label), None) if delete => {
                    github
                        .delete_issue_data(&mut issue, &label, value.as_deref().unwrap_or(""))
                        .await?;
                    tracing::info!("#{}: removed {}", number, label);
                }
                (Some(label), None) => {
                    for v in github.issue_data(&issue).values(&label) {
                        println!("{}", v);
                    }
                }
                (None, _) => {
                    for (label, v) in github.issue_data(&issue).data {
                        println!("{}: {}", label, v);
                    }
                }
            }
        }

        Command::VerifyWebhook {
            signature,
            payload,
            secret,
        } => {
            let secret = match secret {
                Some(secret) => secret,
                None => config
                    .github
                    .as_ref()
                    .map(|g| g.secret.clone())
                    .context("No --secret given and no [github] section")?,
            };
            let body = std::fs::read(&payload)
                .with_context(|| format!("Failed to read {}", payload.display()))?;

            if !webhook::verify_signature(&secret, &signature, &body) {
                bail!("Signature does not match {}", payload.display());
            }
            println!("valid");
        }

        Command::MoveIssue {
            repo_id,
            workspace,
            issue,
            pipeline,
        } => {
            let zenhub = config.zenhub_client()?;
            zenhub.move_issue(repo_id, &workspace, issue, &pipeline).await?;
        }
    }

    Ok(())
}
