use anyhow::Context;
use clap::Parser;
use kube::CustomResourceExt;

use tagwatch::core::config::{compose_config, TagwatchConfig};
use tagwatch::dto::check::{CheckAcceptedDto, ComponentChangedReqDto, DesiredStateDto, TimelineDto};
use tagwatch::model::spec::DesiredVersion;
use tagwatch::resolver::registry::ResolverRegistry;

use crate::args::{Commands, ResolveArgs, TagCtlArgs};
use crate::client::SimpleRest;
use crate::command::{execute_command, ChangeNotified, ResolvedVersion};

mod args;
mod client;
mod command;

async fn resolve_locally(args: ResolveArgs) -> anyhow::Result<ResolvedVersion> {
    let config: TagwatchConfig = compose_config("tagwatch", "tagwatch")
        .context("Error loading configuration")?;
    let registry = ResolverRegistry::with_builtins(&config.resolver);
    let resolver = registry.dispatch(&args.source)
        .with_context(|| format!("No resolver available for source '{}'", args.source))?;
    let version = resolver.resolve(&args.repository, &args.name, &args.pattern).await?;
    Ok(ResolvedVersion {
        source: args.source,
        repository: args.repository,
        version,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: TagCtlArgs = TagCtlArgs::parse();

    let client = SimpleRest::new(&args.url);
    match args.subcommand {
        Commands::Check(check_args) => {
            let path = match check_args.name {
                Some(name) => format!("/check/{name}"),
                None => String::from("/check"),
            };
            execute_command(
                args.out_format,
                || client.post::<(), CheckAcceptedDto>(&path, None),
            ).await;
        }
        Commands::Changed(changed_args) => {
            let name = changed_args.name.clone();
            execute_command(
                args.out_format,
                || async move {
                    client.post_no_content("/fleet/changed", Some(ComponentChangedReqDto::from(changed_args))).await?;
                    Ok::<_, anyhow::Error>(ChangeNotified { name })
                },
            ).await;
        }
        Commands::Resolve(resolve_args) => {
            execute_command(
                args.out_format,
                || resolve_locally(resolve_args),
            ).await;
        }
        Commands::Desired(desired_args) => {
            let path = format!("/desired/{}/{}", desired_args.namespace, desired_args.name);
            execute_command(
                args.out_format,
                || client.get::<DesiredStateDto>(&path),
            ).await;
        }
        Commands::Timeline(timeline_args) => {
            let path = format!("/timeline/{}/{}", timeline_args.team, timeline_args.name);
            execute_command(
                args.out_format,
                || client.get::<TimelineDto>(&path),
            ).await;
        }
        Commands::Crd => {
            let crd = serde_json::to_string_pretty(&DesiredVersion::crd())
                .context("Error serializing crd")?;
            println!("{crd}");
        }
    }
    Ok(())
}
