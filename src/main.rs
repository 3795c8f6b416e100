//! sitekiln - static site build pipeline.

use anyhow::Result;
use clap::Parser;
use sitekiln::{
    builder::SiteBuilder,
    cli::{Cli, Commands},
    config::SiteConfig,
    log,
    pipeline::FileSet,
    serve::serve_site,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;
    let mut builder = SiteBuilder::new(config);

    let files = match &cli.command {
        Commands::Prepare => builder.prepare()?,
        Commands::Metainfo => builder.refresh_metadata()?,
        Commands::Generate { force } => builder.generate(*force)?,
        Commands::Publish { .. } => {
            let deploy = builder.config().deploy.clone();
            builder.publish(deploy)?
        }
        Commands::Serve { .. } => {
            let port = builder.config().serve.port;
            return serve_site(builder, port, |result| match result {
                Ok(files) => report(files),
                Err(err) => log!("error"; "{err:#}"),
            });
        }
    };

    report(&files);
    Ok(())
}

fn report(files: &FileSet) {
    log!("build"; "{} files processed", files.len());
}
