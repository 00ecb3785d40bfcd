//! get / list / show.

use clinica_api::Request;

use crate::cli::{GetArgs, ListArgs, ShowArgs};
use crate::commands::Context;
use crate::error::CliError;

fn pairs(query: &[(String, String)]) -> Vec<(&str, &str)> {
    query.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

pub async fn get(ctx: &Context, args: GetArgs) -> Result<(), CliError> {
    let path = if args.path.starts_with('/') {
        args.path
    } else {
        format!("/{}", args.path)
    };
    let request = Request::get(path).query(pairs(&args.query));
    let value = ctx.client.execute(&request).await?;
    ctx.emit(&value)
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<(), CliError> {
    let items = ctx.client.list(args.resource, &pairs(&args.query)).await?;
    tracing::debug!(resource = %args.resource, count = items.len(), "listed");
    ctx.emit(&items)
}

pub async fn show(ctx: &Context, args: ShowArgs) -> Result<(), CliError> {
    let item = ctx.client.fetch(args.resource, &args.id).await?;
    ctx.emit(&item)
}
