//! Escape command - print the cache key of a repository URL

use crate::error::MorphResult;
use crate::escape::escape_url;

pub async fn execute(url: &str) -> MorphResult<()> {
    println!("{}", escape_url(url));
    Ok(())
}
