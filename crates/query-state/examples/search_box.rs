//! A search box whose state lives in the URL.
//!
//! Run with: `RUST_LOG=query_state=debug cargo run --example search_box`

use query_state::adapter::memory::MemoryHistoryAdapter;
use query_state::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let history = Arc::new(MemoryHistoryAdapter::new("/search?q=tokio"));
    let session = QuerySession::new(history.clone());

    let query = session.state(QueryKey::new("query", parse_as_string()).with_url_key("q"));
    let page = session.state(QueryKey::new("page", parse_as_integer().with_default(1)));
    let langs = session.state(QueryKey::new("langs", parse_as_array_of(parse_as_string())));

    let mut query_changes = query.subscribe();

    println!("start:        {}", history.current_url());
    println!("query = {:?}, page = {}", query.get(), page.get());

    // Typing into the box replaces the entry; everything lands in one update.
    query.set(Some("tokio runtime".into()))?;
    langs.set(Some(vec!["rust".into(), "c++".into()]))?;
    page.update(|p| Some(p + 1))?.await?;
    println!("after typing: {}", history.current_url());

    if let Some(change) = query_changes.try_recv() {
        println!("query key changed to {:?}", change.query);
    }

    // Paging pushes a history entry.
    page.set_with(Some(3), Options::push())?.await?;
    println!("paged:        {} ({} entries)", history.current_url(), history.history_len());

    // Back to page 1 clears the parameter.
    page.set(Some(1))?.await?;
    println!("first page:   {}", history.current_url());

    history.back();
    println!("back:         {} (page = {})", history.current_url(), page.get());

    // Shareable link for the same state, built without a session.
    let link = Serializer::new("https://example.com/search")
        .set(query.key(), query.get().as_ref())
        .set(page.key(), Some(&page.get()))
        .finish();
    println!("share:        {link}");

    Ok(())
}
