//! Optimist Demo - a book record edited ahead of a fake server
//!
//! Walks through:
//! - Immediate updates
//! - An optimistic update the server rejects (rolled back)
//! - An optimistic update the server confirms with its own value
//!
//! Set `RUST_LOG=optimist_state=debug` to watch the engine reconcile.

use std::time::Duration;

use optimist_core::{Document, Mutation, Node};
use optimist_state::{DocumentState, ResolvedUpdate};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("starting book demo");
    println!("=== Optimist Book Demo ===\n");

    let book = DocumentState::new(json!({ "title": "To Kill a Mockingbird", "awards": 1 }));
    println!("1. Initial value:\n   {}", book.value());

    book.subscribe(|change| {
        println!("   [change] {}", change.value);
        for report in &change.resolved {
            match report {
                ResolvedUpdate::Succeeded { id, payload } => {
                    println!("   [change] update {} confirmed (payload: {:?})", id, payload)
                }
                ResolvedUpdate::Failed { id, reason } => {
                    println!("   [change] update {} rolled back: {}", id, reason)
                }
            }
        }
        if change.loading {
            println!("   [change] still waiting on the server");
        }
    });

    // Immediate updates skip the queue and publish nothing
    let value = book.update(Mutation::from_fn(|doc: Document| {
        let awards = doc.get("awards").and_then(Node::as_i64).unwrap_or(0);
        doc.set("author", "Harper Lee")
            .set("awards", awards + 1)
            .set("followers", vec![Node::from("Kevin"), Node::from("Caleb")])
    }))?;
    println!("\n2. After an immediate update:\n   {}", value);

    println!("\n3. Optimistically adding followers...");
    let followers = book.push_update(Mutation::from_fn(|doc: Document| {
        doc.splice("followers", 1, ["Marcy", "Zach", "Bill"])
    }))?;
    println!("   visible now: {}", book.value()["followers"]);

    tokio::time::sleep(Duration::from_millis(400)).await;
    println!("\n4. The server rejects the change...");
    followers.failed("500: We don't like Marcy.");
    tokio::time::sleep(Duration::from_millis(10)).await;
    println!("   visible now: {}", book.value()["followers"]);

    println!("\n5. Optimistically renaming, the server answers with its own title...");
    let rename = book.push_update(Mutation::new(|doc: Document, confirmed: Option<&Value>| {
        let title = confirmed
            .and_then(Value::as_str)
            .unwrap_or("To Kill a Mockingbird (draft)");
        doc.set("title", title)
    }))?;

    tokio::time::sleep(Duration::from_millis(200)).await;
    rename.succeeded(Some(json!("To Kill a Mockingbird (50th Anniversary)")));
    tokio::time::sleep(Duration::from_millis(10)).await;

    println!("\n6. Final value:\n   {}", book.value());
    println!("   pending updates: {}", book.pending());
    info!(pending = book.pending(), "book demo finished");

    println!("\n=== Demo Complete ===");
    Ok(())
}
