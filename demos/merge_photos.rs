//! Merges two photos with the default Polaroid prompt.
//!
//! Run with: `cargo run --example merge_photos -- <before.jpg> <after.jpg>`
//!
//! Requires `GOOGLE_API_KEY` environment variable.

use memory_merge::{GeminiProvider, MergeSession, Slot, View};

#[tokio::main]
async fn main() -> memory_merge::Result<()> {
    let mut args = std::env::args().skip(1);
    let (Some(before), Some(after)) = (args.next(), args.next()) else {
        eprintln!("Usage: merge_photos <before.jpg> <after.jpg>");
        std::process::exit(2);
    };

    let session = MergeSession::new(GeminiProvider::builder().build()?);
    session.select_image(Slot::Before, &before).await?;
    session.select_image(Slot::After, &after).await?;

    session.attempt_merge().await;
    match session.view() {
        View::Success { .. } => {
            if let Some(path) = session.download(".").await? {
                println!("Merged image saved to {}", path.display());
            }
        }
        view => println!("{view}"),
    }

    Ok(())
}
