use docrag_embed::{BgeM3Embedder, Embedder};

fn main() -> anyhow::Result<()> {
    let embedder = BgeM3Embedder::new()?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("B={} dim={}", embs.len(), embedder.dim());
    Ok(())
}
