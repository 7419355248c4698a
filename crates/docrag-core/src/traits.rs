/// Maps text to fixed-dimension vectors.
///
/// Implementations must preserve batch order (`output[i]` belongs to
/// `texts[i]`) and return vectors of length [`Embedder::dim`].
pub trait Embedder: Send + Sync {
    /// Identifies the model behind the vectors; saved indexes record it.
    fn name(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn name(&self) -> &str { (**self).name() }
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
}
