//! Texture source trait.

use image::RgbaImage;
use std::future::Future;
use std::sync::Arc;

/// Callback receiving `(completed, total, resource_name)` during prefetch.
pub type PrefetchProgress = Arc<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Supplier of tileset textures.
///
/// Rendering only calls [`tile_image`](TextureSource::tile_image), which must
/// not block; everything slow happens in [`prefetch`](TextureSource::prefetch).
/// Images are shared through `Arc` since renderers only read them.
pub trait TextureSource: Send + Sync + 'static {
    /// Loads the named resources so later lookups hit memory.
    ///
    /// Returns the number of textures available after the call. Failures are
    /// not errors: affected tiles render gray.
    fn prefetch(
        &self,
        names: &[String],
        progress: Option<PrefetchProgress>,
    ) -> impl Future<Output = usize> + Send;

    /// Returns a loaded texture.
    fn tile_image(&self, name: &str) -> Option<Arc<RgbaImage>>;

    /// First fetch failure seen, if any.
    fn first_network_error(&self) -> Option<String>;
}
